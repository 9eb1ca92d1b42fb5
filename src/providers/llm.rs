//! 大模型翻译适配器
//!
//! 对接 OpenAI 兼容的 chat-completion 接口，把翻译表述为一条系统指令。
//! 温度固定为0以获得尽量确定的输出。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::TranslationProvider;
use crate::error::{TranslationError, TranslationResult};
use crate::types::{TranslationOutput, TranslationRequest};

/// 大模型输出的基础置信度；生成式结果波动更大，低于专用翻译接口
const BASE_CONFIDENCE: f64 = 0.85;

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f64,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

pub struct LlmProvider {
    name: String,
    api_url: String,
    model: String,
    client: reqwest::Client,
}

impl LlmProvider {
    pub fn new(name: &str, api_url: &str, model: &str) -> Self {
        Self {
            name: name.to_string(),
            api_url: api_url.to_string(),
            model: model.to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn system_prompt(source_lang: &str, target_lang: &str) -> String {
        format!(
            "You are a professional news translator. Translate the user's text from {} to {}. \
             Output only the translation, keep numbers and proper nouns intact.",
            source_lang, target_lang
        )
    }
}

#[async_trait]
impl TranslationProvider for LlmProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn translate(
        &self,
        request: &TranslationRequest,
        api_key: &str,
    ) -> TranslationResult<TranslationOutput> {
        let body = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: Self::system_prompt(&request.source_lang, &request.target_lang),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: request.text.clone(),
                },
            ],
            temperature: 0.0,
        };

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(TranslationError::RateLimitExceeded(format!(
                "{} 返回 429",
                self.name
            )));
        }
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(TranslationError::AuthError(format!(
                "{} 拒绝了当前密钥 (HTTP {})",
                self.name, status
            )));
        }
        if !status.is_success() {
            return Err(TranslationError::ProviderError {
                provider: self.name.clone(),
                message: format!("HTTP {}", status),
            });
        }

        let parsed: ChatResponse = response.json().await?;
        let translated = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content.trim().to_string())
            .unwrap_or_default();

        if translated.is_empty() {
            return Err(TranslationError::ProviderError {
                provider: self.name.clone(),
                message: "模型返回空内容".to_string(),
            });
        }

        Ok(TranslationOutput::from_provider(
            request,
            &self.name,
            translated,
            BASE_CONFIDENCE,
        ))
    }
}
