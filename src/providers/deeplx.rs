//! DeepLX 适配器
//!
//! 对接 DeepLX 兼容的翻译接口（POST JSON，默认 `http://localhost:1188/translate`）。
//! 接口无状态，密钥可选，配置了密钥时通过 Bearer 头携带。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::TranslationProvider;
use crate::error::{TranslationError, TranslationResult};
use crate::types::{TranslationOutput, TranslationRequest};

/// DeepLX 默认服务地址
pub const DEFAULT_API_URL: &str = "http://localhost:1188/translate";

/// DeepLX 返回结果的基础置信度
const BASE_CONFIDENCE: f64 = 0.9;

#[derive(Debug, Serialize)]
struct DeepLxRequest<'a> {
    text: &'a str,
    source_lang: String,
    target_lang: String,
}

#[derive(Debug, Deserialize)]
struct DeepLxResponse {
    code: i64,
    #[serde(default)]
    data: String,
    #[serde(default)]
    alternatives: Vec<String>,
}

pub struct DeepLxProvider {
    name: String,
    api_url: String,
    client: reqwest::Client,
}

impl DeepLxProvider {
    pub fn new(name: &str, api_url: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            api_url: api_url.unwrap_or(DEFAULT_API_URL).to_string(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl TranslationProvider for DeepLxProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn translate(
        &self,
        request: &TranslationRequest,
        api_key: &str,
    ) -> TranslationResult<TranslationOutput> {
        let body = DeepLxRequest {
            text: &request.text,
            // DeepLX 使用大写语言代码，auto原样传递
            source_lang: if request.source_lang == "auto" {
                "auto".to_string()
            } else {
                request.source_lang.to_uppercase()
            },
            target_lang: request.target_lang.to_uppercase(),
        };

        let mut http = self.client.post(&self.api_url).json(&body);
        if !api_key.is_empty() {
            http = http.bearer_auth(api_key);
        }

        let response = http.send().await?;
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

        let parsed: DeepLxResponse = response.json().await?;
        if parsed.code != 200 || parsed.data.is_empty() {
            return Err(TranslationError::ProviderError {
                provider: self.name.clone(),
                message: format!("响应异常 code={}", parsed.code),
            });
        }

        // 有备选译文说明服务端做过对比，置信度略微上调
        let confidence = if parsed.alternatives.is_empty() {
            BASE_CONFIDENCE
        } else {
            (BASE_CONFIDENCE + 0.05).min(1.0)
        };

        Ok(TranslationOutput::from_provider(
            request,
            &self.name,
            parsed.data,
            confidence,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization() {
        let body = DeepLxRequest {
            text: "hello",
            source_lang: "EN".to_string(),
            target_lang: "ZH".to_string(),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["text"], "hello");
        assert_eq!(json["source_lang"], "EN");
        assert_eq!(json["target_lang"], "ZH");
    }

    #[test]
    fn test_response_parsing() {
        let json = r#"{"code":200,"id":1,"data":"你好","alternatives":["您好"]}"#;
        let parsed: DeepLxResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.code, 200);
        assert_eq!(parsed.data, "你好");
        assert_eq!(parsed.alternatives.len(), 1);
    }

    #[test]
    fn test_default_url() {
        let provider = DeepLxProvider::new("deeplx", None);
        assert_eq!(provider.api_url, DEFAULT_API_URL);
        assert_eq!(provider.name(), "deeplx");
    }
}
