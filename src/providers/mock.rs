//! 进程内模拟适配器
//!
//! 确定性的翻译实现，复用规则词表生成可预期的译文，
//! 供集成测试和无网络的本地开发使用。
//! 可配置失败次数、固定延迟等行为来演练重试与降级路径。

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use super::TranslationProvider;
use crate::error::{TranslationError, TranslationResult};
use crate::fallback;
use crate::types::{TranslationOutput, TranslationRequest};

/// 模拟行为
#[derive(Debug, Clone)]
pub enum MockBehavior {
    /// 总是成功
    Succeed,
    /// 前 n 次调用失败（网络错误），之后成功
    FailTimes(u64),
    /// 总是失败
    AlwaysFail,
    /// 每次调用固定延迟后成功
    Delay(Duration),
}

pub struct MockProvider {
    name: String,
    behavior: MockBehavior,
    confidence: f64,
    calls: AtomicU64,
}

impl MockProvider {
    pub fn new(name: &str) -> Self {
        Self::with_behavior(name, MockBehavior::Succeed)
    }

    pub fn with_behavior(name: &str, behavior: MockBehavior) -> Self {
        Self {
            name: name.to_string(),
            behavior,
            confidence: 0.9,
            calls: AtomicU64::new(0),
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    /// 历史调用总数（含失败的调用）
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    fn render(&self, request: &TranslationRequest) -> TranslationOutput {
        let (translated, mapped, _) = fallback::apply_rules(&request.text);
        // 词表没覆盖到就用可识别的标记包裹，保证输出与原文不同
        let text = if mapped == 0 {
            format!("[{}译] {}", self.name, request.text)
        } else {
            translated
        };
        TranslationOutput::from_provider(request, &self.name, text, self.confidence)
    }
}

#[async_trait]
impl TranslationProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn translate(
        &self,
        request: &TranslationRequest,
        _api_key: &str,
    ) -> TranslationResult<TranslationOutput> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);

        match &self.behavior {
            MockBehavior::Succeed => Ok(self.render(request)),
            MockBehavior::FailTimes(n) if call < *n => Err(TranslationError::NetworkError(
                format!("{} 模拟失败 (第{}次调用)", self.name, call + 1),
            )),
            MockBehavior::FailTimes(_) => Ok(self.render(request)),
            MockBehavior::AlwaysFail => Err(TranslationError::ProviderError {
                provider: self.name.clone(),
                message: "模拟服务不可用".to_string(),
            }),
            MockBehavior::Delay(delay) => {
                tokio::time::sleep(*delay).await;
                Ok(self.render(request))
            }
        }
    }
}
