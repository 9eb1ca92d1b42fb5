//! 翻译服务适配器
//!
//! 所有远程翻译后端都通过同一个能力接口接入：
//! `translate` / `translate_batch` / `health_probe` / `name`。
//! 选路逻辑只依赖该接口，不关心具体后端。
//!
//! 内置适配器：
//! - [`DeepLxProvider`]: DeepLX 兼容的 HTTP JSON 接口
//! - [`LlmProvider`]: OpenAI 兼容的 chat-completion 接口
//! - [`MockProvider`]: 进程内的确定性实现，用于测试与本地开发

pub mod deeplx;
pub mod llm;
pub mod mock;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{TranslationError, TranslationResult};
use crate::types::{TranslationOutput, TranslationRequest};

pub use deeplx::DeepLxProvider;
pub use llm::LlmProvider;
pub use mock::{MockBehavior, MockProvider};

/// 健康探测用的固定短文本
pub const PROBE_TEXT: &str = "hello";

/// 翻译服务的统一能力接口
///
/// 实现必须是 `Send + Sync`：编排器会在并发任务间共享适配器。
/// `api_key` 由配置管理器轮换后传入，无需密钥的服务忽略即可。
#[async_trait]
pub trait TranslationProvider: Send + Sync {
    /// 服务名，与配置中的 `ProviderConfig.name` 对应
    fn name(&self) -> &str;

    /// 翻译单段文本
    async fn translate(
        &self,
        request: &TranslationRequest,
        api_key: &str,
    ) -> TranslationResult<TranslationOutput>;

    /// 批量翻译；默认逐条调用，适配器可覆盖为真正的批量接口
    async fn translate_batch(
        &self,
        requests: &[TranslationRequest],
        api_key: &str,
    ) -> TranslationResult<Vec<TranslationOutput>> {
        let mut outputs = Vec::with_capacity(requests.len());
        for request in requests {
            outputs.push(self.translate(request, api_key).await?);
        }
        Ok(outputs)
    }

    /// 健康探测：返回一次最小调用的延迟
    async fn health_probe(&self, api_key: &str) -> TranslationResult<Duration> {
        let probe = TranslationRequest::new(PROBE_TEXT, "en", "zh");
        let start = std::time::Instant::now();
        self.translate(&probe, api_key).await?;
        Ok(start.elapsed())
    }
}

/// 适配器注册表
///
/// 按名字索引的只读集合，启动时注册，运行期共享。
#[derive(Default, Clone)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn TranslationProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, provider: Arc<dyn TranslationProvider>) {
        self.providers.insert(provider.name().to_string(), provider);
    }

    pub fn get(&self, name: &str) -> TranslationResult<Arc<dyn TranslationProvider>> {
        self.providers.get(name).cloned().ok_or_else(|| {
            TranslationError::ConfigError(format!("未注册的翻译服务: {}", name))
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.providers.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.providers.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_registry_lookup() {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(MockProvider::new("p1")));
        registry.register(Arc::new(MockProvider::new("p2")));

        assert_eq!(registry.len(), 2);
        assert!(registry.contains("p1"));
        assert_eq!(registry.names(), vec!["p1".to_string(), "p2".to_string()]);
        assert!(registry.get("p1").is_ok());
        assert!(registry.get("p3").is_err());
    }

    #[tokio::test]
    async fn test_default_batch_delegates_to_translate() {
        let provider = MockProvider::new("p1");
        let requests = vec![
            TranslationRequest::new("AI breakthrough", "en", "zh"),
            TranslationRequest::new("new model", "en", "zh"),
        ];

        let outputs = provider.translate_batch(&requests, "").await.unwrap();
        assert_eq!(outputs.len(), 2);
        assert_eq!(outputs[0].provider_name, "p1");
    }

    #[tokio::test]
    async fn test_default_health_probe_measures_latency() {
        let provider = MockProvider::new("p1");
        let latency = provider.health_probe("").await.unwrap();
        assert!(latency < Duration::from_secs(1));
    }
}
