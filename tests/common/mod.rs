//! 集成测试公共设施
//!
//! 提供带临时数据目录和可控模拟服务的引擎构造器。

#![allow(dead_code)]

use std::sync::Arc;

use tempfile::TempDir;

use news_translator::{
    ConfigManager, EngineSettings, MockBehavior, MockProvider, OrchestratorContext,
    ProviderConfig, ProviderRegistry, TranslationEngine, TranslationProvider,
};

/// 测试引擎：持有临时目录保证生命周期
pub struct TestEngine {
    pub engine: Arc<TranslationEngine>,
    pub config: Arc<ConfigManager>,
    pub dir: TempDir,
}

/// 用一组模拟服务构造引擎；`mutate` 可调整默认配置
pub fn engine_with<F>(providers: Vec<Arc<dyn TranslationProvider>>, mutate: F) -> TestEngine
where
    F: FnOnce(&mut EngineSettings),
{
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let dir = TempDir::new().expect("创建临时目录失败");

    let mut settings = EngineSettings::default();
    settings.services = providers
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let mut service = ProviderConfig::new(p.name(), "mock", i as u32 + 1);
            // 测试默认每字符成本很低，预算测试自行调整
            service.cost_per_char = 0.000_01;
            service
        })
        .collect();
    mutate(&mut settings);

    let config = Arc::new(ConfigManager::with_settings(settings, None).expect("配置无效"));

    let mut registry = ProviderRegistry::new();
    for provider in providers {
        registry.register(provider);
    }

    let ctx = OrchestratorContext::build(registry, Arc::clone(&config), dir.path())
        .expect("构造上下文失败");
    let engine = Arc::new(TranslationEngine::new(ctx));

    TestEngine {
        engine,
        config,
        dir,
    }
}

/// 单个正常服务的引擎
pub fn single_provider_engine(name: &str) -> TestEngine {
    engine_with(vec![Arc::new(MockProvider::new(name))], |_| {})
}

/// 指定行为的模拟服务
pub fn mock(name: &str, behavior: MockBehavior) -> Arc<dyn TranslationProvider> {
    Arc::new(MockProvider::with_behavior(name, behavior))
}
