//! # news-translator
//!
//! 多服务新闻翻译引擎，负责把一段源语言文本变成目标语言结果：
//! 协调多个可互换的远程翻译服务、对候选译文启发式评分、
//! 跨三级存储缓存结果、监控服务健康、执行成本预算，并在服务
//! 失效时逐级优雅降级。
//!
//! ## 模块组织
//!
//! - `orchestrator` - 弹性编排器，引擎入口
//! - `providers` - 翻译服务的统一适配器接口与内置实现
//! - `quality` - 纯函数式的翻译质量评估
//! - `cache` - 内存/文件/数据库三级缓存
//! - `health` - 服务健康状态机与后台探测
//! - `config` - 动态配置、成本账本与热重载
//! - `selector` - 并发对比与自适应选路
//! - `fallback` - 规则翻译器与原文透传兜底
//! - `feedback` - 追加式用户反馈存储
//!
//! # 基本用法
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use news_translator::{
//!     build_registry, ConfigManager, OrchestratorContext, TranslateOptions, TranslationEngine,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Arc::new(ConfigManager::new()?);
//! let registry = build_registry(&config);
//! let ctx = OrchestratorContext::build(registry, config, "./data")?;
//! let engine = Arc::new(TranslationEngine::new(ctx));
//! engine.start_background_tasks();
//!
//! let result = engine
//!     .translate("OpenAI releases new model", "en", "zh", TranslateOptions::default())
//!     .await;
//! println!("{} ({})", result.translated_text, result.provider_name);
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod fallback;
pub mod feedback;
pub mod health;
pub mod lexicon;
pub mod orchestrator;
pub mod providers;
pub mod quality;
pub mod selector;
pub mod types;

// ============================================================================
// 核心API导出
// ============================================================================

pub use config::{ConfigManager, CostStatistics, EngineSettings, ProviderConfig, ProviderUpdate};
pub use error::{ErrorCategory, ErrorSeverity, TranslationError, TranslationResult};
pub use orchestrator::{
    build_registry, EngineStatsSnapshot, OrchestratorContext, TranslateOptions, TranslationEngine,
};
pub use types::{content_hash, FeedbackRecord, ResultSource, TranslationOutput, TranslationRequest};

// ============================================================================
// 高级API导出
// ============================================================================

pub use cache::{CacheConfig, CacheEntry, CacheStats, MultiTierCache};
pub use health::{HealthMonitor, HealthMonitorConfig, HealthRecord, HealthStatus};
pub use providers::{
    DeepLxProvider, LlmProvider, MockBehavior, MockProvider, ProviderRegistry, TranslationProvider,
};
pub use quality::{QualityAssessor, QualityScore};
pub use selector::{AdaptiveSelector, ComparisonOutcome, ProviderComparator, ProviderScore};

/// 模块版本信息
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 引擎自检：逐个构造核心组件并做一次最小调用
pub async fn self_check() -> TranslationResult<()> {
    tracing::info!("开始引擎自检...");

    // 质量评估器
    let assessor = QualityAssessor::new();
    let score = assessor.assess("AI breakthrough", "人工智能突破", "zh");
    if score.overall <= 0.0 {
        return Err(TranslationError::InternalError(
            "质量评估器异常".to_string(),
        ));
    }
    tracing::debug!("✓ 质量评估器正常");

    // 规则翻译器
    let request = TranslationRequest::new("AI breakthrough", "en", "zh");
    fallback::RuleBasedTranslator::new().translate(&request)?;
    tracing::debug!("✓ 规则翻译器正常");

    // 配置管理器（默认配置）
    let _config = ConfigManager::with_settings(EngineSettings::default(), None)?;
    tracing::debug!("✓ 配置管理器正常");

    tracing::info!("引擎自检完成，所有组件正常");
    Ok(())
}

/// 模块初始化日志
pub fn init() {
    tracing::info!("news-translator v{} 已加载", VERSION);
}
