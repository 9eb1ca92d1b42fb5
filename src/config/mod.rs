//! 动态配置管理
//!
//! 服务配置、成本账本和质量阈值的唯一事实来源。
//! 支持热重载（文件系统通知，降级为定时轮询）、
//! 部分字段更新、API密钥轮换和原子化持久化。

pub mod manager;
pub mod watcher;

pub use manager::{
    ConfigManager, CostControlConfig, CostStatistics, EngineSettings, ProviderConfig,
    ProviderUpdate, QualityConfig,
};
pub use watcher::{spawn_config_watcher, ConfigReloadEvent};

/// 配置常量
pub mod constants {
    use std::time::Duration;

    /// 配置文件搜索路径
    pub const CONFIG_PATHS: &[&str] = &[
        "news-translator.toml",
        ".news-translator.toml",
        "~/.config/news-translator/config.toml",
        "/etc/news-translator/config.toml",
    ];

    /// 预算告警阈值（80%）
    pub const DEFAULT_ALERT_THRESHOLD: f64 = 0.8;
    /// 默认日预算（货币单位）
    pub const DEFAULT_DAILY_BUDGET: f64 = 10.0;
    /// 默认月预算
    pub const DEFAULT_MONTHLY_BUDGET: f64 = 200.0;

    /// 质量优化模式的质量阈值
    pub const DEFAULT_QUALITY_THRESHOLD: f64 = 0.8;

    /// 单次服务调用的默认超时
    pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
    /// 每服务默认重试次数
    pub const DEFAULT_RETRY_COUNT: u32 = 3;
    /// 默认每分钟请求上限
    pub const DEFAULT_RATE_LIMIT_PER_MINUTE: u32 = 60;

    /// 配置文件轮询间隔（无法使用文件系统通知时）
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
}

/// 检查是否存在配置文件
pub fn config_file_exists() -> bool {
    constants::CONFIG_PATHS.iter().any(|path| {
        let expanded = shellexpand::tilde(path);
        std::path::Path::new(expanded.as_ref()).exists()
    })
}
