//! 翻译引擎统一错误处理
//!
//! 提供结构化错误类型和错误处理机制。
//! 错误分为四大来源：输入校验、服务调用、预算控制和持久化。
//! 服务与缓存层的失败在编排器内部完全恢复，
//! 只有输入错误和显式的持久化失败会到达调用方。

use std::fmt;

use thiserror::Error;

/// 翻译错误类型
#[derive(Error, Debug, Clone)]
pub enum TranslationError {
    /// 输入验证错误（空文本等），不重试，直接返回
    #[error("输入无效: {0}")]
    InvalidInput(String),

    /// 不支持的语言对，不重试，直接返回
    #[error("不支持的语言对: {source_lang} -> {target_lang}")]
    UnsupportedLanguage {
        source_lang: String,
        target_lang: String,
    },

    /// 候选集为空（质量评分要求至少一个候选）
    #[error("候选结果为空，无法评分")]
    EmptyCandidates,

    /// 网络错误
    #[error("网络错误: {0}")]
    NetworkError(String),

    /// 超时错误
    #[error("操作超时: {0}")]
    TimeoutError(String),

    /// 认证错误（API密钥无效或过期）
    #[error("认证失败: {0}")]
    AuthError(String),

    /// 速率限制错误
    #[error("请求速率过快，已达到限制: {0}")]
    RateLimitExceeded(String),

    /// 翻译服务错误（服务端返回异常响应）
    #[error("翻译服务 {provider} 错误: {message}")]
    ProviderError { provider: String, message: String },

    /// 所有服务都失败，触发本地降级，不会抛出到调用方
    #[error("所有翻译服务都失败: {0}")]
    AllProvidersFailed(String),

    /// 预算超限，服务被预先跳过
    #[error("翻译服务 {provider} 预算超限，已跳过")]
    BudgetExceeded { provider: String },

    /// 缓存错误（损坏条目已删除并按未命中处理）
    #[error("缓存错误: {0}")]
    CacheError(String),

    /// 配置错误
    #[error("配置错误: {0}")]
    ConfigError(String),

    /// 配置持久化错误，会返回给配置变更的调用方
    #[error("配置持久化失败: {0}")]
    PersistenceError(String),

    /// 序列化错误
    #[error("序列化错误: {0}")]
    SerializationError(String),

    /// 解析错误
    #[error("解析错误: {0}")]
    ParseError(String),

    /// 内部错误
    #[error("内部错误: {0}")]
    InternalError(String),
}

impl TranslationError {
    /// 检查错误是否可重试
    pub fn is_retryable(&self) -> bool {
        match self {
            TranslationError::NetworkError(_) => true,
            TranslationError::TimeoutError(_) => true,
            TranslationError::ProviderError { .. } => true,
            TranslationError::RateLimitExceeded(_) => true,
            TranslationError::CacheError(_) => true,
            TranslationError::AuthError(_) => false, // 换密钥而非重试
            TranslationError::InvalidInput(_) => false,
            TranslationError::UnsupportedLanguage { .. } => false,
            TranslationError::EmptyCandidates => false,
            TranslationError::AllProvidersFailed(_) => false,
            TranslationError::BudgetExceeded { .. } => false,
            TranslationError::ConfigError(_) => false,
            TranslationError::PersistenceError(_) => false,
            TranslationError::SerializationError(_) => false,
            TranslationError::ParseError(_) => false,
            TranslationError::InternalError(_) => false,
        }
    }

    /// 获取错误的严重程度
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            TranslationError::InvalidInput(_) => ErrorSeverity::Info,
            TranslationError::UnsupportedLanguage { .. } => ErrorSeverity::Info,
            TranslationError::EmptyCandidates => ErrorSeverity::Info,
            TranslationError::NetworkError(_) => ErrorSeverity::Warning,
            TranslationError::TimeoutError(_) => ErrorSeverity::Warning,
            TranslationError::RateLimitExceeded(_) => ErrorSeverity::Warning,
            TranslationError::CacheError(_) => ErrorSeverity::Warning,
            TranslationError::BudgetExceeded { .. } => ErrorSeverity::Warning,
            TranslationError::AuthError(_) => ErrorSeverity::Error,
            TranslationError::ProviderError { .. } => ErrorSeverity::Error,
            TranslationError::AllProvidersFailed(_) => ErrorSeverity::Error,
            TranslationError::SerializationError(_) => ErrorSeverity::Error,
            TranslationError::ParseError(_) => ErrorSeverity::Error,
            TranslationError::ConfigError(_) => ErrorSeverity::Critical,
            TranslationError::PersistenceError(_) => ErrorSeverity::Critical,
            TranslationError::InternalError(_) => ErrorSeverity::Critical,
        }
    }

    /// 获取错误类别
    pub fn category(&self) -> ErrorCategory {
        match self {
            TranslationError::InvalidInput(_) => ErrorCategory::Input,
            TranslationError::UnsupportedLanguage { .. } => ErrorCategory::Input,
            TranslationError::EmptyCandidates => ErrorCategory::Input,
            TranslationError::NetworkError(_) => ErrorCategory::Network,
            TranslationError::TimeoutError(_) => ErrorCategory::Timeout,
            TranslationError::AuthError(_) => ErrorCategory::Auth,
            TranslationError::RateLimitExceeded(_) => ErrorCategory::RateLimit,
            TranslationError::ProviderError { .. } => ErrorCategory::Service,
            TranslationError::AllProvidersFailed(_) => ErrorCategory::Service,
            TranslationError::BudgetExceeded { .. } => ErrorCategory::Budget,
            TranslationError::CacheError(_) => ErrorCategory::Cache,
            TranslationError::ConfigError(_) => ErrorCategory::Configuration,
            TranslationError::PersistenceError(_) => ErrorCategory::Persistence,
            TranslationError::SerializationError(_) => ErrorCategory::Serialization,
            TranslationError::ParseError(_) => ErrorCategory::Parsing,
            TranslationError::InternalError(_) => ErrorCategory::Internal,
        }
    }

    /// 错误的简短标识，写入降级结果的 error_kind 字段供观测使用
    pub fn kind(&self) -> &'static str {
        match self {
            TranslationError::InvalidInput(_) => "invalid_input",
            TranslationError::UnsupportedLanguage { .. } => "unsupported_language",
            TranslationError::EmptyCandidates => "empty_candidates",
            TranslationError::NetworkError(_) => "network",
            TranslationError::TimeoutError(_) => "timeout",
            TranslationError::AuthError(_) => "auth",
            TranslationError::RateLimitExceeded(_) => "rate_limit",
            TranslationError::ProviderError { .. } => "provider",
            TranslationError::AllProvidersFailed(_) => "all_providers_failed",
            TranslationError::BudgetExceeded { .. } => "budget_exceeded",
            TranslationError::CacheError(_) => "cache",
            TranslationError::ConfigError(_) => "config",
            TranslationError::PersistenceError(_) => "persistence",
            TranslationError::SerializationError(_) => "serialization",
            TranslationError::ParseError(_) => "parse",
            TranslationError::InternalError(_) => "internal",
        }
    }
}

/// 错误严重程度
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Input,
    Network,
    Timeout,
    Auth,
    RateLimit,
    Service,
    Budget,
    Cache,
    Configuration,
    Persistence,
    Serialization,
    Parsing,
    Internal,
}

/// 标准错误转换
impl From<std::io::Error> for TranslationError {
    fn from(error: std::io::Error) -> Self {
        TranslationError::CacheError(format!("IO错误: {}", error))
    }
}

impl From<serde_json::Error> for TranslationError {
    fn from(error: serde_json::Error) -> Self {
        TranslationError::SerializationError(format!("JSON序列化错误: {}", error))
    }
}

impl From<toml::de::Error> for TranslationError {
    fn from(error: toml::de::Error) -> Self {
        TranslationError::ParseError(format!("TOML解析错误: {}", error))
    }
}

impl From<toml::ser::Error> for TranslationError {
    fn from(error: toml::ser::Error) -> Self {
        TranslationError::SerializationError(format!("TOML序列化错误: {}", error))
    }
}

impl From<tokio::time::error::Elapsed> for TranslationError {
    fn from(error: tokio::time::error::Elapsed) -> Self {
        TranslationError::TimeoutError(format!("异步操作超时: {}", error))
    }
}

impl From<reqwest::Error> for TranslationError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            TranslationError::TimeoutError(format!("请求超时: {}", error))
        } else if error.is_status() {
            let status = error.status().map(|s| s.as_u16()).unwrap_or(0);
            match status {
                401 | 403 => TranslationError::AuthError(format!("HTTP {}: {}", status, error)),
                429 => TranslationError::RateLimitExceeded(format!("HTTP 429: {}", error)),
                _ => TranslationError::NetworkError(format!("HTTP {}: {}", status, error)),
            }
        } else {
            TranslationError::NetworkError(format!("请求失败: {}", error))
        }
    }
}

/// 错误结果类型别名
pub type TranslationResult<T> = Result<T, TranslationError>;

/// 错误处理助手函数
pub mod helpers {
    use super::*;

    /// 按严重程度记录并返回错误
    pub fn log_error<T>(error: TranslationError) -> TranslationResult<T> {
        match error.severity() {
            ErrorSeverity::Info => tracing::info!("翻译信息: {}", error),
            ErrorSeverity::Warning => tracing::warn!("翻译警告: {}", error),
            ErrorSeverity::Error => tracing::error!("翻译错误: {}", error),
            ErrorSeverity::Critical => tracing::error!("翻译严重错误: {}", error),
        }

        Err(error)
    }

    /// 创建网络错误
    pub fn network_error<T: fmt::Display>(msg: T) -> TranslationError {
        TranslationError::NetworkError(msg.to_string())
    }

    /// 创建配置错误
    pub fn config_error<T: fmt::Display>(msg: T) -> TranslationError {
        TranslationError::ConfigError(msg.to_string())
    }

    /// 创建缓存错误
    pub fn cache_error<T: fmt::Display>(msg: T) -> TranslationError {
        TranslationError::CacheError(msg.to_string())
    }

    /// 创建输入验证错误
    pub fn validation_error<T: fmt::Display>(msg: T) -> TranslationError {
        TranslationError::InvalidInput(msg.to_string())
    }

    /// 创建超时错误
    pub fn timeout_error<T: fmt::Display>(msg: T) -> TranslationError {
        TranslationError::TimeoutError(msg.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(TranslationError::NetworkError("连接重置".into()).is_retryable());
        assert!(TranslationError::TimeoutError("5s".into()).is_retryable());
        assert!(!TranslationError::InvalidInput("空文本".into()).is_retryable());
        assert!(!TranslationError::AuthError("密钥无效".into()).is_retryable());
        assert!(!TranslationError::BudgetExceeded {
            provider: "deeplx".into()
        }
        .is_retryable());
    }

    #[test]
    fn test_severity_and_category() {
        let err = TranslationError::PersistenceError("写入失败".into());
        assert_eq!(err.severity(), ErrorSeverity::Critical);
        assert_eq!(err.category(), ErrorCategory::Persistence);

        let err = TranslationError::UnsupportedLanguage {
            source_lang: "en".into(),
            target_lang: "xx".into(),
        };
        assert_eq!(err.severity(), ErrorSeverity::Info);
        assert_eq!(err.category(), ErrorCategory::Input);
    }

    #[test]
    fn test_kind_labels() {
        assert_eq!(
            TranslationError::AllProvidersFailed("0个结果".into()).kind(),
            "all_providers_failed"
        );
        assert_eq!(TranslationError::EmptyCandidates.kind(), "empty_candidates");
    }
}
