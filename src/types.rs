//! 核心数据类型
//!
//! 定义翻译请求、翻译结果和反馈记录等跨组件共享的数据结构。
//! 翻译结果一经产生即不可变；缓存键由内容哈希唯一确定。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 翻译请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationRequest {
    pub text: String,
    pub source_lang: String,
    pub target_lang: String,
    /// 启用后编排器会向多个服务并发请求并择优返回
    pub quality_optimization: bool,
}

impl TranslationRequest {
    pub fn new(text: &str, source_lang: &str, target_lang: &str) -> Self {
        Self {
            text: text.to_string(),
            source_lang: source_lang.to_string(),
            target_lang: target_lang.to_string(),
            quality_optimization: false,
        }
    }

    /// 请求对应的缓存键
    pub fn content_hash(&self) -> String {
        content_hash(&self.text, &self.source_lang, &self.target_lang)
    }
}

/// 结果来源标记
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultSource {
    /// 远程翻译服务返回
    Provider,
    /// 缓存命中
    Cache,
    /// 本地规则翻译器降级
    RuleBased,
    /// 原文透传（最终兜底，置信度为0）
    Passthrough,
}

impl ResultSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultSource::Provider => "provider",
            ResultSource::Cache => "cache",
            ResultSource::RuleBased => "rule_based",
            ResultSource::Passthrough => "passthrough",
        }
    }
}

/// 翻译结果
///
/// 一经产生即不可变。`confidence_score` 取值范围 [0,1]，
/// `quality_score` 只在经过质量评估器评分后存在。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationOutput {
    pub original_text: String,
    pub translated_text: String,
    pub source_lang: String,
    pub target_lang: String,
    /// 实际产生结果的服务名，降级时为 "rule_based_translator" 或 "passthrough"
    pub provider_name: String,
    pub confidence_score: f64,
    pub quality_score: Option<f64>,
    pub timestamp: DateTime<Utc>,
    /// 降级结果携带的诊断信息
    pub error_kind: Option<String>,
    pub source: ResultSource,
    /// 降级层级：0=服务成功，1=规则翻译器，2=原文透传
    pub fallback_level: u8,
}

impl TranslationOutput {
    /// 服务成功返回的结果
    pub fn from_provider(
        request: &TranslationRequest,
        provider_name: &str,
        translated_text: String,
        confidence_score: f64,
    ) -> Self {
        Self {
            original_text: request.text.clone(),
            translated_text,
            source_lang: request.source_lang.clone(),
            target_lang: request.target_lang.clone(),
            provider_name: provider_name.to_string(),
            confidence_score: confidence_score.clamp(0.0, 1.0),
            quality_score: None,
            timestamp: Utc::now(),
            error_kind: None,
            source: ResultSource::Provider,
            fallback_level: 0,
        }
    }

    /// 标记为缓存命中的副本
    pub fn as_cache_hit(mut self) -> Self {
        self.source = ResultSource::Cache;
        self
    }

    /// 结果是否等同于未翻译（空输出或与原文完全一致按失败处理）
    pub fn is_unchanged(&self) -> bool {
        let t = self.translated_text.trim();
        t.is_empty() || t == self.original_text.trim()
    }
}

/// 反馈记录（追加写入的审计条目）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub request_id: String,
    pub original_text: String,
    pub translated_text: String,
    pub provider_name: String,
    /// 用户评分，1-5
    pub rating: Option<u8>,
    pub corrected_text: Option<String>,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// 内容哈希：对 (text, source_lang, target_lang) 的确定性摘要
///
/// 字段之间插入分隔符，避免 ("ab","c") 与 ("a","bc") 产生同一摘要。
pub fn content_hash(text: &str, source_lang: &str, target_lang: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(text.as_bytes());
    hasher.update(b"\x1f");
    hasher.update(source_lang.as_bytes());
    hasher.update(b"\x1f");
    hasher.update(target_lang.as_bytes());
    hasher.finalize().to_hex().to_string()
}
