//! 本地降级翻译
//!
//! 远程服务全部不可用时的两级兜底：
//!
//! 1. 规则翻译器：基于内置词表做逐词映射，译出已知术语，保留专有名词与数字
//! 2. 原文透传：永远成功，置信度为0，携带诊断信息
//!
//! 规则翻译只覆盖词表内的高频词，质量远低于远程服务，
//! 仅用于保证 `translate` 的最终结果总是存在。

use regex::Regex;
use std::sync::OnceLock;

use crate::error::{TranslationError, TranslationResult};
use crate::lexicon;
use crate::types::{ResultSource, TranslationOutput, TranslationRequest};

/// 规则翻译结果的固定服务名
pub const RULE_BASED_NAME: &str = "rule_based_translator";
/// 透传结果的固定服务名
pub const PASSTHROUGH_NAME: &str = "passthrough";

/// 规则翻译的基础置信度，按词表覆盖率折算
const RULE_BASE_CONFIDENCE: f64 = 0.35;

fn token_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // 单词（含连字符）或数字字面量
    RE.get_or_init(|| Regex::new(r"[A-Za-z][A-Za-z0-9'-]*|\d+(?:[.,]\d+)*%?").unwrap())
}

/// 规则翻译器
#[derive(Debug, Default, Clone)]
pub struct RuleBasedTranslator;

impl RuleBasedTranslator {
    pub fn new() -> Self {
        Self
    }

    /// 对请求做规则翻译；词表完全未覆盖时报错，交给透传兜底
    pub fn translate(&self, request: &TranslationRequest) -> TranslationResult<TranslationOutput> {
        let (translated, mapped, total) = apply_rules(&request.text);

        if mapped == 0 {
            return Err(TranslationError::ProviderError {
                provider: RULE_BASED_NAME.to_string(),
                message: "词表未覆盖任何词，无法规则翻译".to_string(),
            });
        }

        let coverage = mapped as f64 / total.max(1) as f64;
        let mut output = TranslationOutput::from_provider(
            request,
            RULE_BASED_NAME,
            translated,
            RULE_BASE_CONFIDENCE * coverage,
        );
        output.source = ResultSource::RuleBased;
        output.fallback_level = 1;
        Ok(output)
    }
}

/// 构造透传结果：原文原样返回，置信度0
pub fn passthrough(request: &TranslationRequest, error_kind: Option<String>) -> TranslationOutput {
    let mut output =
        TranslationOutput::from_provider(request, PASSTHROUGH_NAME, request.text.clone(), 0.0);
    output.source = ResultSource::Passthrough;
    output.fallback_level = 2;
    output.error_kind = error_kind;
    output
}

/// 逐词应用词表规则，返回 (译文, 命中词数, 词总数)
///
/// 贪心匹配：优先尝试最长的多词术语；专有名词与数字原样保留；
/// 词表外的词保留原文。中文片段之间不加空格，保留的英文片段之间加空格。
pub fn apply_rules(text: &str) -> (String, usize, usize) {
    let tokens: Vec<&str> = token_pattern().find_iter(text).map(|m| m.as_str()).collect();
    if tokens.is_empty() {
        return (text.to_string(), 0, 0);
    }

    let mut segments: Vec<Segment> = Vec::new();
    let mut mapped = 0usize;
    let mut i = 0usize;

    while i < tokens.len() {
        // 多词术语最长4词，从长到短尝试
        let mut matched_len = 0usize;
        let mut matched_zh: Option<&str> = None;
        for len in (2..=4.min(tokens.len() - i)).rev() {
            let phrase = tokens[i..i + len].join(" ");
            if let Some(zh) = lexicon::lookup(&phrase) {
                matched_len = len;
                matched_zh = Some(zh);
                break;
            }
        }

        if let Some(zh) = matched_zh {
            segments.push(Segment::Translated(zh.to_string()));
            mapped += matched_len;
            i += matched_len;
            continue;
        }

        let token = tokens[i];
        if lexicon::PROPER_NOUNS.contains(&token) {
            segments.push(Segment::Verbatim(token.to_string()));
            mapped += 1;
        } else if token.chars().next().map(|c| c.is_ascii_digit()).unwrap_or(false) {
            segments.push(Segment::Verbatim(token.to_string()));
            mapped += 1;
        } else if let Some(zh) = lexicon::lookup(token) {
            segments.push(Segment::Translated(zh.to_string()));
            mapped += 1;
        } else {
            segments.push(Segment::Untranslated(token.to_string()));
        }
        i += 1;
    }

    (join_segments(&segments), mapped, tokens.len())
}

enum Segment {
    /// 已译为中文
    Translated(String),
    /// 专有名词或数字，原样保留
    Verbatim(String),
    /// 词表外的词
    Untranslated(String),
}

impl Segment {
    fn text(&self) -> &str {
        match self {
            Segment::Translated(s) | Segment::Verbatim(s) | Segment::Untranslated(s) => s,
        }
    }

    fn is_cjk(&self) -> bool {
        matches!(self, Segment::Translated(_))
    }
}

fn join_segments(segments: &[Segment]) -> String {
    let mut out = String::new();
    for (i, seg) in segments.iter().enumerate() {
        if i > 0 {
            let prev = &segments[i - 1];
            // 中文与中文、中文与保留片段之间不加空格
            if !prev.is_cjk() && !seg.is_cjk() {
                out.push(' ');
            }
        }
        out.push_str(seg.text());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_coverage_sentence() {
        let (out, mapped, total) = apply_rules("OpenAI releases new model");
        assert_eq!(out, "OpenAI发布新模型");
        assert_eq!(mapped, total);
    }

    #[test]
    fn test_ai_term_mapping() {
        let request = TranslationRequest::new("AI breakthrough", "en", "zh");
        let output = RuleBasedTranslator::new().translate(&request).unwrap();
        assert!(output.translated_text.contains("人工智能"));
        assert_eq!(output.provider_name, RULE_BASED_NAME);
        assert_eq!(output.fallback_level, 1);
        assert_eq!(output.source, ResultSource::RuleBased);
    }

    #[test]
    fn test_zero_coverage_fails() {
        let request = TranslationRequest::new("xyzzy plugh", "en", "zh");
        let result = RuleBasedTranslator::new().translate(&request);
        assert!(result.is_err(), "词表完全未覆盖时应失败");
    }

    #[test]
    fn test_numbers_preserved() {
        let (out, _, _) = apply_rules("Revenue grew 42% with AI");
        assert!(out.contains("42%"));
        assert!(out.contains("人工智能"));
    }

    #[test]
    fn test_unknown_words_kept_verbatim() {
        let (out, mapped, _) = apply_rules("Tesla quarterly report");
        assert!(out.contains("Tesla"));
        assert!(out.contains("quarterly"));
        assert_eq!(mapped, 1); // 只有专有名词Tesla命中
    }

    #[test]
    fn test_passthrough_always_succeeds() {
        let request = TranslationRequest::new("anything at all", "en", "zh");
        let output = passthrough(&request, Some("all_providers_failed".into()));
        assert_eq!(output.translated_text, "anything at all");
        assert_eq!(output.confidence_score, 0.0);
        assert_eq!(output.fallback_level, 2);
        assert_eq!(output.provider_name, PASSTHROUGH_NAME);
        assert_eq!(output.error_kind.as_deref(), Some("all_providers_failed"));
    }

    #[test]
    fn test_multiword_term_greedy_match() {
        let (out, _, _) = apply_rules("machine learning model");
        assert!(out.contains("机器学习"));
        assert!(out.contains("模型"));
    }
}
