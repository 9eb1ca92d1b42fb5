//! 翻译质量评估器
//!
//! 对 (原文, 候选译文) 进行纯函数式的确定性评分，不发起任何网络调用。
//! 总分由四个子项加权合成：
//!
//! ```text
//! overall = 0.35·semantic + 0.25·fluency + 0.25·terminology + 0.15·context
//! ```
//!
//! - semantic: 数字字面量与专有名词是否得到保留（原样或经词表映射）
//! - fluency: 目标文字字符密度与句边界数量匹配程度
//! - terminology: 词表术语从源语言到译文的正确映射覆盖率
//! - context: 句数比与总长度比是否落在 [0.3, 1.2] 区间
//!
//! 权重沿用线上系统的经验值，可调，不代表最优。

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{TranslationError, TranslationResult};
use crate::lexicon;

/// 子项权重
pub const WEIGHT_SEMANTIC: f64 = 0.35;
pub const WEIGHT_FLUENCY: f64 = 0.25;
pub const WEIGHT_TERMINOLOGY: f64 = 0.25;
pub const WEIGHT_CONTEXT: f64 = 0.15;

/// 目标文字密度达到该阈值即视为满分
const SCRIPT_DENSITY_THRESHOLD: f64 = 0.5;

/// 句数比与长度比的合理区间
const RATIO_LOW: f64 = 0.3;
const RATIO_HIGH: f64 = 1.2;

fn number_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d+(?:[.,]\d+)*%?").unwrap())
}

fn sentence_boundary_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[.!?。！？；;]+").unwrap())
}

/// 单个候选的评分明细
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityScore {
    pub overall: f64,
    pub semantic: f64,
    pub fluency: f64,
    pub terminology: f64,
    pub context: f64,
    /// 候选在输入序列中的下标，排序后仍可回溯
    pub candidate_index: usize,
}

/// 质量评估器
///
/// 无内部状态，评分只依赖输入文本和内置词表，同样的输入永远给出同样的分数。
#[derive(Debug, Default, Clone)]
pub struct QualityAssessor;

impl QualityAssessor {
    pub fn new() -> Self {
        Self
    }

    /// 对单个候选评分
    pub fn assess(&self, source: &str, candidate: &str, target_lang: &str) -> QualityScore {
        self.assess_indexed(source, candidate, target_lang, 0)
    }

    fn assess_indexed(
        &self,
        source: &str,
        candidate: &str,
        target_lang: &str,
        index: usize,
    ) -> QualityScore {
        if candidate.trim().is_empty() {
            return QualityScore {
                overall: 0.0,
                semantic: 0.0,
                fluency: 0.0,
                terminology: 0.0,
                context: 0.0,
                candidate_index: index,
            };
        }

        let semantic = semantic_score(source, candidate);
        let fluency = fluency_score(source, candidate, target_lang);
        let terminology = terminology_score(source, candidate);
        let context = context_score(source, candidate);

        let overall = WEIGHT_SEMANTIC * semantic
            + WEIGHT_FLUENCY * fluency
            + WEIGHT_TERMINOLOGY * terminology
            + WEIGHT_CONTEXT * context;

        QualityScore {
            overall: overall.clamp(0.0, 1.0),
            semantic,
            fluency,
            terminology,
            context,
            candidate_index: index,
        }
    }

    /// 对候选集合评分并按 overall 非递增排序
    ///
    /// 排序是稳定的：总分相同的候选保持输入顺序。
    pub fn compare(
        &self,
        source: &str,
        candidates: &[String],
        target_lang: &str,
    ) -> Vec<QualityScore> {
        let mut scores: Vec<QualityScore> = candidates
            .iter()
            .enumerate()
            .map(|(i, c)| self.assess_indexed(source, c, target_lang, i))
            .collect();

        scores.sort_by(|a, b| {
            b.overall
                .partial_cmp(&a.overall)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scores
    }

    /// 返回最优候选的评分；候选集为空时报错
    pub fn best(
        &self,
        source: &str,
        candidates: &[String],
        target_lang: &str,
    ) -> TranslationResult<QualityScore> {
        if candidates.is_empty() {
            return Err(TranslationError::EmptyCandidates);
        }
        Ok(self.compare(source, candidates, target_lang)[0])
    }
}

/// 语义保持度：数字字面量与专有名词作为锚点，统计保留比例
fn semantic_score(source: &str, candidate: &str) -> f64 {
    let mut anchors = 0usize;
    let mut preserved = 0usize;

    for m in number_pattern().find_iter(source) {
        anchors += 1;
        if candidate.contains(m.as_str()) {
            preserved += 1;
        }
    }

    for noun in lexicon::PROPER_NOUNS {
        if contains_word(source, noun) {
            anchors += 1;
            if lexicon::proper_noun_preserved(noun, candidate) {
                preserved += 1;
            }
        }
    }

    if anchors == 0 {
        // 没有可核对的锚点时给中性基线
        0.8
    } else {
        preserved as f64 / anchors as f64
    }
}

/// 流畅度：目标文字密度 + 句边界数量匹配
fn fluency_score(source: &str, candidate: &str, target_lang: &str) -> f64 {
    let density = script_density(candidate, target_lang);
    let density_score = (density / SCRIPT_DENSITY_THRESHOLD).min(1.0);

    let src_boundaries = sentence_boundary_pattern().find_iter(source).count();
    let cand_boundaries = sentence_boundary_pattern().find_iter(candidate).count();
    let max_boundaries = src_boundaries.max(1);
    let diff = src_boundaries.abs_diff(cand_boundaries);
    let boundary_score = (1.0 - diff as f64 / max_boundaries as f64).max(0.0);

    0.6 * density_score + 0.4 * boundary_score
}

/// 术语覆盖率：源文出现的词表术语有多少被正确映射到译文
fn terminology_score(source: &str, candidate: &str) -> f64 {
    let mut total = 0usize;
    let mut mapped = 0usize;

    for (en, zh) in lexicon::TERM_TABLE {
        if contains_word(source, en) {
            total += 1;
            if candidate.contains(zh) {
                mapped += 1;
            }
        }
    }

    if total == 0 {
        0.7
    } else {
        mapped as f64 / total as f64
    }
}

/// 上下文完整度：句数比与长度比
fn context_score(source: &str, candidate: &str) -> f64 {
    let src_sentences = sentence_boundary_pattern().find_iter(source).count().max(1);
    let cand_sentences = sentence_boundary_pattern()
        .find_iter(candidate)
        .count()
        .max(1);
    let sentence_ratio = cand_sentences as f64 / src_sentences as f64;

    let src_len = source.chars().count().max(1);
    let cand_len = candidate.chars().count().max(1);
    let length_ratio = cand_len as f64 / src_len as f64;

    0.5 * ratio_score(sentence_ratio) + 0.5 * ratio_score(length_ratio)
}

/// 比值落在 [0.3, 1.2] 给满分，越界按距离线性衰减
fn ratio_score(ratio: f64) -> f64 {
    if (RATIO_LOW..=RATIO_HIGH).contains(&ratio) {
        1.0
    } else if ratio < RATIO_LOW {
        (ratio / RATIO_LOW).max(0.0)
    } else {
        (RATIO_HIGH / ratio).max(0.0)
    }
}

/// 目标文字的字符密度（按非空白字符计）
fn script_density(text: &str, target_lang: &str) -> f64 {
    let chars: Vec<char> = text.chars().filter(|c| !c.is_whitespace()).collect();
    if chars.is_empty() {
        return 0.0;
    }

    let matching = chars
        .iter()
        .filter(|c| char_matches_lang(**c, target_lang))
        .count();
    matching as f64 / chars.len() as f64
}

fn char_matches_lang(c: char, target_lang: &str) -> bool {
    match target_lang {
        "zh" | "zh-CN" | "zh-TW" => is_cjk(c),
        "ja" => is_cjk(c) || ('\u{3040}'..='\u{30ff}').contains(&c),
        "ko" => ('\u{ac00}'..='\u{d7af}').contains(&c),
        "ru" => ('\u{0400}'..='\u{04ff}').contains(&c),
        _ => c.is_ascii_alphabetic(),
    }
}

fn is_cjk(c: char) -> bool {
    ('\u{4e00}'..='\u{9fff}').contains(&c) || ('\u{3400}'..='\u{4dbf}').contains(&c)
}

/// ASCII词边界匹配；含空格的多词术语退化为子串匹配
fn contains_word(haystack: &str, needle: &str) -> bool {
    let haystack_lower = haystack.to_lowercase();
    let needle_lower = needle.to_lowercase();

    if needle_lower.contains(' ') {
        return haystack_lower.contains(&needle_lower);
    }

    let mut start = 0;
    while let Some(pos) = haystack_lower[start..].find(&needle_lower) {
        let abs = start + pos;
        let before_ok = abs == 0
            || !haystack_lower[..abs]
                .chars()
                .next_back()
                .map(|c| c.is_ascii_alphanumeric())
                .unwrap_or(false);
        let end = abs + needle_lower.len();
        let after_ok = end >= haystack_lower.len()
            || !haystack_lower[end..]
                .chars()
                .next()
                .map(|c| c.is_ascii_alphanumeric())
                .unwrap_or(false);
        if before_ok && after_ok {
            return true;
        }
        start = abs + needle_lower.len().max(1);
        if start >= haystack_lower.len() {
            break;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scores_sorted_non_increasing() {
        let assessor = QualityAssessor::new();
        let source = "OpenAI releases new model with 175 billion parameters.";
        let candidates = vec![
            "OpenAI发布拥有175亿参数的新模型。".to_string(),
            "发布了模型".to_string(),
            "".to_string(),
            "OpenAI releases new model with 175 billion parameters.".to_string(),
        ];

        let scores = assessor.compare(source, &candidates, "zh");
        assert_eq!(scores.len(), 4);
        for pair in scores.windows(2) {
            assert!(pair[0].overall >= pair[1].overall, "分数必须非递增");
        }
    }

    #[test]
    fn test_best_rejects_empty_candidates() {
        let assessor = QualityAssessor::new();
        let result = assessor.best("hello", &[], "zh");
        assert!(matches!(result, Err(TranslationError::EmptyCandidates)));
    }

    #[test]
    fn test_deterministic() {
        let assessor = QualityAssessor::new();
        let a = assessor.assess("AI breakthrough in 2024", "2024年人工智能突破", "zh");
        let b = assessor.assess("AI breakthrough in 2024", "2024年人工智能突破", "zh");
        assert_eq!(a, b);
    }

    #[test]
    fn test_number_preservation_rewarded() {
        let assessor = QualityAssessor::new();
        let keeps = assessor.assess("Revenue grew 42% in Q3", "第三季度营收增长42%", "zh");
        let drops = assessor.assess("Revenue grew 42% in Q3", "第三季度营收增长了", "zh");
        assert!(keeps.semantic > drops.semantic);
    }

    #[test]
    fn test_proper_noun_alias_counts_as_preserved() {
        let assessor = QualityAssessor::new();
        let alias = assessor.assess("Google announces new chip", "谷歌宣布新芯片", "zh");
        let missing = assessor.assess("Google announces new chip", "某公司宣布新芯片", "zh");
        assert!(alias.semantic > missing.semantic);
    }

    #[test]
    fn test_terminology_coverage() {
        let assessor = QualityAssessor::new();
        let good = assessor.assess("AI breakthrough", "人工智能突破", "zh");
        let bad = assessor.assess("AI breakthrough", "重要进展", "zh");
        assert!(good.terminology > bad.terminology);
    }

    #[test]
    fn test_empty_candidate_scores_zero() {
        let assessor = QualityAssessor::new();
        let score = assessor.assess("hello world", "   ", "zh");
        assert_eq!(score.overall, 0.0);
    }

    #[test]
    fn test_ratio_score_window() {
        assert_eq!(ratio_score(0.5), 1.0);
        assert_eq!(ratio_score(1.2), 1.0);
        assert!(ratio_score(0.1) < 1.0);
        assert!(ratio_score(2.4) < 1.0);
    }

    #[test]
    fn test_contains_word_boundaries() {
        assert!(contains_word("AI breakthrough", "AI"));
        assert!(!contains_word("OpenAI model", "AI"));
        assert!(contains_word("the machine learning era", "machine learning"));
    }
}
