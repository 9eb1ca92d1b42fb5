//! 服务选路与对比
//!
//! 两个协作组件：
//!
//! - [`ProviderComparator`]: 质量优化模式下向所有可用服务并发发起同一请求
//!   （并发度以服务数为上限），在共享超时内收集结果，按
//!   `0.8·质量分 + 0.2·静态权重` 择优。零结果返回时报
//!   `AllProvidersFailed`。
//! - [`AdaptiveSelector`]: 维护每个服务的运行期统计（成功率、平均质量、
//!   平均延迟），按 `0.4·成功率 + 0.4·平均质量 + 0.2·延迟分` 推荐前K个
//!   服务；某服务样本充足且表现稳定后，推荐退出并发对比、进入单服务模式。

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures::future::join_all;
use tokio::sync::Semaphore;

use crate::config::{ProviderConfig, QualityConfig};
use crate::error::{TranslationError, TranslationResult};
use crate::providers::ProviderRegistry;
use crate::quality::{QualityAssessor, QualityScore};
use crate::types::{TranslationOutput, TranslationRequest};

/// 对比打分中质量分与静态权重的占比
const COMPARE_QUALITY_WEIGHT: f64 = 0.8;
const COMPARE_PRIOR_WEIGHT: f64 = 0.2;

/// 自适应推荐中各项占比
const ADAPT_SUCCESS_WEIGHT: f64 = 0.4;
const ADAPT_QUALITY_WEIGHT: f64 = 0.4;
const ADAPT_LATENCY_WEIGHT: f64 = 0.2;

/// 平均延迟达到该值时延迟分归零
const LATENCY_FLOOR_MS: f64 = 10_000.0;

// ============================================================================
// 自适应选路
// ============================================================================

#[derive(Debug, Default)]
struct ProviderStats {
    attempts: u64,
    successes: u64,
    quality_sum: f64,
    quality_samples: u64,
    latency_sum_ms: u64,
}

/// 单个服务的统计快照
#[derive(Debug, Clone, Copy, Default)]
pub struct ProviderStatsSnapshot {
    pub attempts: u64,
    pub successes: u64,
    pub success_rate: f64,
    pub avg_quality: f64,
    pub avg_latency_ms: f64,
}

impl ProviderStatsSnapshot {
    /// 延迟分：0ms为满分，线性衰减到10秒归零
    pub fn latency_score(&self) -> f64 {
        (1.0 - self.avg_latency_ms / LATENCY_FLOOR_MS).clamp(0.0, 1.0)
    }

    /// 推荐用的综合分；无样本的服务给中性分，保证新服务有被尝试的机会
    pub fn ranking_score(&self) -> f64 {
        if self.attempts == 0 {
            return 0.5;
        }
        ADAPT_SUCCESS_WEIGHT * self.success_rate
            + ADAPT_QUALITY_WEIGHT * self.avg_quality
            + ADAPT_LATENCY_WEIGHT * self.latency_score()
    }
}

/// 自适应选路器
#[derive(Default)]
pub struct AdaptiveSelector {
    stats: DashMap<String, ProviderStats>,
}

impl AdaptiveSelector {
    pub fn new() -> Self {
        Self::default()
    }

    /// 每次服务调用（成功或失败）后记录一次
    pub fn record_attempt(
        &self,
        provider: &str,
        success: bool,
        quality: Option<f64>,
        latency: Duration,
    ) {
        let mut stats = self.stats.entry(provider.to_string()).or_default();
        stats.attempts += 1;
        if success {
            stats.successes += 1;
        }
        if let Some(quality) = quality {
            stats.quality_sum += quality;
            stats.quality_samples += 1;
        }
        stats.latency_sum_ms += latency.as_millis() as u64;
    }

    pub fn snapshot(&self, provider: &str) -> ProviderStatsSnapshot {
        self.stats
            .get(provider)
            .map(|s| ProviderStatsSnapshot {
                attempts: s.attempts,
                successes: s.successes,
                success_rate: if s.attempts > 0 {
                    s.successes as f64 / s.attempts as f64
                } else {
                    0.0
                },
                avg_quality: if s.quality_samples > 0 {
                    s.quality_sum / s.quality_samples as f64
                } else {
                    0.0
                },
                avg_latency_ms: if s.attempts > 0 {
                    s.latency_sum_ms as f64 / s.attempts as f64
                } else {
                    0.0
                },
            })
            .unwrap_or_default()
    }

    /// 从候选中推荐前K个服务
    pub fn recommend(&self, candidates: &[String], k: usize) -> Vec<String> {
        let mut ranked: Vec<(String, f64)> = candidates
            .iter()
            .map(|name| (name.clone(), self.snapshot(name).ranking_score()))
            .collect();
        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        ranked.into_iter().take(k).map(|(name, _)| name).collect()
    }

    /// 某服务表现足够稳定时推荐单服务模式，省掉并发对比的成本
    pub fn single_provider_mode(
        &self,
        candidates: &[String],
        quality_config: &QualityConfig,
    ) -> Option<String> {
        for name in self.recommend(candidates, candidates.len()) {
            let stats = self.snapshot(&name);
            if stats.attempts >= quality_config.min_sample_size as u64
                && stats.success_rate >= quality_config.single_mode_success_rate
                && stats.avg_quality >= quality_config.quality_threshold
            {
                return Some(name);
            }
        }
        None
    }
}

// ============================================================================
// 并发对比
// ============================================================================

/// 单个服务的对比得分
#[derive(Debug, Clone)]
pub struct ProviderScore {
    pub provider: String,
    /// `0.8·质量分 + 0.2·静态权重`
    pub combined: f64,
    pub quality: QualityScore,
}

/// 对比结果
#[derive(Debug, Clone)]
pub struct ComparisonOutcome {
    pub best: TranslationOutput,
    pub all: Vec<TranslationOutput>,
    /// 按综合分非递增排序
    pub scores: Vec<ProviderScore>,
}

/// 服务对比器
pub struct ProviderComparator {
    registry: ProviderRegistry,
    assessor: QualityAssessor,
    selector: Arc<AdaptiveSelector>,
}

impl ProviderComparator {
    pub fn new(
        registry: ProviderRegistry,
        assessor: QualityAssessor,
        selector: Arc<AdaptiveSelector>,
    ) -> Self {
        Self {
            registry,
            assessor,
            selector,
        }
    }

    /// 并发调用所有给定服务并择优
    ///
    /// `eligible` 由调用方过滤（启用+预算内+健康）。
    /// 并发度以服务数为上限；整体受 `shared_timeout` 约束。
    pub async fn compare(
        &self,
        request: &TranslationRequest,
        eligible: &[ProviderConfig],
        shared_timeout: Duration,
    ) -> TranslationResult<ComparisonOutcome> {
        if eligible.is_empty() {
            return Err(TranslationError::AllProvidersFailed(
                "没有可用的翻译服务".to_string(),
            ));
        }

        let semaphore = Arc::new(Semaphore::new(eligible.len()));
        let tasks: Vec<_> = eligible
            .iter()
            .map(|config| {
                let semaphore = Arc::clone(&semaphore);
                let provider = self.registry.get(&config.name);
                let api_key = config.current_key().to_string();
                let weight = config.weight;
                let name = config.name.clone();
                let request = request.clone();

                async move {
                    let provider = provider.ok()?;
                    let _permit = semaphore.acquire().await.ok()?;
                    let start = std::time::Instant::now();
                    let result = provider.translate(&request, &api_key).await;
                    Some((name, weight, start.elapsed(), result))
                }
            })
            .collect();

        let joined = tokio::time::timeout(shared_timeout, join_all(tasks)).await;
        let attempts = match joined {
            Ok(attempts) => attempts,
            Err(_) => {
                return Err(TranslationError::AllProvidersFailed(format!(
                    "对比整体超时: {:?}",
                    shared_timeout
                )));
            }
        };

        let mut outputs: Vec<(f64, Duration, TranslationOutput)> = Vec::new();
        for attempt in attempts.into_iter().flatten() {
            let (name, weight, latency, result) = attempt;
            match result {
                Ok(output) if !output.is_unchanged() => {
                    // 质量分在下面统一评完再记录
                    outputs.push((weight, latency, output));
                }
                Ok(_) => {
                    self.selector.record_attempt(&name, false, None, latency);
                    tracing::debug!("服务 {} 返回空译文或原文，按失败处理", name);
                }
                Err(e) => {
                    self.selector.record_attempt(&name, false, None, latency);
                    tracing::debug!("服务 {} 对比调用失败: {}", name, e);
                }
            }
        }

        if outputs.is_empty() {
            return Err(TranslationError::AllProvidersFailed(
                "所有服务的对比调用都失败".to_string(),
            ));
        }

        // 统一评分并合成综合分
        let candidates: Vec<String> = outputs
            .iter()
            .map(|(_, _, o)| o.translated_text.clone())
            .collect();
        let quality_scores =
            self.assessor
                .compare(&request.text, &candidates, &request.target_lang);

        let mut scores: Vec<ProviderScore> = Vec::with_capacity(quality_scores.len());
        for quality in quality_scores {
            let (weight, latency, output) = &outputs[quality.candidate_index];
            let combined =
                COMPARE_QUALITY_WEIGHT * quality.overall + COMPARE_PRIOR_WEIGHT * weight;
            self.selector
                .record_attempt(&output.provider_name, true, Some(quality.overall), *latency);
            scores.push(ProviderScore {
                provider: output.provider_name.clone(),
                combined,
                quality,
            });
        }
        scores.sort_by(|a, b| {
            b.combined
                .partial_cmp(&a.combined)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.provider.cmp(&b.provider))
        });

        let best_score = &scores[0];
        let (_, _, best_output) = &outputs[best_score.quality.candidate_index];
        let mut best = best_output.clone();
        best.quality_score = Some(best_score.quality.overall);

        tracing::info!(
            "服务对比完成: {} 个候选，最优 {} (综合分 {:.3})",
            scores.len(),
            best.provider_name,
            best_score.combined
        );

        Ok(ComparisonOutcome {
            best,
            all: outputs.into_iter().map(|(_, _, o)| o).collect(),
            scores,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{MockBehavior, MockProvider};

    fn eligible(names: &[&str]) -> Vec<ProviderConfig> {
        names
            .iter()
            .enumerate()
            .map(|(i, name)| ProviderConfig::new(name, "mock", i as u32 + 1))
            .collect()
    }

    fn comparator(providers: Vec<Arc<MockProvider>>) -> ProviderComparator {
        let mut registry = ProviderRegistry::new();
        for p in providers {
            registry.register(p);
        }
        ProviderComparator::new(
            registry,
            QualityAssessor::new(),
            Arc::new(AdaptiveSelector::new()),
        )
    }

    #[tokio::test]
    async fn test_compare_picks_a_winner() {
        let cmp = comparator(vec![
            Arc::new(MockProvider::new("p1")),
            Arc::new(MockProvider::new("p2")),
        ]);
        let request = TranslationRequest::new("OpenAI releases new model", "en", "zh");

        let outcome = cmp
            .compare(&request, &eligible(&["p1", "p2"]), Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(outcome.all.len(), 2);
        assert_eq!(outcome.scores.len(), 2);
        assert!(outcome.best.quality_score.is_some());
        for pair in outcome.scores.windows(2) {
            assert!(pair[0].combined >= pair[1].combined);
        }
    }

    #[tokio::test]
    async fn test_compare_all_failed() {
        let cmp = comparator(vec![
            Arc::new(MockProvider::with_behavior("p1", MockBehavior::AlwaysFail)),
            Arc::new(MockProvider::with_behavior("p2", MockBehavior::AlwaysFail)),
        ]);
        let request = TranslationRequest::new("hello world", "en", "zh");

        let result = cmp
            .compare(&request, &eligible(&["p1", "p2"]), Duration::from_secs(5))
            .await;
        assert!(matches!(
            result,
            Err(TranslationError::AllProvidersFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_compare_survives_partial_failure() {
        let cmp = comparator(vec![
            Arc::new(MockProvider::with_behavior("p1", MockBehavior::AlwaysFail)),
            Arc::new(MockProvider::new("p2")),
        ]);
        let request = TranslationRequest::new("AI breakthrough", "en", "zh");

        let outcome = cmp
            .compare(&request, &eligible(&["p1", "p2"]), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(outcome.best.provider_name, "p2");
        assert_eq!(outcome.all.len(), 1);
    }

    #[test]
    fn test_selector_stats_accumulate() {
        let selector = AdaptiveSelector::new();
        selector.record_attempt("p1", true, Some(0.9), Duration::from_millis(100));
        selector.record_attempt("p1", false, None, Duration::from_millis(300));

        let stats = selector.snapshot("p1");
        assert_eq!(stats.attempts, 2);
        assert_eq!(stats.successes, 1);
        assert_eq!(stats.success_rate, 0.5);
        assert_eq!(stats.avg_quality, 0.9);
        assert_eq!(stats.avg_latency_ms, 200.0);
    }

    #[test]
    fn test_recommend_ranks_by_score() {
        let selector = AdaptiveSelector::new();
        for _ in 0..10 {
            selector.record_attempt("good", true, Some(0.9), Duration::from_millis(100));
            selector.record_attempt("bad", false, None, Duration::from_millis(100));
        }

        let ranked = selector.recommend(
            &["bad".to_string(), "good".to_string(), "new".to_string()],
            3,
        );
        assert_eq!(ranked[0], "good");
        assert_eq!(ranked[2], "bad");

        let top1 = selector.recommend(&["bad".to_string(), "good".to_string()], 1);
        assert_eq!(top1, vec!["good".to_string()]);
    }

    #[test]
    fn test_single_provider_mode_thresholds() {
        let selector = AdaptiveSelector::new();
        let quality_config = QualityConfig::default();
        let candidates = vec!["p1".to_string()];

        // 样本不足
        for _ in 0..9 {
            selector.record_attempt("p1", true, Some(0.9), Duration::from_millis(100));
        }
        assert!(selector
            .single_provider_mode(&candidates, &quality_config)
            .is_none());

        // 样本达到10、成功率1.0、平均质量0.9 -> 满足
        selector.record_attempt("p1", true, Some(0.9), Duration::from_millis(100));
        assert_eq!(
            selector.single_provider_mode(&candidates, &quality_config),
            Some("p1".to_string())
        );
    }
}
