//! 弹性翻译编排器
//!
//! 引擎入口。一次翻译请求按固定状态机推进：
//!
//! ```text
//! 缓存查找 --命中--> 返回
//!     |未命中
//! 服务筛选（启用 + 预算 + 健康 + 速率）
//!     |
//! 逐服务尝试（按优先级，每服务带重试与指数退避）
//!     |全部失败
//! 规则翻译器降级 --失败--> 原文透传（永远成功，置信度0）
//! ```
//!
//! 保证：四种终态（缓存命中 / 服务成功 / 规则降级 / 原文透传）恰有其一，
//! `translate` 从不向调用方抛错。每次尝试都会更新自适应选路统计，
//! 每次成功都会经配置管理器记账。
//!
//! 调用方给出的截止时间会传播到在途调用：超过截止时间的重试直接跳过，
//! 整条服务链提前进入降级。

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use futures::future::join_all;

use crate::cache::{CacheConfig, MultiTierCache};
use crate::config::{ConfigManager, ProviderConfig};
use crate::error::{TranslationError, TranslationResult};
use crate::fallback::{self, RuleBasedTranslator};
use crate::feedback::FeedbackStore;
use crate::health::{HealthMonitor, HealthMonitorConfig};
use crate::providers::{DeepLxProvider, LlmProvider, MockProvider, ProviderRegistry};
use crate::quality::QualityAssessor;
use crate::selector::{AdaptiveSelector, ComparisonOutcome, ProviderComparator};
use crate::types::{ResultSource, TranslationOutput, TranslationRequest};

/// 重试退避基准（第n次重试等待 base · 2ⁿ）
const RETRY_BASE_DELAY: Duration = Duration::from_secs(1);
/// 对比模式的共享超时
const COMPARE_TIMEOUT: Duration = Duration::from_secs(30);
/// 速率窗口长度
const RATE_WINDOW: Duration = Duration::from_secs(60);

/// 单次调用的选项
#[derive(Debug, Clone, Default)]
pub struct TranslateOptions {
    /// 并发对比多个服务并择优（受单服务模式推荐约束）
    pub quality_optimization: bool,
    /// 跳过缓存查找，强制重新翻译
    pub force_refresh: bool,
    /// 调用方截止时间；超时后跳过剩余重试直接降级
    pub deadline: Option<Duration>,
}

/// 编排器上下文
///
/// 显式持有全部子系统，构造一次后传给引擎——没有任何隐藏的全局状态。
pub struct OrchestratorContext {
    pub registry: ProviderRegistry,
    pub cache: Arc<MultiTierCache>,
    pub config: Arc<ConfigManager>,
    pub health: Arc<HealthMonitor>,
    pub selector: Arc<AdaptiveSelector>,
    pub feedback: Arc<FeedbackStore>,
}

impl OrchestratorContext {
    /// 以数据目录为根组装全套子系统
    pub fn build(
        registry: ProviderRegistry,
        config: Arc<ConfigManager>,
        data_dir: impl Into<std::path::PathBuf>,
    ) -> TranslationResult<Self> {
        let data_dir = data_dir.into();
        let cache = Arc::new(MultiTierCache::new(&CacheConfig::with_root(&data_dir))?);
        let selector = Arc::new(AdaptiveSelector::new());
        let health = Arc::new(HealthMonitor::new(
            registry.clone(),
            Arc::clone(&config),
            HealthMonitorConfig::default(),
        ));
        let feedback = Arc::new(FeedbackStore::new(data_dir.join("feedback.jsonl"))?);

        Ok(Self {
            registry,
            cache,
            config,
            health,
            selector,
            feedback,
        })
    }
}

/// 根据配置组装适配器注册表
pub fn build_registry(config: &ConfigManager) -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();
    for service in config.snapshot().services {
        match service.adapter.as_str() {
            "deeplx" => {
                registry.register(Arc::new(DeepLxProvider::new(
                    &service.name,
                    service.api_url.as_deref(),
                )));
            }
            "llm" => {
                registry.register(Arc::new(LlmProvider::new(
                    &service.name,
                    service.api_url.as_deref().unwrap_or_default(),
                    service.model.as_deref().unwrap_or("gpt-4o-mini"),
                )));
            }
            "mock" => {
                registry.register(Arc::new(MockProvider::new(&service.name)));
            }
            other => {
                tracing::warn!("未知的适配器类型 {}，服务 {} 未注册", other, service.name);
            }
        }
    }
    registry
}

/// 弹性翻译引擎
pub struct TranslationEngine {
    ctx: OrchestratorContext,
    comparator: ProviderComparator,
    assessor: QualityAssessor,
    rule_fallback: RuleBasedTranslator,
    stats: EngineStats,
    // 每服务一个滑动窗口做速率准入
    rate_windows: DashMap<String, VecDeque<Instant>>,
    background: std::sync::Mutex<Vec<tokio::task::JoinHandle<()>>>,
}

impl TranslationEngine {
    pub fn new(ctx: OrchestratorContext) -> Self {
        let comparator = ProviderComparator::new(
            ctx.registry.clone(),
            QualityAssessor::new(),
            Arc::clone(&ctx.selector),
        );
        Self {
            ctx,
            comparator,
            assessor: QualityAssessor::new(),
            rule_fallback: RuleBasedTranslator::new(),
            stats: EngineStats::default(),
            rate_windows: DashMap::new(),
            background: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// 启动后台任务：健康探测循环、缓存清理循环、配置热重载
    pub fn start_background_tasks(self: &Arc<Self>) {
        self.ctx.health.start();

        let sweep_interval = crate::cache::constants::DEFAULT_SWEEP_INTERVAL;
        let sweeper = self.ctx.cache.spawn_sweeper(sweep_interval);

        let mut handles = self.background.lock().unwrap();
        handles.push(sweeper);

        if let Some(watcher) = crate::config::spawn_config_watcher(
            Arc::clone(&self.ctx.config),
            crate::config::constants::DEFAULT_POLL_INTERVAL,
        ) {
            handles.push(watcher);
        }
    }

    /// 停止所有后台任务
    pub fn shutdown(&self) {
        self.ctx.health.stop();
        for handle in self.background.lock().unwrap().drain(..) {
            handle.abort();
        }
    }

    // ------------------------------------------------------------------
    // 对外API
    // ------------------------------------------------------------------

    /// 翻译一段文本；永不抛错
    ///
    /// 输入无效时返回透传结果并在 `error_kind` 中携带诊断信息。
    pub async fn translate(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
        opts: TranslateOptions,
    ) -> TranslationOutput {
        match self.try_translate(text, source_lang, target_lang, opts).await {
            Ok(output) => output,
            Err(e) => {
                tracing::warn!("请求被拒绝，返回透传结果: {}", e);
                let request = TranslationRequest::new(text, source_lang, target_lang);
                fallback::passthrough(&request, Some(e.kind().to_string()))
            }
        }
    }

    /// 翻译一段文本；只有输入校验错误会返回 `Err`
    pub async fn try_translate(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
        opts: TranslateOptions,
    ) -> TranslationResult<TranslationOutput> {
        self.stats.requests_total.fetch_add(1, Ordering::Relaxed);

        if text.trim().is_empty() {
            return Err(TranslationError::InvalidInput("文本为空".to_string()));
        }
        // 目标语言为空，或源语言显式等于目标语言，都是无效的语言对
        if target_lang.trim().is_empty()
            || (source_lang == target_lang && source_lang != "auto")
        {
            return Err(TranslationError::UnsupportedLanguage {
                source_lang: source_lang.to_string(),
                target_lang: target_lang.to_string(),
            });
        }

        let mut request = TranslationRequest::new(text, source_lang, target_lang);
        request.quality_optimization = opts.quality_optimization;
        let key = request.content_hash();
        let deadline = opts.deadline.map(|d| Instant::now() + d);

        // 第一步：缓存查找
        if !opts.force_refresh {
            if let Some(entry) = self.ctx.cache.get(&key) {
                self.stats.cache_hits.fetch_add(1, Ordering::Relaxed);
                tracing::debug!("缓存命中: {}", &key[..12]);
                return Ok(entry.result.as_cache_hit());
            }
        }

        // 第二步：服务筛选
        let eligible = self.eligible_providers(&request);

        // 第三步：调用服务
        let provider_result = if eligible.is_empty() {
            Err(TranslationError::AllProvidersFailed(
                "没有可用的翻译服务".to_string(),
            ))
        } else if opts.quality_optimization {
            self.translate_comparing(&request, &eligible).await
        } else {
            self.translate_sequential(&request, &eligible, deadline).await
        };

        match provider_result {
            Ok(output) => {
                self.record_success(&request, &output);
                self.ctx.cache.put(&key, output.clone());
                Ok(output)
            }
            Err(e) => {
                tracing::warn!("所有翻译服务不可用，进入本地降级: {}", e);
                Ok(self.local_fallback(&request, &e))
            }
        }
    }

    /// 批量翻译：各请求作为独立任务并发执行
    pub async fn translate_batch(
        &self,
        texts: &[String],
        source_lang: &str,
        target_lang: &str,
        opts: TranslateOptions,
    ) -> Vec<TranslationOutput> {
        let tasks: Vec<_> = texts
            .iter()
            .map(|text| self.translate(text, source_lang, target_lang, opts.clone()))
            .collect();
        join_all(tasks).await
    }

    /// 并发对比所有可用服务，返回排序后的全量结果
    pub async fn compare_providers(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> TranslationResult<ComparisonOutcome> {
        if text.trim().is_empty() {
            return Err(TranslationError::InvalidInput("文本为空".to_string()));
        }
        let request = TranslationRequest::new(text, source_lang, target_lang);
        let eligible = self.eligible_providers(&request);
        let outcome = self
            .comparator
            .compare(&request, &eligible, COMPARE_TIMEOUT)
            .await?;
        for output in &outcome.all {
            self.record_cost_for(output);
        }
        Ok(outcome)
    }

    /// 成本账本快照
    pub fn cost_statistics(&self) -> crate::config::CostStatistics {
        self.ctx.config.cost_statistics()
    }

    /// 所有服务的健康记录
    pub fn health_summary(&self) -> std::collections::HashMap<String, crate::health::HealthRecord> {
        self.ctx.health.summary()
    }

    /// 提交用户反馈；失败只记录日志
    #[allow(clippy::too_many_arguments)]
    pub fn submit_feedback(
        &self,
        request_id: &str,
        original_text: &str,
        translated_text: &str,
        provider_name: &str,
        rating: Option<u8>,
        corrected_text: Option<String>,
        comment: Option<String>,
    ) -> bool {
        match self.ctx.feedback.submit(
            request_id,
            original_text,
            translated_text,
            provider_name,
            rating,
            corrected_text,
            comment,
        ) {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!("反馈写入失败: {}", e);
                false
            }
        }
    }

    /// 引擎统计快照
    pub fn stats(&self) -> EngineStatsSnapshot {
        self.stats.snapshot()
    }

    /// 上下文只读访问（监控、测试与上层组合使用）
    pub fn context(&self) -> &OrchestratorContext {
        &self.ctx
    }

    /// 缓存统计
    pub fn cache_stats(&self) -> crate::cache::CacheStats {
        self.ctx.cache.stats()
    }

    // ------------------------------------------------------------------
    // 内部流程
    // ------------------------------------------------------------------

    /// 服务筛选：启用 + 预算 + 健康 + 速率窗口
    fn eligible_providers(&self, request: &TranslationRequest) -> Vec<ProviderConfig> {
        let chars = request.text.chars().count();
        self.ctx
            .config
            .enabled_providers()
            .into_iter()
            .filter(|service| {
                if !self.ctx.registry.contains(&service.name) {
                    return false;
                }
                if !self.ctx.health.is_usable(&service.name) {
                    tracing::debug!("服务 {} 不健康，跳过", service.name);
                    return false;
                }
                if !self.ctx.config.should_use(&service.name, chars) {
                    tracing::debug!("服务 {} 超出预算，预先跳过", service.name);
                    return false;
                }
                if !self.admit_rate(service) {
                    tracing::debug!("服务 {} 达到速率上限，本次跳过", service.name);
                    return false;
                }
                true
            })
            .collect()
    }

    /// 速率准入：60秒滑动窗口
    fn admit_rate(&self, service: &ProviderConfig) -> bool {
        if service.rate_limit_per_minute == 0 {
            return true;
        }
        let now = Instant::now();
        let mut window = self
            .rate_windows
            .entry(service.name.clone())
            .or_default();
        while window
            .front()
            .map(|t| now.duration_since(*t) > RATE_WINDOW)
            .unwrap_or(false)
        {
            window.pop_front();
        }
        if window.len() >= service.rate_limit_per_minute as usize {
            return false;
        }
        window.push_back(now);
        true
    }

    /// 质量优化模式：表现稳定时退化为单服务，否则并发对比
    async fn translate_comparing(
        &self,
        request: &TranslationRequest,
        eligible: &[ProviderConfig],
    ) -> TranslationResult<TranslationOutput> {
        let names: Vec<String> = eligible.iter().map(|s| s.name.clone()).collect();
        let quality_config = self.ctx.config.quality_config();

        if let Some(stable) = self
            .ctx
            .selector
            .single_provider_mode(&names, &quality_config)
        {
            tracing::debug!("服务 {} 表现稳定，进入单服务模式", stable);
            let single: Vec<ProviderConfig> = eligible
                .iter()
                .filter(|s| s.name == stable)
                .cloned()
                .collect();
            if let Ok(output) = Box::pin(self.translate_sequential(request, &single, None)).await {
                return Ok(output);
            }
            // 稳定服务也失败了，回到全量对比
        }

        let outcome = self
            .comparator
            .compare(request, eligible, COMPARE_TIMEOUT)
            .await?;
        Ok(outcome.best)
    }

    /// 默认模式：按优先级逐服务尝试，每服务带重试与指数退避
    async fn translate_sequential(
        &self,
        request: &TranslationRequest,
        eligible: &[ProviderConfig],
        deadline: Option<Instant>,
    ) -> TranslationResult<TranslationOutput> {
        let mut last_error: Option<TranslationError> = None;

        'providers: for service in eligible {
            let provider = match self.ctx.registry.get(&service.name) {
                Ok(provider) => provider,
                Err(e) => {
                    last_error = Some(e);
                    continue;
                }
            };

            for attempt in 0..=service.retry_count {
                // 截止时间传播：剩余时间耗尽就跳过所有剩余重试
                let remaining = match deadline {
                    Some(deadline) => {
                        let now = Instant::now();
                        if now >= deadline {
                            tracing::debug!("已过截止时间，跳过剩余服务与重试");
                            break 'providers;
                        }
                        Some(deadline - now)
                    }
                    None => None,
                };
                let attempt_timeout = match remaining {
                    Some(remaining) => service.timeout().min(remaining),
                    None => service.timeout(),
                };

                let api_key = service.current_key().to_string();
                let start = Instant::now();
                let result =
                    tokio::time::timeout(attempt_timeout, provider.translate(request, &api_key))
                        .await;
                let latency = start.elapsed();

                let error = match result {
                    Ok(Ok(output)) if output.is_unchanged() => {
                        // 空译文/原样返回按失败处理，且不值得在同一服务上重试
                        self.ctx
                            .selector
                            .record_attempt(&service.name, false, None, latency);
                        tracing::debug!("服务 {} 返回空译文或原文，切换下一服务", service.name);
                        last_error = Some(TranslationError::ProviderError {
                            provider: service.name.clone(),
                            message: "译文为空或与原文一致".to_string(),
                        });
                        continue 'providers;
                    }
                    Ok(Ok(mut output)) => {
                        self.ctx.selector.record_attempt(
                            &service.name,
                            true,
                            None,
                            latency,
                        );
                        let quality = self.assessor.assess(
                            &request.text,
                            &output.translated_text,
                            &request.target_lang,
                        );
                        output.quality_score = Some(quality.overall);
                        if quality.overall < service.quality_threshold {
                            tracing::warn!(
                                "服务 {} 的译文质量 {:.2} 低于阈值 {:.2}",
                                service.name,
                                quality.overall,
                                service.quality_threshold
                            );
                        }
                        if attempt > 0 {
                            tracing::info!(
                                "服务 {} 在第 {} 次重试后成功",
                                service.name,
                                attempt
                            );
                        }
                        return Ok(output);
                    }
                    Ok(Err(e)) => e,
                    Err(_) => TranslationError::TimeoutError(format!(
                        "服务 {} 第 {} 次调用超时 ({:?})",
                        service.name,
                        attempt + 1,
                        attempt_timeout
                    )),
                };

                self.ctx
                    .selector
                    .record_attempt(&service.name, false, None, latency);
                tracing::debug!(
                    "服务 {} 第 {} 次调用失败: {}",
                    service.name,
                    attempt + 1,
                    error
                );

                // 认证失败轮换密钥后再试
                if matches!(error, TranslationError::AuthError(_)) {
                    if let Err(e) = self.ctx.config.rotate_key(&service.name) {
                        tracing::debug!("密钥轮换失败: {}", e);
                    }
                } else if !error.is_retryable() {
                    last_error = Some(error);
                    continue 'providers;
                }

                last_error = Some(error);

                if attempt < service.retry_count {
                    let delay = RETRY_BASE_DELAY * 2u32.pow(attempt);
                    let delay = match deadline {
                        Some(deadline) => {
                            let now = Instant::now();
                            if now + delay >= deadline {
                                tracing::debug!("退避等待会超过截止时间，提前降级");
                                break 'providers;
                            }
                            delay
                        }
                        None => delay,
                    };
                    tokio::time::sleep(delay).await;
                }
            }
        }

        Err(TranslationError::AllProvidersFailed(
            last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "没有可尝试的服务".to_string()),
        ))
    }

    /// 本地降级链：规则翻译器 → 原文透传
    fn local_fallback(&self, request: &TranslationRequest, cause: &TranslationError) -> TranslationOutput {
        match self.rule_fallback.translate(request) {
            Ok(output) => {
                self.stats.rule_fallbacks.fetch_add(1, Ordering::Relaxed);
                tracing::info!("规则翻译器产出降级结果");
                output
            }
            Err(_) => {
                self.stats.passthroughs.fetch_add(1, Ordering::Relaxed);
                fallback::passthrough(request, Some(cause.kind().to_string()))
            }
        }
    }

    fn record_success(&self, request: &TranslationRequest, output: &TranslationOutput) {
        if output.source != ResultSource::Provider {
            return;
        }
        self.stats.provider_successes.fetch_add(1, Ordering::Relaxed);
        self.stats
            .chars_processed
            .fetch_add(request.text.chars().count() as u64, Ordering::Relaxed);
        self.record_cost_for(output);
    }

    /// 成本记账；持久化失败不影响翻译结果，只记日志
    fn record_cost_for(&self, output: &TranslationOutput) {
        let Some(service) = self.ctx.config.provider(&output.provider_name) else {
            return;
        };
        let chars = output.original_text.chars().count();
        let cost = chars as f64 * service.cost_per_char;
        if let Err(e) = self.ctx.config.record_cost(&output.provider_name, chars, cost) {
            tracing::warn!("成本记账失败: {}", e);
        }
    }
}

// ============================================================================
// 引擎统计
// ============================================================================

/// 引擎统计（原子计数器，无锁并发更新）
#[derive(Debug, Default)]
pub struct EngineStats {
    pub requests_total: AtomicU64,
    pub cache_hits: AtomicU64,
    pub provider_successes: AtomicU64,
    pub rule_fallbacks: AtomicU64,
    pub passthroughs: AtomicU64,
    pub chars_processed: AtomicU64,
}

impl EngineStats {
    /// 一致性快照
    pub fn snapshot(&self) -> EngineStatsSnapshot {
        EngineStatsSnapshot {
            requests_total: self.requests_total.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            provider_successes: self.provider_successes.load(Ordering::Relaxed),
            rule_fallbacks: self.rule_fallbacks.load(Ordering::Relaxed),
            passthroughs: self.passthroughs.load(Ordering::Relaxed),
            chars_processed: self.chars_processed.load(Ordering::Relaxed),
        }
    }
}

/// 统计数据的不可变快照
#[derive(Debug, Clone, Copy)]
pub struct EngineStatsSnapshot {
    pub requests_total: u64,
    pub cache_hits: u64,
    pub provider_successes: u64,
    pub rule_fallbacks: u64,
    pub passthroughs: u64,
    pub chars_processed: u64,
}

impl EngineStatsSnapshot {
    pub fn cache_hit_rate(&self) -> f64 {
        if self.requests_total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / self.requests_total as f64
        }
    }
}
