//! 服务健康监控
//!
//! 每个服务维护一个健康状态机：
//!
//! ```text
//! UNKNOWN --探测成功--> HEALTHY | DEGRADED（延迟超阈值）
//!         --连续失败达到阈值--> UNHEALTHY
//! ```
//!
//! 任意一次成功都会把连续失败数清零并重新评估 HEALTHY/DEGRADED。
//! 后台循环按固定间隔并行探测所有服务，每次探测有独立超时。
//! 状态记录按服务名分片加锁，更新是原子的，不会出现半新半旧的记录。
//! 状态变更监听器同步调用，监听器内部的panic被捕获并记录，从不外溢。

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures::future::join_all;
use serde::Serialize;

use crate::config::ConfigManager;
use crate::providers::ProviderRegistry;

/// 健康监控默认值
pub mod constants {
    use std::time::Duration;

    /// 探测循环间隔
    pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_secs(60);
    /// 单次探测超时
    pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);
    /// 延迟超过该值视为降级
    pub const DEFAULT_DEGRADED_LATENCY: Duration = Duration::from_secs(5);
    /// 连续失败达到该值视为不健康
    pub const DEFAULT_UNHEALTHY_THRESHOLD: u32 = 5;
}

/// 健康状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HealthStatus {
    Unknown,
    Healthy,
    Degraded,
    Unhealthy,
}

/// 单个服务的健康记录
///
/// 被探测持续覆写；只在进程重启时重置。
#[derive(Debug, Clone, Serialize)]
pub struct HealthRecord {
    pub provider_name: String,
    pub status: HealthStatus,
    pub consecutive_failures: u32,
    /// 最近一次探测延迟（毫秒）
    pub last_latency_ms: Option<u64>,
    pub success_rate: f64,
    pub total_probes: u64,
    pub successful_probes: u64,
    pub last_error: Option<String>,
    pub last_checked: Option<DateTime<Utc>>,
}

impl HealthRecord {
    fn new(provider_name: &str) -> Self {
        Self {
            provider_name: provider_name.to_string(),
            status: HealthStatus::Unknown,
            consecutive_failures: 0,
            last_latency_ms: None,
            success_rate: 0.0,
            total_probes: 0,
            successful_probes: 0,
            last_error: None,
            last_checked: None,
        }
    }
}

/// 健康监控配置
#[derive(Debug, Clone)]
pub struct HealthMonitorConfig {
    pub probe_interval: Duration,
    pub probe_timeout: Duration,
    pub degraded_latency: Duration,
    pub unhealthy_threshold: u32,
}

impl Default for HealthMonitorConfig {
    fn default() -> Self {
        Self {
            probe_interval: constants::DEFAULT_PROBE_INTERVAL,
            probe_timeout: constants::DEFAULT_PROBE_TIMEOUT,
            degraded_latency: constants::DEFAULT_DEGRADED_LATENCY,
            unhealthy_threshold: constants::DEFAULT_UNHEALTHY_THRESHOLD,
        }
    }
}

type StatusListener = Box<dyn Fn(&str, HealthStatus, HealthStatus) + Send + Sync>;

/// 健康监控器
pub struct HealthMonitor {
    registry: ProviderRegistry,
    config_manager: Arc<ConfigManager>,
    monitor_config: HealthMonitorConfig,
    // DashMap按键分片加锁，每条记录的更新天然原子
    records: DashMap<String, HealthRecord>,
    listeners: Mutex<Vec<StatusListener>>,
    task: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl HealthMonitor {
    pub fn new(
        registry: ProviderRegistry,
        config_manager: Arc<ConfigManager>,
        monitor_config: HealthMonitorConfig,
    ) -> Self {
        let records = DashMap::new();
        for name in registry.names() {
            records.insert(name.clone(), HealthRecord::new(&name));
        }
        Self {
            registry,
            config_manager,
            monitor_config,
            records,
            listeners: Mutex::new(Vec::new()),
            task: Mutex::new(None),
        }
    }

    /// 启动后台探测循环；重复调用会先停掉旧任务
    pub fn start(self: &Arc<Self>) {
        self.stop();

        let monitor = Arc::clone(self);
        let interval = self.monitor_config.probe_interval;
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                monitor.probe_all().await;
            }
        });

        *self.task.lock().unwrap() = Some(handle);
        tracing::info!(
            "健康监控已启动，探测间隔 {:?}",
            self.monitor_config.probe_interval
        );
    }

    /// 停止后台循环
    pub fn stop(&self) {
        if let Some(handle) = self.task.lock().unwrap().take() {
            handle.abort();
            tracing::info!("健康监控已停止");
        }
    }

    /// 立即同步探测；`provider` 为空时探测全部
    pub async fn force_check(&self, provider: Option<&str>) {
        match provider {
            Some(name) => self.probe_one(name).await,
            None => self.probe_all().await,
        }
    }

    /// 并行探测所有已注册的服务
    async fn probe_all(&self) {
        let names = self.registry.names();
        let futures: Vec<_> = names.iter().map(|name| self.probe_one(name)).collect();
        join_all(futures).await;
    }

    async fn probe_one(&self, name: &str) {
        let Ok(provider) = self.registry.get(name) else {
            return;
        };
        let api_key = self
            .config_manager
            .provider(name)
            .map(|c| c.current_key().to_string())
            .unwrap_or_default();

        let start = std::time::Instant::now();
        let result = tokio::time::timeout(
            self.monitor_config.probe_timeout,
            provider.health_probe(&api_key),
        )
        .await;

        match result {
            Ok(Ok(latency)) => self.apply_success(name, latency),
            Ok(Err(e)) => self.apply_failure(name, &e.to_string()),
            Err(_) => {
                let msg = format!("探测超时 ({:?})", start.elapsed());
                self.apply_failure(name, &msg);
            }
        }
    }

    fn apply_success(&self, name: &str, latency: Duration) {
        let (old_status, new_status) = {
            let mut record = self
                .records
                .entry(name.to_string())
                .or_insert_with(|| HealthRecord::new(name));

            let old_status = record.status;
            record.consecutive_failures = 0;
            record.total_probes += 1;
            record.successful_probes += 1;
            record.success_rate = record.successful_probes as f64 / record.total_probes as f64;
            record.last_latency_ms = Some(latency.as_millis() as u64);
            record.last_error = None;
            record.last_checked = Some(Utc::now());
            record.status = if latency > self.monitor_config.degraded_latency {
                HealthStatus::Degraded
            } else {
                HealthStatus::Healthy
            };
            (old_status, record.status)
        };

        if old_status != new_status {
            tracing::info!("服务 {} 健康状态: {:?} -> {:?}", name, old_status, new_status);
            self.notify_listeners(name, old_status, new_status);
        }
    }

    fn apply_failure(&self, name: &str, error: &str) {
        let (old_status, new_status) = {
            let mut record = self
                .records
                .entry(name.to_string())
                .or_insert_with(|| HealthRecord::new(name));

            let old_status = record.status;
            record.consecutive_failures += 1;
            record.total_probes += 1;
            record.success_rate = record.successful_probes as f64 / record.total_probes as f64;
            record.last_error = Some(error.to_string());
            record.last_checked = Some(Utc::now());
            if record.consecutive_failures >= self.monitor_config.unhealthy_threshold {
                record.status = HealthStatus::Unhealthy;
            }
            (old_status, record.status)
        };

        if old_status != new_status {
            tracing::warn!(
                "服务 {} 健康状态: {:?} -> {:?} ({})",
                name,
                old_status,
                new_status,
                error
            );
            self.notify_listeners(name, old_status, new_status);
        }
    }

    /// 同步调用所有监听器；监听器panic只记录不传播
    fn notify_listeners(&self, name: &str, old: HealthStatus, new: HealthStatus) {
        let listeners = self.listeners.lock().unwrap();
        for listener in listeners.iter() {
            let result = catch_unwind(AssertUnwindSafe(|| listener(name, old, new)));
            if result.is_err() {
                tracing::error!("健康状态监听器执行失败，已忽略");
            }
        }
    }

    /// 注册状态变更监听器
    pub fn add_listener<F>(&self, listener: F)
    where
        F: Fn(&str, HealthStatus, HealthStatus) + Send + Sync + 'static,
    {
        self.listeners.lock().unwrap().push(Box::new(listener));
    }

    /// 服务当前状态；未知服务返回 `Unknown`
    pub fn status(&self, name: &str) -> HealthStatus {
        self.records
            .get(name)
            .map(|r| r.status)
            .unwrap_or(HealthStatus::Unknown)
    }

    /// 服务是否可用于选路（不健康的排除，未知的先信任）
    pub fn is_usable(&self, name: &str) -> bool {
        self.status(name) != HealthStatus::Unhealthy
    }

    /// 全部健康记录的快照
    pub fn summary(&self) -> HashMap<String, HealthRecord> {
        self.records
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// 直接写入一次探测结果（测试与外部探针使用）
    pub fn report_probe(&self, name: &str, outcome: Result<Duration, String>) {
        match outcome {
            Ok(latency) => self.apply_success(name, latency),
            Err(e) => self.apply_failure(name, &e),
        }
    }
}

impl Drop for HealthMonitor {
    fn drop(&mut self) {
        if let Some(handle) = self.task.lock().unwrap().take() {
            handle.abort();
        }
    }
}
