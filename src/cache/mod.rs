//! 三级翻译缓存
//!
//! 内存 → 文件 → 数据库，按延迟从低到高排列：
//!
//! - **内存层**: LRU，固定容量（默认1000条），进程内最快
//! - **文件层**: 按哈希前缀分片的JSON目录树，软上限（默认10000条），溢出时回收最旧的20%
//! - **数据库层**: redb 持久表，无容量上限，定期（默认24小时）及按需清理过期行
//!
//! 任一层命中后会把条目提升到所有更快的层，热点数据自然聚集在内存。
//! 提升过程中锁的获取顺序固定为 内存 → 文件 → 数据库，且不跨层持锁。
//! 磁盘上损坏的条目直接删除并按未命中处理，从不向上层暴露为错误。

pub mod database;
pub mod file;
pub mod memory;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TranslationResult;
use crate::types::TranslationOutput;

pub use database::DatabaseTier;
pub use file::FileTier;
pub use memory::MemoryTier;

/// 缓存默认值
pub mod constants {
    use std::time::Duration;

    /// 内存层容量
    pub const DEFAULT_MEMORY_CAPACITY: usize = 1000;
    /// 文件层软上限
    pub const DEFAULT_FILE_SOFT_CAP: usize = 10_000;
    /// 溢出时回收的比例
    pub const FILE_RECLAIM_RATIO: f64 = 0.2;
    /// 条目默认存活时间：30天
    pub const DEFAULT_TTL: Duration = Duration::from_secs(30 * 24 * 3600);
    /// 数据库层过期清理周期
    pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(24 * 3600);
}

/// 缓存条目
///
/// 在未命中且翻译成功时创建；每次命中更新 `usage_count` 和 `last_accessed`；
/// 由TTL清理或容量驱逐销毁。`expires_at` 恒大于 `created_at`。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub content_hash: String,
    pub result: TranslationOutput,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub usage_count: u64,
    pub last_accessed: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(content_hash: String, result: TranslationOutput, ttl: Duration) -> Self {
        let now = Utc::now();
        let ttl = chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::days(30));
        Self {
            content_hash,
            result,
            created_at: now,
            // TTL为0时也保证 expires_at > created_at
            expires_at: now + ttl.max(chrono::Duration::seconds(1)),
            usage_count: 0,
            last_accessed: now,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// 命中时更新访问信息
    pub fn touch(&mut self) {
        self.usage_count += 1;
        self.last_accessed = Utc::now();
    }
}

/// 缓存配置
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub memory_capacity: usize,
    pub file_dir: PathBuf,
    pub file_soft_cap: usize,
    pub db_path: PathBuf,
    pub default_ttl: Duration,
    pub sweep_interval: Duration,
}

impl CacheConfig {
    /// 以指定目录为根的默认配置
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            memory_capacity: constants::DEFAULT_MEMORY_CAPACITY,
            file_dir: root.join("file-cache"),
            file_soft_cap: constants::DEFAULT_FILE_SOFT_CAP,
            db_path: root.join("translations.redb"),
            default_ttl: constants::DEFAULT_TTL,
            sweep_interval: constants::DEFAULT_SWEEP_INTERVAL,
        }
    }
}

/// 缓存统计信息
#[derive(Debug, Default, Clone)]
pub struct CacheStats {
    pub total_requests: u64,
    pub memory_hits: u64,
    pub file_hits: u64,
    pub database_hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expired_removed: u64,
}

impl CacheStats {
    pub fn hits(&self) -> u64 {
        self.memory_hits + self.file_hits + self.database_hits
    }

    pub fn hit_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.hits() as f64 / self.total_requests as f64
        }
    }
}

/// 多级缓存
///
/// `get` 依次查内存、文件、数据库；`put` 同时写入三层。
/// 所有方法都可以在并发任务中安全调用。
pub struct MultiTierCache {
    memory: MemoryTier,
    file: FileTier,
    database: DatabaseTier,
    default_ttl: Duration,
    stats: std::sync::Mutex<CacheStats>,
}

impl MultiTierCache {
    pub fn new(config: &CacheConfig) -> TranslationResult<Self> {
        Ok(Self {
            memory: MemoryTier::new(config.memory_capacity),
            file: FileTier::new(&config.file_dir, config.file_soft_cap)?,
            database: DatabaseTier::new(&config.db_path)?,
            default_ttl: config.default_ttl,
            stats: std::sync::Mutex::new(CacheStats::default()),
        })
    }

    /// 按键查找；任一层命中即提升到所有更快的层
    pub fn get(&self, key: &str) -> Option<CacheEntry> {
        {
            let mut stats = self.stats.lock().unwrap();
            stats.total_requests += 1;
        }

        // 第一级：内存
        if let Some(mut entry) = self.memory.get(key) {
            entry.touch();
            self.memory.put(key, entry.clone());
            self.stats.lock().unwrap().memory_hits += 1;
            return Some(entry);
        }

        // 第二级：文件
        if let Some(mut entry) = self.file.get(key) {
            entry.touch();
            self.memory.put(key, entry.clone());
            self.file.put(key, &entry);
            self.stats.lock().unwrap().file_hits += 1;
            return Some(entry);
        }

        // 第三级：数据库
        if let Some(mut entry) = self.database.get(key) {
            entry.touch();
            self.memory.put(key, entry.clone());
            self.file.put(key, &entry);
            self.database.put(key, &entry);
            self.stats.lock().unwrap().database_hits += 1;
            return Some(entry);
        }

        self.stats.lock().unwrap().misses += 1;
        None
    }

    /// 写入三层；同键并发写入时最后一次成功写入胜出
    pub fn put(&self, key: &str, result: TranslationOutput) -> CacheEntry {
        self.put_with_ttl(key, result, self.default_ttl)
    }

    pub fn put_with_ttl(
        &self,
        key: &str,
        result: TranslationOutput,
        ttl: Duration,
    ) -> CacheEntry {
        let entry = CacheEntry::new(key.to_string(), result, ttl);
        self.memory.put(key, entry.clone());
        self.file.put(key, &entry);
        self.database.put(key, &entry);
        entry
    }

    /// 从所有层清除过期条目，返回删除总数
    ///
    /// 对并发读写安全：各层内部加锁，正在被删除的条目不会再被返回。
    pub fn clear_expired(&self) -> usize {
        let removed =
            self.memory.clear_expired() + self.file.clear_expired() + self.database.clear_expired();
        if removed > 0 {
            tracing::info!("缓存过期清理完成，删除 {} 条", removed);
        }
        self.stats.lock().unwrap().expired_removed += removed as u64;
        removed
    }

    /// 启动后台清理任务
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // 首个tick立即触发，跳过
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = cache.clear_expired();
                tracing::debug!("后台缓存清理: 删除 {} 条过期条目", removed);
            }
        })
    }

    /// 统计快照（合并各层驱逐计数）
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.lock().unwrap().clone();
        stats.evictions =
            self.memory.evictions() + self.file.evictions() + self.database.evictions();
        stats
    }

    /// 各层当前条目数 (内存, 文件, 数据库)
    pub fn tier_sizes(&self) -> (usize, usize, usize) {
        (self.memory.len(), self.file.len(), self.database.len())
    }
}
