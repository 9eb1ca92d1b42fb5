//! 内存缓存层
//!
//! 固定容量的LRU缓存，按最后访问时间驱逐。
//! 只用一把锁保护这一个map，不与其他组件共享锁。

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use lru::LruCache;

use super::CacheEntry;

pub struct MemoryTier {
    entries: Mutex<LruCache<String, CacheEntry>>,
    evictions: AtomicU64,
}

impl MemoryTier {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap();
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            evictions: AtomicU64::new(0),
        }
    }

    /// 查找条目；过期条目当场删除并按未命中处理
    pub fn get(&self, key: &str) -> Option<CacheEntry> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some(entry) if !entry.is_expired() => Some(entry.clone()),
            Some(_) => {
                entries.pop(key);
                None
            }
            None => None,
        }
    }

    /// 写入条目；容量满时LRU驱逐
    pub fn put(&self, key: &str, entry: CacheEntry) {
        let mut entries = self.entries.lock().unwrap();
        let at_capacity = entries.len() == usize::from(entries.cap());
        let evicted = at_capacity && !entries.contains(key);
        entries.put(key.to_string(), entry);
        if evicted {
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// 清除过期条目，返回删除数
    pub fn clear_expired(&self) -> usize {
        let mut entries = self.entries.lock().unwrap();
        let expired: Vec<String> = entries
            .iter()
            .filter(|(_, e)| e.is_expired())
            .map(|(k, _)| k.clone())
            .collect();
        for key in &expired {
            entries.pop(key);
        }
        expired.len()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }
}
