//! 数据库缓存层
//!
//! 基于 redb 的持久表，按内容哈希为键存储序列化后的条目。
//! 容量无上限，依靠定期与按需的过期清理控制体积。
//! 读到无法反序列化的值时删除该行并按未命中处理。

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use redb::{Database, ReadableTable, ReadableTableMetadata, TableDefinition};

use super::CacheEntry;
use crate::error::{TranslationError, TranslationResult};

const TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("translations");

pub struct DatabaseTier {
    db: Database,
    evictions: AtomicU64,
}

impl DatabaseTier {
    pub fn new(path: &Path) -> TranslationResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path)
            .map_err(|e| TranslationError::CacheError(format!("打开缓存数据库失败: {}", e)))?;

        // 确保表存在，后续只读事务才能打开
        let txn = db
            .begin_write()
            .map_err(|e| TranslationError::CacheError(format!("初始化缓存表失败: {}", e)))?;
        txn.open_table(TABLE)
            .map_err(|e| TranslationError::CacheError(format!("初始化缓存表失败: {}", e)))?;
        txn.commit()
            .map_err(|e| TranslationError::CacheError(format!("初始化缓存表失败: {}", e)))?;

        Ok(Self {
            db,
            evictions: AtomicU64::new(0),
        })
    }

    pub fn get(&self, key: &str) -> Option<CacheEntry> {
        let bytes = {
            let txn = self.db.begin_read().ok()?;
            let table = txn.open_table(TABLE).ok()?;
            let guard = table.get(key).ok()??;
            guard.value().to_vec()
        };

        match serde_json::from_slice::<CacheEntry>(&bytes) {
            Ok(entry) if entry.is_expired() => {
                self.remove(key);
                None
            }
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!("数据库缓存行损坏，已删除: {} ({})", key, e);
                self.remove(key);
                None
            }
        }
    }

    pub fn put(&self, key: &str, entry: &CacheEntry) {
        let bytes = match serde_json::to_vec(entry) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!("序列化缓存条目失败: {}", e);
                return;
            }
        };

        let result = (|| -> Result<(), redb::Error> {
            let txn = self.db.begin_write()?;
            {
                let mut table = txn.open_table(TABLE)?;
                table.insert(key, bytes.as_slice())?;
            }
            txn.commit()?;
            Ok(())
        })();

        if let Err(e) = result {
            tracing::warn!("写入数据库缓存失败: {} ({})", key, e);
        }
    }

    fn remove(&self, key: &str) {
        let result = (|| -> Result<(), redb::Error> {
            let txn = self.db.begin_write()?;
            {
                let mut table = txn.open_table(TABLE)?;
                table.remove(key)?;
            }
            txn.commit()?;
            Ok(())
        })();

        if result.is_ok() {
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// 全表扫描删除过期与损坏的行，返回删除数
    pub fn clear_expired(&self) -> usize {
        let doomed: Vec<String> = {
            let Ok(txn) = self.db.begin_read() else {
                return 0;
            };
            let Ok(table) = txn.open_table(TABLE) else {
                return 0;
            };
            let Ok(iter) = table.iter() else {
                return 0;
            };

            iter.flatten()
                .filter_map(|(key, value)| {
                    let keep = serde_json::from_slice::<CacheEntry>(value.value())
                        .map(|entry| !entry.is_expired())
                        .unwrap_or(false);
                    if keep {
                        None
                    } else {
                        Some(key.value().to_string())
                    }
                })
                .collect()
        };

        if doomed.is_empty() {
            return 0;
        }

        let result = (|| -> Result<(), redb::Error> {
            let txn = self.db.begin_write()?;
            {
                let mut table = txn.open_table(TABLE)?;
                for key in &doomed {
                    table.remove(key.as_str())?;
                }
            }
            txn.commit()?;
            Ok(())
        })();

        match result {
            Ok(()) => doomed.len(),
            Err(e) => {
                tracing::warn!("数据库缓存清理失败: {}", e);
                0
            }
        }
    }

    pub fn len(&self) -> usize {
        let Ok(txn) = self.db.begin_read() else {
            return 0;
        };
        let Ok(table) = txn.open_table(TABLE) else {
            return 0;
        };
        table.len().map(|l| l as usize).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{TranslationOutput, TranslationRequest};
    use std::time::Duration;

    fn sample_entry(key: &str) -> CacheEntry {
        let req = TranslationRequest::new("hello", "en", "zh");
        let output = TranslationOutput::from_provider(&req, "mock", "你好".into(), 0.9);
        CacheEntry::new(key.to_string(), output, Duration::from_secs(60))
    }

    #[test]
    fn test_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let tier = DatabaseTier::new(&dir.path().join("cache.redb")).unwrap();

        tier.put("k1", &sample_entry("k1"));
        let found = tier.get("k1").expect("应命中");
        assert_eq!(found.result.translated_text, "你好");
        assert_eq!(tier.len(), 1);
        assert!(tier.get("k2").is_none());
    }

    #[test]
    fn test_expired_row_removed_on_get() {
        let dir = tempfile::tempdir().unwrap();
        let tier = DatabaseTier::new(&dir.path().join("cache.redb")).unwrap();

        let mut entry = sample_entry("k1");
        entry.expires_at = chrono::Utc::now() - chrono::Duration::seconds(1);
        tier.put("k1", &entry);

        assert!(tier.get("k1").is_none());
        assert_eq!(tier.len(), 0);
    }

    #[test]
    fn test_clear_expired_sweeps_table() {
        let dir = tempfile::tempdir().unwrap();
        let tier = DatabaseTier::new(&dir.path().join("cache.redb")).unwrap();

        tier.put("live", &sample_entry("live"));
        let mut dead = sample_entry("dead");
        dead.expires_at = chrono::Utc::now() - chrono::Duration::seconds(1);
        tier.put("dead", &dead);

        assert_eq!(tier.clear_expired(), 1);
        assert_eq!(tier.len(), 1);
        assert!(tier.get("live").is_some());
    }

    #[test]
    fn test_reopen_persists_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.redb");
        {
            let tier = DatabaseTier::new(&path).unwrap();
            tier.put("k1", &sample_entry("k1"));
        }

        let tier = DatabaseTier::new(&path).unwrap();
        assert!(tier.get("k1").is_some(), "数据库层重启后仍应命中");
    }
}
