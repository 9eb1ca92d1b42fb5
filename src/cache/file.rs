//! 文件缓存层
//!
//! 按内容哈希前两个字符分片的JSON目录树，不相关的键不会落在同一文件上。
//! 条目数超过软上限时按修改时间回收最旧的20%。
//! 无法解析的文件视为损坏：删除并按未命中处理。

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::SystemTime;

use super::{constants, CacheEntry};
use crate::error::TranslationResult;

pub struct FileTier {
    root: PathBuf,
    soft_cap: usize,
    entry_count: AtomicUsize,
    evictions: AtomicU64,
    // 只序列化回收操作；普通读写靠分片目录天然分散
    prune_lock: Mutex<()>,
}

impl FileTier {
    pub fn new(root: &Path, soft_cap: usize) -> TranslationResult<Self> {
        fs::create_dir_all(root)?;
        let count = count_entries(root);
        Ok(Self {
            root: root.to_path_buf(),
            soft_cap: soft_cap.max(1),
            entry_count: AtomicUsize::new(count),
            evictions: AtomicU64::new(0),
            prune_lock: Mutex::new(()),
        })
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        // 哈希是十六进制串，前两个字符做分片目录
        let shard = if key.len() >= 2 { &key[..2] } else { "xx" };
        self.root.join(shard).join(format!("{}.json", key))
    }

    pub fn get(&self, key: &str) -> Option<CacheEntry> {
        let path = self.entry_path(key);
        let content = fs::read_to_string(&path).ok()?;

        let entry: CacheEntry = match serde_json::from_str(&content) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("文件缓存条目损坏，已删除: {} ({})", path.display(), e);
                self.remove_file(&path);
                return None;
            }
        };

        if entry.is_expired() {
            self.remove_file(&path);
            return None;
        }

        Some(entry)
    }

    pub fn put(&self, key: &str, entry: &CacheEntry) {
        let path = self.entry_path(key);
        let is_new = !path.exists();

        if let Some(parent) = path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                tracing::warn!("创建缓存分片目录失败: {}", e);
                return;
            }
        }

        let json = match serde_json::to_string(entry) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!("序列化缓存条目失败: {}", e);
                return;
            }
        };

        if let Err(e) = fs::write(&path, json) {
            tracing::warn!("写入文件缓存失败: {} ({})", path.display(), e);
            return;
        }

        if is_new {
            let count = self.entry_count.fetch_add(1, Ordering::Relaxed) + 1;
            if count > self.soft_cap {
                self.prune_oldest();
            }
        }
    }

    /// 回收最旧的20%条目（按文件修改时间）
    fn prune_oldest(&self) {
        let _guard = match self.prune_lock.try_lock() {
            Ok(guard) => guard,
            // 已有任务在回收
            Err(_) => return,
        };

        let mut files: Vec<(PathBuf, SystemTime)> = Vec::new();
        collect_files(&self.root, &mut files);

        if files.len() <= self.soft_cap {
            self.entry_count.store(files.len(), Ordering::Relaxed);
            return;
        }

        files.sort_by_key(|(_, mtime)| *mtime);
        let reclaim = ((files.len() as f64) * constants::FILE_RECLAIM_RATIO).ceil() as usize;
        let reclaim = reclaim.max(files.len().saturating_sub(self.soft_cap));

        let mut removed = 0usize;
        for (path, _) in files.iter().take(reclaim) {
            if fs::remove_file(path).is_ok() {
                removed += 1;
            }
        }

        self.entry_count
            .store(files.len().saturating_sub(removed), Ordering::Relaxed);
        self.evictions.fetch_add(removed as u64, Ordering::Relaxed);
        tracing::info!("文件缓存超过软上限，回收 {} 条最旧条目", removed);
    }

    pub fn clear_expired(&self) -> usize {
        let mut files: Vec<(PathBuf, SystemTime)> = Vec::new();
        collect_files(&self.root, &mut files);

        let mut removed = 0usize;
        for (path, _) in files {
            let keep = fs::read_to_string(&path)
                .ok()
                .and_then(|content| serde_json::from_str::<CacheEntry>(&content).ok())
                .map(|entry| !entry.is_expired())
                // 读不出来或解析失败都删
                .unwrap_or(false);

            if !keep && fs::remove_file(&path).is_ok() {
                removed += 1;
                self.entry_count.fetch_sub(1, Ordering::Relaxed);
            }
        }
        removed
    }

    fn remove_file(&self, path: &Path) {
        if fs::remove_file(path).is_ok() {
            let _ = self
                .entry_count
                .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |c| {
                    Some(c.saturating_sub(1))
                });
        }
    }

    pub fn len(&self) -> usize {
        self.entry_count.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }
}

fn count_entries(root: &Path) -> usize {
    let mut files = Vec::new();
    collect_files(root, &mut files);
    files.len()
}

fn collect_files(root: &Path, out: &mut Vec<(PathBuf, SystemTime)>) {
    let Ok(shards) = fs::read_dir(root) else {
        return;
    };
    for shard in shards.flatten() {
        let shard_path = shard.path();
        if !shard_path.is_dir() {
            continue;
        }
        let Ok(entries) = fs::read_dir(&shard_path) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().map(|e| e == "json").unwrap_or(false) {
                let mtime = entry
                    .metadata()
                    .and_then(|m| m.modified())
                    .unwrap_or(SystemTime::UNIX_EPOCH);
                out.push((path, mtime));
            }
        }
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
    fn test_sharded_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let tier = FileTier::new(dir.path(), 100).unwrap();

        let key = "ab12cd34";
        tier.put(key, &sample_entry(key));

        assert!(dir.path().join("ab").join("ab12cd34.json").exists());
        let found = tier.get(key).expect("应命中");
        assert_eq!(found.result.translated_text, "你好");
        assert_eq!(tier.len(), 1);
    }

    #[test]
    fn test_corrupted_entry_deleted_as_miss() {
        let dir = tempfile::tempdir().unwrap();
        let tier = FileTier::new(dir.path(), 100).unwrap();

        let key = "ef56ab78";
        tier.put(key, &sample_entry(key));
        let path = dir.path().join("ef").join("ef56ab78.json");
        fs::write(&path, "{ 这不是合法的JSON").unwrap();

        assert!(tier.get(key).is_none(), "损坏条目按未命中处理");
        assert!(!path.exists(), "损坏条目应被删除");
    }

    #[test]
    fn test_expired_entry_removed_on_get() {
        let dir = tempfile::tempdir().unwrap();
        let tier = FileTier::new(dir.path(), 100).unwrap();

        let key = "aa11bb22";
        let mut entry = sample_entry(key);
        entry.expires_at = chrono::Utc::now() - chrono::Duration::seconds(1);
        tier.put(key, &entry);

        assert!(tier.get(key).is_none());
        assert!(!dir.path().join("aa").join("aa11bb22.json").exists());
    }

    #[test]
    fn test_soft_cap_prunes_oldest() {
        let dir = tempfile::tempdir().unwrap();
        let tier = FileTier::new(dir.path(), 10).unwrap();

        for i in 0..12 {
            let key = format!("{:02x}entry{}", i, i);
            tier.put(&key, &sample_entry(&key));
        }

        assert!(tier.len() <= 10, "超过软上限后应回收到上限以内");
        assert!(tier.evictions() > 0);
    }

    #[test]
    fn test_count_recovered_on_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let tier = FileTier::new(dir.path(), 100).unwrap();
            tier.put("cc33dd44", &sample_entry("cc33dd44"));
            tier.put("dd44ee55", &sample_entry("dd44ee55"));
        }

        let tier = FileTier::new(dir.path(), 100).unwrap();
        assert_eq!(tier.len(), 2, "重新打开时应扫描恢复计数");
    }
}
