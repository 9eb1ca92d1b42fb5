//! 缓存系统集成测试
//!
//! 覆盖三级缓存的往返、提升、TTL过期和损坏恢复行为。

use std::time::Duration;

use news_translator::{
    CacheConfig, MultiTierCache, TranslationOutput, TranslationRequest,
};

fn cache_in(dir: &std::path::Path) -> MultiTierCache {
    MultiTierCache::new(&CacheConfig::with_root(dir)).expect("创建缓存失败")
}

fn sample_output(text: &str, translated: &str) -> (String, TranslationOutput) {
    let request = TranslationRequest::new(text, "en", "zh");
    let output = TranslationOutput::from_provider(&request, "deeplx", translated.to_string(), 0.9);
    (request.content_hash(), output)
}

/// put后get在过期前必须返回同样的结果
#[tokio::test]
async fn test_cache_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let cache = cache_in(dir.path());

    let (key, output) = sample_output("Hello world", "你好世界");
    assert!(cache.get(&key).is_none(), "初始应为空");

    cache.put(&key, output.clone());
    let entry = cache.get(&key).expect("应命中");
    assert_eq!(entry.result.translated_text, "你好世界");
    assert_eq!(entry.result.provider_name, "deeplx");
}

/// 每次命中都会累加使用计数
#[tokio::test]
async fn test_usage_count_increments_on_hits() {
    let dir = tempfile::tempdir().unwrap();
    let cache = cache_in(dir.path());

    let (key, output) = sample_output("OpenAI releases new model", "OpenAI发布新模型");
    cache.put(&key, output);

    let first = cache.get(&key).unwrap();
    assert_eq!(first.usage_count, 1);
    let second = cache.get(&key).unwrap();
    assert_eq!(second.usage_count, 2, "第二次命中计数应为2");
}

/// 过期条目在任何一层都不会被返回
#[tokio::test]
async fn test_ttl_expiry_across_tiers() {
    let dir = tempfile::tempdir().unwrap();
    let cache = cache_in(dir.path());

    let (key, output) = sample_output("expiring text", "即将过期");
    cache.put_with_ttl(&key, output, Duration::from_millis(50));

    tokio::time::sleep(Duration::from_millis(120)).await;
    assert!(cache.get(&key).is_none(), "过期后任何层都不应命中");
}

/// 数据库层在进程重启后仍持有条目，命中后提升回内存层
#[tokio::test]
async fn test_durable_tier_survives_reopen_and_promotes() {
    let dir = tempfile::tempdir().unwrap();
    let (key, output) = sample_output("durable entry", "持久条目");

    {
        let cache = cache_in(dir.path());
        cache.put(&key, output);
    }

    let cache = cache_in(dir.path());
    let entry = cache.get(&key).expect("重启后应从持久层命中");
    assert_eq!(entry.result.translated_text, "持久条目");

    // 提升后内存层应有该条目
    let (memory, _, _) = cache.tier_sizes();
    assert!(memory >= 1, "命中后应提升到内存层");

    let stats = cache.stats();
    assert!(stats.hits() >= 1);
}

/// 文件层损坏的条目被删除并按未命中处理，但数据库层仍可恢复
#[tokio::test]
async fn test_corrupted_file_entry_recovers_from_database() {
    let dir = tempfile::tempdir().unwrap();
    let (key, output) = sample_output("corruption test", "损坏测试");

    {
        let cache = cache_in(dir.path());
        cache.put(&key, output);
    }

    // 人为破坏文件层条目
    let shard = dir.path().join("file-cache").join(&key[..2]);
    let entry_path = shard.join(format!("{}.json", key));
    assert!(entry_path.exists());
    std::fs::write(&entry_path, "损坏的内容{{{").unwrap();

    // 新开缓存（内存层为空），文件层损坏 -> 数据库层兜底
    let cache = cache_in(dir.path());
    let entry = cache.get(&key).expect("数据库层应兜底命中");
    assert_eq!(entry.result.translated_text, "损坏测试");
}

/// clear_expired 从所有层删除过期条目且不影响有效条目
#[tokio::test]
async fn test_clear_expired_keeps_live_entries() {
    let dir = tempfile::tempdir().unwrap();
    let cache = cache_in(dir.path());

    let (live_key, live) = sample_output("live text", "有效条目");
    cache.put(&live_key, live);
    let (dead_key, dead) = sample_output("dead text", "过期条目");
    cache.put_with_ttl(&dead_key, dead, Duration::from_millis(10));

    tokio::time::sleep(Duration::from_millis(50)).await;
    let removed = cache.clear_expired();
    assert!(removed >= 1, "应至少清掉过期条目的一份副本");

    assert!(cache.get(&live_key).is_some());
    assert!(cache.get(&dead_key).is_none());
}

/// 同键并发写入不崩溃，最终保留其中一个结果
#[tokio::test]
async fn test_concurrent_same_key_writes_last_wins() {
    let dir = tempfile::tempdir().unwrap();
    let cache = std::sync::Arc::new(cache_in(dir.path()));

    let (key, _) = sample_output("contended", "争用");
    let mut handles = Vec::new();
    for i in 0..8 {
        let cache = std::sync::Arc::clone(&cache);
        let key = key.clone();
        handles.push(tokio::spawn(async move {
            let (_, output) = sample_output("contended", &format!("版本{}", i));
            cache.put(&key, output);
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let entry = cache.get(&key).expect("应命中");
    assert!(entry.result.translated_text.starts_with("版本"));
}
