//! 编排器弹性集成测试
//!
//! 覆盖完整的降级链：缓存命中、服务重试、规则降级、原文透传，
//! 以及截止时间传播和速率准入。

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{engine_with, mock, single_provider_engine};
use news_translator::{
    MockBehavior, MockProvider, ResultSource, TranslateOptions, TranslationProvider,
};

/// 场景1：服务正常时返回服务结果并写入缓存
#[tokio::test]
async fn test_provider_success_path() {
    let fixture = single_provider_engine("p1");

    let result = fixture
        .engine
        .translate(
            "OpenAI releases new model",
            "en",
            "zh",
            TranslateOptions::default(),
        )
        .await;

    assert_eq!(result.translated_text, "OpenAI发布新模型");
    assert_eq!(result.provider_name, "p1");
    assert_eq!(result.source, ResultSource::Provider);
    assert_eq!(result.fallback_level, 0);
    assert!(result.confidence_score >= 0.9);
    assert!(result.quality_score.is_some(), "服务结果应附带质量分");
}

/// 场景2：第二次调用命中缓存，译文逐字节一致
#[tokio::test]
async fn test_idempotent_cache_hit() {
    let fixture = single_provider_engine("p1");

    let first = fixture
        .engine
        .translate(
            "OpenAI releases new model",
            "en",
            "zh",
            TranslateOptions::default(),
        )
        .await;
    let second = fixture
        .engine
        .translate(
            "OpenAI releases new model",
            "en",
            "zh",
            TranslateOptions::default(),
        )
        .await;

    assert_eq!(first.translated_text, second.translated_text);
    assert_eq!(second.source, ResultSource::Cache);
    assert_eq!(fixture.engine.stats().cache_hits, 1);
}

/// 场景3：首选服务停用，次选服务超时两次后第三次成功
#[tokio::test(start_paused = true)]
async fn test_retry_then_succeed_on_secondary() {
    let fixture = engine_with(
        vec![
            mock("p1", MockBehavior::Succeed),
            mock("p2", MockBehavior::FailTimes(2)),
        ],
        |settings| {
            // 停用首选服务
            settings.services[0].enabled = false;
        },
    );

    let result = fixture
        .engine
        .translate("AI breakthrough", "en", "zh", TranslateOptions::default())
        .await;

    assert_eq!(result.provider_name, "p2");
    assert_eq!(result.fallback_level, 0);
    assert_eq!(result.source, ResultSource::Provider);

    let stats = fixture.engine.context().selector.snapshot("p2");
    assert_eq!(stats.attempts, 3, "两次失败加一次成功");
    assert_eq!(stats.successes, 1);
}

/// 场景4：所有服务停用时规则翻译器兜底
#[tokio::test]
async fn test_rule_fallback_when_all_disabled() {
    let fixture = engine_with(vec![mock("p1", MockBehavior::Succeed)], |settings| {
        for service in settings.services.iter_mut() {
            service.enabled = false;
        }
    });

    let result = fixture
        .engine
        .translate("AI breakthrough", "en", "zh", TranslateOptions::default())
        .await;

    assert!(result.translated_text.contains("人工智能"));
    assert_eq!(result.provider_name, "rule_based_translator");
    assert_eq!(result.source, ResultSource::RuleBased);
    assert_eq!(result.fallback_level, 1);
}

/// 降级完备性：词表也覆盖不了时透传原文，永不抛错
#[tokio::test(start_paused = true)]
async fn test_passthrough_as_terminal_outcome() {
    let fixture = engine_with(vec![mock("p1", MockBehavior::AlwaysFail)], |settings| {
        settings.services[0].retry_count = 1;
    });

    let result = fixture
        .engine
        .translate("xyzzy plugh qwfp", "en", "zh", TranslateOptions::default())
        .await;

    assert_eq!(result.translated_text, "xyzzy plugh qwfp");
    assert_eq!(result.provider_name, "passthrough");
    assert_eq!(result.source, ResultSource::Passthrough);
    assert_eq!(result.fallback_level, 2);
    assert_eq!(result.confidence_score, 0.0);
    assert!(result.error_kind.is_some(), "透传结果应携带诊断信息");
}

/// 输入为空时不触发任何服务调用，返回带诊断的透传
#[tokio::test]
async fn test_empty_input_rejected_without_provider_calls() {
    let provider = Arc::new(MockProvider::new("p1"));
    let fixture = engine_with(
        vec![Arc::clone(&provider) as Arc<dyn TranslationProvider>],
        |_| {},
    );

    let result = fixture
        .engine
        .translate("   ", "en", "zh", TranslateOptions::default())
        .await;

    assert_eq!(result.source, ResultSource::Passthrough);
    assert_eq!(result.error_kind.as_deref(), Some("invalid_input"));
    assert_eq!(provider.call_count(), 0, "输入校验失败不应调用服务");
}

/// 截止时间传播：超时后跳过剩余重试，快速进入降级
#[tokio::test]
async fn test_deadline_skips_remaining_retries() {
    let fixture = engine_with(
        vec![mock("p1", MockBehavior::Delay(Duration::from_secs(30)))],
        |settings| {
            settings.services[0].retry_count = 3;
        },
    );

    let start = std::time::Instant::now();
    let result = fixture
        .engine
        .translate(
            "AI breakthrough",
            "en",
            "zh",
            TranslateOptions {
                deadline: Some(Duration::from_millis(200)),
                ..Default::default()
            },
        )
        .await;
    let elapsed = start.elapsed();

    assert!(result.fallback_level >= 1, "应降级而非等待全部重试");
    assert!(
        elapsed < Duration::from_secs(5),
        "截止时间应截断重试链，实际耗时 {:?}",
        elapsed
    );
}

/// 速率准入：超过每分钟上限的请求跳过该服务
#[tokio::test]
async fn test_rate_limit_admission() {
    let fixture = engine_with(vec![mock("p1", MockBehavior::Succeed)], |settings| {
        settings.services[0].rate_limit_per_minute = 1;
    });

    let first = fixture
        .engine
        .translate("AI breakthrough", "en", "zh", TranslateOptions::default())
        .await;
    assert_eq!(first.source, ResultSource::Provider);

    // 不同文本避开缓存；速率窗口已满，只能降级
    let second = fixture
        .engine
        .translate("machine learning model", "en", "zh", TranslateOptions::default())
        .await;
    assert_ne!(second.source, ResultSource::Provider);
}

/// 批量翻译：每条都有终态结果
#[tokio::test]
async fn test_batch_returns_result_per_input() {
    let fixture = single_provider_engine("p1");

    let texts = vec![
        "AI breakthrough".to_string(),
        "new model".to_string(),
        "machine learning".to_string(),
    ];
    let results = fixture
        .engine
        .translate_batch(&texts, "en", "zh", TranslateOptions::default())
        .await;

    assert_eq!(results.len(), 3);
    for result in &results {
        assert!(!result.translated_text.is_empty());
    }
}

/// 质量优化模式：并发对比并返回带质量分的最优结果
#[tokio::test]
async fn test_quality_optimization_compares() {
    let fixture = engine_with(
        vec![
            mock("p1", MockBehavior::Succeed),
            mock("p2", MockBehavior::AlwaysFail),
        ],
        |_| {},
    );

    let result = fixture
        .engine
        .translate(
            "OpenAI releases new model",
            "en",
            "zh",
            TranslateOptions {
                quality_optimization: true,
                ..Default::default()
            },
        )
        .await;

    assert_eq!(result.provider_name, "p1");
    assert!(result.quality_score.is_some());
}

/// compare_providers 返回按综合分排序的全量结果
#[tokio::test]
async fn test_compare_providers_api() {
    let fixture = engine_with(
        vec![
            mock("p1", MockBehavior::Succeed),
            mock("p2", MockBehavior::Succeed),
        ],
        |_| {},
    );

    let outcome = fixture
        .engine
        .compare_providers("OpenAI releases new model", "en", "zh")
        .await
        .expect("对比应成功");

    assert_eq!(outcome.all.len(), 2);
    for pair in outcome.scores.windows(2) {
        assert!(pair[0].combined >= pair[1].combined);
    }
}

/// 反馈提交成功返回true，并可回读
#[tokio::test]
async fn test_submit_feedback_roundtrip() {
    let fixture = single_provider_engine("p1");

    let ok = fixture.engine.submit_feedback(
        "req-1",
        "AI breakthrough",
        "人工智能突破",
        "p1",
        Some(4),
        None,
        Some("不错".to_string()),
    );
    assert!(ok);

    let records = fixture.engine.context().feedback.load_all().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].rating, Some(4));
}

/// 健康摘要：探测后应反映每个服务的状态
#[tokio::test]
async fn test_health_summary_reflects_probes() {
    let fixture = engine_with(
        vec![
            mock("p1", MockBehavior::Succeed),
            mock("p2", MockBehavior::AlwaysFail),
        ],
        |_| {},
    );

    fixture.engine.context().health.force_check(None).await;
    let summary = fixture.engine.health_summary();

    assert_eq!(summary.len(), 2);
    assert_eq!(summary["p1"].consecutive_failures, 0);
    assert_eq!(summary["p2"].consecutive_failures, 1);
}
