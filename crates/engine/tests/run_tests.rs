//! End-to-end engine scenarios against programmable mock backends.

mod common;

use std::sync::atomic::Ordering;

use assert_matches::assert_matches;

use common::{
    harness, raw_brief, MockImageBackend, MockImageMode, MockInspector, MockText,
};
use flyerforge_core::error::EngineError;
use flyerforge_core::qc::QC_DISABLED_RATIONALE;
use flyerforge_core::state::{RunStatus, VariantState};
use flyerforge_engine::config::EngineConfig;

fn config() -> EngineConfig {
    EngineConfig {
        variant_count: 3,
        max_attempts: 3,
        ..EngineConfig::default()
    }
}

#[tokio::test]
async fn three_variants_all_pass_first_attempt() {
    let text = MockText::new();
    let inspector = MockInspector::pass_all();
    let h = harness(
        config(),
        text.clone(),
        inspector.clone(),
        MockImageBackend::new(MockImageMode::Url),
    );

    let outcome = h.controller.execute(raw_brief(), Some(3)).await.unwrap();

    assert_eq!(outcome.status, RunStatus::Succeeded);
    assert_eq!(outcome.variants.len(), 3);
    assert!(outcome.variants.iter().all(|v| v.accepted()));
    assert!(outcome.error.is_none());
    assert_eq!(text.copy_calls.load(Ordering::SeqCst), 3);
    assert_eq!(inspector.calls.load(Ordering::SeqCst), 3);

    // One attempt each, image reference recorded.
    for variant in &outcome.variants {
        assert_eq!(variant.attempts, 1);
        assert!(variant.image_ref.as_deref().unwrap().starts_with("http://img.mock/"));
        assert!(variant.qc.as_ref().unwrap().passed);
    }

    // Promotion of the selected winner creates one asset.
    let asset_id = h.controller.promote(&outcome, 42, None).await.unwrap();
    let assets = h.store.assets();
    assert_eq!(assets.len(), 1);
    assert_eq!(assets[0].id, asset_id);
    assert_eq!(assets[0].campaign_id, 42);
    assert_eq!(assets[0].run_id, outcome.run_id);
    assert_eq!(Some(assets[0].variant_index), outcome.best_index);
}

#[tokio::test]
async fn persisted_indices_are_gapless() {
    let h = harness(
        config(),
        MockText::new(),
        MockInspector::pass_all(),
        MockImageBackend::new(MockImageMode::Url),
    );

    let outcome = h.controller.execute(raw_brief(), Some(4)).await.unwrap();
    let run = h.store.run(outcome.run_id).unwrap();

    let mut indices: Vec<u32> = run.variants.iter().map(|v| v.index).collect();
    indices.sort_unstable();
    assert_eq!(indices, vec![0, 1, 2, 3]);
    assert_eq!(run.completion_writes, 1);
    assert_eq!(run.status, RunStatus::Succeeded);
}

#[tokio::test]
async fn image_transport_failures_retry_with_copy_reused() {
    let text = MockText::new();
    let backend = MockImageBackend::new(MockImageMode::Url).with_transport_failures(2);
    let image_calls = backend.call_counter();
    let h = harness(config(), text.clone(), MockInspector::pass_all(), backend);

    let outcome = h.controller.execute(raw_brief(), Some(1)).await.unwrap();

    assert_eq!(outcome.status, RunStatus::Succeeded);
    let variant = &outcome.variants[0];
    assert_eq!(variant.state, VariantState::Accepted);
    assert_eq!(variant.attempts, 3);
    // Copy validated once and reused across all three attempts.
    assert_eq!(text.copy_calls.load(Ordering::SeqCst), 1);
    assert_eq!(image_calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn exhausted_retry_cap_ends_failed_never_accepted() {
    let inspector = MockInspector::with_scores(vec![0.2], 0.8);
    let h = harness(
        config(),
        MockText::new(),
        inspector.clone(),
        MockImageBackend::new(MockImageMode::Url),
    );

    let outcome = h.controller.execute(raw_brief(), Some(1)).await.unwrap();

    assert_eq!(outcome.status, RunStatus::Failed);
    assert_eq!(
        outcome.error.as_deref(),
        Some("no variant passed quality control")
    );
    let variant = &outcome.variants[0];
    assert_eq!(variant.state, VariantState::Failed);
    assert_eq!(variant.attempts, 3);
    assert!(variant.error.as_deref().unwrap().contains("retry cap exhausted"));
    assert_eq!(inspector.calls.load(Ordering::SeqCst), 3);

    // Nothing promotable.
    assert_eq!(outcome.best_index, None);
    assert_matches!(
        h.controller.promote(&outcome, 42, None).await,
        Err(EngineError::Validation(_))
    );
}

#[tokio::test]
async fn disabled_qc_accepts_everything_with_marker() {
    let inspector = MockInspector::pass_all();
    let h = harness(
        EngineConfig {
            qc_enabled: false,
            ..config()
        },
        MockText::new(),
        inspector.clone(),
        MockImageBackend::new(MockImageMode::Url),
    );

    let outcome = h.controller.execute(raw_brief(), Some(2)).await.unwrap();

    assert_eq!(outcome.status, RunStatus::Succeeded);
    assert_eq!(inspector.calls.load(Ordering::SeqCst), 0);
    for variant in &outcome.variants {
        assert!(variant.accepted());
        let qc = variant.qc.as_ref().unwrap();
        assert_eq!(qc.score, 1.0);
        assert_eq!(qc.rationale, QC_DISABLED_RATIONALE);
        assert!(qc.is_disabled_pass());
    }

    // The disabled marker still satisfies promotion.
    h.controller.promote(&outcome, 7, None).await.unwrap();
}

#[tokio::test]
async fn selection_takes_highest_score_lowest_index_tie() {
    let inspector = MockInspector::with_scores(vec![0.4, 0.9, 0.9], 0.3);
    let h = harness(
        config(),
        MockText::new(),
        inspector,
        MockImageBackend::new(MockImageMode::Url),
    );

    let outcome = h.controller.execute(raw_brief(), Some(3)).await.unwrap();

    assert_eq!(outcome.status, RunStatus::Succeeded);
    assert_eq!(outcome.best_index, Some(1));

    let asset_id = h.controller.promote(&outcome, 9, None).await.unwrap();
    let assets = h.store.assets();
    assert_eq!(assets[0].id, asset_id);
    assert_eq!(assets[0].variant_index, 1);
}

#[tokio::test]
async fn parse_failure_gets_one_corrective_reprompt() {
    let text = MockText::new().with_parse_failures(1);
    let h = harness(
        config(),
        text.clone(),
        MockInspector::pass_all(),
        MockImageBackend::new(MockImageMode::Url),
    );

    let outcome = h.controller.execute(raw_brief(), Some(1)).await.unwrap();

    assert_eq!(outcome.status, RunStatus::Succeeded);
    let variant = &outcome.variants[0];
    assert_eq!(variant.state, VariantState::Accepted);
    // The corrective re-prompt happens inside the same attempt.
    assert_eq!(variant.attempts, 1);
    assert_eq!(text.copy_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn text_transport_failure_regenerates_copy_on_retry() {
    let text = MockText::new().with_transport_failures(1);
    let h = harness(
        config(),
        text.clone(),
        MockInspector::pass_all(),
        MockImageBackend::new(MockImageMode::Url),
    );

    let outcome = h.controller.execute(raw_brief(), Some(1)).await.unwrap();

    assert_eq!(outcome.status, RunStatus::Succeeded);
    let variant = &outcome.variants[0];
    assert_eq!(variant.attempts, 2);
    // First attempt failed in text generation, so the retry paid for a
    // fresh copy call.
    assert_eq!(text.copy_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn template_fault_fails_the_run_immediately() {
    let h = harness(
        config(),
        MockText::new(),
        MockInspector::pass_all(),
        MockImageBackend::new(MockImageMode::TemplateFault),
    );

    let outcome = h.controller.execute(raw_brief(), Some(2)).await.unwrap();

    assert_eq!(outcome.status, RunStatus::Failed);
    assert!(outcome
        .error
        .as_deref()
        .unwrap()
        .contains("No value supplied for template tokens"));
    // No silent drops: both variants are recorded in their terminal
    // state, with a single completion write.
    let run = h.store.run(outcome.run_id).unwrap();
    assert_eq!(run.variants.len(), 2);
    assert!(run.variants.iter().all(|v| v.state == VariantState::Failed));
    assert_eq!(run.completion_writes, 1);
    // Template faults burn no retries.
    for variant in &run.variants {
        assert_eq!(variant.attempts, 1);
    }
}

#[tokio::test]
async fn invalid_brief_creates_no_run() {
    let h = harness(
        config(),
        MockText::new(),
        MockInspector::pass_all(),
        MockImageBackend::new(MockImageMode::Url),
    );

    let mut raw = raw_brief();
    raw.offer = "".into();
    let result = h.controller.execute(raw, Some(1)).await;

    assert_matches!(result, Err(EngineError::Validation(_)));
    assert_eq!(h.store.run_count(), 0);
}

#[tokio::test]
async fn byte_payloads_are_stored_and_referenced() {
    let h = harness(
        config(),
        MockText::new(),
        MockInspector::pass_all(),
        MockImageBackend::new(MockImageMode::Bytes),
    );

    let outcome = h.controller.execute(raw_brief(), Some(1)).await.unwrap();

    assert_eq!(outcome.status, RunStatus::Succeeded);
    let variant = &outcome.variants[0];
    let reference = variant.image_ref.as_deref().unwrap();
    assert!(reference.starts_with("mem://runs/"));
    assert_eq!(h.image_store.len(), 1);
}

#[tokio::test]
async fn qc_transport_failure_retries_without_new_copy() {
    let text = MockText::new();
    let inspector = MockInspector::pass_all().with_transport_failures(1);
    let backend = MockImageBackend::new(MockImageMode::Url);
    let image_calls = backend.call_counter();
    let h = harness(config(), text.clone(), inspector.clone(), backend);

    let outcome = h.controller.execute(raw_brief(), Some(1)).await.unwrap();

    assert_eq!(outcome.status, RunStatus::Succeeded);
    let variant = &outcome.variants[0];
    assert_eq!(variant.attempts, 2);
    // Copy survives a QC-stage failure; the image stage reruns.
    assert_eq!(text.copy_calls.load(Ordering::SeqCst), 1);
    assert_eq!(image_calls.load(Ordering::SeqCst), 2);
}
