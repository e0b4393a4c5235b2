//! End-to-end orchestrator scenarios against in-memory stores and a
//! scripted provider.

mod common;

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;

use common::{
    fast_config, harness, harness_full, harness_with_config, params, wait_terminal, FailRule,
    ScriptedProvider,
};
use vitrine_core::status::JobStatus;
use vitrine_core::types::{JobKind, OwnerId};
use vitrine_pipeline::{CancelError, SubmitError};
use vitrine_provider::ProviderError;
use vitrine_store::{JobAssets, JobStore, StaticOwnerIndex};

// ---------------------------------------------------------------------------
// Happy paths
// ---------------------------------------------------------------------------

#[tokio::test]
async fn full_app_generates_concept_icon_and_screens() {
    let h = harness(ScriptedProvider::ok());
    let mut p = params();
    p.screens_total = Some(3);

    let record = h
        .orchestrator
        .submit(OwnerId::new_v4(), JobKind::FullAppGeneration, p)
        .await
        .unwrap();
    assert_eq!(record.status, JobStatus::Pending);

    let done = wait_terminal(&h.store, record.id).await;
    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(done.progress_percentage, 100);
    assert_eq!(done.screens_total, 3);
    assert_eq!(done.screens_generated, 3);
    assert!(done.failed_units.is_empty());

    let JobAssets::FullApp { concept, icon, screens } = &done.assets else {
        panic!("wrong asset payload: {:?}", done.assets);
    };
    assert!(concept.is_some());
    assert!(icon.is_some());
    assert_eq!(screens.len(), 3);
    assert!(screens.iter().all(Option::is_some));

    // concept + icon + 3 screens
    assert_eq!(h.assets.len(), 5);
}

#[tokio::test]
async fn concept_job_completes_with_single_asset() {
    let h = harness(ScriptedProvider::ok());
    let record = h
        .orchestrator
        .submit(OwnerId::new_v4(), JobKind::Concept, params())
        .await
        .unwrap();

    let done = wait_terminal(&h.store, record.id).await;
    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(done.progress_percentage, 100);
    assert_eq!(done.screens_total, 0);
    assert_matches!(&done.assets, JobAssets::Concept { concept: Some(_) });
}

#[tokio::test]
async fn cover_image_generates_four_variants() {
    let h = harness(ScriptedProvider::ok());
    let record = h
        .orchestrator
        .submit(OwnerId::new_v4(), JobKind::CoverImage, params())
        .await
        .unwrap();

    let done = wait_terminal(&h.store, record.id).await;
    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(done.screens_total, 4);
    assert_eq!(done.screens_generated, 4);

    let JobAssets::CoverImage { variants } = &done.assets else {
        panic!("wrong asset payload: {:?}", done.assets);
    };
    assert_eq!(variants.len(), 4);
    assert!(variants.iter().all(Option::is_some));
}

#[tokio::test]
async fn cover_image_with_one_dead_variant_ends_partial() {
    let provider = ScriptedProvider::with_rules(vec![FailRule {
        needle: "composition variant 3",
        times: None,
        error: ProviderError::Unknown("render crashed".to_string()),
    }]);
    let h = harness(provider);
    let record = h
        .orchestrator
        .submit(OwnerId::new_v4(), JobKind::CoverImage, params())
        .await
        .unwrap();

    let done = wait_terminal(&h.store, record.id).await;
    assert_eq!(done.status, JobStatus::Partial);
    assert_eq!(done.progress_percentage, 100);
    assert_eq!(done.screens_total, 4);
    assert_eq!(done.screens_generated, 3);
    assert_eq!(done.failed_units.len(), 1);
    assert_eq!(done.failed_units[0].unit_name, "variant_3");
    assert_eq!(
        done.screens_generated + done.failed_units.len() as u32,
        done.screens_total
    );
    assert_eq!(done.error.as_deref(), Some("1 of 4 units failed"));

    let JobAssets::CoverImage { variants } = &done.assets else {
        panic!("wrong asset payload");
    };
    assert!(variants[2].is_none());
    assert!(variants[0].is_some() && variants[1].is_some() && variants[3].is_some());
}

#[tokio::test]
async fn screens_reference_the_generated_icon() {
    let h = harness(ScriptedProvider::ok());
    let mut p = params();
    p.screens_total = Some(2);
    let record = h
        .orchestrator
        .submit(OwnerId::new_v4(), JobKind::FullAppGeneration, p)
        .await
        .unwrap();
    wait_terminal(&h.store, record.id).await;

    // The icon itself is generated without references.
    let icon_requests = h.provider.requests_matching("App icon");
    assert_eq!(icon_requests.len(), 1);
    assert!(icon_requests[0].reference_urls.is_empty());

    // Every screen request carries the icon's URL as a style reference.
    let screen_requests = h.provider.requests_matching("App screenshot");
    assert_eq!(screen_requests.len(), 2);
    for request in &screen_requests {
        assert_eq!(request.reference_urls.len(), 1);
        assert!(request.reference_urls[0].starts_with("memory://assets/"));
    }
}

#[tokio::test]
async fn progress_is_monotonic_throughout() {
    let h = harness(ScriptedProvider::ok());
    let mut p = params();
    p.screens_total = Some(5);
    let record = h
        .orchestrator
        .submit(OwnerId::new_v4(), JobKind::FullAppGeneration, p)
        .await
        .unwrap();

    let mut rx = h.store.subscribe(record.id).await.unwrap();
    let mut last = 0u8;
    loop {
        let snapshot = rx.borrow_and_update().clone();
        assert!(
            snapshot.progress_percentage >= last,
            "progress regressed: {} -> {}",
            last,
            snapshot.progress_percentage
        );
        last = snapshot.progress_percentage;
        if snapshot.status.is_terminal() {
            break;
        }
        rx.changed().await.unwrap();
    }
    assert_eq!(last, 100);
}

// ---------------------------------------------------------------------------
// Partial and failed outcomes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn screens_job_with_one_dead_unit_ends_partial() {
    let provider = ScriptedProvider::with_rules(vec![FailRule {
        needle: "screenshot 2 of 4",
        times: None,
        error: ProviderError::Unknown("render crashed".to_string()),
    }]);
    let h = harness(provider);
    let mut p = params();
    p.screens_total = Some(4);

    let record = h
        .orchestrator
        .submit(OwnerId::new_v4(), JobKind::Screens, p)
        .await
        .unwrap();
    let done = wait_terminal(&h.store, record.id).await;

    assert_eq!(done.status, JobStatus::Partial);
    assert_eq!(done.progress_percentage, 100);
    assert_eq!(done.screens_generated, 3);
    assert_eq!(done.failed_units.len(), 1);
    assert_eq!(done.failed_units[0].unit_name, "screen_2");
    assert!(done.failed_units[0].error_message.contains("render crashed"));
    assert_eq!(done.error.as_deref(), Some("1 of 4 units failed"));

    let JobAssets::Screens { screens } = &done.assets else {
        panic!("wrong asset payload");
    };
    assert!(screens[1].is_none());
    assert!(screens[0].is_some() && screens[2].is_some() && screens[3].is_some());
}

#[tokio::test]
async fn screens_job_with_all_units_dead_fails_with_frozen_progress() {
    let provider = ScriptedProvider::with_rules(vec![FailRule {
        needle: "App screenshot",
        times: None,
        error: ProviderError::Rejected("overloaded".to_string()),
    }]);
    let h = harness(provider);
    let mut p = params();
    p.screens_total = Some(4);

    let record = h
        .orchestrator
        .submit(OwnerId::new_v4(), JobKind::Screens, p)
        .await
        .unwrap();
    let done = wait_terminal(&h.store, record.id).await;

    assert_eq!(done.status, JobStatus::Failed);
    assert!(done.progress_percentage < 100, "failed job must not read 100");
    assert_eq!(done.screens_generated, 0);
    assert_eq!(done.failed_units.len(), 4);
    assert_eq!(done.error.as_deref(), Some("all units failed"));
}

#[tokio::test]
async fn full_app_icon_failure_is_fatal() {
    let provider = ScriptedProvider::with_rules(vec![FailRule {
        needle: "App icon",
        times: None,
        error: ProviderError::Unknown("boom".to_string()),
    }]);
    let h = harness(provider);
    let record = h
        .orchestrator
        .submit(OwnerId::new_v4(), JobKind::FullAppGeneration, params())
        .await
        .unwrap();

    let done = wait_terminal(&h.store, record.id).await;
    assert_eq!(done.status, JobStatus::Failed);
    assert_eq!(done.failed_units.len(), 1);
    assert_eq!(done.failed_units[0].unit_name, "icon");
    // Concept finished before the icon stage killed the job.
    let JobAssets::FullApp { concept, icon, screens } = &done.assets else {
        panic!("wrong asset payload");
    };
    assert!(concept.is_some());
    assert!(icon.is_none());
    assert!(screens.is_empty());
}

// ---------------------------------------------------------------------------
// Retry behaviour
// ---------------------------------------------------------------------------

#[tokio::test]
async fn transient_failure_is_retried_to_success() {
    let provider = ScriptedProvider::with_rules(vec![FailRule {
        needle: "App icon",
        times: Some(1),
        error: ProviderError::Rejected("overloaded".to_string()),
    }]);
    let h = harness(provider);
    let record = h
        .orchestrator
        .submit(OwnerId::new_v4(), JobKind::Icon, params())
        .await
        .unwrap();

    let done = wait_terminal(&h.store, record.id).await;
    assert_eq!(done.status, JobStatus::Completed);
    assert!(done.failed_units.is_empty());
}

#[tokio::test]
async fn retry_budget_is_respected() {
    let h = harness(ScriptedProvider::with_rules(vec![FailRule {
        needle: "App icon",
        times: None,
        error: ProviderError::Rejected("overloaded".to_string()),
    }]));
    let record = h
        .orchestrator
        .submit(OwnerId::new_v4(), JobKind::Icon, params())
        .await
        .unwrap();

    let done = wait_terminal(&h.store, record.id).await;
    assert_eq!(done.status, JobStatus::Failed);
    assert_eq!(done.failed_units.len(), 1);
    // max_retries = 2 allows exactly three provider calls.
    assert_eq!(h.provider.calls_matching("App icon"), 3);
}

#[tokio::test]
async fn invalid_input_is_not_retried() {
    let provider = ScriptedProvider::with_rules(vec![FailRule {
        needle: "App icon",
        times: None,
        error: ProviderError::InvalidInput("empty prompt".to_string()),
    }]);
    let h = harness(provider);
    let record = h
        .orchestrator
        .submit(OwnerId::new_v4(), JobKind::Icon, params())
        .await
        .unwrap();

    let done = wait_terminal(&h.store, record.id).await;
    assert_eq!(done.status, JobStatus::Failed);
    assert!(done.failed_units[0].error_message.contains("empty prompt"));
    assert_eq!(h.provider.calls_matching("App icon"), 1);
}

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cancel_running_job_fails_it_with_cancelled_units() {
    let h = harness(ScriptedProvider::slow(Duration::from_secs(30)));
    let record = h
        .orchestrator
        .submit(OwnerId::new_v4(), JobKind::CoverVideo, params())
        .await
        .unwrap();

    // Wait until the driver has actually started the stage.
    let mut rx = h.store.subscribe(record.id).await.unwrap();
    while rx.borrow().status == JobStatus::Pending {
        rx.changed().await.unwrap();
    }

    h.orchestrator.cancel(record.id).await.unwrap();
    let done = wait_terminal(&h.store, record.id).await;

    assert_eq!(done.status, JobStatus::Failed);
    assert_eq!(done.error.as_deref(), Some("cancelled"));
    assert_eq!(done.failed_units.len(), 1);
    assert_eq!(done.failed_units[0].unit_name, "cover_video");
    assert_eq!(done.failed_units[0].error_message, "cancelled");
    assert!(done.progress_percentage < 100);

    // Cancelling a terminal job is a no-op, not an error.
    h.orchestrator.cancel(record.id).await.unwrap();
}

#[tokio::test]
async fn cancel_unknown_job_is_an_error() {
    let h = harness(ScriptedProvider::ok());
    let result = h.orchestrator.cancel(vitrine_core::types::JobId::new_v4()).await;
    assert_matches!(result, Err(CancelError::NotFound(_)));
}

// ---------------------------------------------------------------------------
// Stall circuit breaker
// ---------------------------------------------------------------------------

#[tokio::test]
async fn stalled_unit_fails_the_job() {
    let config = vitrine_pipeline::PipelineConfig {
        video_target: Duration::from_millis(50),
        progress_tick: Duration::from_millis(10),
        attempt_timeout: Duration::from_secs(30),
        ..fast_config()
    };
    let h = harness_with_config(ScriptedProvider::slow(Duration::from_secs(30)), config);
    let record = h
        .orchestrator
        .submit(OwnerId::new_v4(), JobKind::CoverVideo, params())
        .await
        .unwrap();

    let done = wait_terminal(&h.store, record.id).await;
    assert_eq!(done.status, JobStatus::Failed);
    assert!(done.failed_units[0].error_message.contains("no result"));
    assert!(done.progress_percentage < 100);
}

// ---------------------------------------------------------------------------
// Submission validation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn invalid_params_are_rejected_before_any_record_exists() {
    let h = harness(ScriptedProvider::ok());
    let mut p = params();
    p.name = String::new();
    let result = h
        .orchestrator
        .submit(OwnerId::new_v4(), JobKind::Icon, p)
        .await;
    assert_matches!(result, Err(SubmitError::Validation(_)));

    let mut p = params();
    p.screens_total = Some(2);
    let result = h
        .orchestrator
        .submit(OwnerId::new_v4(), JobKind::CoverVideo, p)
        .await;
    assert_matches!(result, Err(SubmitError::Validation(_)));

    assert!(h.store.is_empty());
}

#[tokio::test]
async fn unknown_owner_is_rejected() {
    let known = OwnerId::new_v4();
    let h = harness_full(
        ScriptedProvider::ok(),
        fast_config(),
        Arc::new(StaticOwnerIndex::with_owners([known])),
    );

    let result = h
        .orchestrator
        .submit(OwnerId::new_v4(), JobKind::Icon, params())
        .await;
    assert_matches!(result, Err(SubmitError::OwnerNotFound(_)));

    let accepted = h.orchestrator.submit(known, JobKind::Icon, params()).await;
    assert!(accepted.is_ok());
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[tokio::test]
async fn lifecycle_events_are_published() {
    let h = harness(ScriptedProvider::ok());
    let mut rx = h.events.subscribe();

    let record = h
        .orchestrator
        .submit(OwnerId::new_v4(), JobKind::Icon, params())
        .await
        .unwrap();
    wait_terminal(&h.store, record.id).await;

    let mut seen = Vec::new();
    while let Ok(Ok(event)) =
        tokio::time::timeout(Duration::from_millis(200), rx.recv()).await
    {
        seen.push(event.event_type.clone());
        if event.event_type == "job.completed" {
            break;
        }
    }
    assert_eq!(
        seen,
        vec!["job.submitted", "job.stage_started", "job.completed"]
    );
}
