//! Job orchestration.
//!
//! [`JobOrchestrator::submit`] validates the request, creates the
//! `pending` record, and spawns a driver task. The driver is the only
//! writer for its job: it sequences stages, folds unit outcomes into
//! store patches, and terminalizes the record exactly once. Readers
//! therefore never observe a status regression or a progress drop.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::time::{interval, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use vitrine_core::params::{self, JobParams};
use vitrine_core::progress::{
    countable_progress, has_stalled, time_based_progress, ProgressPlan, StageKind, StageWindow,
};
use vitrine_core::prompt;
use vitrine_core::status::JobStatus;
use vitrine_core::types::{JobId, JobKind, OwnerId, UnitKind};
use vitrine_events::{EventBus, JobEvent};
use vitrine_provider::{GenerationProvider, GenerationRequest};
use vitrine_store::{
    AssetAttachment, AssetRef, AssetStore, FailedUnit, JobPatch, JobRecord, JobStore, OwnerIndex,
    StoreError,
};

use crate::config::PipelineConfig;
use crate::error::{CancelError, SubmitError, UnitError};
use crate::stage::StageController;
use crate::unit::UnitSpec;

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Owns job submission, cancellation, and the per-job driver tasks.
pub struct JobOrchestrator {
    driver: Arc<Driver>,
}

impl JobOrchestrator {
    pub fn new(
        store: Arc<dyn JobStore>,
        assets: Arc<dyn AssetStore>,
        provider: Arc<dyn GenerationProvider>,
        owners: Arc<dyn OwnerIndex>,
        events: Arc<EventBus>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            driver: Arc::new(Driver {
                store,
                assets,
                provider,
                owners,
                events,
                config,
                active: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Validate and accept a new job, returning its initial `pending`
    /// snapshot. Generation proceeds in a background task.
    pub async fn submit(
        &self,
        owner_id: OwnerId,
        kind: JobKind,
        job_params: JobParams,
    ) -> Result<JobRecord, SubmitError> {
        params::validate_params(kind, &job_params)?;
        if !self.driver.owners.exists(owner_id).await {
            return Err(SubmitError::OwnerNotFound(owner_id));
        }

        // v7 ids sort by creation time.
        let record = JobRecord::new(JobId::now_v7(), owner_id, kind);
        self.driver.store.create(record.clone()).await?;
        info!(job_id = %record.id, kind = %kind, owner_id = %owner_id, "Job submitted");
        self.driver.events.publish(
            JobEvent::new("job.submitted", record.id, kind)
                .with_owner(owner_id)
                .with_payload(serde_json::json!({ "name": job_params.name })),
        );

        let cancel = CancellationToken::new();
        self.driver
            .active
            .lock()
            .expect("orchestrator state poisoned")
            .insert(record.id, cancel.clone());

        let driver = Arc::clone(&self.driver);
        let driver_record = record.clone();
        tokio::spawn(async move {
            driver.drive(driver_record, job_params, cancel).await;
        });

        Ok(record)
    }

    /// Request cancellation of a running job.
    ///
    /// Idempotent: cancelling a terminal or already-cancelled job is a
    /// no-op. Unknown jobs are an error.
    pub async fn cancel(&self, id: JobId) -> Result<(), CancelError> {
        let record = self
            .driver
            .store
            .get(id)
            .await?
            .ok_or(CancelError::NotFound(id))?;
        if record.status.is_terminal() {
            return Ok(());
        }
        if let Some(token) = self
            .driver
            .active
            .lock()
            .expect("orchestrator state poisoned")
            .get(&id)
        {
            token.cancel();
        }
        info!(job_id = %id, "Job cancellation requested");
        self.driver
            .events
            .publish(JobEvent::new("job.cancelled", id, record.kind).with_owner(record.owner_id));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

/// Shared context for per-job driver tasks.
struct Driver {
    store: Arc<dyn JobStore>,
    assets: Arc<dyn AssetStore>,
    provider: Arc<dyn GenerationProvider>,
    owners: Arc<dyn OwnerIndex>,
    events: Arc<EventBus>,
    config: PipelineConfig,
    active: Mutex<HashMap<JobId, CancellationToken>>,
}

impl Driver {
    async fn drive(
        self: Arc<Self>,
        record: JobRecord,
        job_params: JobParams,
        cancel: CancellationToken,
    ) {
        let id = record.id;
        let kind = record.kind;
        let owner_id = record.owner_id;

        let outcome = self.run(id, kind, &job_params, &cancel).await;
        self.active
            .lock()
            .expect("orchestrator state poisoned")
            .remove(&id);

        match outcome {
            Ok(final_record) => {
                let event_type = match final_record.status {
                    JobStatus::Completed => "job.completed",
                    JobStatus::Partial => "job.partial",
                    _ => "job.failed",
                };
                info!(
                    job_id = %id,
                    status = %final_record.status,
                    progress = final_record.progress_percentage,
                    failed_units = final_record.failed_units.len(),
                    "Job finished"
                );
                let mut event = JobEvent::new(event_type, id, kind).with_owner(owner_id);
                if let Some(message) = &final_record.error {
                    event = event.with_payload(serde_json::json!({ "error": message }));
                }
                self.events.publish(event);
            }
            Err(e) => {
                error!(job_id = %id, error = %e, "Job driver aborted");
                // Leave a terminal marker if the record still accepts one.
                let patch = JobPatch::new()
                    .status(JobStatus::Failed)
                    .current_step("Failed")
                    .error("internal error");
                if self.store.patch(id, patch).await.is_ok() {
                    self.events
                        .publish(JobEvent::new("job.failed", id, kind).with_owner(owner_id));
                }
            }
        }
    }

    async fn run(
        &self,
        id: JobId,
        kind: JobKind,
        job_params: &JobParams,
        cancel: &CancellationToken,
    ) -> Result<JobRecord, StoreError> {
        match kind {
            JobKind::FullAppGeneration => self.run_full_app(id, job_params, cancel).await,
            JobKind::Concept => {
                self.run_single(
                    id,
                    kind,
                    UnitKind::ConceptText,
                    "concept",
                    prompt::concept_prompt(job_params),
                    "Generating concept",
                    cancel,
                )
                .await
            }
            JobKind::Icon => {
                self.run_single(
                    id,
                    kind,
                    UnitKind::IconImage,
                    "icon",
                    prompt::icon_prompt(job_params),
                    "Generating icon",
                    cancel,
                )
                .await
            }
            JobKind::CoverVideo => {
                self.run_single(
                    id,
                    kind,
                    UnitKind::CoverVideo,
                    "cover_video",
                    prompt::cover_video_prompt(job_params),
                    "Generating cover video",
                    cancel,
                )
                .await
            }
            JobKind::Screens => self.run_screens(id, kind, job_params, cancel).await,
            JobKind::CoverImage => self.run_cover_image(id, kind, job_params, cancel).await,
        }
    }

    // -----------------------------------------------------------------------
    // Job shapes
    // -----------------------------------------------------------------------

    async fn run_full_app(
        &self,
        id: JobId,
        job_params: &JobParams,
        cancel: &CancellationToken,
    ) -> Result<JobRecord, StoreError> {
        let kind = JobKind::FullAppGeneration;
        let plan = ProgressPlan::full_app();

        // Stage 1: concept text.
        self.apply_patch(
            id,
            JobPatch::new()
                .status(JobStatus::initial_generating(kind))
                .current_step("Generating concept"),
        )
        .await?;
        self.publish_stage(id, kind, "concept");
        let window = plan
            .window(StageKind::Concept)
            .expect("full-app plan has a concept window");
        let spec = UnitSpec {
            slot: 0,
            name: "concept".to_string(),
            kind: UnitKind::ConceptText,
            request: GenerationRequest::new(
                UnitKind::ConceptText,
                prompt::concept_prompt(job_params),
            ),
        };
        match self.run_timed_unit(id, spec, window, cancel).await? {
            Ok(asset) => {
                self.apply_patch(
                    id,
                    JobPatch::new()
                        .attach(AssetAttachment::Concept(asset))
                        .progress(window.end),
                )
                .await?;
            }
            Err(failure) => return self.fail_timed(id, failure).await,
        }

        // Stage 2: app icon.
        self.apply_patch(
            id,
            JobPatch::new()
                .status(JobStatus::GeneratingIcon)
                .current_step("Generating icon"),
        )
        .await?;
        self.publish_stage(id, kind, "icon");
        let window = plan
            .window(StageKind::Icon)
            .expect("full-app plan has an icon window");
        let spec = UnitSpec {
            slot: 0,
            name: "icon".to_string(),
            kind: UnitKind::IconImage,
            request: GenerationRequest::new(UnitKind::IconImage, prompt::icon_prompt(job_params)),
        };
        let icon_url = match self.run_timed_unit(id, spec, window, cancel).await? {
            Ok(asset) => {
                let url = self.assets.get_url(&asset).await;
                self.apply_patch(
                    id,
                    JobPatch::new()
                        .attach(AssetAttachment::Icon(asset))
                        .progress(window.end),
                )
                .await?;
                url
            }
            Err(failure) => return self.fail_timed(id, failure).await,
        };

        // Stage 3: screenshot fan-out.
        let total = params::final_stage_units(kind, job_params);
        self.apply_patch(
            id,
            JobPatch::new()
                .status(JobStatus::GeneratingScreens)
                .current_step("Generating screenshots")
                .screens_total(total),
        )
        .await?;
        self.publish_stage(id, kind, "screens");
        let window = plan
            .window(StageKind::Screens)
            .expect("full-app plan has a screens window");
        // Screens condition on the icon so the set shares one style.
        let reference_urls: Vec<String> = icon_url.into_iter().collect();
        let specs = screen_specs(job_params, total, &reference_urls);
        let summary = self
            .run_fanout(id, specs, window, self.config.screen_concurrency, cancel)
            .await?;
        self.finish_fanout(id, summary, cancel.is_cancelled()).await
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_single(
        &self,
        id: JobId,
        kind: JobKind,
        unit_kind: UnitKind,
        unit_name: &str,
        unit_prompt: String,
        step: &str,
        cancel: &CancellationToken,
    ) -> Result<JobRecord, StoreError> {
        self.apply_patch(
            id,
            JobPatch::new()
                .status(JobStatus::initial_generating(kind))
                .current_step(step),
        )
        .await?;
        self.publish_stage(id, kind, unit_name);

        let window = single_stage_window();
        let spec = UnitSpec {
            slot: 0,
            name: unit_name.to_string(),
            kind: unit_kind,
            request: GenerationRequest::new(unit_kind, unit_prompt),
        };
        match self.run_timed_unit(id, spec, window, cancel).await? {
            Ok(asset) => {
                self.apply_patch(
                    id,
                    JobPatch::new()
                        .attach(attachment_for(unit_kind, 0, asset))
                        .status(JobStatus::Completed)
                        .current_step("Completed")
                        .progress(100),
                )
                .await
            }
            Err(failure) => self.fail_timed(id, failure).await,
        }
    }

    async fn run_screens(
        &self,
        id: JobId,
        kind: JobKind,
        job_params: &JobParams,
        cancel: &CancellationToken,
    ) -> Result<JobRecord, StoreError> {
        let total = params::final_stage_units(kind, job_params);
        self.apply_patch(
            id,
            JobPatch::new()
                .status(JobStatus::initial_generating(kind))
                .current_step("Generating screenshots")
                .screens_total(total),
        )
        .await?;
        self.publish_stage(id, kind, "screens");

        let specs = screen_specs(job_params, total, &[]);
        let summary = self
            .run_fanout(
                id,
                specs,
                single_stage_window(),
                self.config.screen_concurrency,
                cancel,
            )
            .await?;
        self.finish_fanout(id, summary, cancel.is_cancelled()).await
    }

    async fn run_cover_image(
        &self,
        id: JobId,
        kind: JobKind,
        job_params: &JobParams,
        cancel: &CancellationToken,
    ) -> Result<JobRecord, StoreError> {
        // Variants are a countable fan-out like screens, so the same
        // counters carry the partial accounting.
        let total = params::final_stage_units(kind, job_params);
        self.apply_patch(
            id,
            JobPatch::new()
                .status(JobStatus::initial_generating(kind))
                .current_step("Generating cover variants")
                .screens_total(total),
        )
        .await?;
        self.publish_stage(id, kind, "cover_variants");

        let specs = variant_specs(job_params);
        let summary = self
            .run_fanout(
                id,
                specs,
                single_stage_window(),
                self.config.variant_concurrency,
                cancel,
            )
            .await?;
        self.finish_fanout(id, summary, cancel.is_cancelled()).await
    }

    // -----------------------------------------------------------------------
    // Stage execution
    // -----------------------------------------------------------------------

    fn stage_controller(&self) -> StageController {
        StageController::new(
            Arc::clone(&self.provider),
            Arc::clone(&self.assets),
            self.config.retry.clone(),
            self.config.attempt_timeout,
        )
    }

    /// Run one time-based unit, ticking the progress curve until it
    /// resolves. Trips the stall circuit breaker when the unit exceeds
    /// three times its target duration.
    async fn run_timed_unit(
        &self,
        id: JobId,
        spec: UnitSpec,
        window: StageWindow,
        cancel: &CancellationToken,
    ) -> Result<Result<AssetRef, TimedFailure>, StoreError> {
        let unit_name = spec.name.clone();
        let target = self.config.target_for(spec.kind);
        let stage_cancel = cancel.child_token();
        let mut rx = self
            .stage_controller()
            .launch(vec![spec], 1, stage_cancel.clone());

        let started = Instant::now();
        let mut ticker = interval(self.config.progress_tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick fires immediately; consume it.
        ticker.tick().await;
        let mut stalled = false;

        loop {
            tokio::select! {
                outcome = rx.recv() => {
                    let Some(outcome) = outcome else {
                        return Ok(Err(TimedFailure::cancelled(unit_name)));
                    };
                    return Ok(match outcome.result {
                        Ok(asset) => Ok(asset),
                        Err(UnitError::Cancelled) if stalled => Err(TimedFailure {
                            unit_name: outcome.name,
                            message: format!(
                                "no result after {}s (target {}s)",
                                started.elapsed().as_secs(),
                                target.as_secs()
                            ),
                            cancelled: false,
                        }),
                        Err(UnitError::Cancelled) => Err(TimedFailure::cancelled(outcome.name)),
                        Err(error) => Err(TimedFailure {
                            unit_name: outcome.name,
                            message: error.to_string(),
                            cancelled: false,
                        }),
                    });
                }
                _ = ticker.tick() => {
                    let elapsed = started.elapsed();
                    if !stalled && has_stalled(elapsed, target) {
                        warn!(
                            job_id = %id,
                            unit = %unit_name,
                            elapsed_secs = elapsed.as_secs(),
                            "Unit stalled; aborting stage"
                        );
                        stalled = true;
                        stage_cancel.cancel();
                        continue;
                    }
                    let progress = time_based_progress(window, elapsed, target);
                    self.store.patch(id, JobPatch::new().progress(progress)).await?;
                }
            }
        }
    }

    /// Fold the outcomes of a fan-out stage into store patches.
    ///
    /// Countable progress counts *resolved* units (succeeded or
    /// failed); the final resolution is left to the terminal patch so
    /// a failed job never reads 100.
    async fn run_fanout(
        &self,
        id: JobId,
        specs: Vec<UnitSpec>,
        window: StageWindow,
        concurrency: usize,
        cancel: &CancellationToken,
    ) -> Result<FanoutSummary, StoreError> {
        let total = specs.len() as u32;
        let stage_cancel = cancel.child_token();
        let mut rx = self.stage_controller().launch(specs, concurrency, stage_cancel);

        let mut resolved = 0u32;
        let mut succeeded = 0u32;
        while let Some(outcome) = rx.recv().await {
            resolved += 1;
            let mut patch = JobPatch::new();
            match outcome.result {
                Ok(asset) => {
                    succeeded += 1;
                    info!(
                        job_id = %id,
                        unit = %outcome.name,
                        attempts = outcome.attempts,
                        "Unit succeeded"
                    );
                    patch = patch
                        .attach(attachment_for(outcome.kind, outcome.slot, asset))
                        .screens_generated(succeeded);
                }
                Err(error) => {
                    warn!(
                        job_id = %id,
                        unit = %outcome.name,
                        attempts = outcome.attempts,
                        error = %error,
                        "Unit failed"
                    );
                    patch = patch.failed_unit(FailedUnit {
                        unit_name: outcome.name,
                        error_message: error.to_string(),
                    });
                }
            }
            if resolved < total {
                patch = patch.progress(countable_progress(window, resolved, total));
            }
            self.apply_patch(id, patch).await?;
            if resolved == total {
                break;
            }
        }

        Ok(FanoutSummary { total, succeeded })
    }

    async fn finish_fanout(
        &self,
        id: JobId,
        summary: FanoutSummary,
        cancelled: bool,
    ) -> Result<JobRecord, StoreError> {
        let patch = if cancelled {
            JobPatch::new()
                .status(JobStatus::Failed)
                .current_step("Cancelled")
                .error("cancelled")
        } else if summary.succeeded == summary.total {
            JobPatch::new()
                .status(JobStatus::Completed)
                .current_step("Completed")
                .progress(100)
        } else if summary.succeeded > 0 {
            let failed = summary.total - summary.succeeded;
            JobPatch::new()
                .status(JobStatus::Partial)
                .current_step("Completed with failures")
                .progress(100)
                .error(format!("{failed} of {} units failed", summary.total))
        } else {
            JobPatch::new()
                .status(JobStatus::Failed)
                .current_step("Failed")
                .error("all units failed")
        };
        self.apply_patch(id, patch).await
    }

    async fn fail_timed(&self, id: JobId, failure: TimedFailure) -> Result<JobRecord, StoreError> {
        let step = if failure.cancelled { "Cancelled" } else { "Failed" };
        self.apply_patch(
            id,
            JobPatch::new()
                .failed_unit(FailedUnit {
                    unit_name: failure.unit_name,
                    error_message: failure.message.clone(),
                })
                .status(JobStatus::Failed)
                .current_step(step)
                .error(failure.message),
        )
        .await
    }

    /// Apply a patch and dispose of any asset it displaced.
    async fn apply_patch(&self, id: JobId, patch: JobPatch) -> Result<JobRecord, StoreError> {
        let outcome = self.store.patch(id, patch).await?;
        if let Some(old) = outcome.replaced_asset {
            if let Err(e) = self.assets.delete(&old).await {
                warn!(job_id = %id, asset = %old, error = %e, "Failed to delete replaced asset");
            }
        }
        Ok(outcome.record)
    }

    fn publish_stage(&self, id: JobId, kind: JobKind, stage: &str) {
        self.events.publish(
            JobEvent::new("job.stage_started", id, kind)
                .with_payload(serde_json::json!({ "stage": stage })),
        );
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct FanoutSummary {
    total: u32,
    succeeded: u32,
}

struct TimedFailure {
    unit_name: String,
    message: String,
    cancelled: bool,
}

impl TimedFailure {
    fn cancelled(unit_name: String) -> Self {
        Self {
            unit_name,
            message: "cancelled".to_string(),
            cancelled: true,
        }
    }
}

fn single_stage_window() -> StageWindow {
    ProgressPlan::single_stage()
        .window(StageKind::Single)
        .expect("single-stage plan has one window")
}

fn attachment_for(kind: UnitKind, slot: usize, asset: AssetRef) -> AssetAttachment {
    match kind {
        UnitKind::ConceptText => AssetAttachment::Concept(asset),
        UnitKind::IconImage => AssetAttachment::Icon(asset),
        UnitKind::ScreenImage => AssetAttachment::Screen { slot, asset },
        UnitKind::CoverImage => AssetAttachment::CoverVariant { slot, asset },
        UnitKind::CoverVideo => AssetAttachment::CoverVideo(asset),
    }
}

fn screen_specs(job_params: &JobParams, total: u32, reference_urls: &[String]) -> Vec<UnitSpec> {
    (0..total)
        .map(|i| UnitSpec {
            slot: i as usize,
            name: format!("screen_{}", i + 1),
            kind: UnitKind::ScreenImage,
            request: GenerationRequest::new(
                UnitKind::ScreenImage,
                prompt::screen_prompt(job_params, i + 1, total),
            )
            .with_references(reference_urls.to_vec()),
        })
        .collect()
}

fn variant_specs(job_params: &JobParams) -> Vec<UnitSpec> {
    (0..params::COVER_VARIANT_COUNT)
        .map(|i| UnitSpec {
            slot: i as usize,
            name: format!("variant_{}", i + 1),
            kind: UnitKind::CoverImage,
            request: GenerationRequest::new(
                UnitKind::CoverImage,
                prompt::cover_variant_prompt(job_params, i + 1),
            ),
        })
        .collect()
}
