//! Pipeline tuning knobs.

use std::time::Duration;

use vitrine_core::retry::RetryPolicy;
use vitrine_core::types::{
    UnitKind, TARGET_IMAGE_SECS, TARGET_TEXT_SECS, TARGET_VIDEO_SECS,
};

/// Tunable parameters for stage execution and progress reporting.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Per-unit retry behaviour.
    pub retry: RetryPolicy,
    /// Concurrent screenshot units per job.
    pub screen_concurrency: usize,
    /// Concurrent cover-image variant units per job.
    pub variant_concurrency: usize,
    /// Hard cap on a single provider call.
    pub attempt_timeout: Duration,
    /// Interval between time-based progress updates.
    pub progress_tick: Duration,
    /// Expected duration of a text unit.
    pub text_target: Duration,
    /// Expected duration of an image unit.
    pub image_target: Duration,
    /// Expected duration of a video unit.
    pub video_target: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            screen_concurrency: 2,
            variant_concurrency: 4,
            attempt_timeout: Duration::from_secs(120),
            progress_tick: Duration::from_millis(500),
            text_target: Duration::from_secs(TARGET_TEXT_SECS),
            image_target: Duration::from_secs(TARGET_IMAGE_SECS),
            video_target: Duration::from_secs(TARGET_VIDEO_SECS),
        }
    }
}

impl PipelineConfig {
    /// Target duration for `kind`, honouring the configured overrides.
    pub fn target_for(&self, kind: UnitKind) -> Duration {
        match kind {
            UnitKind::ConceptText => self.text_target,
            UnitKind::IconImage | UnitKind::ScreenImage | UnitKind::CoverImage => {
                self.image_target
            }
            UnitKind::CoverVideo => self.video_target,
        }
    }
}
