//! Shared identifier and kind types used across all Vitrine crates.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Unique identifier of a generation job.
pub type JobId = uuid::Uuid;

/// Unique identifier of the entity (app, template, set) owning a job.
pub type OwnerId = uuid::Uuid;

/// UTC timestamp type used for all persisted times.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

// ---------------------------------------------------------------------------
// Job kinds
// ---------------------------------------------------------------------------

/// The kind of content a job produces.
///
/// `FullAppGeneration` runs the three-stage pipeline (concept, icon,
/// screens); all other kinds run a single stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Concept,
    Icon,
    Screens,
    CoverImage,
    CoverVideo,
    FullAppGeneration,
}

impl JobKind {
    /// Stable string form, matching the serde representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Concept => "concept",
            Self::Icon => "icon",
            Self::Screens => "screens",
            Self::CoverImage => "cover_image",
            Self::CoverVideo => "cover_video",
            Self::FullAppGeneration => "full_app_generation",
        }
    }

    /// Whether this kind runs the concept -> icon -> screens pipeline.
    pub fn is_multi_stage(self) -> bool {
        matches!(self, Self::FullAppGeneration)
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Unit kinds
// ---------------------------------------------------------------------------

/// Expected wall-clock duration of a text generation call.
pub const TARGET_TEXT_SECS: u64 = 15;
/// Expected wall-clock duration of an image generation call.
pub const TARGET_IMAGE_SECS: u64 = 40;
/// Expected wall-clock duration of a video generation call.
pub const TARGET_VIDEO_SECS: u64 = 90;

/// The kind of one atomic generation call within a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    ConceptText,
    IconImage,
    ScreenImage,
    CoverImage,
    CoverVideo,
}

impl UnitKind {
    /// Target duration used by the time-based progress curve and the
    /// stall circuit breaker. Chosen so the curve reaches ~87% at the
    /// target and ~95% at 1.5x.
    pub fn target_duration(self) -> Duration {
        match self {
            Self::ConceptText => Duration::from_secs(TARGET_TEXT_SECS),
            Self::IconImage | Self::ScreenImage | Self::CoverImage => {
                Duration::from_secs(TARGET_IMAGE_SECS)
            }
            Self::CoverVideo => Duration::from_secs(TARGET_VIDEO_SECS),
        }
    }

    /// MIME type of the asset this unit produces.
    pub fn content_type(self) -> &'static str {
        match self {
            Self::ConceptText => "text/plain",
            Self::IconImage | Self::ScreenImage | Self::CoverImage => "image/png",
            Self::CoverVideo => "video/mp4",
        }
    }

    /// Stable string form, matching the serde representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ConceptText => "concept_text",
            Self::IconImage => "icon_image",
            Self::ScreenImage => "screen_image",
            Self::CoverImage => "cover_image",
            Self::CoverVideo => "cover_video",
        }
    }
}

impl std::fmt::Display for UnitKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
