//! Submission parameters and their per-kind validation.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::JobKind;

// ---------------------------------------------------------------------------
// Limits and defaults
// ---------------------------------------------------------------------------

/// Maximum length of the app/product name.
pub const MAX_NAME_LEN: usize = 120;
/// Maximum length of the free-text description used to build prompts.
pub const MAX_DESCRIPTION_LEN: usize = 2000;
/// Maximum length of the optional style hint.
pub const MAX_STYLE_LEN: usize = 200;
/// Hard ceiling on screenshot units per job.
pub const MAX_SCREENS: u32 = 12;
/// Screenshot count used when the caller does not specify one.
pub const DEFAULT_SCREENS: u32 = 5;
/// Number of cover-image variants generated per cover-image job.
pub const COVER_VARIANT_COUNT: u32 = 4;

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

/// Caller-supplied inputs for a generation job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobParams {
    /// Display name of the app/product the content is for.
    pub name: String,
    /// Free-text description driving the generation prompts.
    pub description: String,
    /// Optional visual style hint shared by all image units.
    #[serde(default)]
    pub style: Option<String>,
    /// Requested screenshot count; only meaningful for `screens` and
    /// `full_app_generation` jobs.
    #[serde(default)]
    pub screens_total: Option<u32>,
}

/// Validate parameters for a job of the given kind.
pub fn validate_params(kind: JobKind, params: &JobParams) -> Result<(), CoreError> {
    if params.name.trim().is_empty() {
        return Err(CoreError::Validation("name must not be empty".to_string()));
    }
    if params.name.len() > MAX_NAME_LEN {
        return Err(CoreError::Validation(format!(
            "name must not exceed {MAX_NAME_LEN} characters"
        )));
    }
    if params.description.trim().is_empty() {
        return Err(CoreError::Validation(
            "description must not be empty".to_string(),
        ));
    }
    if params.description.len() > MAX_DESCRIPTION_LEN {
        return Err(CoreError::Validation(format!(
            "description must not exceed {MAX_DESCRIPTION_LEN} characters"
        )));
    }
    if let Some(style) = &params.style {
        if style.len() > MAX_STYLE_LEN {
            return Err(CoreError::Validation(format!(
                "style must not exceed {MAX_STYLE_LEN} characters"
            )));
        }
    }
    match params.screens_total {
        Some(n) if !matches!(kind, JobKind::Screens | JobKind::FullAppGeneration) => {
            Err(CoreError::Validation(format!(
                "screens_total is not valid for {kind} jobs (got {n})"
            )))
        }
        Some(0) => Err(CoreError::Validation(
            "screens_total must be at least 1".to_string(),
        )),
        Some(n) if n > MAX_SCREENS => Err(CoreError::Validation(format!(
            "screens_total must not exceed {MAX_SCREENS}"
        ))),
        _ => Ok(()),
    }
}

/// Number of units the final fan-out stage of `kind` will launch.
///
/// Zero for kinds whose only stage is a single time-based unit.
pub fn final_stage_units(kind: JobKind, params: &JobParams) -> u32 {
    match kind {
        JobKind::Screens | JobKind::FullAppGeneration => {
            params.screens_total.unwrap_or(DEFAULT_SCREENS)
        }
        JobKind::CoverImage => COVER_VARIANT_COUNT,
        JobKind::Concept | JobKind::Icon | JobKind::CoverVideo => 0,
    }
}
