//! Prompt construction for each unit kind.
//!
//! Pure string builders: the caller's name, description, and optional
//! style hint are folded into a fixed template per unit. Keeping these
//! here (rather than in the pipeline) makes the exact provider input
//! testable without any I/O.

use crate::params::JobParams;

fn style_suffix(params: &JobParams) -> String {
    match &params.style {
        Some(style) if !style.trim().is_empty() => format!(" Visual style: {}.", style.trim()),
        _ => String::new(),
    }
}

/// Prompt for the concept text unit.
pub fn concept_prompt(params: &JobParams) -> String {
    format!(
        "Write a short marketing concept for an app called \"{}\". {}",
        params.name.trim(),
        params.description.trim()
    )
}

/// Prompt for the app icon unit.
pub fn icon_prompt(params: &JobParams) -> String {
    format!(
        "App icon for \"{}\". {}{}",
        params.name.trim(),
        params.description.trim(),
        style_suffix(params)
    )
}

/// Prompt for screenshot `index` (1-based) of `total`.
pub fn screen_prompt(params: &JobParams, index: u32, total: u32) -> String {
    format!(
        "App screenshot {index} of {total} for \"{}\". {}{}",
        params.name.trim(),
        params.description.trim(),
        style_suffix(params)
    )
}

/// Prompt for cover-image variant `index` (1-based).
///
/// The variant index is part of the prompt so the provider produces
/// distinct compositions rather than four near-identical renders.
pub fn cover_variant_prompt(params: &JobParams, index: u32) -> String {
    format!(
        "Cover image, composition variant {index}, for \"{}\". {}{}",
        params.name.trim(),
        params.description.trim(),
        style_suffix(params)
    )
}

/// Prompt for the cover video unit.
pub fn cover_video_prompt(params: &JobParams) -> String {
    format!(
        "Short animated cover video for \"{}\". {}{}",
        params.name.trim(),
        params.description.trim(),
        style_suffix(params)
    )
}
