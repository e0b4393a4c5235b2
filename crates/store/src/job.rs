//! Job document model: the persisted record, partial patches, and the
//! kind-tagged asset payload.
//!
//! A [`JobRecord`] is a shared envelope (status, step, progress,
//! counters, failures) plus a [`JobAssets`] variant specific to the
//! job kind. Mutation happens exclusively through [`JobPatch`]es
//! applied atomically by a [`JobStore`] implementation.

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use vitrine_core::status::JobStatus;
use vitrine_core::types::{JobId, JobKind, OwnerId, Timestamp};

use crate::asset::AssetRef;
use crate::error::StoreError;

// ---------------------------------------------------------------------------
// Failed units
// ---------------------------------------------------------------------------

/// One unit that exhausted its retries, kept on the record so callers
/// can offer per-unit retry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedUnit {
    pub unit_name: String,
    pub error_message: String,
}

// ---------------------------------------------------------------------------
// Kind-specific asset payload
// ---------------------------------------------------------------------------

/// Generated asset references, shaped per job kind.
///
/// Slot vectors grow as slots are attached; slot identity is assigned
/// at fan-out time and never changes afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobAssets {
    Concept {
        concept: Option<AssetRef>,
    },
    Icon {
        icon: Option<AssetRef>,
    },
    Screens {
        screens: Vec<Option<AssetRef>>,
    },
    CoverImage {
        variants: Vec<Option<AssetRef>>,
    },
    CoverVideo {
        video: Option<AssetRef>,
    },
    FullApp {
        concept: Option<AssetRef>,
        icon: Option<AssetRef>,
        screens: Vec<Option<AssetRef>>,
    },
}

impl JobAssets {
    /// Empty payload for a freshly submitted job of `kind`.
    pub fn for_kind(kind: JobKind) -> Self {
        match kind {
            JobKind::Concept => Self::Concept { concept: None },
            JobKind::Icon => Self::Icon { icon: None },
            JobKind::Screens => Self::Screens { screens: Vec::new() },
            JobKind::CoverImage => Self::CoverImage { variants: Vec::new() },
            JobKind::CoverVideo => Self::CoverVideo { video: None },
            JobKind::FullAppGeneration => Self::FullApp {
                concept: None,
                icon: None,
                screens: Vec::new(),
            },
        }
    }

    /// Attach an asset reference, returning the reference it replaced
    /// (if the target position was already occupied).
    fn attach(&mut self, attachment: AssetAttachment) -> Result<Option<AssetRef>, StoreError> {
        fn set_slot(
            slots: &mut Vec<Option<AssetRef>>,
            slot: usize,
            asset: AssetRef,
        ) -> Option<AssetRef> {
            if slots.len() <= slot {
                slots.resize(slot + 1, None);
            }
            slots[slot].replace(asset)
        }

        match (self, attachment) {
            (Self::Concept { concept }, AssetAttachment::Concept(asset))
            | (Self::FullApp { concept, .. }, AssetAttachment::Concept(asset)) => {
                Ok(concept.replace(asset))
            }
            (Self::Icon { icon }, AssetAttachment::Icon(asset))
            | (Self::FullApp { icon, .. }, AssetAttachment::Icon(asset)) => {
                Ok(icon.replace(asset))
            }
            (Self::Screens { screens }, AssetAttachment::Screen { slot, asset })
            | (Self::FullApp { screens, .. }, AssetAttachment::Screen { slot, asset }) => {
                Ok(set_slot(screens, slot, asset))
            }
            (Self::CoverImage { variants }, AssetAttachment::CoverVariant { slot, asset }) => {
                Ok(set_slot(variants, slot, asset))
            }
            (Self::CoverVideo { video }, AssetAttachment::CoverVideo(asset)) => {
                Ok(video.replace(asset))
            }
            (assets, attachment) => Err(StoreError::InvalidPatch(format!(
                "attachment {attachment:?} does not fit payload {}",
                assets.variant_name()
            ))),
        }
    }

    fn variant_name(&self) -> &'static str {
        match self {
            Self::Concept { .. } => "concept",
            Self::Icon { .. } => "icon",
            Self::Screens { .. } => "screens",
            Self::CoverImage { .. } => "cover_image",
            Self::CoverVideo { .. } => "cover_video",
            Self::FullApp { .. } => "full_app",
        }
    }
}

/// A single asset attachment carried by a patch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetAttachment {
    Concept(AssetRef),
    Icon(AssetRef),
    Screen { slot: usize, asset: AssetRef },
    CoverVariant { slot: usize, asset: AssetRef },
    CoverVideo(AssetRef),
}

// ---------------------------------------------------------------------------
// JobRecord
// ---------------------------------------------------------------------------

/// The persisted, subscribable status record of one generation job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    pub owner_id: OwnerId,
    pub kind: JobKind,
    pub status: JobStatus,
    pub current_step: String,
    pub progress_percentage: u8,
    pub screens_generated: u32,
    pub screens_total: u32,
    pub failed_units: Vec<FailedUnit>,
    pub error: Option<String>,
    pub assets: JobAssets,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl JobRecord {
    /// Fresh `pending` record for a newly submitted job.
    pub fn new(id: JobId, owner_id: OwnerId, kind: JobKind) -> Self {
        let now = Utc::now();
        Self {
            id,
            owner_id,
            kind,
            status: JobStatus::Pending,
            current_step: "Queued".to_string(),
            progress_percentage: 0,
            screens_generated: 0,
            screens_total: 0,
            failed_units: Vec::new(),
            error: None,
            assets: JobAssets::for_kind(kind),
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a patch in place, returning any replaced asset reference.
    ///
    /// Enforces the record invariants: legal forward status
    /// transitions, non-decreasing progress, and
    /// `screens_generated <= screens_total`. Terminal immutability is
    /// enforced by the store, which refuses to patch terminal records.
    pub fn apply(&mut self, patch: JobPatch) -> Result<Option<AssetRef>, StoreError> {
        if let Some(next) = patch.status {
            if !self.status.can_transition_to(next) {
                return Err(StoreError::InvalidPatch(format!(
                    "illegal status transition {} -> {}",
                    self.status, next
                )));
            }
            self.status = next;
        }
        if let Some(step) = patch.current_step {
            self.current_step = step;
        }
        if let Some(progress) = patch.progress_percentage {
            // Readers must never observe a regression.
            self.progress_percentage = self.progress_percentage.max(progress.min(100));
        }
        if let Some(total) = patch.screens_total {
            self.screens_total = total;
        }
        if let Some(generated) = patch.screens_generated {
            self.screens_generated = generated;
        }
        if self.screens_generated > self.screens_total {
            return Err(StoreError::InvalidPatch(format!(
                "screens_generated {} exceeds screens_total {}",
                self.screens_generated, self.screens_total
            )));
        }
        if let Some(unit) = patch.failed_unit {
            self.failed_units.push(unit);
        }
        if let Some(error) = patch.error {
            self.error = Some(error);
        }
        let replaced = match patch.attach {
            Some(attachment) => self.assets.attach(attachment)?,
            None => None,
        };
        self.updated_at = Utc::now();
        Ok(replaced)
    }
}

// ---------------------------------------------------------------------------
// JobPatch
// ---------------------------------------------------------------------------

/// Partial update applied atomically to a [`JobRecord`].
///
/// Built with the fluent setters; unset fields are left untouched.
/// `failed_unit` appends rather than replaces.
#[derive(Debug, Clone, Default)]
pub struct JobPatch {
    pub status: Option<JobStatus>,
    pub current_step: Option<String>,
    pub progress_percentage: Option<u8>,
    pub screens_generated: Option<u32>,
    pub screens_total: Option<u32>,
    pub failed_unit: Option<FailedUnit>,
    pub error: Option<String>,
    pub attach: Option<AssetAttachment>,
}

impl JobPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(mut self, status: JobStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn current_step(mut self, step: impl Into<String>) -> Self {
        self.current_step = Some(step.into());
        self
    }

    pub fn progress(mut self, percentage: u8) -> Self {
        self.progress_percentage = Some(percentage);
        self
    }

    pub fn screens_generated(mut self, generated: u32) -> Self {
        self.screens_generated = Some(generated);
        self
    }

    pub fn screens_total(mut self, total: u32) -> Self {
        self.screens_total = Some(total);
        self
    }

    pub fn failed_unit(mut self, unit: FailedUnit) -> Self {
        self.failed_unit = Some(unit);
        self
    }

    pub fn error(mut self, message: impl Into<String>) -> Self {
        self.error = Some(message.into());
        self
    }

    pub fn attach(mut self, attachment: AssetAttachment) -> Self {
        self.attach = Some(attachment);
        self
    }
}

// ---------------------------------------------------------------------------
// JobStore trait
// ---------------------------------------------------------------------------

/// Result of a successful patch: the updated snapshot plus any asset
/// reference the patch displaced (to be deleted by the caller after
/// the new reference is visible).
#[derive(Debug, Clone)]
pub struct PatchOutcome {
    pub record: JobRecord,
    pub replaced_asset: Option<AssetRef>,
}

/// Reactive document store keyed by job id.
///
/// Patches for one job are applied (and observed) in the order they
/// are issued; `subscribe` yields every applied patch's snapshot.
/// Terminal records are immutable.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a new record. Fails on duplicate id.
    async fn create(&self, record: JobRecord) -> Result<(), StoreError>;

    /// Fetch the current snapshot, or `None` if unknown.
    async fn get(&self, id: JobId) -> Result<Option<JobRecord>, StoreError>;

    /// Apply a partial patch atomically and notify subscribers.
    async fn patch(&self, id: JobId, patch: JobPatch) -> Result<PatchOutcome, StoreError>;

    /// Subscribe to snapshot updates for one job.
    async fn subscribe(&self, id: JobId) -> Result<watch::Receiver<JobRecord>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn record(kind: JobKind) -> JobRecord {
        JobRecord::new(JobId::new_v4(), OwnerId::new_v4(), kind)
    }

    fn asset(tag: &str) -> AssetRef {
        AssetRef::from_string(tag.to_string())
    }

    #[test]
    fn new_record_starts_pending_at_zero() {
        let r = record(JobKind::FullAppGeneration);
        assert_eq!(r.status, JobStatus::Pending);
        assert_eq!(r.progress_percentage, 0);
        assert_eq!(r.screens_total, 0);
        assert!(r.failed_units.is_empty());
        assert_matches!(r.assets, JobAssets::FullApp { .. });
    }

    #[test]
    fn apply_legal_transition() {
        let mut r = record(JobKind::FullAppGeneration);
        let patch = JobPatch::new()
            .status(JobStatus::GeneratingConcept)
            .current_step("Generating concept")
            .progress(1);
        r.apply(patch).unwrap();
        assert_eq!(r.status, JobStatus::GeneratingConcept);
        assert_eq!(r.current_step, "Generating concept");
        assert_eq!(r.progress_percentage, 1);
    }

    #[test]
    fn apply_rejects_illegal_transition() {
        let mut r = record(JobKind::CoverVideo);
        let result = r.apply(JobPatch::new().status(JobStatus::GeneratingIcon));
        assert_matches!(result, Err(StoreError::InvalidPatch(_)));
    }

    #[test]
    fn progress_never_regresses() {
        let mut r = record(JobKind::Screens);
        r.apply(JobPatch::new().progress(40)).unwrap();
        r.apply(JobPatch::new().progress(25)).unwrap();
        assert_eq!(r.progress_percentage, 40);
        r.apply(JobPatch::new().progress(41)).unwrap();
        assert_eq!(r.progress_percentage, 41);
    }

    #[test]
    fn progress_caps_at_100() {
        let mut r = record(JobKind::Screens);
        r.apply(JobPatch::new().progress(255)).unwrap();
        assert_eq!(r.progress_percentage, 100);
    }

    #[test]
    fn screens_generated_cannot_exceed_total() {
        let mut r = record(JobKind::Screens);
        r.apply(JobPatch::new().screens_total(3)).unwrap();
        let result = r.apply(JobPatch::new().screens_generated(4));
        assert_matches!(result, Err(StoreError::InvalidPatch(_)));
    }

    #[test]
    fn failed_units_append() {
        let mut r = record(JobKind::Screens);
        r.apply(JobPatch::new().screens_total(2)).unwrap();
        for name in ["screen_1", "screen_2"] {
            let unit = FailedUnit {
                unit_name: name.to_string(),
                error_message: "provider timeout".to_string(),
            };
            r.apply(JobPatch::new().failed_unit(unit)).unwrap();
        }
        assert_eq!(r.failed_units.len(), 2);
        assert_eq!(r.failed_units[1].unit_name, "screen_2");
    }

    #[test]
    fn attach_screen_slots_out_of_order() {
        let mut r = record(JobKind::Screens);
        r.apply(JobPatch::new().attach(AssetAttachment::Screen {
            slot: 2,
            asset: asset("c"),
        }))
        .unwrap();
        r.apply(JobPatch::new().attach(AssetAttachment::Screen {
            slot: 0,
            asset: asset("a"),
        }))
        .unwrap();

        let JobAssets::Screens { screens } = &r.assets else {
            panic!("wrong payload");
        };
        assert_eq!(screens.len(), 3);
        assert_eq!(screens[0], Some(asset("a")));
        assert_eq!(screens[1], None);
        assert_eq!(screens[2], Some(asset("c")));
    }

    #[test]
    fn attach_replacement_returns_old_ref() {
        let mut r = record(JobKind::Icon);
        let first = r
            .apply(JobPatch::new().attach(AssetAttachment::Icon(asset("old"))))
            .unwrap();
        assert_eq!(first, None);
        let replaced = r
            .apply(JobPatch::new().attach(AssetAttachment::Icon(asset("new"))))
            .unwrap();
        assert_eq!(replaced, Some(asset("old")));
    }

    #[test]
    fn attach_rejects_kind_mismatch() {
        let mut r = record(JobKind::CoverVideo);
        let result = r.apply(JobPatch::new().attach(AssetAttachment::Icon(asset("x"))));
        assert_matches!(result, Err(StoreError::InvalidPatch(_)));
    }

    #[test]
    fn full_app_payload_accepts_concept_icon_and_screens() {
        let mut r = record(JobKind::FullAppGeneration);
        r.apply(JobPatch::new().attach(AssetAttachment::Concept(asset("c"))))
            .unwrap();
        r.apply(JobPatch::new().attach(AssetAttachment::Icon(asset("i"))))
            .unwrap();
        r.apply(JobPatch::new().attach(AssetAttachment::Screen {
            slot: 1,
            asset: asset("s"),
        }))
        .unwrap();

        let JobAssets::FullApp { concept, icon, screens } = &r.assets else {
            panic!("wrong payload");
        };
        assert_eq!(*concept, Some(asset("c")));
        assert_eq!(*icon, Some(asset("i")));
        assert_eq!(screens[1], Some(asset("s")));
    }

    #[test]
    fn record_serializes_with_tagged_assets() {
        let r = record(JobKind::CoverImage);
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["status"], "pending");
        assert_eq!(json["assets"]["type"], "cover_image");
    }
}
