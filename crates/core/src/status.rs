//! Job status state machine.
//!
//! Statuses only ever move forward; terminal statuses are absorbing.
//! The orchestrator is the only writer, but the transition relation is
//! kept here as pure logic so it can be checked before every patch.

use serde::{Deserialize, Serialize};

use crate::types::JobKind;

/// Observable lifecycle state of a generation job.
///
/// Full-pipeline jobs move through the `Generating*` states in order;
/// single-stage jobs (concept, icon, screens, cover image, cover
/// video) use the plain `Generating` state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    GeneratingConcept,
    GeneratingIcon,
    GeneratingScreens,
    Generating,
    Completed,
    Partial,
    Failed,
}

impl JobStatus {
    /// Stable string form, matching the serde representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::GeneratingConcept => "generating_concept",
            Self::GeneratingIcon => "generating_icon",
            Self::GeneratingScreens => "generating_screens",
            Self::Generating => "generating",
            Self::Completed => "completed",
            Self::Partial => "partial",
            Self::Failed => "failed",
        }
    }

    /// Terminal statuses are absorbing: no patch may move a job out of
    /// them, and the record becomes immutable.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Partial | Self::Failed)
    }

    /// Whether `next` is a legal forward transition from `self`.
    ///
    /// Any non-terminal state may fail (fatal stage errors and
    /// cancellation); partial is only reachable from a fan-out stage.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        use JobStatus::*;
        match (self, next) {
            (s, Failed) if !s.is_terminal() => true,
            (Pending, GeneratingConcept) | (Pending, Generating) => true,
            (GeneratingConcept, GeneratingIcon) => true,
            (GeneratingIcon, GeneratingScreens) => true,
            (GeneratingScreens, Completed) | (GeneratingScreens, Partial) => true,
            (Generating, Completed) | (Generating, Partial) => true,
            _ => false,
        }
    }

    /// The state entered when a job of `kind` starts its first stage.
    pub fn initial_generating(kind: JobKind) -> JobStatus {
        if kind.is_multi_stage() {
            JobStatus::GeneratingConcept
        } else {
            JobStatus::Generating
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
