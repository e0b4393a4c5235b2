//! Progress estimation: stage windows, countable and time-based curves.
//!
//! A job's 0-100 progress range is partitioned into fixed per-stage
//! windows. Within a window, progress is either countable (resolved
//! units over total units) or time-based (asymptotic curve that never
//! reaches the window end before the unit resolves). All functions
//! here are pure and monotone in their time/count arguments.

use std::time::Duration;

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Stage windows
// ---------------------------------------------------------------------------

/// Multiple of the target duration after which a stage is considered
/// stalled and the job is failed instead of silently retried.
pub const STALL_MULTIPLIER: u32 = 3;

/// Fraction at which the time-based curve is capped until the unit
/// actually resolves, so progress never reads 100 early.
const TIME_CURVE_CAP: f64 = 0.99;

/// A stage identifier within a progress plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    Concept,
    Icon,
    Screens,
    /// The only stage of a single-stage job.
    Single,
}

/// A half-open slice `[start, end]` of the 0-100 progress range owned
/// by one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageWindow {
    pub start: u8,
    pub end: u8,
}

impl StageWindow {
    pub fn new(start: u8, end: u8) -> Self {
        Self { start, end }
    }

    fn span(self) -> f64 {
        f64::from(self.end) - f64::from(self.start)
    }
}

// ---------------------------------------------------------------------------
// Progress plan
// ---------------------------------------------------------------------------

/// Ordered table of stage windows covering 0-100 without gaps.
///
/// Built once per job kind and validated at construction; the window
/// boundaries are the only "magic percentages" in the system.
#[derive(Debug, Clone)]
pub struct ProgressPlan {
    windows: Vec<(StageKind, StageWindow)>,
}

impl ProgressPlan {
    /// Validate and build a plan from an ordered window list.
    ///
    /// Rules: non-empty; first window starts at 0; last ends at 100;
    /// windows are contiguous; every window is non-empty.
    pub fn new(windows: Vec<(StageKind, StageWindow)>) -> Result<Self, CoreError> {
        let Some(first) = windows.first() else {
            return Err(CoreError::Validation(
                "Progress plan must contain at least one stage".to_string(),
            ));
        };
        if first.1.start != 0 {
            return Err(CoreError::Validation(
                "Progress plan must start at 0".to_string(),
            ));
        }
        let last = windows.last().expect("non-empty checked above");
        if last.1.end != 100 {
            return Err(CoreError::Validation(
                "Progress plan must end at 100".to_string(),
            ));
        }
        for (kind, window) in &windows {
            if window.start >= window.end {
                return Err(CoreError::Validation(format!(
                    "Stage {kind:?} window {}-{} is empty",
                    window.start, window.end
                )));
            }
        }
        for pair in windows.windows(2) {
            if pair[0].1.end != pair[1].1.start {
                return Err(CoreError::Validation(format!(
                    "Progress plan has a gap or overlap between {:?} and {:?}",
                    pair[0].0, pair[1].0
                )));
            }
        }
        Ok(Self { windows })
    }

    /// The standard full-pipeline partition: concept 0-15, icon 15-30,
    /// screens 30-100.
    pub fn full_app() -> Self {
        Self::new(vec![
            (StageKind::Concept, StageWindow::new(0, 15)),
            (StageKind::Icon, StageWindow::new(15, 30)),
            (StageKind::Screens, StageWindow::new(30, 100)),
        ])
        .expect("static full-app plan is valid")
    }

    /// Partition for single-stage jobs: one window owning 0-100.
    pub fn single_stage() -> Self {
        Self::new(vec![(StageKind::Single, StageWindow::new(0, 100))])
            .expect("static single-stage plan is valid")
    }

    /// The window owned by `kind`, if the plan contains that stage.
    pub fn window(&self, kind: StageKind) -> Option<StageWindow> {
        self.windows
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, w)| *w)
    }
}

// ---------------------------------------------------------------------------
// Estimators
// ---------------------------------------------------------------------------

/// Countable regime: progress within `window` after `resolved` of
/// `total` units have finished (succeeded or exhausted retries).
///
/// Reaches the window end exactly when all units have resolved, even
/// if some failed: all *work* is finished even when the outcome is
/// incomplete.
pub fn countable_progress(window: StageWindow, resolved: u32, total: u32) -> u8 {
    if total == 0 {
        return window.start;
    }
    let frac = (f64::from(resolved) / f64::from(total)).clamp(0.0, 1.0);
    (f64::from(window.start) + window.span() * frac) as u8
}

/// Time-based regime for a single long-running unit: an asymptotic
/// curve `1 - e^(-2 * elapsed / target)` scaled into `window`, capped
/// just below the window end until the unit resolves.
pub fn time_based_progress(window: StageWindow, elapsed: Duration, target: Duration) -> u8 {
    if target.is_zero() {
        return window.start;
    }
    let ratio = elapsed.as_secs_f64() / target.as_secs_f64();
    let frac = (1.0 - (-2.0 * ratio).exp()).min(TIME_CURVE_CAP);
    (f64::from(window.start) + window.span() * frac) as u8
}

/// Stall circuit breaker: true once `elapsed` exceeds
/// [`STALL_MULTIPLIER`] times the target duration without resolution.
pub fn has_stalled(elapsed: Duration, target: Duration) -> bool {
    elapsed > target * STALL_MULTIPLIER
}
