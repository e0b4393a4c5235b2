//! Generation pipeline: per-job orchestration, stage fan-out, and
//! per-unit retry.
//!
//! The [`JobOrchestrator`] is the single writer for every job record it
//! owns. Submission creates a `pending` record and spawns a driver
//! task; the driver sequences stages, folds unit outcomes into store
//! patches, and terminalizes the job exactly once.

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod stage;
pub mod unit;

pub use config::PipelineConfig;
pub use error::{CancelError, SubmitError, UnitError};
pub use orchestrator::JobOrchestrator;
pub use unit::{UnitOutcome, UnitSpec};
