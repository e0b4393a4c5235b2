//! Pure domain logic for the Vitrine generation platform.
//!
//! Everything in this crate is side-effect free: ids and kinds, the job
//! status state machine, progress estimation, retry policy math, and
//! submission-parameter validation. No internal dependencies.

pub mod error;
pub mod params;
pub mod prompt;
pub mod progress;
pub mod retry;
pub mod status;
pub mod types;
