//! In-process domain events for the Vitrine generation platform.

pub mod bus;

pub use bus::{EventBus, JobEvent};
