//! Storage abstractions for the Vitrine generation platform.
//!
//! Defines the [`JobStore`](job::JobStore) reactive document store,
//! the [`AssetStore`](asset::AssetStore) binary store, and the
//! [`OwnerIndex`](owner::OwnerIndex) existence lookup, plus in-memory
//! reference implementations used by tests and the default server.

pub mod asset;
pub mod error;
pub mod job;
pub mod memory;
pub mod owner;

pub use asset::{AssetRef, AssetStore, MemoryAssetStore};
pub use error::StoreError;
pub use job::{
    AssetAttachment, FailedUnit, JobAssets, JobPatch, JobRecord, JobStore, PatchOutcome,
};
pub use memory::MemoryJobStore;
pub use owner::{OwnerIndex, StaticOwnerIndex};
