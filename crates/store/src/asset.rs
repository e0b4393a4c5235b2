//! Binary asset storage behind a stable-reference interface.
//!
//! Generated bytes go in, an opaque [`AssetRef`] comes out. References
//! are derived from a SHA-256 content digest plus a random suffix, so
//! two puts of identical bytes yield distinct references and can be
//! deleted independently.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::StoreError;

// ---------------------------------------------------------------------------
// AssetRef
// ---------------------------------------------------------------------------

/// Opaque, stable reference to a stored binary asset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetRef(String);

impl AssetRef {
    /// Wrap an externally produced reference string.
    pub fn from_string(value: String) -> Self {
        Self(value)
    }

    /// Derive a fresh reference for `bytes`: 16-byte SHA-256 digest
    /// prefix plus a random suffix for uniqueness.
    pub fn derive(bytes: &[u8]) -> Self {
        let digest = Sha256::digest(bytes);
        let mut hex = String::with_capacity(32);
        for byte in &digest[..16] {
            hex.push_str(&format!("{byte:02x}"));
        }
        Self(format!("{hex}-{}", uuid::Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AssetRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// AssetStore trait
// ---------------------------------------------------------------------------

/// Durable binary storage for generated content.
///
/// References are never mutated in place: replacement stores a new
/// asset, attaches the new reference, then deletes the old one.
#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Persist `bytes` and return a stable reference.
    async fn put(&self, bytes: Vec<u8>, content_type: &str) -> Result<AssetRef, StoreError>;

    /// Resolve a reference to a fetchable URL, or `None` if unknown.
    async fn get_url(&self, asset: &AssetRef) -> Option<String>;

    /// Delete an asset. Deleting an unknown reference is a no-op.
    async fn delete(&self, asset: &AssetRef) -> Result<(), StoreError>;
}

// ---------------------------------------------------------------------------
// In-memory implementation
// ---------------------------------------------------------------------------

struct StoredObject {
    #[allow(dead_code)]
    bytes: Vec<u8>,
    content_type: String,
}

/// In-memory [`AssetStore`] used by tests and the default server.
#[derive(Default)]
pub struct MemoryAssetStore {
    objects: Mutex<HashMap<AssetRef, StoredObject>>,
}

impl MemoryAssetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored assets (test helper).
    pub fn len(&self) -> usize {
        self.objects.lock().expect("asset store poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl AssetStore for MemoryAssetStore {
    async fn put(&self, bytes: Vec<u8>, content_type: &str) -> Result<AssetRef, StoreError> {
        let asset = AssetRef::derive(&bytes);
        let object = StoredObject {
            bytes,
            content_type: content_type.to_string(),
        };
        self.objects
            .lock()
            .expect("asset store poisoned")
            .insert(asset.clone(), object);
        Ok(asset)
    }

    async fn get_url(&self, asset: &AssetRef) -> Option<String> {
        let objects = self.objects.lock().expect("asset store poisoned");
        objects
            .get(asset)
            .map(|o| format!("memory://assets/{asset}?type={}", o.content_type))
    }

    async fn delete(&self, asset: &AssetRef) -> Result<(), StoreError> {
        self.objects
            .lock()
            .expect("asset store poisoned")
            .remove(asset);
        Ok(())
    }
}
