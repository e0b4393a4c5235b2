//! Owner existence lookup used to validate job submissions.

use std::collections::HashSet;

use async_trait::async_trait;

use vitrine_core::types::OwnerId;

/// Answers "does this owner exist" at submission time.
#[async_trait]
pub trait OwnerIndex: Send + Sync {
    async fn exists(&self, owner: OwnerId) -> bool;
}

/// Fixed owner set, or a pass-through that accepts everyone.
pub struct StaticOwnerIndex {
    allow_all: bool,
    owners: HashSet<OwnerId>,
}

impl StaticOwnerIndex {
    /// Accept every owner id. Default for single-tenant deployments.
    pub fn allow_all() -> Self {
        Self {
            allow_all: true,
            owners: HashSet::new(),
        }
    }

    /// Accept only the given owner ids.
    pub fn with_owners(owners: impl IntoIterator<Item = OwnerId>) -> Self {
        Self {
            allow_all: false,
            owners: owners.into_iter().collect(),
        }
    }
}

#[async_trait]
impl OwnerIndex for StaticOwnerIndex {
    async fn exists(&self, owner: OwnerId) -> bool {
        self.allow_all || self.owners.contains(&owner)
    }
}
