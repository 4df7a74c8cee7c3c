use std::collections::HashMap;
use std::sync::Arc;

use async_lock::{Mutex as AsyncMutex, MutexGuardArc};
use parking_lot::Mutex;

use crate::identity::ConnectorIdentity;

/// Arena of async locks keyed by connector identity.
///
/// Clones share the same arena. Every connector that may touch the same
/// cache directory must hold a clone of one arena.
#[derive(Debug, Default, Clone)]
pub struct IdentityLocks {
    locks: Arc<Mutex<HashMap<ConnectorIdentity, Arc<AsyncMutex<()>>>>>,
}

/// Held for the duration of one fetch-and-validate sequence
pub struct IdentityGuard {
    _guard: MutexGuardArc<()>,
}

impl IdentityLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, identity: &ConnectorIdentity) -> IdentityGuard {
        let lock = self.entry(identity);
        IdentityGuard {
            _guard: lock.lock_arc().await,
        }
    }

    pub fn try_lock(&self, identity: &ConnectorIdentity) -> Option<IdentityGuard> {
        let lock = self.entry(identity);
        lock.try_lock_arc().map(|guard| IdentityGuard { _guard: guard })
    }

    fn entry(&self, identity: &ConnectorIdentity) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock();
        locks.entry(identity.clone()).or_default().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(name: &str) -> ConnectorIdentity {
        ConnectorIdentity::new("acme", name, "v1").unwrap()
    }

    #[fluvio_future::test]
    async fn test_same_identity_is_exclusive() {
        let locks = IdentityLocks::new();
        let shared = locks.clone();

        let guard = locks.lock(&identity("demo")).await;
        assert!(shared.try_lock(&identity("demo")).is_none());

        drop(guard);
        assert!(shared.try_lock(&identity("demo")).is_some());
    }

    #[fluvio_future::test]
    async fn test_different_identities_do_not_block() {
        let locks = IdentityLocks::new();

        let _demo = locks.lock(&identity("demo")).await;
        let other = locks.try_lock(&identity("other"));

        assert!(other.is_some());
    }
}
