//! Per-entity operation serialization
//!
//! Lifecycle operations check a status precondition and then write;
//! two operations interleaving on the same row could both pass the
//! check. The registry hands out one async mutex per entity id, so a
//! transition holds exclusive access to its entity for the duration
//! of the operation.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

/// Keyed async mutexes, one per entity id.
///
/// Entries are created on first use and kept for the life of the
/// registry. Shared between the dispatcher and the webhook processor
/// so message transitions serialize across both.
#[derive(Default)]
pub struct EntityLocks {
    locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl EntityLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the lock for `id`, waiting if another operation holds it.
    pub async fn acquire(&self, id: Uuid) -> OwnedMutexGuard<()> {
        let lock = self.locks.lock().await.entry(id).or_default().clone();
        lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_same_id_waits_for_the_holder() {
        let locks = Arc::new(EntityLocks::new());
        let id = Uuid::new_v4();

        let guard = locks.acquire(id).await;

        let contender = locks.clone();
        let handle = tokio::spawn(async move {
            let _guard = contender.acquire(id).await;
        });

        tokio::task::yield_now().await;
        assert!(!handle.is_finished());

        drop(guard);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_different_ids_are_independent() {
        let locks = EntityLocks::new();

        let _first = locks.acquire(Uuid::new_v4()).await;
        let _second = locks.acquire(Uuid::new_v4()).await;
    }

    #[tokio::test]
    async fn test_lock_is_reacquirable_after_release() {
        let locks = EntityLocks::new();
        let id = Uuid::new_v4();

        drop(locks.acquire(id).await);
        let _guard = locks.acquire(id).await;
    }
}
