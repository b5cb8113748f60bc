//! Per-key mutual exclusion for cache producers.
//!
//! A slot exists only while someone holds or waits for it. Each slot records
//! when its key was last produced so a waiter can tell that the artifacts it
//! is about to create were written while it was queued.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::trace;

type Slot = Arc<AsyncMutex<Option<Instant>>>;

/// Registry of per-key async locks.
#[derive(Clone, Default)]
pub struct KeyLocks {
    // Synchronous: slots are released from `Drop`.
    slots: Arc<Mutex<HashMap<String, Slot>>>,
}

impl KeyLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `key`.
    pub async fn lock(&self, key: &str) -> KeyGuard {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
            slots
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(None)))
                .clone()
        };

        let guard = slot.lock_owned().await;
        trace!(key = key, "Acquired key lock");

        KeyGuard {
            key: key.to_string(),
            guard: Some(guard),
            slots: Arc::clone(&self.slots),
        }
    }

    /// Number of keys currently held or awaited.
    pub fn active(&self) -> usize {
        self.slots.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// Exclusive access to one key. Released on drop.
pub struct KeyGuard {
    key: String,
    guard: Option<OwnedMutexGuard<Option<Instant>>>,
    slots: Arc<Mutex<HashMap<String, Slot>>>,
}

impl KeyGuard {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// When the artifacts for this key were last produced by a holder.
    pub fn last_produced(&self) -> Option<Instant> {
        self.guard.as_ref().and_then(|g| **g)
    }

    /// True when another holder produced the key at or after `since`.
    pub fn produced_since(&self, since: Instant) -> bool {
        self.last_produced().map_or(false, |at| at >= since)
    }

    pub fn mark_produced(&mut self) {
        if let Some(guard) = self.guard.as_mut() {
            **guard = Some(Instant::now());
        }
    }
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        drop(self.guard.take());

        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        // Only the registry still references an idle slot.
        if slots
            .get(&self.key)
            .map_or(false, |slot| Arc::strong_count(slot) == 1)
        {
            slots.remove(&self.key);
            trace!(key = %self.key, "Released idle key slot");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_slot_removed_when_idle() {
        let locks = KeyLocks::new();
        {
            let guard = locks.lock("m51-dss2-red").await;
            assert_eq!(guard.key(), "m51-dss2-red");
            assert_eq!(locks.active(), 1);
        }
        assert_eq!(locks.active(), 0);
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_block() {
        let locks = KeyLocks::new();
        let _a = locks.lock("a").await;
        let b = tokio::time::timeout(Duration::from_millis(200), locks.lock("b")).await;
        assert!(b.is_ok());
        assert_eq!(locks.active(), 2);
    }

    #[tokio::test]
    async fn test_waiter_sees_production() {
        let locks = KeyLocks::new();
        let started = Instant::now();

        let mut first = locks.lock("k").await;
        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let guard = locks.lock("k").await;
                guard.produced_since(started)
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        // The waiter keeps the slot alive.
        assert_eq!(locks.active(), 1);
        first.mark_produced();
        drop(first);

        assert!(waiter.await.unwrap());
        assert_eq!(locks.active(), 0);
    }

    #[tokio::test]
    async fn test_fresh_slot_has_no_production() {
        let locks = KeyLocks::new();
        let guard = locks.lock("k").await;
        assert!(guard.last_produced().is_none());
        assert!(!guard.produced_since(Instant::now()));
    }
}
