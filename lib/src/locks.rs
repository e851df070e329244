//! Per-circuit mutual exclusion.
//!
//! Each circuit's working directory holds shared on-disk state (parameter
//! file, witness, proof outputs), so at most one pipeline may touch it at a
//! time. Different circuits never contend. Waiters are served in FIFO order
//! because `tokio::sync::Mutex` is fair.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;

use crate::circuit::CircuitKind;

type Slot = Arc<AsyncMutex<()>>;

/// Registry of per-circuit locks, created on demand and dropped when idle
#[derive(Debug, Default)]
pub struct CircuitLocks {
    slots: Arc<Mutex<HashMap<CircuitKind, Slot>>>,
    acquisitions: AtomicU64,
}

/// Held while a circuit's pipeline runs; releases and prunes on drop
#[derive(Debug)]
pub struct CircuitLease {
    kind: CircuitKind,
    guard: Option<OwnedMutexGuard<()>>,
    slot: Slot,
    slots: Arc<Mutex<HashMap<CircuitKind, Slot>>>,
}

impl CircuitLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `kind`
    pub async fn acquire(&self, kind: CircuitKind) -> CircuitLease {
        // Cloning the slot while holding the table lock keeps the refcount
        // accurate for pruning.
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            slots.entry(kind).or_default().clone()
        };

        debug!("Waiting for {} lock", kind);
        let guard = slot.clone().lock_owned().await;
        self.acquisitions.fetch_add(1, Ordering::Relaxed);
        debug!("Acquired {} lock", kind);

        CircuitLease {
            kind,
            guard: Some(guard),
            slot,
            slots: self.slots.clone(),
        }
    }

    /// Run `f` while holding the lock for `kind`.
    ///
    /// The lock is released when `f` finishes, fails, or is dropped.
    pub async fn with_lock<F, Fut, T>(&self, kind: CircuitKind, f: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let _lease = self.acquire(kind).await;
        f().await
    }

    /// Total number of locks granted since construction
    pub fn acquisitions(&self) -> u64 {
        self.acquisitions.load(Ordering::Relaxed)
    }

    /// Number of circuits with a live lock entry
    pub fn active_entries(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl CircuitLease {
    #[must_use]
    pub const fn kind(&self) -> CircuitKind {
        self.kind
    }
}

impl Drop for CircuitLease {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        // Table entry plus this lease: nobody else is queued.
        if Arc::strong_count(&self.slot) == 2 {
            slots.remove(&self.kind);
            debug!("Released idle {} lock entry", self.kind);
        }
    }
}
