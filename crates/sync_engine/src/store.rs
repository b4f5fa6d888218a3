//! SharedReadingStore - the only mutex-guarded state in the node.
//!
//! Access is closure-scoped: the guard never leaves this module, so no
//! caller can hold slot references past the block, and since the closure
//! is synchronous nothing can be awaited while the lock is held.

use std::sync::{Mutex, MutexGuard, PoisonError};

use contracts::{CompositeSnapshot, SensorKind, SlotState};
use tracing::trace;

/// Latest reading per sensor kind
#[derive(Debug, Default)]
pub struct SharedReadingStore {
    inner: Mutex<CompositeSnapshot>,
}

impl SharedReadingStore {
    /// Create a store with every slot vacant
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` with exclusive access to the whole snapshot
    ///
    /// The lock is released on every exit path, including a panic inside
    /// `f`; a poisoned lock is recovered so later callers keep working.
    pub fn with_exclusive_access<R>(&self, f: impl FnOnce(&mut CompositeSnapshot) -> R) -> R {
        let mut guard = self.lock();
        f(&mut guard)
    }

    /// Copy of one slot
    pub fn read(&self, kind: SensorKind) -> SlotState {
        self.with_exclusive_access(|snapshot| *snapshot.get(kind))
    }

    /// Overwrite one slot, returning its new revision
    pub fn write(&self, kind: SensorKind, state: SlotState) -> u64 {
        let revision = self.with_exclusive_access(|snapshot| {
            snapshot.set(kind, state);
            snapshot.revision(kind)
        });
        trace!(kind = %kind, revision, "slot written");
        revision
    }

    /// Copy of the whole snapshot
    pub fn snapshot(&self) -> CompositeSnapshot {
        self.with_exclusive_access(|snapshot| snapshot.clone())
    }

    fn lock(&self) -> MutexGuard<'_, CompositeSnapshot> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
