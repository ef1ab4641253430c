//! Live handle bookkeeping: the collector's roots.
//!
//! Every [`Bdd`][crate::bdd::Bdd] owns one [`HandleCell`]; the registry keeps
//! a weak pointer to it. The collector reads every live cell as a root and
//! rewrites it after compaction. Freed or dropped cells are pruned at every
//! collection, and between collections whenever the list doubles.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use crate::reference::Ref;

/// Id of a revoked handle.
const FREED: u32 = Ref::INVALID.raw();

/// The slot a handle stores its node id in.
#[derive(Debug)]
pub struct HandleCell {
    id: AtomicU32,
}

impl HandleCell {
    fn new(id: Ref) -> Self {
        Self { id: AtomicU32::new(id.raw()) }
    }

    /// Current id, or `None` once revoked.
    pub fn get(&self) -> Option<Ref> {
        match self.id.load(Ordering::Acquire) {
            FREED => None,
            id => Some(Ref::new(id)),
        }
    }

    /// Point the handle at `id`.
    ///
    /// Only called while the caller holds the store guard, so the collector
    /// cannot be rewriting the cell concurrently.
    pub fn set(&self, id: Ref) {
        self.id.store(id.raw(), Ordering::Release);
    }

    /// Move the handle from `old` to `new` unless it changed in between.
    pub fn replace(&self, old: Ref, new: Ref) -> bool {
        self.id
            .compare_exchange(old.raw(), new.raw(), Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Revoke the handle; returns whether it was live.
    pub fn revoke(&self) -> bool {
        self.id.swap(FREED, Ordering::AcqRel) != FREED
    }
}

/// Registrations below which the list is never pruned outside a collection.
const MIN_PRUNE_LEN: usize = 1024;

#[derive(Debug)]
struct Handles {
    cells: Vec<Weak<HandleCell>>,
    /// Length at which `register` prunes next.
    prune_at: usize,
}

impl Default for Handles {
    fn default() -> Self {
        Self {
            cells: Vec::new(),
            prune_at: MIN_PRUNE_LEN,
        }
    }
}

impl Handles {
    /// Drop dead or revoked entries, collecting the live ones into `live`.
    fn prune(&mut self, mut live: impl FnMut(Arc<HandleCell>)) {
        self.cells.retain(|weak| match weak.upgrade() {
            Some(cell) if cell.get().is_some() => {
                live(cell);
                true
            }
            _ => false,
        });
        self.prune_at = (2 * self.cells.len()).max(MIN_PRUNE_LEN);
    }
}

#[derive(Debug, Default)]
pub struct Registry {
    handles: Mutex<Handles>,
    /// Handles freed since the last collection.
    freed: AtomicUsize,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new root for `id`.
    pub fn register(&self, id: Ref) -> Arc<HandleCell> {
        let cell = Arc::new(HandleCell::new(id));
        let mut handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
        if handles.cells.len() >= handles.prune_at {
            handles.prune(drop);
        }
        handles.cells.push(Arc::downgrade(&cell));
        cell
    }

    /// Count a freed handle; returns the number freed since the last collection.
    pub fn note_free(&self) -> usize {
        self.freed.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Every live cell, pruning dead entries on the way.
    pub fn snapshot(&self) -> Vec<Arc<HandleCell>> {
        let mut handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
        let mut live = Vec::with_capacity(handles.cells.len());
        handles.prune(|cell| live.push(cell));
        self.freed.store(0, Ordering::Relaxed);
        live
    }

    /// Number of registered cells, live or not yet pruned.
    pub fn len(&self) -> usize {
        self.handles.lock().unwrap_or_else(PoisonError::into_inner).cells.len()
    }

    /// Revoke every handle and forget them.
    pub fn revoke_all(&self) {
        let mut handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
        for cell in handles.cells.drain(..).filter_map(|weak| weak.upgrade()) {
            cell.revoke();
        }
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_snapshot_prunes() {
        let registry = Registry::new();
        let a = registry.register(Ref::new(5));
        let b = registry.register(Ref::new(6));
        let c = registry.register(Ref::new(7));
        assert_eq!(registry.len(), 3);

        drop(b);
        assert!(c.revoke());
        assert!(!c.revoke());
        assert_eq!(registry.note_free(), 1);

        let live = registry.snapshot();
        assert_eq!(live.len(), 1);
        assert!(Arc::ptr_eq(&live[0], &a));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_register_prunes_dropped_handles() {
        let registry = Registry::new();
        let kept: Vec<_> = (0..10).map(|i| registry.register(Ref::new(i))).collect();
        for i in 0..100_000 {
            drop(registry.register(Ref::new(i)));
            assert!(registry.len() <= 2 * MIN_PRUNE_LEN);
        }
        assert!(kept.iter().all(|cell| cell.get().is_some()));
        assert_eq!(registry.snapshot().len(), kept.len());
    }

    #[test]
    fn test_revoke_all() {
        let registry = Registry::new();
        let a = registry.register(Ref::new(5));
        registry.revoke_all();
        assert_eq!(a.get(), None);
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_set() {
        let registry = Registry::new();
        let a = registry.register(Ref::new(5));
        a.set(Ref::new(9));
        assert_eq!(a.get(), Some(Ref::new(9)));
    }
}
