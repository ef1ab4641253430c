//! Mark-compact collection and table growth.
//!
//! Both run with the store held exclusively. Collection traces from every
//! live handle (plus the permanent region), slides survivors down, rewrites
//! the handles through the resulting remap, and clears the caches. Growth
//! keeps every id and only rebuilds the index and the caches.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::debug;

use crate::reference::Ref;
use crate::registry::HandleCell;
use crate::store::Store;

/// Phase the node table is in.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[repr(u8)]
pub enum TableState {
    Idle = 0,
    Collecting = 1,
    Resizing = 2,
}

impl TableState {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => TableState::Collecting,
            2 => TableState::Resizing,
            _ => TableState::Idle,
        }
    }
}

/// Snapshot passed to [`GcListener`]s.
#[derive(Debug, Clone, PartialEq)]
pub struct GcEvent {
    /// 1-based number of this collection.
    pub seq: usize,
    /// Table capacity.
    pub size: usize,
    /// Free slots at the time of the event.
    pub free: usize,
    /// Duration of this collection; `None` in `on_start`.
    pub elapsed: Option<Duration>,
    /// Time spent in all collections so far.
    pub total: Duration,
}

/// Snapshot passed to [`ResizeListener`]s.
#[derive(Debug, Clone, PartialEq)]
pub struct ResizeEvent {
    /// 1-based number of this resize.
    pub seq: usize,
    pub old_size: usize,
    pub new_size: usize,
    /// Duration of this resize; `None` in `on_start`.
    pub elapsed: Option<Duration>,
    /// Time spent in all resizes so far.
    pub total: Duration,
}

/// Observer of garbage collections.
///
/// Called with the table held exclusively: implementations must not use
/// the factory.
pub trait GcListener: Send + Sync {
    fn on_start(&self, _event: &GcEvent) {}
    fn on_stop(&self, _event: &GcEvent) {}
}

/// Observer of table growth. Same restrictions as [`GcListener`].
pub trait ResizeListener: Send + Sync {
    fn on_start(&self, _event: &ResizeEvent) {}
    fn on_stop(&self, _event: &ResizeEvent) {}
}

/// How marking is spread over threads.
#[derive(Debug, Copy, Clone)]
pub(crate) struct MarkPlan {
    pub threshold: usize,
    pub threads: usize,
}

impl MarkPlan {
    fn threads_for(&self, roots: usize) -> usize {
        if roots < self.threshold.max(2) {
            return 1;
        }
        let threads = if self.threads == 0 {
            thread::available_parallelism().map_or(1, |n| n.get())
        } else {
            self.threads
        };
        threads.clamp(1, roots)
    }
}

impl Store {
    /// Collect every node unreachable from `handles` and the permanent
    /// region. Returns the number of reclaimed slots.
    pub(crate) fn collect(&mut self, handles: &[Arc<HandleCell>], plan: MarkPlan) -> usize {
        let before = self.table.size();

        let roots: Vec<Ref> = handles.iter().filter_map(|cell| cell.get()).collect();
        let mut marks = self.table.new_marks();
        let threads = plan.threads_for(roots.len());
        debug!("gc: marking from {} roots on {} thread(s)", roots.len(), threads);

        if threads > 1 {
            let table = &self.table;
            let marks: &[AtomicBool] = &marks;
            let chunk = roots.len().div_ceil(threads);
            thread::scope(|s| {
                for part in roots.chunks(chunk) {
                    s.spawn(move || {
                        for &root in part {
                            table.mark(root, marks);
                        }
                    });
                }
            });
        } else {
            for &root in &roots {
                self.table.mark(root, &marks);
            }
        }

        let remap = self.table.compact(&mut marks);

        for cell in handles {
            if let Some(old) = cell.get() {
                // A handle dropped since the snapshot stays revoked.
                cell.replace(old, remap[old.index()]);
            }
        }

        self.caches.clear();

        let reclaimed = before - self.table.size();
        debug!("gc: reclaimed {} of {} nodes", reclaimed, before);
        reclaimed
    }

    /// Grow the table to `new_size` slots; caches are rebuilt at
    /// `cache_size` entries if given, otherwise cleared.
    pub(crate) fn grow(&mut self, new_size: usize, cache_size: Option<usize>) {
        debug!("resize: {} -> {} (cache {:?})", self.table.capacity(), new_size, cache_size);
        self.table.grow(new_size);
        match cache_size {
            Some(size) => self.caches = crate::cache::Caches::new(size),
            None => self.caches.clear(),
        }
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::registry::Registry;
    use crate::types::Var;

    fn plan() -> MarkPlan {
        MarkPlan { threshold: usize::MAX, threads: 1 }
    }

    #[test]
    fn test_collect_remaps_handles() {
        let mut store = Store::new(64, 16, false);
        let registry = Registry::new();

        let x: Vec<Ref> = (0..4).map(|i| store.literal(Var::new(i), true).unwrap()).collect();
        let dead = store.and(x[0], x[1]).unwrap();
        let live = store.or(x[2], x[3]).unwrap();
        let count = store.sat_count(live, 4);

        let dead_cell = registry.register(dead);
        dead_cell.revoke();
        let live_cell = registry.register(live);

        let reclaimed = store.collect(&registry.snapshot(), plan());
        assert!(reclaimed > 0);

        let live = live_cell.get().unwrap();
        assert_eq!(store.sat_count(live, 4), count);
        // Only `x2 ∨ x3` survives: its root and the `x3` literal.
        assert_eq!(store.table.size(), 2 + 2);
    }

    #[test]
    fn test_parallel_marking() {
        let mut store = Store::new(1 << 10, 16, false);
        let registry = Registry::new();
        let x: Vec<Ref> = (0..8).map(|i| store.literal(Var::new(i), true).unwrap()).collect();

        let mut cells = Vec::new();
        for i in 0..7 {
            let f = store.and(x[i], x[i + 1]).unwrap();
            cells.push((registry.register(f), store.path_count(f)));
        }
        let plan = MarkPlan { threshold: 2, threads: 4 };
        store.collect(&registry.snapshot(), plan);

        for (cell, count) in &cells {
            assert_eq!(&store.path_count(cell.get().unwrap()), count);
        }
        assert!(store.table.check_integrity().is_ok());
    }

    #[test]
    fn test_grow_keeps_functions() {
        let mut store = Store::new(16, 4, false);
        let a = store.literal(Var::new(0), true).unwrap();
        let b = store.literal(Var::new(1), true).unwrap();
        let f = store.and(a, b).unwrap();
        store.grow(64, Some(32));
        assert_eq!(store.table.capacity(), 64);
        assert_eq!(store.caches.capacity(), 32);
        assert_eq!(store.and(a, b).unwrap(), f);
    }

    #[test]
    fn test_threads_for() {
        let plan = MarkPlan { threshold: 10, threads: 3 };
        assert_eq!(plan.threads_for(5), 1);
        assert_eq!(plan.threads_for(100), 3);
        let plan = MarkPlan { threshold: 0, threads: 8 };
        assert_eq!(plan.threads_for(1), 1);
        assert_eq!(plan.threads_for(4), 4);
    }
}
