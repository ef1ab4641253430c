//! The factory: owner of the node store, handle registry, and GC policy.
//!
//! Operations run under the shared side of an [`RwLock`] over the
//! [`Store`]; collections and resizes take the exclusive side. An operation
//! that runs out of slots aborts with [`Abort::TableFull`], releases its
//! guard, makes room (or waits for whoever is already making room), and
//! restarts from its operands' current ids.

use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use log::{debug, info};

use crate::apply::Operator;
use crate::bdd::Bdd;
use crate::config::{BddConfig, Knobs};
use crate::error::{Abort, BddError, OpResult};
use crate::gc::{GcEvent, GcListener, MarkPlan, ResizeEvent, ResizeListener, TableState};
use crate::reference::Ref;
use crate::registry::{HandleCell, Registry};
use crate::store::Store;
use crate::subst::Pairing;
use crate::types::{Lit, Var};

/// Frees between two checks of whether a collection is worthwhile.
const FREE_NUDGE_INTERVAL: usize = 1024;

/// Table load above which accumulated frees trigger a collection.
const NUDGE_LOAD: f64 = 0.9;

#[derive(Debug, Default)]
struct Stats {
    gc_count: usize,
    gc_time: Duration,
    resize_count: usize,
    resize_time: Duration,
}

#[derive(Default)]
struct Listeners {
    gc: Vec<Arc<dyn GcListener>>,
    resize: Vec<Arc<dyn ResizeListener>>,
}

/// State shared by a factory, its clones, and every handle it produced.
pub(crate) struct Shared {
    store: RwLock<Store>,
    pub(crate) registry: Registry,
    knobs: Knobs,
    plan: MarkPlan,

    /// Bumped by every collection/resize; ids seen in one epoch are stale
    /// in the next.
    epoch: AtomicU64,
    state: AtomicU8,
    closed: AtomicBool,
    pending_gc: AtomicBool,
    /// One past the largest variable ever created.
    var_num: AtomicU32,

    stats: Mutex<Stats>,
    listeners: Mutex<Listeners>,
}

impl Shared {
    pub(crate) fn read(&self) -> RwLockReadGuard<'_, Store> {
        self.store.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Store> {
        self.store.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub(crate) fn var_num(&self) -> u32 {
        self.var_num.load(Ordering::Relaxed)
    }

    fn bump_var_num(&self, v: Var) {
        self.var_num.fetch_max(v.index() + 1, Ordering::Relaxed);
    }

    /// Record a freed handle; may schedule a collection.
    pub(crate) fn note_free(&self) {
        if self.registry.note_free() % FREE_NUDGE_INTERVAL == 0 {
            self.pending_gc.store(true, Ordering::Relaxed);
        }
    }

    /// Run a scheduled collection if the table is nearly full.
    fn nudge(&self) {
        if !self.pending_gc.swap(false, Ordering::Relaxed) {
            return;
        }
        let (load, epoch) = {
            let store = self.read();
            let load = store.table.size() as f64 / store.table.capacity() as f64;
            (load, self.epoch.load(Ordering::Acquire))
        };
        if load > NUDGE_LOAD {
            debug!("nudge: table load {:.2}, collecting", load);
            self.make_room(epoch, false);
        }
    }

    /// Run `op` on the current ids of `operands` under a shared guard,
    /// retrying after a collection/resize whenever the table fills up.
    ///
    /// `finish` runs under the same guard as the successful attempt, so the
    /// produced id is still valid when it is stored into a handle.
    pub(crate) fn run<T>(
        &self,
        operands: &[&Bdd],
        op: impl Fn(&Store, &[Ref]) -> OpResult,
        finish: impl FnOnce(Ref) -> T,
    ) -> Result<T, BddError> {
        self.nudge();
        let mut attempt = 0;
        loop {
            let store = self.read();
            if self.is_closed() {
                return Err(BddError::FactoryClosed);
            }
            let epoch = self.epoch.load(Ordering::Acquire);
            let ids = self.load_ids(operands)?;

            match op(&store, &ids) {
                Ok(id) => return Ok(finish(id)),
                Err(Abort::Conflict(variable)) => {
                    return Err(BddError::ReplacementConflict { variable });
                }
                Err(Abort::TableFull) => {
                    drop(store);
                    debug!("table full (attempt {}), making room", attempt);
                    self.make_room(epoch, attempt > 0);
                    attempt += 1;
                }
            }
        }
    }

    /// Run a read-only query on the current ids of `operands`.
    pub(crate) fn query<T>(
        &self,
        operands: &[&Bdd],
        query: impl FnOnce(&Store, &[Ref]) -> T,
    ) -> Result<T, BddError> {
        let store = self.read();
        if self.is_closed() {
            return Err(BddError::FactoryClosed);
        }
        let ids = self.load_ids(operands)?;
        Ok(query(&store, &ids))
    }

    fn load_ids(&self, operands: &[&Bdd]) -> Result<Vec<Ref>, BddError> {
        operands
            .iter()
            .map(|bdd| {
                if !std::ptr::eq(bdd.shared(), self) {
                    return Err(BddError::ForeignHandle);
                }
                bdd.cell().get().ok_or(BddError::UseAfterFree)
            })
            .collect()
    }

    /// Build a new handle from `op`.
    pub(crate) fn build(
        self: &Arc<Self>,
        operands: &[&Bdd],
        op: impl Fn(&Store, &[Ref]) -> OpResult,
    ) -> Result<Bdd, BddError> {
        self.run(operands, op, |id| Bdd::new(Arc::clone(self), self.registry.register(id)))
    }

    /// Store the result of `op` into `target`'s cell.
    pub(crate) fn update(
        &self,
        target: &HandleCell,
        operands: &[&Bdd],
        op: impl Fn(&Store, &[Ref]) -> OpResult,
    ) -> Result<(), BddError> {
        self.run(operands, op, |id| target.set(id))
    }

    /// Collect (and grow, if forced or still short on space) unless someone
    /// else already did since `seen_epoch`.
    fn make_room(&self, seen_epoch: u64, force_resize: bool) {
        let mut store = self.write();
        if self.epoch.load(Ordering::Acquire) != seen_epoch {
            debug!("make_room: already done by another thread");
            return;
        }
        self.collect_locked(&mut store);
        let free_ratio = store.table.free() as f64 / store.table.capacity() as f64;
        if force_resize || free_ratio < self.knobs.min_free_nodes() {
            self.resize_locked(&mut store);
        }
    }

    fn set_state(&self, state: TableState) {
        self.state.store(state as u8, Ordering::Release);
    }

    fn collect_locked(&self, store: &mut Store) {
        self.set_state(TableState::Collecting);
        let listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner).gc.clone();

        let (seq, total) = {
            let stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
            (stats.gc_count + 1, stats.gc_time)
        };
        let mut event = GcEvent {
            seq,
            size: store.table.capacity(),
            free: store.table.free(),
            elapsed: None,
            total,
        };
        for listener in &listeners {
            listener.on_start(&event);
        }

        let start = Instant::now();
        let handles = self.registry.snapshot();
        let reclaimed = store.collect(&handles, self.plan);
        let elapsed = start.elapsed();

        let total = {
            let mut stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
            stats.gc_count = seq;
            stats.gc_time += elapsed;
            stats.gc_time
        };
        event.free = store.table.free();
        event.elapsed = Some(elapsed);
        event.total = total;
        info!(
            "gc #{}: reclaimed {} nodes, {}/{} free, {:?}",
            seq, reclaimed, event.free, event.size, elapsed
        );
        for listener in &listeners {
            listener.on_stop(&event);
        }

        self.epoch.fetch_add(1, Ordering::AcqRel);
        self.set_state(TableState::Idle);
    }

    fn resize_locked(&self, store: &mut Store) {
        self.set_state(TableState::Resizing);
        let listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner).resize.clone();

        let old_size = store.table.capacity();
        let new_size = self.knobs.grown_size(old_size);
        let (seq, total) = {
            let stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
            (stats.resize_count + 1, stats.resize_time)
        };
        let mut event = ResizeEvent {
            seq,
            old_size,
            new_size,
            elapsed: None,
            total,
        };
        for listener in &listeners {
            listener.on_start(&event);
        }

        let start = Instant::now();
        store.grow(new_size, self.knobs.cache_size_for(new_size));
        let elapsed = start.elapsed();

        let total = {
            let mut stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
            stats.resize_count = seq;
            stats.resize_time += elapsed;
            stats.resize_time
        };
        event.elapsed = Some(elapsed);
        event.total = total;
        info!("resize #{}: {} -> {} nodes, {:?}", seq, old_size, new_size, elapsed);
        for listener in &listeners {
            listener.on_stop(&event);
        }

        self.epoch.fetch_add(1, Ordering::AcqRel);
        self.set_state(TableState::Idle);
    }
}

/// A handle to a shared BDD node store.
///
/// Cloning the factory is cheap and yields another handle to the same store;
/// every [`Bdd`] produced by any clone can be combined with any other.
#[derive(Clone)]
pub struct BddFactory {
    shared: Arc<Shared>,
}

impl Debug for BddFactory {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let store = self.shared.read();
        f.debug_struct("BddFactory")
            .field("capacity", &store.table.capacity())
            .field("size", &store.table.size())
            .field("cache_size", &store.caches.capacity())
            .field("var_num", &self.var_num())
            .field("handles", &self.shared.registry.len())
            .finish()
    }
}

impl Default for BddFactory {
    fn default() -> Self {
        Self::with_config(BddConfig::default())
    }
}

impl BddFactory {
    /// Create a factory with `table_size` node slots and `cache_size`
    /// entries per computation cache.
    pub fn new(table_size: usize, cache_size: usize) -> Self {
        Self::with_config(BddConfig::default().with_table_size(table_size).with_cache_size(cache_size))
    }

    pub fn with_config(config: BddConfig) -> Self {
        debug!("BddFactory::with_config({:?})", config);
        let mut store = Store::new(config.table_size, config.cache_size, config.verify_checksums);
        store.table.preallocate(config.preallocated_vars);

        let shared = Shared {
            store: RwLock::new(store),
            registry: Registry::new(),
            knobs: Knobs::new(&config),
            plan: MarkPlan {
                threshold: config.parallel_mark_threshold,
                threads: config.mark_threads,
            },
            epoch: AtomicU64::new(0),
            state: AtomicU8::new(TableState::Idle as u8),
            closed: AtomicBool::new(false),
            pending_gc: AtomicBool::new(false),
            var_num: AtomicU32::new(0),
            stats: Mutex::new(Stats::default()),
            listeners: Mutex::new(Listeners::default()),
        };
        Self { shared: Arc::new(shared) }
    }

    fn constant(&self, value: bool) -> Bdd {
        // Terminals are never collected, so no retry is needed.
        let cell = self.shared.registry.register(Ref::constant(value));
        if self.shared.is_closed() {
            cell.revoke();
        }
        Bdd::new(Arc::clone(&self.shared), cell)
    }

    /// The constant `false`.
    pub fn zero(&self) -> Bdd {
        self.constant(false)
    }

    /// The constant `true`.
    pub fn one(&self) -> Bdd {
        self.constant(true)
    }

    /// The function `x_index`.
    pub fn var(&self, index: u32) -> Result<Bdd, BddError> {
        self.literal(Var::new(index).pos())
    }

    /// The function `¬x_index`.
    pub fn nvar(&self, index: u32) -> Result<Bdd, BddError> {
        self.literal(Var::new(index).neg())
    }

    pub fn literal(&self, lit: Lit) -> Result<Bdd, BddError> {
        self.shared.bump_var_num(lit.var());
        self.shared
            .build(&[], |store, _| store.literal(lit.var(), lit.is_positive()))
    }

    /// Conjunction of the given literals.
    pub fn cube(&self, lits: &[Lit]) -> Result<Bdd, BddError> {
        if let Some(max) = lits.iter().map(|l| l.var()).max() {
            self.shared.bump_var_num(max);
        }
        self.shared.build(&[], |store, _| store.cube(lits))
    }

    /// Variable set, for quantification and [`Bdd::sat_count_set`].
    pub fn make_set(&self, vars: &[Var]) -> Result<Bdd, BddError> {
        if let Some(&max) = vars.iter().max() {
            self.shared.bump_var_num(max);
        }
        self.shared.build(&[], |store, _| store.make_set(vars))
    }

    /// Renaming `source → target` for [`Bdd::replace`].
    pub fn pairing(&self, pairs: &[(Var, Var)]) -> Pairing {
        let pairing = Pairing::new(pairs);
        if let Some(max) = pairing.max_var() {
            self.shared.bump_var_num(max);
        }
        pairing
    }

    pub fn apply(&self, op: Operator, a: &Bdd, b: &Bdd) -> Result<Bdd, BddError> {
        self.shared.build(&[a, b], |store, ids| store.apply(op, ids[0], ids[1]))
    }

    fn fold(&self, op: Operator, unit: bool, fs: &[&Bdd]) -> Result<Bdd, BddError> {
        self.shared.build(fs, |store, ids| {
            ids.iter()
                .try_fold(Ref::constant(unit), |acc, &f| store.apply(op, acc, f))
        })
    }

    /// Conjunction of all `fs`; `true` if empty.
    pub fn and_all(&self, fs: &[&Bdd]) -> Result<Bdd, BddError> {
        self.fold(Operator::And, true, fs)
    }

    /// Disjunction of all `fs`; `false` if empty.
    pub fn or_all(&self, fs: &[&Bdd]) -> Result<Bdd, BddError> {
        self.fold(Operator::Or, false, fs)
    }

    pub fn set_max_increase(&self, value: usize) -> usize {
        self.shared.knobs.set_max_increase(value)
    }
    pub fn set_increase_factor(&self, value: f64) -> f64 {
        self.shared.knobs.set_increase_factor(value)
    }
    pub fn set_cache_ratio(&self, value: f64) -> f64 {
        self.shared.knobs.set_cache_ratio(value)
    }
    pub fn set_min_free_nodes(&self, value: f64) -> f64 {
        self.shared.knobs.set_min_free_nodes(value)
    }

    /// Run a collection now. Grows the table afterwards if it is still
    /// short on free slots.
    pub fn collect_garbage(&self) {
        let mut store = self.shared.write();
        self.shared.collect_locked(&mut store);
        let free_ratio = store.table.free() as f64 / store.table.capacity() as f64;
        if free_ratio < self.shared.knobs.min_free_nodes() {
            self.shared.resize_locked(&mut store);
        }
    }

    /// Grow the table by one step of the growth policy.
    pub fn resize_table(&self) {
        let mut store = self.shared.write();
        self.shared.resize_locked(&mut store);
    }

    pub fn add_gc_listener(&self, listener: Arc<dyn GcListener>) {
        self.shared
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .gc
            .push(listener);
    }

    pub fn add_resize_listener(&self, listener: Arc<dyn ResizeListener>) {
        self.shared
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .resize
            .push(listener);
    }

    /// Number of node slots.
    pub fn table_size(&self) -> usize {
        self.shared.read().table.capacity()
    }

    /// Number of used node slots, terminals included.
    pub fn node_num(&self) -> usize {
        self.shared.read().table.size()
    }

    /// Entries per computation cache.
    pub fn cache_size(&self) -> usize {
        self.shared.read().caches.capacity()
    }

    /// Cache hits since the caches were last rebuilt.
    pub fn cache_hits(&self) -> usize {
        self.shared.read().caches.hits()
    }

    /// Cache misses since the caches were last rebuilt.
    pub fn cache_misses(&self) -> usize {
        self.shared.read().caches.misses()
    }

    /// One past the largest variable created so far.
    pub fn var_num(&self) -> u32 {
        self.shared.var_num()
    }

    pub fn state(&self) -> TableState {
        TableState::from_u8(self.shared.state.load(Ordering::Acquire))
    }

    /// Number of collections run so far.
    pub fn gc_count(&self) -> usize {
        self.shared.stats.lock().unwrap_or_else(PoisonError::into_inner).gc_count
    }

    /// Number of resizes run so far.
    pub fn resize_count(&self) -> usize {
        self.shared.stats.lock().unwrap_or_else(PoisonError::into_inner).resize_count
    }

    /// Verify every node's checksum.
    pub fn check_integrity(&self) -> Result<(), BddError> {
        self.shared.read().table.check_integrity()
    }

    /// Shut the factory down: every handle is revoked and the caches are
    /// released. Clones of the factory fail with [`BddError::FactoryClosed`]
    /// from now on.
    pub fn done(self) {
        let mut store = self.shared.write();
        self.shared.closed.store(true, Ordering::Release);
        self.shared.registry.revoke_all();
        store.caches = crate::cache::Caches::new(1);
        debug!("BddFactory::done");
    }
}
