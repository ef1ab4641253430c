//! Factory configuration.
//!
//! [`BddConfig`] fixes everything decided at construction time. The four
//! growth knobs (max increase, increase factor, cache ratio, min free nodes)
//! are copied into [`Knobs`], which the factory exposes through setters.
//! Knob updates are individually atomic but not mutually consistent; a
//! GC/resize decision may observe a mix of old and new values.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Construction-time configuration of a [`BddFactory`][crate::factory::BddFactory].
#[derive(Debug, Clone)]
pub struct BddConfig {
    /// Initial number of node slots (terminals included).
    pub table_size: usize,
    /// Initial number of entries in each computation cache.
    pub cache_size: usize,
    /// Variables `0..preallocated_vars` get both literal nodes eagerly.
    /// These nodes are never collected.
    pub preallocated_vars: u32,
    /// Upper bound on the number of slots added by one resize.
    pub max_increase: usize,
    /// Multiplicative growth of the table on resize.
    pub increase_factor: f64,
    /// Node slots per cache entry after a resize; `0` keeps cache sizes fixed.
    pub cache_ratio: f64,
    /// Minimal fraction of free slots after a GC; below it the table grows.
    pub min_free_nodes: f64,
    /// Number of live handles from which marking runs in parallel.
    pub parallel_mark_threshold: usize,
    /// Marking threads; `0` uses the available parallelism.
    pub mark_threads: usize,
    /// Validate a per-node checksum on every node access.
    pub verify_checksums: bool,
}

impl Default for BddConfig {
    fn default() -> Self {
        Self {
            table_size: 1 << 16,
            cache_size: 1 << 14,
            preallocated_vars: 16,
            max_increase: 1 << 20,
            increase_factor: 2.0,
            cache_ratio: 4.0,
            min_free_nodes: 0.2,
            parallel_mark_threshold: 4096,
            mark_threads: 0,
            verify_checksums: false,
        }
    }
}

impl BddConfig {
    pub fn with_table_size(mut self, table_size: usize) -> Self {
        self.table_size = table_size;
        self
    }
    pub fn with_cache_size(mut self, cache_size: usize) -> Self {
        self.cache_size = cache_size;
        self
    }
    pub fn with_preallocated_vars(mut self, count: u32) -> Self {
        self.preallocated_vars = count;
        self
    }
    pub fn with_max_increase(mut self, max_increase: usize) -> Self {
        self.max_increase = max_increase;
        self
    }
    pub fn with_increase_factor(mut self, factor: f64) -> Self {
        self.increase_factor = factor;
        self
    }
    pub fn with_cache_ratio(mut self, ratio: f64) -> Self {
        self.cache_ratio = ratio;
        self
    }
    pub fn with_min_free_nodes(mut self, ratio: f64) -> Self {
        self.min_free_nodes = ratio;
        self
    }
    pub fn with_parallel_mark_threshold(mut self, threshold: usize) -> Self {
        self.parallel_mark_threshold = threshold;
        self
    }
    pub fn with_mark_threads(mut self, threads: usize) -> Self {
        self.mark_threads = threads;
        self
    }
    pub fn with_checksums(mut self, verify: bool) -> Self {
        self.verify_checksums = verify;
        self
    }
}

/// An `f64` stored as its bit pattern.
#[derive(Debug)]
struct AtomicF64(AtomicU64);

impl AtomicF64 {
    fn new(value: f64) -> Self {
        Self(AtomicU64::new(value.to_bits()))
    }
    fn load(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }
    fn swap(&self, value: f64) -> f64 {
        f64::from_bits(self.0.swap(value.to_bits(), Ordering::Relaxed))
    }
}

/// Growth knobs adjustable while the factory is in use.
#[derive(Debug)]
pub(crate) struct Knobs {
    max_increase: AtomicUsize,
    increase_factor: AtomicF64,
    cache_ratio: AtomicF64,
    min_free_nodes: AtomicF64,
}

impl Knobs {
    pub fn new(config: &BddConfig) -> Self {
        Self {
            max_increase: AtomicUsize::new(config.max_increase),
            increase_factor: AtomicF64::new(config.increase_factor),
            cache_ratio: AtomicF64::new(config.cache_ratio),
            min_free_nodes: AtomicF64::new(config.min_free_nodes),
        }
    }

    pub fn max_increase(&self) -> usize {
        self.max_increase.load(Ordering::Relaxed)
    }
    pub fn increase_factor(&self) -> f64 {
        self.increase_factor.load()
    }
    pub fn cache_ratio(&self) -> f64 {
        self.cache_ratio.load()
    }
    pub fn min_free_nodes(&self) -> f64 {
        self.min_free_nodes.load()
    }

    pub fn set_max_increase(&self, value: usize) -> usize {
        self.max_increase.swap(value, Ordering::Relaxed)
    }
    pub fn set_increase_factor(&self, value: f64) -> f64 {
        self.increase_factor.swap(value)
    }
    pub fn set_cache_ratio(&self, value: f64) -> f64 {
        self.cache_ratio.swap(value)
    }
    pub fn set_min_free_nodes(&self, value: f64) -> f64 {
        self.min_free_nodes.swap(value)
    }

    /// Table size after one resize step from `old`.
    ///
    /// `min(old * factor, old + max_increase)`, and always at least one
    /// slot more than `old`.
    pub fn grown_size(&self, old: usize) -> usize {
        let factor = self.increase_factor().max(1.0);
        let scaled = (old as f64 * factor) as usize;
        let capped = scaled.min(old.saturating_add(self.max_increase()));
        capped.max(old + 1)
    }

    /// Cache size matching a table of `table_size` slots, if caches scale.
    pub fn cache_size_for(&self, table_size: usize) -> Option<usize> {
        let ratio = self.cache_ratio();
        if ratio > 0.0 {
            Some(((table_size as f64 / ratio) as usize).max(1))
        } else {
            None
        }
    }
}
