//! Direct-mapped computation caches.
//!
//! Each key hashes to exactly one entry; collisions overwrite. Entries are
//! guarded individually, so lookups and inserts from different threads only
//! contend when they land on the same entry. A poisoned entry is simply
//! reused: a cache holds no invariant a panic could break.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::apply::Operator;
use crate::reference::Ref;
use crate::types::Var;
use crate::utils::{mix64, pairing2, pairing3, MyHash};

pub struct Cache<K> {
    entries: Vec<Mutex<Option<(K, Ref)>>>,
    bitmask: u64,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl<K> Cache<K>
where
    K: MyHash + Copy + Eq,
{
    /// Create a cache with at least `size` entries, rounded up to a power of two.
    pub fn new(size: usize) -> Self {
        let size = size.clamp(1, 1 << 31).next_power_of_two();
        Self {
            entries: (0..size).map(|_| Mutex::new(None)).collect(),
            bitmask: (size - 1) as u64,
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
        }
    }

    /// Get the number of entries.
    pub fn capacity(&self) -> usize {
        self.entries.len()
    }
    /// Get the number of cache hits.
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::Relaxed)
    }
    /// Get the number of cache misses.
    pub fn misses(&self) -> usize {
        self.misses.load(Ordering::Relaxed)
    }

    fn index(&self, key: &K) -> usize {
        (mix64(key.hash()) & self.bitmask) as usize
    }

    /// Get the cached result.
    pub fn get(&self, key: &K) -> Option<Ref> {
        let entry = self.entries[self.index(key)]
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match *entry {
            Some((k, value)) if k == *key => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(value)
            }
            _ => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Insert a result into the cache.
    pub fn insert(&self, key: K, value: Ref) {
        let mut entry = self.entries[self.index(&key)]
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *entry = Some((key, value));
    }

    /// Reset the cache.
    pub fn clear(&mut self) {
        for entry in &mut self.entries {
            *entry.get_mut().unwrap_or_else(PoisonError::into_inner) = None;
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ApplyKey {
    pub op: Operator,
    pub a: Ref,
    pub b: Ref,
}

impl ApplyKey {
    /// Key with commutative operands put in a canonical order.
    pub fn new(op: Operator, a: Ref, b: Ref) -> Self {
        if op.is_commutative() && b < a {
            Self { op, a: b, b: a }
        } else {
            Self { op, a, b }
        }
    }
}

impl MyHash for ApplyKey {
    fn hash(&self) -> u64 {
        pairing3(self.op as u64, self.a.raw() as u64, self.b.raw() as u64)
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct IteKey {
    pub f: Ref,
    pub g: Ref,
    pub h: Ref,
}

impl MyHash for IteKey {
    fn hash(&self) -> u64 {
        pairing3(self.f.raw() as u64, self.g.raw() as u64, self.h.raw() as u64)
    }
}

/// Quantifier key; `op` is [`Operator::Or`] for ∃ and [`Operator::And`] for ∀.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct QuantKey {
    pub op: Operator,
    pub f: Ref,
    pub cube: Ref,
}

impl MyHash for QuantKey {
    fn hash(&self) -> u64 {
        pairing3(self.op as u64, self.f.raw() as u64, self.cube.raw() as u64)
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct RelProdKey {
    pub f: Ref,
    pub g: Ref,
    pub cube: Ref,
}

impl MyHash for RelProdKey {
    fn hash(&self) -> u64 {
        pairing3(self.f.raw() as u64, self.g.raw() as u64, self.cube.raw() as u64)
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct RestrictKey {
    pub f: Ref,
    pub var: Var,
    pub value: bool,
}

impl MyHash for RestrictKey {
    fn hash(&self) -> u64 {
        pairing3(self.f.raw() as u64, self.var.index() as u64, self.value as u64)
    }
}

/// Replacement key; `pairing` is the id of the [`Pairing`][crate::subst::Pairing].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ReplaceKey {
    pub f: Ref,
    pub pairing: u64,
}

impl MyHash for ReplaceKey {
    fn hash(&self) -> u64 {
        pairing2(self.f.raw() as u64, self.pairing)
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ComposeKey {
    pub f: Ref,
    pub g: Ref,
    pub var: Var,
}

impl MyHash for ComposeKey {
    fn hash(&self) -> u64 {
        pairing3(self.f.raw() as u64, self.g.raw() as u64, self.var.index() as u64)
    }
}

/// Every computation cache of a factory.
pub struct Caches {
    pub apply: Cache<ApplyKey>,
    pub ite: Cache<IteKey>,
    pub quant: Cache<QuantKey>,
    pub rel_prod: Cache<RelProdKey>,
    pub restrict: Cache<RestrictKey>,
    pub replace: Cache<ReplaceKey>,
    pub compose: Cache<ComposeKey>,
}

impl Caches {
    pub fn new(size: usize) -> Self {
        Self {
            apply: Cache::new(size),
            ite: Cache::new(size),
            quant: Cache::new(size),
            rel_prod: Cache::new(size),
            restrict: Cache::new(size),
            replace: Cache::new(size),
            compose: Cache::new(size),
        }
    }

    /// Size of each cache.
    pub fn capacity(&self) -> usize {
        self.apply.capacity()
    }

    /// Hits summed over every cache.
    pub fn hits(&self) -> usize {
        self.apply.hits()
            + self.ite.hits()
            + self.quant.hits()
            + self.rel_prod.hits()
            + self.restrict.hits()
            + self.replace.hits()
            + self.compose.hits()
    }

    /// Misses summed over every cache.
    pub fn misses(&self) -> usize {
        self.apply.misses()
            + self.ite.misses()
            + self.quant.misses()
            + self.rel_prod.misses()
            + self.restrict.misses()
            + self.replace.misses()
            + self.compose.misses()
    }

    pub fn clear(&mut self) {
        self.apply.clear();
        self.ite.clear();
        self.quant.clear();
        self.rel_prod.clear();
        self.restrict.clear();
        self.replace.clear();
        self.compose.clear();
    }
}
