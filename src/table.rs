//! Hash-consed node arena shared between threads.
//!
//! The table is a flat array of slots addressed by [`Ref`] plus a separate
//! index of bucket heads; every bucket is an intrusive chain linked through
//! the slots' `next` fields.
//!
//! # Concurrency
//!
//! All slot fields are atomics, so a `&UniqueTable` can be shared freely:
//!
//! - lookups walk a chain without locking (optimistic read);
//! - an insert takes the bucket's lock from a fixed pool, walks the chain
//!   again, claims a slot from the bump allocator, fills it, and publishes
//!   it with a release store of the bucket head;
//! - everything that moves slots (compaction, growth, index rebuild) takes
//!   `&mut self`, which the factory only hands out under its exclusive lock.
//!
//! Slots are allocated by bumping `next_free`. Children are always created
//! before their parents, so a child's id is smaller than its parent's; the
//! collector relies on this to compact in a single forward pass.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::error::{Abort, BddError, OpResult};
use crate::node::Node;
use crate::reference::Ref;
use crate::types::Var;
use crate::utils::MyHash;

/// Empty chain link.
const NIL: u32 = u32::MAX;

/// Number of bucket locks; buckets share locks modulo this size.
const LOCK_POOL_SIZE: usize = 1024;

/// Largest table the `u32` id space can address.
pub const MAX_CAPACITY: usize = (u32::MAX - 1) as usize;

#[derive(Debug)]
struct Slot {
    variable: AtomicU32,
    low: AtomicU32,
    high: AtomicU32,
    next: AtomicU32,
    checksum: AtomicU32,
}

impl Default for Slot {
    fn default() -> Self {
        Self {
            variable: AtomicU32::new(Var::TERMINAL.index()),
            low: AtomicU32::new(NIL),
            high: AtomicU32::new(NIL),
            next: AtomicU32::new(NIL),
            checksum: AtomicU32::new(0),
        }
    }
}

impl Slot {
    fn load(&self) -> Node {
        Node::new(
            Var::from_raw(self.variable.load(Ordering::Relaxed)),
            Ref::new(self.low.load(Ordering::Relaxed)),
            Ref::new(self.high.load(Ordering::Relaxed)),
        )
    }

    fn store(&self, node: &Node) {
        self.variable.store(node.variable.index(), Ordering::Relaxed);
        self.low.store(node.low.raw(), Ordering::Relaxed);
        self.high.store(node.high.raw(), Ordering::Relaxed);
        self.checksum.store(node.checksum(), Ordering::Relaxed);
    }

    fn load_mut(&mut self) -> Node {
        Node::new(
            Var::from_raw(*self.variable.get_mut()),
            Ref::new(*self.low.get_mut()),
            Ref::new(*self.high.get_mut()),
        )
    }

    fn store_mut(&mut self, node: &Node) {
        *self.variable.get_mut() = node.variable.index();
        *self.low.get_mut() = node.low.raw();
        *self.high.get_mut() = node.high.raw();
        *self.checksum.get_mut() = node.checksum();
    }
}

/// Mark bits used by the collector, one per slot.
pub(crate) type Marks = Vec<AtomicBool>;

pub struct UniqueTable {
    slots: Vec<Slot>,

    buckets: Vec<AtomicU32>,
    bitmask: u64,
    locks: Vec<Mutex<()>>,

    /// Index of the first never-used slot.
    next_free: AtomicUsize,
    /// Slots below this index are never collected.
    permanent: usize,

    verify_checksums: bool,
}

impl UniqueTable {
    /// Create a table with room for `capacity` nodes, terminals included.
    pub fn new(capacity: usize, verify_checksums: bool) -> Self {
        let capacity = capacity.clamp(3, MAX_CAPACITY);

        let mut slots: Vec<Slot> = Vec::with_capacity(capacity);
        slots.resize_with(capacity, Slot::default);
        for slot in &mut slots[..2] {
            slot.store_mut(&Node::terminal());
        }

        let mut table = Self {
            slots,
            buckets: Vec::new(),
            bitmask: 0,
            locks: (0..LOCK_POOL_SIZE).map(|_| Mutex::new(())).collect(),
            next_free: AtomicUsize::new(2),
            permanent: 2,
            verify_checksums,
        };
        table.rebuild_index();
        table
    }

    /// Get the number of slots.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
    /// Get the number of used slots, terminals included.
    pub fn size(&self) -> usize {
        self.next_free.load(Ordering::Relaxed)
    }
    /// Get the number of unused slots.
    pub fn free(&self) -> usize {
        self.capacity() - self.size()
    }

    /// Eagerly create both literal nodes of variables `0..count` and make
    /// them permanent, growing the table if they do not fit.
    pub(crate) fn preallocate(&mut self, count: u32) {
        let needed = self.size() + 2 * count as usize + 1;
        if needed > self.capacity() {
            self.grow(needed);
        }
        for index in 0..count {
            let var = Var::new(index);
            self.insert_mut(Node::new(var, Ref::ZERO, Ref::ONE));
            self.insert_mut(Node::new(var, Ref::ONE, Ref::ZERO));
        }
        self.permanent = self.size();
    }

    /// Get the node stored at `id`.
    ///
    /// # Panics
    ///
    /// With checksums enabled, panics with [`BddError::CorruptedNode`] if the
    /// slot does not match its checksum.
    pub fn node(&self, id: Ref) -> Node {
        let slot = &self.slots[id.index()];
        let node = slot.load();
        if self.verify_checksums && slot.checksum.load(Ordering::Relaxed) != node.checksum() {
            panic!("{}", BddError::CorruptedNode { id });
        }
        node
    }

    pub fn variable(&self, id: Ref) -> Var {
        self.node(id).variable
    }
    pub fn high(&self, id: Ref) -> Ref {
        self.node(id).high
    }

    fn bucket_index(&self, node: &Node) -> usize {
        (node.hash() & self.bitmask) as usize
    }

    fn find_in_chain(&self, mut index: u32, node: &Node) -> Option<Ref> {
        while index != NIL {
            let slot = &self.slots[index as usize];
            if slot.load() == *node {
                return Some(Ref::new(index));
            }
            index = slot.next.load(Ordering::Relaxed);
        }
        None
    }

    fn claim_slot(&self) -> Option<usize> {
        let capacity = self.capacity();
        self.next_free
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| (n < capacity).then_some(n + 1))
            .ok()
    }

    /// Return the id of the node `(variable, low, high)`, inserting it if it
    /// does not exist yet.
    ///
    /// The caller guarantees `low != high`. Returns [`Abort::TableFull`] when
    /// no slot is left; the table is left unchanged in that case.
    pub fn get(&self, variable: Var, low: Ref, high: Ref) -> OpResult {
        debug_assert_ne!(low, high, "reduction is the caller's responsibility");
        debug_assert!(variable < self.variable(low) && variable < self.variable(high));

        let node = Node::new(variable, low, high);
        let bucket = self.bucket_index(&node);

        let head = self.buckets[bucket].load(Ordering::Acquire);
        if let Some(id) = self.find_in_chain(head, &node) {
            return Ok(id);
        }

        let _guard = self.locks[bucket % LOCK_POOL_SIZE]
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        // Someone may have won the race while we were waiting.
        let current = self.buckets[bucket].load(Ordering::Acquire);
        if current != head {
            if let Some(id) = self.find_in_chain(current, &node) {
                return Ok(id);
            }
        }

        let index = self.claim_slot().ok_or(Abort::TableFull)?;
        let slot = &self.slots[index];
        slot.store(&node);
        slot.next.store(current, Ordering::Relaxed);
        self.buckets[bucket].store(index as u32, Ordering::Release);

        Ok(Ref::new(index as u32))
    }

    /// Single-threaded insert used while the table is exclusively owned.
    fn insert_mut(&mut self, node: Node) -> Ref {
        let bucket = self.bucket_index(&node);
        let head = *self.buckets[bucket].get_mut();
        if let Some(id) = self.find_in_chain(head, &node) {
            return id;
        }
        let index = *self.next_free.get_mut();
        assert!(index < self.capacity(), "Node table is full");
        *self.next_free.get_mut() = index + 1;
        let slot = &mut self.slots[index];
        slot.store_mut(&node);
        *slot.next.get_mut() = head;
        *self.buckets[bucket].get_mut() = index as u32;
        Ref::new(index as u32)
    }

    /// Rebuild every bucket chain from the used slots.
    fn rebuild_index(&mut self) {
        let buckets_size = self.capacity().next_power_of_two();
        self.buckets = (0..buckets_size).map(|_| AtomicU32::new(NIL)).collect();
        self.bitmask = (buckets_size - 1) as u64;

        for index in 2..*self.next_free.get_mut() {
            let node = self.slots[index].load_mut();
            let bucket = self.bucket_index(&node);
            let head = self.buckets[bucket].get_mut();
            *self.slots[index].next.get_mut() = *head;
            *head = index as u32;
        }
    }

    /// Grow the table to `new_capacity` slots, keeping every id.
    pub(crate) fn grow(&mut self, new_capacity: usize) {
        assert!(
            new_capacity <= MAX_CAPACITY,
            "Node table exhausted: {} slots requested",
            new_capacity
        );
        if new_capacity <= self.capacity() {
            return;
        }
        self.slots.resize_with(new_capacity, Slot::default);
        self.rebuild_index();
    }

    /// Fresh, all-clear mark bits for the used region.
    pub(crate) fn new_marks(&self) -> Marks {
        (0..self.size()).map(|_| AtomicBool::new(false)).collect()
    }

    /// Mark every node reachable from `root`.
    ///
    /// Safe to run from several threads over the same marks.
    pub(crate) fn mark(&self, root: Ref, marks: &[AtomicBool]) {
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if id.index() < self.permanent || marks[id.index()].swap(true, Ordering::Relaxed) {
                // Permanent nodes have only permanent descendants.
                continue;
            }
            let node = self.node(id);
            stack.push(node.low);
            stack.push(node.high);
        }
    }

    /// Slide every marked (or permanent) slot down to the lowest free id,
    /// preserving relative order, and rebuild the index.
    ///
    /// Returns the old→new id map; unmarked ids map to [`Ref::INVALID`].
    pub(crate) fn compact(&mut self, marks: &mut [AtomicBool]) -> Vec<Ref> {
        let size = *self.next_free.get_mut();
        let mut remap = vec![Ref::INVALID; size];
        let mut next = 0;

        for index in 0..size {
            let keep = index < self.permanent || *marks[index].get_mut();
            if !keep {
                continue;
            }
            let mut node = self.slots[index].load_mut();
            if index >= 2 {
                node.low = remap[node.low.index()];
                node.high = remap[node.high.index()];
                debug_assert!(node.low.is_valid() && node.high.is_valid());
            }
            self.slots[next].store_mut(&node);
            remap[index] = Ref::new(next as u32);
            next += 1;
        }

        for slot in &mut self.slots[next..size] {
            *slot = Slot::default();
        }
        *self.next_free.get_mut() = next;
        self.rebuild_index();

        remap
    }

    /// Scan every used slot and report the first checksum mismatch.
    pub fn check_integrity(&self) -> Result<(), BddError> {
        for index in 0..self.size() {
            let slot = &self.slots[index];
            if slot.checksum.load(Ordering::Relaxed) != slot.load().checksum() {
                return Err(BddError::CorruptedNode {
                    id: Ref::new(index as u32),
                });
            }
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn corrupt(&self, id: Ref) {
        let slot = &self.slots[id.index()];
        slot.low.fetch_xor(1, Ordering::Relaxed);
    }
}
