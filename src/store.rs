//! The node table together with its computation caches.
//!
//! Every recursive operation is a method on [`Store`] taking `&self`; the
//! factory holds a shared guard on the store for the whole recursion, so
//! ids seen by an operation stay valid until it returns.

use log::debug;

use crate::cache::Caches;
use crate::error::OpResult;
use crate::node::Node;
use crate::reference::Ref;
use crate::table::UniqueTable;
use crate::types::Var;

pub struct Store {
    pub table: UniqueTable,
    pub caches: Caches,
}

impl Store {
    pub fn new(table_size: usize, cache_size: usize, verify_checksums: bool) -> Self {
        Self {
            table: UniqueTable::new(table_size, verify_checksums),
            caches: Caches::new(cache_size),
        }
    }

    pub fn node(&self, id: Ref) -> Node {
        self.table.node(id)
    }
    pub fn variable(&self, id: Ref) -> Var {
        self.table.variable(id)
    }
    pub fn high(&self, id: Ref) -> Ref {
        self.table.high(id)
    }

    /// Reduced node constructor.
    pub fn mk(&self, v: Var, low: Ref, high: Ref) -> OpResult {
        if low == high {
            debug!("mk: duplicates {} == {}", low, high);
            return Ok(low);
        }
        self.table.get(v, low, high)
    }

    /// Literal node `v` (or `¬v` if not `positive`).
    pub fn literal(&self, v: Var, positive: bool) -> OpResult {
        if positive {
            self.mk(v, Ref::ZERO, Ref::ONE)
        } else {
            self.mk(v, Ref::ONE, Ref::ZERO)
        }
    }

    /// Cofactors of `f` with respect to `v`, where `v` is not below `f`'s top
    /// variable.
    pub fn top_cofactors(&self, f: Ref, v: Var) -> (Ref, Ref) {
        let node = self.node(f);
        if node.variable == v {
            (node.low, node.high)
        } else {
            debug_assert!(v < node.variable);
            (f, f)
        }
    }

    /// Conjunction of positive literals over `vars`, built bottom-up.
    pub fn make_set(&self, vars: &[Var]) -> OpResult {
        let mut vars = vars.to_vec();
        vars.sort_unstable();
        vars.dedup();
        let mut res = Ref::ONE;
        for &v in vars.iter().rev() {
            res = self.mk(v, Ref::ZERO, res)?;
        }
        Ok(res)
    }

    /// Conjunction of the given literals; `false` if both polarities of a
    /// variable occur.
    pub fn cube(&self, lits: &[crate::types::Lit]) -> OpResult {
        let mut lits = lits.to_vec();
        lits.sort_unstable();
        lits.dedup();
        if lits.windows(2).any(|w| w[0].var() == w[1].var()) {
            debug!("cube: contradictory literals");
            return Ok(Ref::ZERO);
        }
        let mut res = Ref::ONE;
        for lit in lits.iter().rev() {
            res = if lit.is_positive() {
                self.mk(lit.var(), Ref::ZERO, res)?
            } else {
                self.mk(lit.var(), res, Ref::ZERO)?
            };
        }
        Ok(res)
    }
}
