//! Quantification and the relational product.
//!
//! Variable sets are passed as positive cubes (see [`Store::make_set`]):
//! the set's members are the variables along the cube's `high` spine.

use std::cmp::min;

use log::debug;

use crate::apply::Operator;
use crate::cache::{QuantKey, RelProdKey};
use crate::error::OpResult;
use crate::reference::Ref;
use crate::store::Store;
use crate::types::Var;

impl Store {
    /// `∃v. f`
    pub fn exist_var(&self, f: Ref, v: Var) -> OpResult {
        let f0 = self.restrict(f, v, false)?;
        let f1 = self.restrict(f, v, true)?;
        self.apply(Operator::Or, f0, f1)
    }

    /// `∀v. f`
    pub fn for_all_var(&self, f: Ref, v: Var) -> OpResult {
        let f0 = self.restrict(f, v, false)?;
        let f1 = self.restrict(f, v, true)?;
        self.apply(Operator::And, f0, f1)
    }

    /// Drop the members of `cube` that are above `v`.
    fn skip_cube(&self, mut cube: Ref, v: Var) -> Ref {
        while !cube.is_terminal() && self.variable(cube) < v {
            cube = self.high(cube);
        }
        cube
    }

    /// `∃cube. f` for `op = Or`, `∀cube. f` for `op = And`.
    pub fn quantify(&self, op: Operator, f: Ref, cube: Ref) -> OpResult {
        debug_assert!(matches!(op, Operator::Or | Operator::And));

        if f.is_terminal() || cube.is_terminal() {
            return Ok(f);
        }
        let v = self.variable(f);
        let cube = self.skip_cube(cube, v);
        if cube.is_terminal() {
            return Ok(f);
        }

        let key = QuantKey { op, f, cube };
        if let Some(res) = self.caches.quant.get(&key) {
            debug!("cache: quantify{:?} -> {}", key, res);
            return Ok(res);
        }

        let node = self.node(f);
        let res = if self.variable(cube) == v {
            let rest = self.high(cube);
            let low = self.quantify(op, node.low, rest)?;
            let high = self.quantify(op, node.high, rest)?;
            self.apply(op, low, high)?
        } else {
            let low = self.quantify(op, node.low, cube)?;
            let high = self.quantify(op, node.high, cube)?;
            self.mk(v, low, high)?
        };

        self.caches.quant.insert(key, res);
        Ok(res)
    }

    /// `∃cube. f ∧ g` without building the conjunction first.
    pub fn rel_prod(&self, f: Ref, g: Ref, cube: Ref) -> OpResult {
        if f.is_zero() || g.is_zero() {
            return Ok(Ref::ZERO);
        }
        if f.is_one() && g.is_one() {
            return Ok(Ref::ONE);
        }
        if cube.is_terminal() {
            return self.and(f, g);
        }
        if f.is_one() || f == g {
            return self.quantify(Operator::Or, g, cube);
        }
        if g.is_one() {
            return self.quantify(Operator::Or, f, cube);
        }

        let m = min(self.variable(f), self.variable(g));
        let cube = self.skip_cube(cube, m);
        if cube.is_terminal() {
            return self.and(f, g);
        }

        let (f, g) = if g < f { (g, f) } else { (f, g) };
        let key = RelProdKey { f, g, cube };
        if let Some(res) = self.caches.rel_prod.get(&key) {
            debug!("cache: rel_prod{:?} -> {}", key, res);
            return Ok(res);
        }

        let (f0, f1) = self.top_cofactors(f, m);
        let (g0, g1) = self.top_cofactors(g, m);

        let res = if self.variable(cube) == m {
            let rest = self.high(cube);
            let low = self.rel_prod(f0, g0, rest)?;
            if low.is_one() {
                Ref::ONE
            } else {
                let high = self.rel_prod(f1, g1, rest)?;
                self.or(low, high)?
            }
        } else {
            let low = self.rel_prod(f0, g0, cube)?;
            let high = self.rel_prod(f1, g1, cube)?;
            self.mk(m, low, high)?
        };

        self.caches.rel_prod.insert(key, res);
        Ok(res)
    }
}
