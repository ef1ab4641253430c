//! Client handles to boolean functions.
//!
//! A [`Bdd`] keeps its factory's store alive and is registered as a GC root
//! for as long as it exists. Its node id is owned by the collector: after a
//! compaction the handle silently points at the relocated node.

use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use log::trace;
use num_bigint::BigUint;

use crate::apply::Operator;
use crate::error::{Abort, BddError, OpResult};
use crate::factory::Shared;
use crate::reference::Ref;
use crate::registry::HandleCell;
use crate::store::Store;
use crate::subst::Pairing;
use crate::types::{Lit, Var};

pub struct Bdd {
    shared: Arc<Shared>,
    cell: Arc<HandleCell>,
}

impl Bdd {
    pub(crate) fn new(shared: Arc<Shared>, cell: Arc<HandleCell>) -> Self {
        Self { shared, cell }
    }

    pub(crate) fn shared(&self) -> &Shared {
        &self.shared
    }

    pub(crate) fn cell(&self) -> &HandleCell {
        &self.cell
    }

    /// Current node id. Only stable until the next collection.
    pub fn id(&self) -> Result<Ref, BddError> {
        self.shared.query(&[self], |_, ids| ids[0])
    }

    /// Release the handle. Any later use fails with [`BddError::UseAfterFree`].
    ///
    /// Dropping a handle has the same effect.
    pub fn free(&self) {
        if self.cell.revoke() {
            self.shared.note_free();
        }
    }

    pub fn is_freed(&self) -> bool {
        self.cell.get().is_none()
    }

    pub fn is_zero(&self) -> bool {
        self.cell.get() == Some(Ref::ZERO)
    }

    pub fn is_one(&self) -> bool {
        self.cell.get() == Some(Ref::ONE)
    }

    /// Top variable of the function.
    pub fn var(&self) -> Result<Var, BddError> {
        self.shared
            .query(&[self], |store, ids| {
                if ids[0].is_terminal() {
                    Err(BddError::TerminalNode)
                } else {
                    Ok(store.variable(ids[0]))
                }
            })
            .and_then(|res| res)
    }

    fn child(&self, high: bool) -> Result<Bdd, BddError> {
        if self.cell.get().is_some_and(|id| id.is_terminal()) {
            return Err(BddError::TerminalNode);
        }
        self.shared.build(&[self], |store, ids| {
            let node = store.node(ids[0]);
            Ok(if high { node.high } else { node.low })
        })
    }

    /// Cofactor along the `false` edge of the top variable.
    pub fn low(&self) -> Result<Bdd, BddError> {
        self.child(false)
    }

    /// Cofactor along the `true` edge of the top variable.
    pub fn high(&self) -> Result<Bdd, BddError> {
        self.child(true)
    }

    pub fn apply(&self, other: &Bdd, op: Operator) -> Result<Bdd, BddError> {
        trace!("apply({:?})", op);
        self.shared
            .build(&[self, other], |store, ids| store.apply(op, ids[0], ids[1]))
    }

    /// Replace `self` by `self op other` and release `other`.
    pub fn apply_with(&mut self, other: Bdd, op: Operator) -> Result<(), BddError> {
        trace!("apply_with({:?})", op);
        let res = self
            .shared
            .update(&self.cell, &[&*self, &other], |store, ids| store.apply(op, ids[0], ids[1]));
        other.free();
        res
    }

    pub fn and(&self, other: &Bdd) -> Result<Bdd, BddError> {
        self.apply(other, Operator::And)
    }
    pub fn or(&self, other: &Bdd) -> Result<Bdd, BddError> {
        self.apply(other, Operator::Or)
    }
    pub fn xor(&self, other: &Bdd) -> Result<Bdd, BddError> {
        self.apply(other, Operator::Xor)
    }
    pub fn nand(&self, other: &Bdd) -> Result<Bdd, BddError> {
        self.apply(other, Operator::Nand)
    }
    pub fn nor(&self, other: &Bdd) -> Result<Bdd, BddError> {
        self.apply(other, Operator::Nor)
    }
    pub fn imp(&self, other: &Bdd) -> Result<Bdd, BddError> {
        self.apply(other, Operator::Imp)
    }
    pub fn biimp(&self, other: &Bdd) -> Result<Bdd, BddError> {
        self.apply(other, Operator::Biimp)
    }
    pub fn diff(&self, other: &Bdd) -> Result<Bdd, BddError> {
        self.apply(other, Operator::Diff)
    }

    pub fn not(&self) -> Result<Bdd, BddError> {
        trace!("not");
        self.shared.build(&[self], |store, ids| store.not(ids[0]))
    }

    pub fn and_with(&mut self, other: Bdd) -> Result<(), BddError> {
        self.apply_with(other, Operator::And)
    }
    pub fn or_with(&mut self, other: Bdd) -> Result<(), BddError> {
        self.apply_with(other, Operator::Or)
    }
    pub fn xor_with(&mut self, other: Bdd) -> Result<(), BddError> {
        self.apply_with(other, Operator::Xor)
    }
    pub fn nand_with(&mut self, other: Bdd) -> Result<(), BddError> {
        self.apply_with(other, Operator::Nand)
    }
    pub fn imp_with(&mut self, other: Bdd) -> Result<(), BddError> {
        self.apply_with(other, Operator::Imp)
    }
    pub fn biimp_with(&mut self, other: Bdd) -> Result<(), BddError> {
        self.apply_with(other, Operator::Biimp)
    }

    /// Replace `self` by `¬self`.
    pub fn not_with(&mut self) -> Result<(), BddError> {
        self.shared.update(&self.cell, &[&*self], |store, ids| store.not(ids[0]))
    }

    /// `if self then then_ else else_`
    pub fn ite(&self, then_: &Bdd, else_: &Bdd) -> Result<Bdd, BddError> {
        trace!("ite");
        self.shared
            .build(&[self, then_, else_], |store, ids| store.ite(ids[0], ids[1], ids[2]))
    }

    /// `∃var. self`
    pub fn exist(&self, var: Var) -> Result<Bdd, BddError> {
        trace!("exist({})", var);
        self.shared.build(&[self], |store, ids| store.exist_var(ids[0], var))
    }

    /// `∃vars. self`, with `vars` built by [`make_set`][crate::factory::BddFactory::make_set].
    pub fn exist_set(&self, vars: &Bdd) -> Result<Bdd, BddError> {
        trace!("exist_set");
        self.shared
            .build(&[self, vars], |store, ids| store.quantify(Operator::Or, ids[0], ids[1]))
    }

    /// `∀var. self`
    pub fn for_all(&self, var: Var) -> Result<Bdd, BddError> {
        trace!("for_all({})", var);
        self.shared.build(&[self], |store, ids| store.for_all_var(ids[0], var))
    }

    /// `∀vars. self`
    pub fn for_all_set(&self, vars: &Bdd) -> Result<Bdd, BddError> {
        trace!("for_all_set");
        self.shared
            .build(&[self, vars], |store, ids| store.quantify(Operator::And, ids[0], ids[1]))
    }

    /// `∃vars. self ∧ other`
    pub fn rel_prod(&self, other: &Bdd, vars: &Bdd) -> Result<Bdd, BddError> {
        trace!("rel_prod");
        self.shared
            .build(&[self, other, vars], |store, ids| store.rel_prod(ids[0], ids[1], ids[2]))
    }

    /// `self[var := value]`
    pub fn restrict(&self, var: Var, value: bool) -> Result<Bdd, BddError> {
        trace!("restrict({}, {})", var, value);
        self.shared
            .build(&[self], |store, ids| store.restrict(ids[0], var, value))
    }

    /// Rename variables according to `pairing`.
    ///
    /// Fails with [`BddError::ReplacementConflict`] if two distinct
    /// variables of the function would be merged.
    pub fn replace(&self, pairing: &Pairing) -> Result<Bdd, BddError> {
        trace!("replace({:?})", pairing.pairs());
        self.shared.build(&[self], |store, ids| replace(store, ids[0], pairing))
    }

    /// In-place [`replace`][Bdd::replace].
    pub fn replace_with(&mut self, pairing: &Pairing) -> Result<(), BddError> {
        trace!("replace_with({:?})", pairing.pairs());
        self.shared
            .update(&self.cell, &[&*self], |store, ids| replace(store, ids[0], pairing))
    }

    /// `self[var := g]`
    pub fn compose(&self, g: &Bdd, var: Var) -> Result<Bdd, BddError> {
        trace!("compose({})", var);
        self.shared
            .build(&[self, g], |store, ids| store.compose(ids[0], ids[1], var))
    }

    /// Number of satisfying assignments over every variable created so far.
    pub fn sat_count(&self) -> Result<BigUint, BddError> {
        let num_vars = self.shared.var_num();
        self.shared.query(&[self], |store, ids| store.sat_count(ids[0], num_vars))
    }

    /// Number of satisfying assignments over the variables `0..=max_var`.
    pub fn sat_count_max(&self, max_var: Var) -> Result<BigUint, BddError> {
        self.shared
            .query(&[self], |store, ids| store.sat_count(ids[0], max_var.index() + 1))
    }

    /// Number of satisfying assignments over the variables of `vars` only.
    ///
    /// The function is expected to depend on `vars` alone.
    pub fn sat_count_set(&self, vars: &Bdd) -> Result<BigUint, BddError> {
        let num_vars = self.shared.var_num();
        self.shared.query(&[self, vars], |store, ids| {
            let set_size = store.support(ids[1]).len() as u32;
            let total = store.sat_count(ids[0], num_vars);
            let num_vars = num_vars.max(store.support(ids[0]).last().map_or(0, |v| v.index() + 1));
            total >> (num_vars.saturating_sub(set_size))
        })
    }

    pub fn path_count(&self) -> Result<BigUint, BddError> {
        self.shared.query(&[self], |store, ids| store.path_count(ids[0]))
    }

    /// Number of non-terminal nodes.
    pub fn node_count(&self) -> Result<usize, BddError> {
        self.shared.query(&[self], |store, ids| store.node_count(ids[0]))
    }

    /// Node count per variable, indexed by variable.
    pub fn var_profile(&self) -> Result<Vec<usize>, BddError> {
        let num_vars = self.shared.var_num();
        self.shared
            .query(&[self], |store, ids| store.var_profile(ids[0], num_vars))
    }

    pub fn support(&self) -> Result<Vec<Var>, BddError> {
        self.shared.query(&[self], |store, ids| store.support(ids[0]))
    }

    /// One satisfying path, as the literals along it.
    pub fn any_sat(&self) -> Result<Vec<Lit>, BddError> {
        self.shared
            .query(&[self], |store, ids| store.any_sat(ids[0]))?
            .ok_or(BddError::Unsat)
    }

    /// Every satisfying path.
    pub fn all_sat(&self) -> Result<Vec<Vec<Lit>>, BddError> {
        self.shared.query(&[self], |store, ids| store.all_sat(ids[0]))
    }
}

/// Renaming with the merge check done up front on the support.
fn replace(store: &Store, f: Ref, pairing: &Pairing) -> OpResult {
    pairing.check(&store.support(f)).map_err(Abort::Conflict)?;
    store.replace(f, pairing)
}

impl Clone for Bdd {
    fn clone(&self) -> Self {
        let store = self.shared.read();
        let id = self.cell.get().unwrap_or(Ref::INVALID);
        let cell = self.shared.registry.register(id);
        drop(store);
        Self::new(Arc::clone(&self.shared), cell)
    }
}

impl Drop for Bdd {
    fn drop(&mut self) {
        self.free();
    }
}

impl PartialEq for Bdd {
    fn eq(&self, other: &Self) -> bool {
        if !Arc::ptr_eq(&self.shared, &other.shared) {
            return false;
        }
        let _store = self.shared.read();
        match (self.cell.get(), other.cell.get()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

impl Debug for Bdd {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.cell.get() {
            Some(id) => write!(f, "Bdd({})", id),
            None => write!(f, "Bdd(freed)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::factory::BddFactory;

    fn vars(factory: &BddFactory, n: u32) -> Vec<Bdd> {
        (0..n).map(|i| factory.var(i).unwrap()).collect()
    }

    #[test]
    fn test_var() {
        let factory = BddFactory::default();
        let x = factory.var(1).unwrap();
        assert_eq!(x.var().unwrap(), Var::new(1));
        assert!(x.high().unwrap().is_one());
        assert!(x.low().unwrap().is_zero());
    }

    #[test]
    fn test_not_var() {
        let factory = BddFactory::default();
        let x = factory.nvar(1).unwrap();
        assert_eq!(x.var().unwrap(), Var::new(1));
        assert!(x.high().unwrap().is_zero());
        assert!(x.low().unwrap().is_one());
        assert_eq!(x, factory.var(1).unwrap().not().unwrap());
    }

    #[test]
    fn test_terminal() {
        let factory = BddFactory::default();
        let one = factory.one();
        assert!(one.is_one());
        assert_eq!(one.var().unwrap_err(), BddError::TerminalNode);
        assert_eq!(one.low().unwrap_err(), BddError::TerminalNode);
        assert_eq!(factory.zero().high().unwrap_err(), BddError::TerminalNode);
    }

    #[test]
    fn test_cube() {
        let factory = BddFactory::default();
        let x = vars(&factory, 3);
        let f = x[0].and(&x[1].not().unwrap()).unwrap().and(&x[2]).unwrap();
        let cube = factory
            .cube(&[Var::new(0).pos(), Var::new(1).neg(), Var::new(2).pos()])
            .unwrap();
        assert_eq!(f, cube);
        assert_eq!(
            cube.any_sat().unwrap(),
            vec![Var::new(0).pos(), Var::new(1).neg(), Var::new(2).pos()]
        );
    }

    #[test]
    fn test_de_morgan_and() {
        let factory = BddFactory::default();
        let x = vars(&factory, 2);
        let f = x[0].and(&x[1]).unwrap().not().unwrap();
        let g = x[0].not().unwrap().or(&x[1].not().unwrap()).unwrap();
        assert_eq!(f, g);
        assert_eq!(x[0].nand(&x[1]).unwrap(), f);
    }

    #[test]
    fn test_de_morgan_or() {
        let factory = BddFactory::default();
        let x = vars(&factory, 2);
        let f = x[0].or(&x[1]).unwrap().not().unwrap();
        let g = x[0].not().unwrap().and(&x[1].not().unwrap()).unwrap();
        assert_eq!(f, g);
        assert_eq!(x[0].nor(&x[1]).unwrap(), f);
    }

    #[test]
    fn test_xor_itself() {
        let factory = BddFactory::default();
        let x = vars(&factory, 2);
        let f = x[0].and(&x[1]).unwrap();
        assert!(f.xor(&f).unwrap().is_zero());
        assert!(f.xor(&f.not().unwrap()).unwrap().is_one());
    }

    #[test]
    fn test_with_forms() {
        let factory = BddFactory::default();
        let x = vars(&factory, 3);
        let mut f = x[0].clone();
        f.and_with(x[1].clone()).unwrap();
        assert_eq!(f, x[0].and(&x[1]).unwrap());
        f.or_with(x[2].clone()).unwrap();
        f.not_with().unwrap();
        let expected = x[0].and(&x[1]).unwrap().or(&x[2]).unwrap().not().unwrap();
        assert_eq!(f, expected);
        f.biimp_with(expected.clone()).unwrap();
        assert!(f.is_one());
        f.imp_with(factory.zero()).unwrap();
        assert!(f.is_zero());
    }

    #[test]
    fn test_with_releases_argument() {
        let factory = BddFactory::default();
        let x = vars(&factory, 2);
        let mut f = x[0].clone();
        let g = x[1].clone();
        let g2 = g.clone();
        f.xor_with(g).unwrap();
        // The clone is an independent handle.
        assert!(!g2.is_freed());
        assert_eq!(f, x[0].xor(&g2).unwrap());
    }

    #[test]
    fn test_use_after_free() {
        let factory = BddFactory::default();
        let x = factory.var(0).unwrap();
        let y = x.clone();
        x.free();
        assert!(x.is_freed());
        assert_eq!(x.not().unwrap_err(), BddError::UseAfterFree);
        assert_eq!(y.and(&x).unwrap_err(), BddError::UseAfterFree);
        assert_eq!(x.sat_count().unwrap_err(), BddError::UseAfterFree);
        assert!(y.not().is_ok());
        assert_ne!(x, x.clone());
    }

    #[test]
    fn test_quantifiers() {
        let factory = BddFactory::default();
        let x = vars(&factory, 3);
        let f = x[0].and(&x[1]).unwrap().or(&x[2]).unwrap();
        assert_eq!(f.exist(Var::new(2)).unwrap(), factory.one());
        assert_eq!(f.for_all(Var::new(2)).unwrap(), x[0].and(&x[1]).unwrap());

        let set = factory.make_set(&[Var::new(0), Var::new(1)]).unwrap();
        assert!(f.exist_set(&set).unwrap().is_one());
        assert_eq!(f.for_all_set(&set).unwrap(), x[2]);
        assert_eq!(f.rel_prod(&x[2].not().unwrap(), &set).unwrap().not().unwrap(), x[2]);
    }

    #[test]
    fn test_replace() {
        let factory = BddFactory::default();
        let x = vars(&factory, 4);
        let f = x[0].imp(&x[1]).unwrap();
        let pairing = factory.pairing(&[(Var::new(0), Var::new(2)), (Var::new(1), Var::new(3))]);
        let g = f.replace(&pairing).unwrap();
        assert_eq!(g, x[2].imp(&x[3]).unwrap());

        let mut h = f.clone();
        h.replace_with(&pairing).unwrap();
        assert_eq!(h, g);

        let clash = factory.pairing(&[(Var::new(0), Var::new(1))]);
        assert_eq!(
            f.replace(&clash).unwrap_err(),
            BddError::ReplacementConflict { variable: Var::new(1) }
        );
    }

    #[test]
    fn test_compose_and_restrict() {
        let factory = BddFactory::default();
        let x = vars(&factory, 3);
        let f = x[0].xor(&x[1]).unwrap();
        assert_eq!(f.compose(&x[2], Var::new(1)).unwrap(), x[0].xor(&x[2]).unwrap());
        assert_eq!(f.restrict(Var::new(0), true).unwrap(), x[1].not().unwrap());
        let expected = x[0]
            .and(&x[1])
            .unwrap()
            .or(&x[0].not().unwrap().and(&x[2]).unwrap())
            .unwrap();
        assert_eq!(x[0].ite(&x[1], &x[2]).unwrap(), expected);
    }

    #[test]
    fn test_counting() {
        let factory = BddFactory::default();
        let x = vars(&factory, 3);
        let f = x[0].biimp(&x[1]).unwrap();
        assert_eq!(f.sat_count_max(Var::new(1)).unwrap(), BigUint::from(2u32));
        assert_eq!(f.sat_count().unwrap(), BigUint::from(4u32));
        let set = factory.make_set(&[Var::new(0), Var::new(1)]).unwrap();
        assert_eq!(f.sat_count_set(&set).unwrap(), BigUint::from(2u32));

        let g = f.or(&x[2]).unwrap();
        assert_eq!(g.path_count().unwrap(), BigUint::from(4u32));
        assert_eq!(g.node_count().unwrap(), 4);
        assert_eq!(g.var_profile().unwrap(), vec![1, 2, 1]);
        assert_eq!(g.support().unwrap(), vec![Var::new(0), Var::new(1), Var::new(2)]);
        assert_eq!(g.all_sat().unwrap().len(), 4);
        assert_eq!(factory.zero().any_sat().unwrap_err(), BddError::Unsat);
    }
}
