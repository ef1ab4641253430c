//! Restriction, variable renaming, and functional composition.

use std::cmp::min;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use log::debug;

use crate::cache::{ComposeKey, ReplaceKey, RestrictKey};
use crate::error::{Abort, OpResult};
use crate::reference::Ref;
use crate::store::Store;
use crate::types::Var;

static NEXT_PAIRING_ID: AtomicU64 = AtomicU64::new(0);

/// A variable renaming `source → target`.
///
/// Each pairing carries a process-wide unique id, which keys the replace
/// cache; two pairings never share cached results.
#[derive(Debug, Clone)]
pub struct Pairing {
    id: u64,
    /// Non-identity pairs, sorted by source.
    pairs: Vec<(Var, Var)>,
}

impl Pairing {
    /// Build a renaming from `(source, target)` pairs.
    ///
    /// A later pair for the same source overrides an earlier one.
    pub fn new(pairs: &[(Var, Var)]) -> Self {
        let pairs = pairs
            .iter()
            .copied()
            .collect::<BTreeMap<Var, Var>>()
            .into_iter()
            .filter(|(source, target)| source != target)
            .collect();
        Self {
            id: NEXT_PAIRING_ID.fetch_add(1, Ordering::Relaxed),
            pairs,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Non-identity `(source, target)` pairs, ordered by source.
    pub fn pairs(&self) -> &[(Var, Var)] {
        &self.pairs
    }

    /// Image of `v` under the renaming.
    pub fn target(&self, v: Var) -> Var {
        match self.pairs.binary_search_by_key(&v, |&(source, _)| source) {
            Ok(i) => self.pairs[i].1,
            Err(_) => v,
        }
    }

    /// Largest renamed variable, if any.
    fn last(&self) -> Option<Var> {
        self.pairs.last().map(|&(s, _)| s)
    }

    /// Largest variable mentioned on either side.
    pub fn max_var(&self) -> Option<Var> {
        self.pairs.iter().map(|&(s, t)| s.max(t)).max()
    }

    /// Reject renamings that would merge two variables of `support`.
    ///
    /// Either a target already occurs in the function without being renamed
    /// away, or two occurring sources map to the same target.
    pub(crate) fn check(&self, support: &[Var]) -> Result<(), Var> {
        let mut images = HashSet::new();
        for &v in support {
            if !images.insert(self.target(v)) {
                return Err(self.target(v));
            }
        }
        Ok(())
    }
}

impl Store {
    /// `f[v := value]`
    pub fn restrict(&self, f: Ref, v: Var, value: bool) -> OpResult {
        let node = self.node(f);
        if node.variable > v {
            // Also covers terminals.
            return Ok(f);
        }
        if node.variable == v {
            return Ok(if value { node.high } else { node.low });
        }

        let key = RestrictKey { f, var: v, value };
        if let Some(res) = self.caches.restrict.get(&key) {
            return Ok(res);
        }

        let low = self.restrict(node.low, v, value)?;
        let high = self.restrict(node.high, v, value)?;
        let res = self.mk(node.variable, low, high)?;

        self.caches.restrict.insert(key, res);
        Ok(res)
    }

    /// Rename the variables of `f` according to `pairing`.
    ///
    /// Fails with [`Abort::Conflict`] if two distinct variables would end up
    /// as the same one.
    pub fn replace(&self, f: Ref, pairing: &Pairing) -> OpResult {
        let last = match pairing.last() {
            Some(last) => last,
            None => return Ok(f),
        };
        let node = self.node(f);
        if node.variable > last {
            return Ok(f);
        }

        let key = ReplaceKey { f, pairing: pairing.id() };
        if let Some(res) = self.caches.replace.get(&key) {
            return Ok(res);
        }

        let low = self.replace(node.low, pairing)?;
        let high = self.replace(node.high, pairing)?;
        let res = self.correctify(pairing.target(node.variable), low, high)?;

        self.caches.replace.insert(key, res);
        Ok(res)
    }

    /// Build `if level then high else low` where `level` may be below the top
    /// variables of `low` and `high`, sinking it to its place in the order.
    fn correctify(&self, level: Var, low: Ref, high: Ref) -> OpResult {
        let vl = self.variable(low);
        let vh = self.variable(high);

        if level < vl && level < vh {
            return self.mk(level, low, high);
        }
        if level == vl || level == vh {
            debug!("correctify: {} already occurs below", level);
            return Err(Abort::Conflict(level));
        }

        let m = min(vl, vh);
        let (l0, l1) = self.top_cofactors(low, m);
        let (h0, h1) = self.top_cofactors(high, m);
        let res0 = self.correctify(level, l0, h0)?;
        let res1 = self.correctify(level, l1, h1)?;
        self.mk(m, res0, res1)
    }

    /// `f[v := g]`
    pub fn compose(&self, f: Ref, g: Ref, v: Var) -> OpResult {
        let vf = self.variable(f);
        if vf > v {
            return Ok(f);
        }

        let key = ComposeKey { f, g, var: v };
        if let Some(res) = self.caches.compose.get(&key) {
            return Ok(res);
        }

        let res = if vf == v {
            let node = self.node(f);
            self.ite(g, node.high, node.low)?
        } else {
            let m = min(vf, self.variable(g));
            let (f0, f1) = self.top_cofactors(f, m);
            let (g0, g1) = self.top_cofactors(g, m);
            let low = self.compose(f0, g0, v)?;
            let high = self.compose(f1, g1, v)?;
            self.mk(m, low, high)?
        };

        self.caches.compose.insert(key, res);
        Ok(res)
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::apply::Operator;

    fn setup() -> (Store, Vec<Ref>) {
        let store = Store::new(1 << 10, 1 << 8, false);
        let xs = (0..5).map(|i| store.literal(Var::new(i), true).unwrap()).collect();
        (store, xs)
    }

    fn x(i: u32) -> Var {
        Var::new(i)
    }

    #[test]
    fn test_restrict() {
        let (store, xs) = setup();
        let f = store.ite(xs[0], xs[1], xs[2]).unwrap();
        assert_eq!(store.restrict(f, x(0), true).unwrap(), xs[1]);
        assert_eq!(store.restrict(f, x(0), false).unwrap(), xs[2]);
        let g = store.restrict(f, x(1), true).unwrap();
        assert_eq!(g, store.or(xs[0], xs[2]).unwrap());
        assert_eq!(store.restrict(f, x(4), true).unwrap(), f);
    }

    #[test]
    fn test_pairing() {
        let p = Pairing::new(&[(x(1), x(3)), (x(0), x(0)), (x(2), x(4))]);
        assert_eq!(p.pairs(), &[(x(1), x(3)), (x(2), x(4))]);
        assert_eq!(p.target(x(0)), x(0));
        assert_eq!(p.target(x(1)), x(3));
        assert_eq!(p.target(x(7)), x(7));
        assert_eq!(p.max_var(), Some(x(4)));
        assert_ne!(p.id(), Pairing::new(&[]).id());

        let p = Pairing::new(&[(x(2), x(5)), (x(2), x(6))]);
        assert_eq!(p.pairs(), &[(x(2), x(6))]);
    }

    #[test]
    fn test_pairing_with_large_source() {
        let big = Var::new(1 << 30);
        let p = Pairing::new(&[(big, x(0))]);
        assert_eq!(p.pairs(), &[(big, x(0))]);
        assert_eq!(p.target(big), x(0));
        assert_eq!(p.target(x(0)), x(0));
        assert_eq!(p.target(x(5)), x(5));

        let (store, xs) = setup();
        assert_eq!(store.replace(xs[1], &p).unwrap(), xs[1]);
    }

    #[test]
    fn test_replace_shift() {
        let (store, xs) = setup();
        let f = store.apply(Operator::Imp, xs[0], xs[1]).unwrap();
        let p = Pairing::new(&[(x(0), x(2)), (x(1), x(3))]);
        let expected = store.apply(Operator::Imp, xs[2], xs[3]).unwrap();
        assert_eq!(store.replace(f, &p).unwrap(), expected);
    }

    #[test]
    fn test_replace_reorders() {
        // Moving x0 below x2 needs the on-the-fly sinking.
        let (store, xs) = setup();
        let f = store.apply(Operator::Diff, xs[0], xs[2]).unwrap();
        let p = Pairing::new(&[(x(0), x(4))]);
        let expected = store.apply(Operator::Diff, xs[4], xs[2]).unwrap();
        assert_eq!(store.replace(f, &p).unwrap(), expected);
    }

    #[test]
    fn test_replace_swap() {
        let (store, xs) = setup();
        let f = store.apply(Operator::Diff, xs[0], xs[1]).unwrap();
        let p = Pairing::new(&[(x(0), x(1)), (x(1), x(0))]);
        let expected = store.apply(Operator::Diff, xs[1], xs[0]).unwrap();
        assert_eq!(store.replace(f, &p).unwrap(), expected);
    }

    #[test]
    fn test_replace_conflict() {
        let (store, xs) = setup();
        let f = store.and(xs[0], xs[1]).unwrap();
        let p = Pairing::new(&[(x(0), x(1))]);
        assert_eq!(store.replace(f, &p), Err(Abort::Conflict(x(1))));
        assert_eq!(p.check(&[x(0), x(1)]), Err(x(1)));
        assert_eq!(p.check(&[x(0), x(2)]), Ok(()));
    }

    #[test]
    fn test_compose() {
        let (store, xs) = setup();
        let f = store.and(xs[0], xs[3]).unwrap();
        let g = store.or(xs[1], xs[4]).unwrap();
        let expected = store.and(g, xs[3]).unwrap();
        assert_eq!(store.compose(f, g, x(0)).unwrap(), expected);

        // Substituting below the top variable.
        let h = store.apply(Operator::Xor, xs[1], xs[2]).unwrap();
        let expected = store.apply(Operator::Xor, xs[1], xs[0]).unwrap();
        assert_eq!(store.compose(h, xs[0], x(2)).unwrap(), expected);

        assert_eq!(store.compose(f, g, x(2)).unwrap(), f);
    }
}
