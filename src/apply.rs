//! Binary operators and if-then-else.

use std::cmp::min;

use log::debug;

use crate::cache::{ApplyKey, IteKey};
use crate::error::OpResult;
use crate::reference::Ref;
use crate::store::Store;

/// Binary boolean operators understood by [`Store::apply`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
#[repr(u8)]
pub enum Operator {
    And,
    Or,
    Xor,
    Nand,
    Nor,
    /// `a → b`
    Imp,
    /// `a ↔ b`
    Biimp,
    /// `a ∧ ¬b`
    Diff,
}

impl Operator {
    pub const ALL: [Operator; 8] = [
        Operator::And,
        Operator::Or,
        Operator::Xor,
        Operator::Nand,
        Operator::Nor,
        Operator::Imp,
        Operator::Biimp,
        Operator::Diff,
    ];

    pub fn eval(self, a: bool, b: bool) -> bool {
        match self {
            Operator::And => a && b,
            Operator::Or => a || b,
            Operator::Xor => a != b,
            Operator::Nand => !(a && b),
            Operator::Nor => !(a || b),
            Operator::Imp => !a || b,
            Operator::Biimp => a == b,
            Operator::Diff => a && !b,
        }
    }

    pub fn is_commutative(self) -> bool {
        !matches!(self, Operator::Imp | Operator::Diff)
    }
}

impl Store {
    /// Terminal rules that settle `op(a, b)` without recursion.
    fn apply_shortcut(op: Operator, a: Ref, b: Ref) -> Option<Ref> {
        if a.is_terminal() && b.is_terminal() {
            return Some(Ref::constant(op.eval(a.is_one(), b.is_one())));
        }
        match op {
            Operator::And => {
                if a == b {
                    Some(a)
                } else if a.is_zero() || b.is_zero() {
                    Some(Ref::ZERO)
                } else if a.is_one() {
                    Some(b)
                } else if b.is_one() {
                    Some(a)
                } else {
                    None
                }
            }
            Operator::Or => {
                if a == b {
                    Some(a)
                } else if a.is_one() || b.is_one() {
                    Some(Ref::ONE)
                } else if a.is_zero() {
                    Some(b)
                } else if b.is_zero() {
                    Some(a)
                } else {
                    None
                }
            }
            Operator::Xor => {
                if a == b {
                    Some(Ref::ZERO)
                } else if a.is_zero() {
                    Some(b)
                } else if b.is_zero() {
                    Some(a)
                } else {
                    None
                }
            }
            Operator::Nand => {
                if a.is_zero() || b.is_zero() {
                    Some(Ref::ONE)
                } else {
                    None
                }
            }
            Operator::Nor => {
                if a.is_one() || b.is_one() {
                    Some(Ref::ZERO)
                } else {
                    None
                }
            }
            Operator::Imp => {
                if a.is_zero() || b.is_one() || a == b {
                    Some(Ref::ONE)
                } else if a.is_one() {
                    Some(b)
                } else {
                    None
                }
            }
            Operator::Biimp => {
                if a == b {
                    Some(Ref::ONE)
                } else if a.is_one() {
                    Some(b)
                } else if b.is_one() {
                    Some(a)
                } else {
                    None
                }
            }
            Operator::Diff => {
                if a == b || a.is_zero() || b.is_one() {
                    Some(Ref::ZERO)
                } else if b.is_zero() {
                    Some(a)
                } else {
                    None
                }
            }
        }
    }

    pub fn apply(&self, op: Operator, a: Ref, b: Ref) -> OpResult {
        debug!("apply(op = {:?}, a = {}, b = {})", op, a, b);

        if let Some(res) = Self::apply_shortcut(op, a, b) {
            return Ok(res);
        }

        let key = ApplyKey::new(op, a, b);
        if let Some(res) = self.caches.apply.get(&key) {
            debug!("cache: apply{:?} -> {}", key, res);
            return Ok(res);
        }

        let m = min(self.variable(a), self.variable(b));
        let (a0, a1) = self.top_cofactors(a, m);
        let (b0, b1) = self.top_cofactors(b, m);

        let low = self.apply(op, a0, b0)?;
        let high = self.apply(op, a1, b1)?;
        let res = self.mk(m, low, high)?;

        self.caches.apply.insert(key, res);
        Ok(res)
    }

    pub fn and(&self, a: Ref, b: Ref) -> OpResult {
        self.apply(Operator::And, a, b)
    }
    pub fn or(&self, a: Ref, b: Ref) -> OpResult {
        self.apply(Operator::Or, a, b)
    }
    pub fn not(&self, a: Ref) -> OpResult {
        self.apply(Operator::Xor, a, Ref::ONE)
    }

    pub fn ite(&self, f: Ref, g: Ref, h: Ref) -> OpResult {
        debug!("ite(f = {}, g = {}, h = {})", f, g, h);

        if f.is_one() {
            debug!("ite(1,G,H) => G");
            return Ok(g);
        }
        if f.is_zero() {
            debug!("ite(0,G,H) => H");
            return Ok(h);
        }
        if g == h {
            debug!("ite(F,G,G) => G");
            return Ok(g);
        }
        if g.is_one() && h.is_zero() {
            debug!("ite(F,1,0) => F");
            return Ok(f);
        }
        if g.is_zero() && h.is_one() {
            debug!("ite(F,0,1) => ~F");
            return self.not(f);
        }

        let key = IteKey { f, g, h };
        if let Some(res) = self.caches.ite.get(&key) {
            debug!("cache: ite{:?} -> {}", key, res);
            return Ok(res);
        }

        let m = min(self.variable(f), min(self.variable(g), self.variable(h)));
        debug!("min variable = {}", m);

        let (f0, f1) = self.top_cofactors(f, m);
        let (g0, g1) = self.top_cofactors(g, m);
        let (h0, h1) = self.top_cofactors(h, m);

        let e = self.ite(f0, g0, h0)?;
        let t = self.ite(f1, g1, h1)?;
        let res = self.mk(m, e, t)?;

        self.caches.ite.insert(key, res);
        Ok(res)
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::types::Var;

    fn store() -> Store {
        Store::new(1 << 10, 1 << 8, false)
    }

    /// Truth table of `f` over variables `0..n`, by walking from the root.
    fn truth_table(store: &Store, f: Ref, n: u32) -> Vec<bool> {
        (0..1u32 << n)
            .map(|bits| {
                let mut cur = f;
                while !cur.is_terminal() {
                    let node = store.node(cur);
                    cur = if (bits >> node.variable.index()) & 1 == 1 { node.high } else { node.low };
                }
                cur.is_one()
            })
            .collect()
    }

    #[test]
    fn test_terminal_cases_match_eval() {
        let store = store();
        for op in Operator::ALL {
            for a in [false, true] {
                for b in [false, true] {
                    let res = store.apply(op, Ref::constant(a), Ref::constant(b)).unwrap();
                    assert_eq!(res, Ref::constant(op.eval(a, b)), "{:?}({}, {})", op, a, b);
                }
            }
        }
    }

    #[test]
    fn test_apply_matches_truth_tables() {
        let store = store();
        let x = store.literal(Var::new(0), true).unwrap();
        let y = store.literal(Var::new(1), true).unwrap();
        let z = store.literal(Var::new(2), false).unwrap();
        let yz = store.or(y, z).unwrap();
        let f = store.apply(Operator::Xor, x, yz).unwrap();
        let g = store.and(x, z).unwrap();

        let tf = truth_table(&store, f, 3);
        let tg = truth_table(&store, g, 3);
        for op in Operator::ALL {
            let res = store.apply(op, f, g).unwrap();
            let expected: Vec<bool> = tf.iter().zip(&tg).map(|(&a, &b)| op.eval(a, b)).collect();
            assert_eq!(truth_table(&store, res, 3), expected, "{:?}", op);
        }
    }

    #[test]
    fn test_not_is_involution() {
        let store = store();
        let x = store.literal(Var::new(0), true).unwrap();
        let y = store.literal(Var::new(1), true).unwrap();
        let f = store.and(x, y).unwrap();
        let nf = store.not(f).unwrap();
        assert_ne!(f, nf);
        assert_eq!(store.not(nf).unwrap(), f);
        assert_eq!(store.not(Ref::ONE).unwrap(), Ref::ZERO);
    }

    #[test]
    fn test_ite() {
        let store = store();
        let x = store.literal(Var::new(0), true).unwrap();
        let y = store.literal(Var::new(1), true).unwrap();
        let z = store.literal(Var::new(2), true).unwrap();

        assert_eq!(store.ite(x, y, Ref::ZERO).unwrap(), store.and(x, y).unwrap());
        assert_eq!(store.ite(x, Ref::ONE, y).unwrap(), store.or(x, y).unwrap());
        assert_eq!(store.ite(x, Ref::ZERO, Ref::ONE).unwrap(), store.not(x).unwrap());

        let f = store.ite(x, y, z).unwrap();
        let nx = store.not(x).unwrap();
        let expected = store.or(store.and(x, y).unwrap(), store.and(nx, z).unwrap()).unwrap();
        assert_eq!(f, expected);
    }

    #[test]
    fn test_canonicity() {
        let store = store();
        let x = store.literal(Var::new(0), true).unwrap();
        let y = store.literal(Var::new(1), true).unwrap();
        // x ∧ y == ¬(¬x ∨ ¬y)
        let a = store.and(x, y).unwrap();
        let nx = store.not(x).unwrap();
        let ny = store.not(y).unwrap();
        let b = store.not(store.or(nx, ny).unwrap()).unwrap();
        assert_eq!(a, b);
    }
}
