use crate::reference::Ref;
use crate::types::Var;
use crate::utils::{mix64, pairing3, MyHash};

/// A decision node: `if variable then high else low`.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Node {
    pub variable: Var,
    pub low: Ref,
    pub high: Ref,
}

impl Node {
    pub const fn new(variable: Var, low: Ref, high: Ref) -> Self {
        Self { variable, low, high }
    }

    /// The node stored in both terminal slots.
    pub const fn terminal() -> Self {
        Self::new(Var::TERMINAL, Ref::INVALID, Ref::INVALID)
    }

    /// Checksum of the whole triple, used by the integrity-checked table.
    pub fn checksum(&self) -> u32 {
        let h = pairing3(
            self.variable.index() as u64,
            self.low.raw() as u64,
            self.high.raw() as u64,
        );
        (mix64(h) >> 32) as u32
    }
}

// Hashes `(low, high)` only; chains are walked comparing the full triple.
impl MyHash for Node {
    fn hash(&self) -> u64 {
        let x = self.low.raw() as u64;
        let y = self.high.raw() as u64;
        mix64(MyHash::hash(&(x, y)))
    }
}
