//! Type-safe wrappers for BDD variables and literals.
//!
//! Variables are 0-indexed and their index *is* their position in the
//! (fixed) variable ordering: a smaller index is closer to the root.
use std::fmt;
use std::ops::Neg;

/// A variable identifier (0-indexed).
///
/// # Invariants
///
/// - Indices are below [`Var::MAX_INDEX`]
/// - [`Var::TERMINAL`] orders after every real variable, so terminals never
///   win a "smallest top variable" comparison
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Var(u32);

impl Var {
    /// Largest usable variable index (exclusive).
    pub const MAX_INDEX: u32 = (1 << 31) - 1;

    /// Pseudo-variable carried by the two terminals.
    pub const TERMINAL: Self = Var(u32::MAX);

    /// Creates a new variable with the given index.
    ///
    /// # Panics
    ///
    /// Panics if `index >= Var::MAX_INDEX`.
    pub fn new(index: u32) -> Self {
        assert!(index < Self::MAX_INDEX, "Variable index {} is too large", index);
        Var(index)
    }

    pub(crate) const fn from_raw(raw: u32) -> Self {
        Var(raw)
    }

    /// Returns the raw variable index.
    pub fn index(self) -> u32 {
        self.0
    }

    pub fn is_terminal(self) -> bool {
        self == Self::TERMINAL
    }

    /// Positive literal of this variable.
    pub fn pos(self) -> Lit {
        Lit::new(self, true)
    }

    /// Negative literal of this variable.
    pub fn neg(self) -> Lit {
        Lit::new(self, false)
    }
}

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_terminal() {
            write!(f, "x⊤")
        } else {
            write!(f, "x{}", self.0)
        }
    }
}

impl From<Var> for u32 {
    fn from(var: Var) -> Self {
        var.0
    }
}

/// A literal: a variable together with a polarity.
///
/// Encoded as `(var << 1) | negated`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Lit(u32);

impl Lit {
    pub fn new(var: Var, positive: bool) -> Self {
        Lit((var.index() << 1) | (!positive as u32))
    }

    pub fn var(self) -> Var {
        Var(self.0 >> 1)
    }

    pub fn is_positive(self) -> bool {
        self.0 & 1 == 0
    }

    pub fn is_negative(self) -> bool {
        !self.is_positive()
    }
}

impl Neg for Lit {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Lit(self.0 ^ 1)
    }
}

impl fmt::Display for Lit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_negative() {
            write!(f, "~")?;
        }
        write!(f, "{}", self.var())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_var_creation() {
        let v0 = Var::new(0);
        let v1 = Var::new(1);
        assert_eq!(v0.index(), 0);
        assert_eq!(v1.index(), 1);
        assert!(v0 < v1);
        assert!(v1 < Var::TERMINAL);
    }

    #[test]
    #[should_panic(expected = "is too large")]
    fn test_var_too_large_panics() {
        Var::new(Var::MAX_INDEX);
    }

    #[test]
    fn test_lit() {
        let x = Var::new(3);
        let p = x.pos();
        let n = x.neg();
        assert_eq!(p.var(), x);
        assert_eq!(n.var(), x);
        assert!(p.is_positive());
        assert!(n.is_negative());
        assert_eq!(-p, n);
        assert_eq!(-(-n), n);
        assert_eq!(format!("{}", p), "x3");
        assert_eq!(format!("{}", n), "~x3");
    }
}
