use std::fmt::{Display, Formatter};

/// A reference to a node in the unique table.
///
/// References are dense indices into the node arena. Ids `0` and `1` are the
/// constant `false` and `true` terminals; every other id denotes an internal
/// node. There are no complement edges: `f` and `!f` are distinct nodes.
///
/// A `Ref` is only meaningful while the table it came from is not compacted.
/// Clients never hold raw references across operations; they hold
/// [`Bdd`][crate::bdd::Bdd] handles, which the collector rewrites.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(transparent)]
pub struct Ref(u32);

impl Ref {
    /// The constant `false` terminal.
    pub const ZERO: Self = Self(0);
    /// The constant `true` terminal.
    pub const ONE: Self = Self(1);
    /// Sentinel for freed handles and terminal children.
    pub const INVALID: Self = Self(u32::MAX);

    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Terminal for the given constant.
    pub const fn constant(value: bool) -> Self {
        if value {
            Self::ONE
        } else {
            Self::ZERO
        }
    }

    /// Return the index of the reference.
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Return the internal representation of the reference.
    pub const fn raw(self) -> u32 {
        self.0
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }
    pub const fn is_one(self) -> bool {
        self.0 == 1
    }
    pub const fn is_terminal(self) -> bool {
        self.0 <= 1
    }
    pub const fn is_valid(self) -> bool {
        self.0 != u32::MAX
    }
}

impl Display for Ref {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match *self {
            Self::ZERO => write!(f, "@0"),
            Self::ONE => write!(f, "@1"),
            Self::INVALID => write!(f, "@invalid"),
            Self(index) => write!(f, "@{}", index),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminals() {
        assert!(Ref::ZERO.is_terminal());
        assert!(Ref::ONE.is_terminal());
        assert!(Ref::ZERO.is_zero());
        assert!(Ref::ONE.is_one());
        assert!(!Ref::new(2).is_terminal());
        assert_eq!(Ref::constant(true), Ref::ONE);
        assert_eq!(Ref::constant(false), Ref::ZERO);
    }

    #[test]
    fn test_ordering() {
        // Commutative cache keys rely on this.
        assert!(Ref::ZERO < Ref::ONE);
        assert!(Ref::new(5) < Ref::new(7));
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Ref::new(42)), "@42");
        assert_eq!(format!("{}", Ref::INVALID), "@invalid");
        assert!(!Ref::INVALID.is_valid());
    }
}
