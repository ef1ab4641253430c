use std::fmt;

use crate::reference::Ref;
use crate::types::Var;

/// Errors surfaced by handle and factory operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BddError {
    /// The handle was freed and must not be dereferenced.
    UseAfterFree,
    /// A satisfying assignment was requested for the constant `false`.
    Unsat,
    /// A renaming would identify two variables that must stay distinct.
    ReplacementConflict { variable: Var },
    /// A node failed its integrity check.
    CorruptedNode { id: Ref },
    /// `var`, `low` or `high` was requested of a constant.
    TerminalNode,
    /// The factory was shut down with `done()`.
    FactoryClosed,
    /// Handles from two different factories were combined.
    ForeignHandle,
}

impl fmt::Display for BddError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BddError::UseAfterFree => write!(f, "BDD handle used after free"),
            BddError::Unsat => write!(f, "Function is unsatisfiable"),
            BddError::ReplacementConflict { variable } => {
                write!(f, "Replacement conflict on variable {}", variable)
            }
            BddError::CorruptedNode { id } => write!(f, "Corrupted node {}", id),
            BddError::TerminalNode => write!(f, "Terminal node has no variable or children"),
            BddError::FactoryClosed => write!(f, "BDD factory is closed"),
            BddError::ForeignHandle => write!(f, "BDD handle belongs to a different factory"),
        }
    }
}

impl std::error::Error for BddError {}

/// Reason a recursive operation stopped before producing a node.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) enum Abort {
    /// The node table ran out of slots; the caller must make room and restart.
    TableFull,
    /// Replacement produced a node whose variable is already below it.
    Conflict(Var),
}

pub(crate) type OpResult<T = Ref> = Result<T, Abort>;
