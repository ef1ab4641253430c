//! # shared-bdd: Binary Decision Diagrams shared between threads
//!
//! **`shared-bdd`** is a library of reduced ordered **Binary Decision Diagrams (BDDs)**
//! whose node store can be used from many threads at once.
//!
//! ## What is a BDD?
//!
//! A Binary Decision Diagram represents a boolean function as a directed acyclic graph.
//! For a fixed variable ordering it is **canonical**: every function has exactly one
//! representation, so equivalence is an identity check on node ids.
//!
//! ## Key Features
//!
//! - **Factory and handles**: a [`BddFactory`] owns the node store; every function is held
//!   through a [`Bdd`] handle that keeps its nodes alive until it is dropped or freed.
//! - **Shared between threads**: lookups in the unique table are lock-free, inserts take a
//!   striped bucket lock, and computation caches are per-entry guarded.
//! - **Garbage collected**: unreachable nodes are reclaimed by a stop-the-world mark-compact
//!   collector; the table grows when a collection does not free enough.
//! - **Rich API**: all binary operators, ITE, quantification, relational product, restriction,
//!   renaming, composition, and exact model counting.
//!
//! Variables are 0-indexed; the index is the position in the (fixed) order.
//!
//! ## Basic Usage
//!
//! ```rust
//! use shared_bdd::{BddFactory, Var};
//!
//! let factory = BddFactory::new(1 << 12, 1 << 10);
//!
//! let x0 = factory.var(0)?;
//! let x1 = factory.var(1)?;
//!
//! // f = x0 AND (NOT x1)
//! let f = x0.and(&x1.not()?)?;
//! assert!(!f.is_zero());
//! assert!(!f.is_one());
//!
//! // Exactly one of the four assignments satisfies f.
//! assert_eq!(f.sat_count()?.to_string(), "1");
//!
//! // ∃x1. f == x0
//! assert_eq!(f.exist(Var::new(1))?, x0);
//! # Ok::<(), shared_bdd::BddError>(())
//! ```
//!
//! ## Core Components
//!
//! - **[`factory`]**: the [`BddFactory`], its GC/resize policy and listeners.
//! - **[`bdd`]**: the [`Bdd`] handle and every operation on it.
//! - **[`gc`]**: collection and resize events, listener traits.
//! - **[`config`]**: construction-time configuration.

mod apply;
pub mod bdd;
mod cache;
pub mod config;
pub mod error;
pub mod factory;
pub mod gc;
mod node;
mod quant;
pub mod reference;
mod registry;
mod sat;
mod store;
mod subst;
mod table;
pub mod types;
mod utils;

pub use apply::Operator;
pub use bdd::Bdd;
pub use config::BddConfig;
pub use error::BddError;
pub use factory::BddFactory;
pub use gc::{GcEvent, GcListener, ResizeEvent, ResizeListener, TableState};
pub use reference::Ref;
pub use subst::Pairing;
pub use types::{Lit, Var};
