#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Core data structures for stitchql.
//!
//! Two layers:
//! - **Node graph**: append-only arena of immutable expression nodes (`graph`)
//! - **Type system**: structural types with tag and known-fields annotations
//!   (`types`, `assign`)

pub mod assign;
pub mod graph;
pub mod types;

mod invariants;

#[cfg(test)]
mod assign_tests;
#[cfg(test)]
mod graph_tests;

pub use assign::assign;
pub use graph::{ConstValue, Descend, Graph, Node, NodeId, OpId, OpNames};
pub use types::{Type, TypeMap};
