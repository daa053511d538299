//! Query compiler for stitchql graphs.
//!
//! Takes a batch of leaf nodes, traces how backend objects flow through the
//! graph, and rewrites the batch so that every backend read is served by a
//! single merged query.
//!
//! # Example
//!
//! ```
//! use stitchql_compiler::{Compiler, Config, GqlPlugin, Operation, OutputType, Registry};
//! use stitchql_core::{Graph, Type};
//!
//! let mut builder = Registry::builder();
//! builder.register(
//!     Operation::new("viewer", [] as [(&str, Type); 0], OutputType::Fixed(Type::object("user")))
//!         .plugin(GqlPlugin::new(|_, inner| format!("viewer {{ id {inner} }}")).root()),
//! );
//! let registry = builder.build().unwrap();
//!
//! let mut graph = Graph::new();
//! let viewer = registry.call(&mut graph, "viewer", [] as [(&str, _); 0]).unwrap();
//! let leaves = Compiler::new(&registry)
//!     .config(Config::new().operation_name("Q"))
//!     .compile(&mut graph, &[viewer])
//!     .unwrap();
//! assert_ne!(leaves[0], viewer);
//! ```

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod compile;
pub mod config;
pub mod error;
pub mod key_propagation;
pub mod registry;
pub mod stitch;

mod invariants;

#[cfg(test)]
pub mod test_utils;


pub use compile::{Compiler, compile, extract_alias};
pub use config::Config;
pub use error::{CompileError, ExecutionError, Result};
pub use key_propagation::{propagate_keys, refine_types, select_key, selection_type};
pub use registry::{
    EXECUTE, EXTRACT, GqlPlugin, OpForm, Operation, OutputType, QueryInputs, Registry,
    RegistryBuilder, TagFlow,
};
pub use stitch::{ObjectRecorder, OpCall, Shape, StitchedGraph, stitch};
