use stitchql_core::{NodeId, Type};

/// Errors that abort a compile call. There is no partial success.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompileError {
    /// A structural limitation: the input graph uses a shape the stitcher cannot follow.
    #[error("`{op}` at {node}: {reason} is not yet supported")]
    NotYetSupported {
        node: NodeId,
        op: String,
        reason: &'static str,
    },

    #[error("`{op}` at {node}: input `{input}` must be a compile-time constant")]
    NonConstantInput {
        node: NodeId,
        op: String,
        input: String,
    },

    #[error("query merge failed: {0}")]
    Merge(#[from] stitchql_gql::Error),

    #[error("root operation `{op}` at {node} must produce exactly one top-level field")]
    MissingRootSelection { node: NodeId, op: String },

    /// A key-propagation function produced a type no value can have.
    #[error("key propagation of `{op}` produced uninhabited type `{ty}`")]
    PluginContract { op: String, ty: Type },

    #[error("unknown operation `{0}`")]
    UnknownOperation(String),

    #[error("operation `{op}` is missing input `{input}`")]
    MissingInput { op: String, input: String },

    #[error("recursion limit of {limit} exceeded")]
    RecursionLimitExceeded { limit: usize },
}

pub type Result<T> = std::result::Result<T, CompileError>;

/// Errors raised by the execution engine when consuming a compiled query's result.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecutionError {
    #[error("alias `{0}` is missing from the query result")]
    MissingAlias(String),
}
