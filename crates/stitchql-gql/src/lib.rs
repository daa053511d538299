//! Graph-query documents: parsing, fragment merging and compact printing.
//!
//! # Example
//!
//! ```
//! let merged = stitchql_gql::normalize("query Q { project { id } project { name } }").unwrap();
//! assert_eq!(merged, "query Q { project { id name } }");
//! ```

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod ast;
pub mod lexer;
pub mod merge;
pub mod parser;
pub mod printer;

#[cfg(test)]
mod merge_tests;
#[cfg(test)]
mod normalize_tests;

pub use ast::{Document, Field, Selection, Value};
pub use merge::merge_selections;
pub use parser::{parse, parse_selections};
pub use printer::{print, print_selections};

/// Errors raised while parsing or merging a document.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("syntax error at offset {offset}: expected {expected}, found `{found}`")]
    Syntax {
        offset: usize,
        expected: &'static str,
        found: String,
    },

    /// Merged documents hold exactly one operation definition.
    #[error("expected exactly one operation definition, found {0}")]
    OperationCount(usize),

    #[error("cannot merge {0} selections")]
    UnsupportedSelection(&'static str),

    #[error("malformed arguments on `{field}`: {reason}")]
    MalformedCustomMerge { field: String, reason: String },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Parse a single-operation document, merge duplicate selections and print it compactly.
///
/// Idempotent: normalizing normalized text returns it unchanged.
pub fn normalize(source: &str) -> Result<String> {
    let mut document = parse(source)?;
    if document.operations.len() != 1 {
        return Err(Error::OperationCount(document.operations.len()));
    }
    for operation in &mut document.operations {
        let selections = std::mem::take(&mut operation.selection_set);
        operation.selection_set = merge_selections(selections)?;
    }
    Ok(print(&document))
}
