//! Compiler configuration.

/// Configuration for [`Compiler`](crate::Compiler).
#[derive(Clone, Debug)]
pub struct Config {
    /// Maximum nesting of lambda bodies and fragment chains
    pub(crate) recursion_limit: usize,
    /// Name of the single operation in the merged document
    pub(crate) operation_name: String,
    /// Prefix of content-addressed root aliases
    pub(crate) alias_prefix: String,
    /// Whether to merge duplicate selections in the combined document
    pub(crate) normalize: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            recursion_limit: 512,
            operation_name: "StitchedQuery".to_string(),
            alias_prefix: "q".to_string(),
            normalize: true,
        }
    }
}

impl Config {
    /// Create a new Config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum recursion depth.
    pub fn recursion_limit(mut self, value: usize) -> Self {
        self.recursion_limit = value;
        self
    }

    /// Set the name of the merged operation.
    pub fn operation_name(mut self, value: impl Into<String>) -> Self {
        self.operation_name = value.into();
        self
    }

    /// Set the prefix of generated root aliases.
    pub fn alias_prefix(mut self, value: impl Into<String>) -> Self {
        self.alias_prefix = value.into();
        self
    }

    /// Set whether the combined document is normalized.
    pub fn normalize(mut self, value: bool) -> Self {
        self.normalize = value;
        self
    }
}
