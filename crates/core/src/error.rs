//! Error type for task tree operations.

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SpecError>;

/// Errors raised synchronously by tree mutations and derivations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpecError {
    /// A sibling (or step) with this name already exists
    #[error("'{parent}' already contains '{name}'")]
    DuplicateName {
        /// Path of the node that rejected the insert
        parent: String,
        /// Colliding name
        name: String,
    },

    /// Child task, step, output module or section is absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// A setter or derivation needs a field the caller did not provide
    #[error("Missing required field: {0}")]
    MissingRequiredField(String),

    /// Malformed run/lumi input for job splitting
    #[error("Invalid splitting input: {0}")]
    InvalidSplittingInput(String),

    /// Dataset string not of the form `/primary/processed/tier`
    #[error("Invalid dataset path: {0}")]
    InvalidDatasetPath(String),

    /// Derived LFN rejected by the LFN lexicon
    #[error("Invalid LFN: {0}")]
    InvalidLfn(String),
}
