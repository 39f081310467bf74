//! Storage trait abstraction.

use async_trait::async_trait;
use wmspec_core::{SpecError, TaskTree};

/// Error type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Stored document violates a tree invariant
    #[error("invalid workload: {0}")]
    Spec(#[from] SpecError),

    /// Workload name cannot be used as a document key
    #[error("invalid workload name: {0}")]
    InvalidName(String),

    /// Item not found
    #[error("Not found: {0}")]
    NotFound(String),
}

/// Document store for task trees.
///
/// A workload is stored under the name of its root task.
#[async_trait]
pub trait WorkloadStore: Send + Sync {
    /// Save a workload (create or update) and return its new version.
    async fn save(&mut self, tree: &TaskTree) -> Result<u64>;

    /// Load a workload by name.
    async fn load(&self, name: &str) -> Result<Option<TaskTree>>;

    /// Names of all stored workloads, sorted.
    async fn list_names(&self) -> Result<Vec<String>>;

    /// Delete a workload.
    async fn delete(&mut self, name: &str) -> Result<()>;
}
