//! Workload persistence for wmspec.
//!
//! This crate provides a trait-based store for whole task trees, keyed by
//! workload name, with a JSON file reference implementation.

#![warn(missing_docs)]

pub mod trait_;
pub mod json_storage;

pub use trait_::{WorkloadStore, StorageError, Result};
pub use json_storage::JsonWorkloadStore;
