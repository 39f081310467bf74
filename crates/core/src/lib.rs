//! wmspec core data models.
//!
//! This crate defines the hierarchical task specification tree of a
//! workload: the task node model, property propagation down the tree, the
//! job-splitting parameter contract, and output dataset naming.

#![warn(missing_docs)]

// Shared building blocks
mod config;
mod dataset;
mod error;
mod lumi;
mod section;

// Task model
mod step;
mod task;
mod tree;

// Tree-wide algorithms
mod naming;
mod propagate;
mod splitting;
mod subscription;

// Re-exports
pub use error::{Result, SpecError};
pub use section::{ConfigSection, ConfigValue, Scalar};
pub use config::{
    LfnDefaults, SpecDefaults, SubscriptionDefaults,
    DEFAULT_LOG_BASE_LFN, DEFAULT_MERGED_LFN_BASE, DEFAULT_SUBSCRIPTION_GROUP, DEFAULT_UNMERGED_LFN_BASE,
};
pub use dataset::{validate_lfn, DatasetPath};
pub use lumi::LumiMask;

// Task & Tree
pub use step::{OutputModule, Step, StepType};
pub use task::{
    AcdcInput, InputDataset, InputDatasetOptions, InputSection, PerformanceMonitor, PerformanceParams,
    ProductionSection, SiteConstraints, SplittingSection, TaskNode, TaskParameters, TaskType,
    WhiteBlackList, WorkflowRef,
};
pub use tree::{TaskIter, TaskTree};

// Propagation, splitting & naming
pub use propagate::{LfnBases, PropertyValue, TaskProperty};
pub use splitting::{REQUEST_TIME_KEYS, RESUBMISSION_KEYS};
pub use naming::{processing_era, run_suffix, MAX_RUN_NUMBER};
pub use subscription::{
    OutputDataset, SubscriptionPriority, SubscriptionRecord, SubscriptionRequest, SubscriptionType,
};
