//! Job-splitting parameter contract.
//!
//! The splitting algorithm itself is external; this module owns what a
//! task hands it and how the stored parameters survive an algorithm change.

use tracing::{debug, warn};

use crate::error::{Result, SpecError};
use crate::propagate::PropertyValue;
use crate::section::{ConfigSection, ConfigValue};
use crate::task::TaskNode;

/// Splitting keys that identify a resubmission; they always survive an
/// algorithm change and win over newly supplied values.
pub const RESUBMISSION_KEYS: [&str; 9] = [
    "collectionName",
    "filesetName",
    "couchURL",
    "couchDB",
    "owner",
    "group",
    "initial_lfn_counter",
    "merge_across_runs",
    "runWhitelist",
];

/// Splitting keys set at request time; they survive an algorithm change
/// unless the caller specifies them again.
pub const REQUEST_TIME_KEYS: [&str; 3] = ["lheInputFiles", "include_parents", "deterministicPileup"];

const RESERVED_KEYS: [&str; 2] = ["algorithm", "performance"];

impl TaskNode {
    /// Merge algorithm-specific parameters into the splitting section.
    pub fn set_splitting_parameters(&mut self, params: &ConfigSection) {
        let splitting = &mut self.input.splitting.params;
        for (key, value) in params.iter() {
            if RESERVED_KEYS.contains(&key) {
                warn!(task = %self.path_name, key, "ignoring reserved splitting key");
                continue;
            }
            splitting.set(key, value.clone());
        }
    }

    /// Switch the splitting algorithm.
    ///
    /// Request-time keys are kept unless `params` respecifies them;
    /// resubmission keys are always kept; the performance section is kept.
    /// Every other previous key is dropped.
    pub fn set_splitting_algorithm(&mut self, algorithm: impl Into<String>, params: &ConfigSection) {
        let old = std::mem::take(&mut self.input.splitting.params);
        let pick = |keys: &[&str]| {
            keys.iter()
                .filter_map(|k| old.get(k).map(|v| (k.to_string(), v.clone())))
                .fold(ConfigSection::new(), |mut section, (k, v)| {
                    section.set(k, v);
                    section
                })
        };
        let request_time = pick(&REQUEST_TIME_KEYS[..]);
        let resubmission = pick(&RESUBMISSION_KEYS[..]);

        let algorithm = algorithm.into();
        debug!(task = %self.path_name, algorithm = %algorithm, "setting splitting algorithm");
        self.input.splitting.algorithm = Some(algorithm);
        self.set_splitting_parameters(&request_time);
        self.set_splitting_parameters(params);
        self.set_splitting_parameters(&resubmission);
    }

    /// Current splitting algorithm.
    pub fn job_splitting_algorithm(&self) -> Option<&str> {
        self.input.splitting.algorithm.as_deref()
    }

    /// Parameters handed to the splitting algorithm.
    ///
    /// Contains `algorithm`, every stored splitting key, the `performance`
    /// section when requested, and the site constraints. Run white/black
    /// lists come from the input dataset unless the splitting section
    /// already has them.
    pub fn job_splitting_parameters(&self, include_performance: bool) -> Result<ConfigSection> {
        let splitting = &self.input.splitting;
        let algorithm = splitting.algorithm.as_deref().ok_or_else(|| {
            SpecError::MissingRequiredField(format!("input.splitting.algorithm of {}", self.path_name))
        })?;

        let mut params = ConfigSection::new().with("algorithm", algorithm);
        params.merge_from(&splitting.params);
        if include_performance {
            params.set("performance", splitting.performance.to_section());
        }

        params.set("siteWhitelist", ConfigValue::list(self.constraints.whitelist.iter().cloned()));
        params.set("siteBlacklist", ConfigValue::list(self.constraints.blacklist.iter().cloned()));
        params.set("trustSitelists", self.constraints.trustlists);

        if let Some(ds) = &self.input.dataset {
            if !params.contains_key("runWhitelist") {
                params.set("runWhitelist", ConfigValue::list(ds.runs.whitelist.iter().copied()));
            }
            if !params.contains_key("runBlacklist") {
                params.set("runBlacklist", ConfigValue::list(ds.runs.blacklist.iter().copied()));
            }
        }

        Ok(params)
    }

    /// Whether jobs read parent files as well.
    pub fn parent_processing_flag(&self) -> bool {
        self.input
            .splitting
            .params
            .get_bool("include_parents")
            .unwrap_or(false)
    }

    /// Set the per-event resource estimates of this task and the memory
    /// requirement of this task and its descendants.
    ///
    /// Memory is looked up by task name when given per task; tasks without
    /// an entry keep their current value.
    pub fn set_job_resource_information(
        &mut self,
        time_per_event: Option<f64>,
        size_per_event: Option<f64>,
        memory: Option<&PropertyValue<u64>>,
    ) {
        let performance = &mut self.input.splitting.performance;
        if time_per_event.is_some() {
            performance.time_per_event = time_per_event;
        }
        if size_per_event.is_some() {
            performance.size_per_event = size_per_event;
        }
        self.apply_memory_requirement(memory);
    }

    fn apply_memory_requirement(&mut self, memory: Option<&PropertyValue<u64>>) {
        if let Some(mem) = memory.and_then(|m| m.resolve(&self.name, None)).filter(|m| *m > 0) {
            self.input.splitting.performance.memory_requirement = Some(mem);
        }
        for child in &mut self.children {
            child.apply_memory_requirement(memory);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::section::Scalar;
    use crate::task::InputDatasetOptions;

    fn task_with_history() -> TaskNode {
        let mut task = TaskNode::new("DataProcessing");
        task.set_splitting_algorithm(
            "LumiBased",
            &ConfigSection::new()
                .with("lumis_per_job", 8)
                .with("collectionName", "ACDC_collection")
                .with("filesetName", "/ReReco/DataProcessing")
                .with("runWhitelist", ConfigValue::list([380001u32]))
                .with("include_parents", true)
                .with("halt_job_on_file_boundaries", false),
        );
        task.set_job_resource_information(Some(12.5), Some(512.0), Some(&PropertyValue::from(2000)));
        task
    }

    #[test]
    fn test_algorithm_required() {
        let task = TaskNode::new("DataProcessing");
        assert!(matches!(
            task.job_splitting_parameters(true),
            Err(SpecError::MissingRequiredField(_))
        ));
    }

    #[test]
    fn test_algorithm_change_keeps_allow_listed_keys() {
        let mut task = task_with_history();
        task.set_splitting_algorithm(
            "EventAwareLumiBased",
            &ConfigSection::new()
                .with("events_per_job", 5000)
                .with("collectionName", "ignored"),
        );

        let params = task.job_splitting_parameters(true).unwrap();
        assert_eq!(params.get_str("algorithm"), Some("EventAwareLumiBased"));
        assert_eq!(params.get_i64("events_per_job"), Some(5000));
        assert_eq!(params.get_str("collectionName"), Some("ACDC_collection"));
        assert_eq!(params.get_str("filesetName"), Some("/ReReco/DataProcessing"));
        assert_eq!(params.get_bool("include_parents"), Some(true));
        assert_eq!(params.get_list("runWhitelist"), Some(&[Scalar::Int(380001)][..]));
        assert!(!params.contains_key("lumis_per_job"));
        assert!(!params.contains_key("halt_job_on_file_boundaries"));

        let performance = params.section("performance").unwrap();
        assert_eq!(performance.get("timePerEvent"), Some(&ConfigValue::from(12.5)));
        assert_eq!(performance.get_i64("memoryRequirement"), Some(2000));
    }

    #[test]
    fn test_request_time_keys_can_be_respecified() {
        let mut task = task_with_history();
        task.set_splitting_algorithm(
            "FileBased",
            &ConfigSection::new().with("include_parents", false),
        );
        assert!(!task.parent_processing_flag());
    }

    #[test]
    fn test_algorithm_change_is_idempotent() {
        let mut task = task_with_history();
        let before = task.job_splitting_parameters(true).unwrap();

        task.set_splitting_algorithm("FileBased", &ConfigSection::new());
        let first = task.job_splitting_parameters(true).unwrap();
        task.set_splitting_algorithm("FileBased", &ConfigSection::new());
        let second = task.job_splitting_parameters(true).unwrap();

        assert_eq!(first, second);
        for key in RESUBMISSION_KEYS.iter().chain(REQUEST_TIME_KEYS.iter()) {
            assert_eq!(first.get(key), before.get(key), "{} changed", key);
        }
        assert_eq!(first.section("performance"), before.section("performance"));
        assert!(before.contains_key("collectionName"));
        assert!(before.contains_key("include_parents"));
    }

    #[test]
    fn test_site_constraints_and_run_backfill() {
        let mut task = TaskNode::new("DataProcessing");
        task.set_splitting_algorithm("FileBased", &ConfigSection::new());
        task.set_site_whitelist(["T2_CH_CERN", "T1_US_FNAL"]);
        task.set_trust_sitelists(true, false);
        task.add_input_dataset(InputDatasetOptions {
            primary: Some("SingleMuon".to_string()),
            processed: Some("Run2024A-v1".to_string()),
            tier: Some("RAW".to_string()),
            run_whitelist: Some(vec![1, 2]),
            run_blacklist: Some(vec![3]),
            ..Default::default()
        })
        .unwrap();

        let params = task.job_splitting_parameters(false).unwrap();
        assert!(!params.contains_key("performance"));
        assert_eq!(
            params.get_list("siteWhitelist"),
            Some(&[Scalar::from("T1_US_FNAL"), Scalar::from("T2_CH_CERN")][..])
        );
        assert_eq!(params.get_bool("trustSitelists"), Some(true));
        assert_eq!(params.get_list("runWhitelist"), Some(&[Scalar::Int(1), Scalar::Int(2)][..]));
        assert_eq!(params.get_list("runBlacklist"), Some(&[Scalar::Int(3)][..]));
    }

    #[test]
    fn test_splitting_run_whitelist_wins_over_dataset() {
        let mut task = TaskNode::new("DataProcessing");
        task.add_input_dataset(InputDatasetOptions {
            primary: Some("SingleMuon".to_string()),
            processed: Some("Run2024A-v1".to_string()),
            tier: Some("RAW".to_string()),
            run_whitelist: Some(vec![1, 2]),
            ..Default::default()
        })
        .unwrap();
        task.set_splitting_algorithm(
            "LumiBased",
            &ConfigSection::new().with("runWhitelist", ConfigValue::list([7u32])),
        );

        let params = task.job_splitting_parameters(false).unwrap();
        assert_eq!(params.get_list("runWhitelist"), Some(&[Scalar::Int(7)][..]));
    }

    #[test]
    fn test_no_run_lists_without_dataset() {
        let mut task = TaskNode::new("Production");
        task.set_splitting_algorithm("EventBased", &ConfigSection::new().with("events_per_job", 100));
        let params = task.job_splitting_parameters(false).unwrap();
        assert!(!params.contains_key("runWhitelist"));
        assert!(!params.contains_key("runBlacklist"));
    }

    #[test]
    fn test_reserved_keys_are_ignored() {
        let mut task = TaskNode::new("DataProcessing");
        task.set_splitting_algorithm("FileBased", &ConfigSection::new().with("algorithm", "Other"));
        assert_eq!(task.job_splitting_algorithm(), Some("FileBased"));
    }

    #[test]
    fn test_memory_per_task_without_inheritance() {
        let mut root = TaskNode::new("DataProcessing");
        root.add_task("Merge").unwrap();
        root.set_job_resource_information(None, None, Some(&PropertyValue::per_task([("DataProcessing", 3000)])));

        assert_eq!(root.input().splitting.performance.memory_requirement, Some(3000));
        assert_eq!(root.children()[0].input().splitting.performance.memory_requirement, None);

        root.set_job_resource_information(None, None, Some(&PropertyValue::from(1500)));
        assert_eq!(root.children()[0].input().splitting.performance.memory_requirement, Some(1500));
    }
}
