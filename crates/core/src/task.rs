//! Task node model - one processing task of a workload.
//!
//! A [`TaskNode`] owns its children, so removing a child drops the whole
//! subtree. Structural operations live in [`crate::tree`], propagation in
//! [`crate::propagate`], and naming in [`crate::naming`].

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use crate::config::LfnDefaults;
use crate::error::{Result, SpecError};
use crate::section::{ConfigSection, ConfigValue, Scalar};
use crate::step::{OutputModule, Step, StepType};
use crate::subscription::SubscriptionRecord;

/// Kind of processing a task performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskType {
    /// Reconstruction or reprocessing of existing data
    Processing,
    /// Event generation
    Production,
    /// Skimming of processed data
    Skim,
    /// Merging of unmerged output
    Merge,
    /// DQM harvesting
    Harvesting,
    /// Removal of unmerged files
    Cleanup,
    /// Log archive collection
    LogCollect,
    /// Express processing
    Express,
    /// Repacking of streamer files
    Repack,
}

impl TaskType {
    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Processing => "Processing",
            TaskType::Production => "Production",
            TaskType::Skim => "Skim",
            TaskType::Merge => "Merge",
            TaskType::Harvesting => "Harvesting",
            TaskType::Cleanup => "Cleanup",
            TaskType::LogCollect => "LogCollect",
            TaskType::Express => "Express",
            TaskType::Repack => "Repack",
        }
    }

    /// Task types that accept resource limits and core counts.
    pub fn takes_resource_limits(&self) -> bool {
        matches!(self, TaskType::Processing | TaskType::Production | TaskType::Skim)
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskType {
    type Err = SpecError;

    fn from_str(s: &str) -> Result<Self> {
        let t = match s {
            "Processing" => TaskType::Processing,
            "Production" => TaskType::Production,
            "Skim" => TaskType::Skim,
            "Merge" => TaskType::Merge,
            "Harvesting" => TaskType::Harvesting,
            "Cleanup" => TaskType::Cleanup,
            "LogCollect" => TaskType::LogCollect,
            "Express" => TaskType::Express,
            "Repack" => TaskType::Repack,
            other => return Err(SpecError::NotFound(format!("task type {}", other))),
        };
        Ok(t)
    }
}

/// Job splitting configuration (`input.splitting`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SplittingSection {
    /// Splitting algorithm name
    pub algorithm: Option<String>,

    /// Per-event resource estimates
    #[serde(default)]
    pub performance: PerformanceParams,

    /// Algorithm-specific scalars (run/lumi lists, ACDC identity, ...)
    #[serde(default)]
    pub params: ConfigSection,
}

/// Resource estimates used by job splitting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceParams {
    /// Seconds per event
    pub time_per_event: Option<f64>,
    /// Output size per event in KB
    pub size_per_event: Option<f64>,
    /// Memory in MB
    pub memory_requirement: Option<u64>,
}

impl PerformanceParams {
    /// Present fields as a section, as handed to job splitting.
    pub fn to_section(&self) -> ConfigSection {
        let mut section = ConfigSection::new();
        if let Some(t) = self.time_per_event {
            section.set("timePerEvent", t);
        }
        if let Some(s) = self.size_per_event {
            section.set("sizePerEvent", s);
        }
        if let Some(m) = self.memory_requirement {
            section.set("memoryRequirement", Scalar::Int(m as i64));
        }
        section
    }
}

/// A white list and a black list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhiteBlackList<T> {
    /// Allowed entries
    pub whitelist: Vec<T>,
    /// Rejected entries
    pub blacklist: Vec<T>,
}

impl<T> Default for WhiteBlackList<T> {
    fn default() -> Self {
        Self {
            whitelist: Vec::new(),
            blacklist: Vec::new(),
        }
    }
}

/// Input dataset of a task (`input.dataset`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputDataset {
    /// Primary dataset name
    pub primary: String,
    /// Processed dataset name
    pub processed: String,
    /// Data tier
    pub tier: String,
    /// Bookkeeping service URL
    pub dbsurl: Option<String>,
    /// Block white and black lists
    pub blocks: WhiteBlackList<String>,
    /// Run white and black lists
    pub runs: WhiteBlackList<u32>,

    /// Extra options given when the dataset was added
    #[serde(default)]
    pub extras: ConfigSection,
}

/// Options accepted by [`TaskNode::add_input_dataset`].
#[derive(Debug, Clone, Default)]
pub struct InputDatasetOptions {
    /// Primary dataset name (required)
    pub primary: Option<String>,
    /// Processed dataset name (required)
    pub processed: Option<String>,
    /// Data tier (required)
    pub tier: Option<String>,
    /// Bookkeeping service URL
    pub dbsurl: Option<String>,
    /// Blocks to read
    pub block_whitelist: Option<Vec<String>>,
    /// Blocks to skip
    pub block_blacklist: Option<Vec<String>>,
    /// Runs to read
    pub run_whitelist: Option<Vec<u32>>,
    /// Runs to skip
    pub run_blacklist: Option<Vec<u32>>,
    /// Extra options kept with the dataset
    pub extras: ConfigSection,
}

/// ACDC resubmission input (`input.acdc`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcdcInput {
    /// ACDC server URL
    pub server: String,
    /// ACDC database
    pub database: String,
    /// Collection name
    pub collection: String,
    /// Fileset name
    pub fileset: String,
}

/// Input section of a task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputSection {
    /// Job splitting configuration
    pub splitting: SplittingSection,
    /// Input dataset
    pub dataset: Option<InputDataset>,
    /// ACDC resubmission input
    pub acdc: Option<AcdcInput>,

    /// Step of the parent task whose output feeds this task
    pub input_step: Option<String>,

    /// Extra details recorded with the input reference
    #[serde(default)]
    pub reference: ConfigSection,
}

/// Site placement constraints (`constraints.sites`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteConstraints {
    /// Sites jobs may run at
    pub whitelist: BTreeSet<String>,
    /// Sites jobs must avoid
    pub blacklist: BTreeSet<String>,
    /// Ignore data location for input
    pub trustlists: bool,
    /// Ignore data location for pileup
    #[serde(rename = "trustPUlists", default)]
    pub trust_pu_lists: bool,
}

/// Naming parameters propagated down the tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskParameters {
    /// Processing version
    pub processing_version: u32,
    /// Processing string
    pub processing_string: Option<String>,
    /// Acquisition era
    pub acquisition_era: Option<String>,
    /// Sub-type of the primary subscription
    pub primary_sub_type: Option<String>,
}

/// Production settings; present only for production-type tasks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductionSection {
    /// Events to produce
    pub total_events: Option<u64>,
    /// First event number
    pub first_event: Option<u64>,
    /// First lumi number
    pub first_lumi: Option<u64>,
    /// Extra production options
    #[serde(default)]
    pub extras: ConfigSection,
}

/// Runtime limits enforced by the job watchdog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceMonitor {
    /// Max resident set size in KiB
    #[serde(rename = "maxRSS")]
    pub max_rss: Option<u64>,
    /// Max virtual size in KiB
    #[serde(rename = "maxVSize")]
    pub max_vsize: Option<u64>,
    /// Soft timeout in seconds
    pub soft_timeout: Option<u64>,
    /// Hard timeout in seconds
    pub hard_timeout: Option<u64>,
}

/// Reference to a task handed to the job bookkeeping layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowRef {
    /// Path name of the task
    pub task: String,
}

/// One processing task in the task tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskNode {
    pub(crate) name: String,
    pub(crate) path_name: String,
    pub(crate) task_type: Option<TaskType>,
    pub(crate) steps: Vec<Step>,
    pub(crate) input: InputSection,
    pub(crate) constraints: SiteConstraints,
    pub(crate) parameters: TaskParameters,
    pub(crate) subscriptions: Vec<SubscriptionRecord>,
    pub(crate) notifications: Vec<String>,
    pub(crate) performance_monitor: Option<PerformanceMonitor>,
    pub(crate) production: Option<ProductionSection>,
    pub(crate) generators: ConfigSection,
    pub(crate) environment: ConfigSection,
    pub(crate) merged_lfn_base: Option<String>,
    pub(crate) unmerged_lfn_base: Option<String>,
    pub(crate) log_base_lfn: Option<String>,
    #[serde(rename = "prepID")]
    pub(crate) prep_id: Option<String>,
    pub(crate) children: Vec<TaskNode>,
}

impl TaskNode {
    /// Create a detached task whose path name is `/name`.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            path_name: format!("/{}", name),
            name,
            task_type: None,
            steps: Vec::new(),
            input: InputSection::default(),
            constraints: SiteConstraints::default(),
            parameters: TaskParameters::default(),
            subscriptions: Vec::new(),
            notifications: Vec::new(),
            performance_monitor: None,
            production: None,
            generators: ConfigSection::new(),
            environment: ConfigSection::new(),
            merged_lfn_base: None,
            unmerged_lfn_base: None,
            log_base_lfn: None,
            prep_id: None,
            children: Vec::new(),
        }
    }

    /// Builder-style task type.
    pub fn with_type(mut self, task_type: TaskType) -> Self {
        self.task_type = Some(task_type);
        self
    }

    /// Task name, unique among siblings.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Slash-joined ancestor names plus own name.
    pub fn path_name(&self) -> &str {
        &self.path_name
    }

    /// Task type, if set.
    pub fn task_type(&self) -> Option<TaskType> {
        self.task_type
    }

    /// Set the task type.
    pub fn set_task_type(&mut self, task_type: TaskType) {
        self.task_type = Some(task_type);
    }

    /// Reference used by the job bookkeeping layer.
    pub fn make_workflow(&self) -> WorkflowRef {
        WorkflowRef {
            task: self.path_name.clone(),
        }
    }

    // === Steps ===

    /// Install a new top step, replacing any existing steps.
    pub fn make_step(&mut self, name: impl Into<String>, step_type: StepType) -> &mut Step {
        self.set_step(Step::new(name, step_type))
    }

    /// Install `step` as the top step, replacing any existing steps.
    pub fn set_step(&mut self, step: Step) -> &mut Step {
        self.steps.clear();
        self.steps.push(step);
        &mut self.steps[0]
    }

    /// Append a step below the top step. Its output module names must not
    /// clash with those of the existing steps.
    pub fn add_step(&mut self, step: Step) -> Result<&mut Step> {
        if self.get_step(&step.name).is_some() {
            return Err(SpecError::DuplicateName {
                parent: self.path_name.clone(),
                name: step.name,
            });
        }
        if let Some(module) = step
            .output_modules()
            .iter()
            .find(|m| self.find_output_module(&m.name).is_some())
        {
            return Err(SpecError::DuplicateName {
                parent: self.path_name.clone(),
                name: module.name.clone(),
            });
        }
        self.steps.push(step);
        let last = self.steps.len() - 1;
        Ok(&mut self.steps[last])
    }

    /// All steps, top step first.
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Name of the first step.
    pub fn top_step_name(&self) -> Option<&str> {
        self.steps.first().map(|s| s.name.as_str())
    }

    /// Step names in execution order.
    pub fn list_all_step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name.as_str()).collect()
    }

    /// Step by name.
    pub fn get_step(&self, name: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.name == name)
    }

    /// Step by name, mutably.
    pub fn get_step_mut(&mut self, name: &str) -> Option<&mut Step> {
        self.steps.iter_mut().find(|s| s.name == name)
    }

    /// Add an output module to the named step, keeping module names unique
    /// across every step of this task.
    pub fn add_output_module(&mut self, step_name: &str, module: OutputModule) -> Result<&mut OutputModule> {
        if self.find_output_module(&module.name).is_some() {
            return Err(SpecError::DuplicateName {
                parent: self.path_name.clone(),
                name: module.name,
            });
        }
        let path = self.path_name.clone();
        self.get_step_mut(step_name)
            .ok_or_else(|| SpecError::NotFound(format!("step {} in {}", step_name, path)))?
            .add_output_module(module)
    }

    fn find_output_module(&self, name: &str) -> Option<&OutputModule> {
        self.steps.iter().find_map(|s| s.output_module(name))
    }

    /// Output modules of one step.
    pub fn output_modules_for_step(&self, step_name: &str) -> Result<&[OutputModule]> {
        self.get_step(step_name)
            .map(Step::output_modules)
            .ok_or_else(|| SpecError::NotFound(format!("step {} in {}", step_name, self.path_name)))
    }

    /// Output modules of every step, grouped per step.
    pub fn output_modules_for_task(&self) -> Vec<&[OutputModule]> {
        self.steps.iter().map(Step::output_modules).collect()
    }

    /// Ignored output module names across every step.
    pub fn ignored_output_modules_for_task(&self) -> Vec<&str> {
        self.steps
            .iter()
            .flat_map(|s| s.ignored_output_modules.iter().map(String::as_str))
            .collect()
    }

    fn first_cmssw_step(&self) -> Option<&Step> {
        self.steps.iter().find(|s| s.is_cmssw())
    }

    /// Framework version of the first processing step.
    pub fn sw_version(&self) -> Option<&str> {
        self.first_cmssw_step().and_then(|s| s.cmssw_version.as_deref())
    }

    /// Scram architecture of the first processing step.
    pub fn scram_arch(&self) -> Option<&str> {
        self.first_cmssw_step().and_then(|s| s.scram_arch.as_deref())
    }

    /// Config cache ids of every step that has one.
    pub fn config_cache_ids(&self) -> Vec<&str> {
        self.steps
            .iter()
            .filter_map(|s| s.config_cache_id.as_deref())
            .collect()
    }

    // === Input ===

    /// Input section.
    pub fn input(&self) -> &InputSection {
        &self.input
    }

    /// Record the step whose output feeds this task, plus extra details.
    pub fn set_input_reference(&mut self, step_id: impl Into<String>, extras: &ConfigSection) {
        self.input.input_step = Some(step_id.into());
        self.input.reference.merge_from(extras);
    }

    /// Set the step whose output feeds this task.
    pub fn set_input_step(&mut self, step_name: impl Into<String>) {
        self.input.input_step = Some(step_name.into());
    }

    /// Step whose output feeds this task.
    pub fn input_step(&self) -> Option<&str> {
        self.input.input_step.as_deref()
    }

    /// Set the ACDC resubmission input.
    pub fn add_input_acdc(
        &mut self,
        server: impl Into<String>,
        database: impl Into<String>,
        collection: impl Into<String>,
        fileset: impl Into<String>,
    ) {
        self.input.acdc = Some(AcdcInput {
            server: server.into(),
            database: database.into(),
            collection: collection.into(),
            fileset: fileset.into(),
        });
    }

    /// ACDC input, if any.
    pub fn input_acdc(&self) -> Option<&AcdcInput> {
        self.input.acdc.as_ref()
    }

    /// Set the input dataset. Primary, processed and tier are required; the
    /// node is untouched when any of them is missing.
    pub fn add_input_dataset(&mut self, options: InputDatasetOptions) -> Result<()> {
        let primary = options
            .primary
            .ok_or_else(|| SpecError::MissingRequiredField("primary".to_string()))?;
        let processed = options
            .processed
            .ok_or_else(|| SpecError::MissingRequiredField("processed".to_string()))?;
        let tier = options
            .tier
            .ok_or_else(|| SpecError::MissingRequiredField("tier".to_string()))?;

        self.input.dataset = Some(InputDataset {
            primary,
            processed,
            tier,
            dbsurl: options.dbsurl,
            blocks: WhiteBlackList {
                whitelist: options.block_whitelist.unwrap_or_default(),
                blacklist: options.block_blacklist.unwrap_or_default(),
            },
            runs: WhiteBlackList {
                whitelist: options.run_whitelist.unwrap_or_default(),
                blacklist: options.run_blacklist.unwrap_or_default(),
            },
            extras: options.extras,
        });
        Ok(())
    }

    /// Input dataset, if any.
    pub fn input_dataset(&self) -> Option<&InputDataset> {
        self.input.dataset.as_ref()
    }

    fn input_dataset_mut(&mut self) -> Result<&mut InputDataset> {
        let path = self.path_name.clone();
        self.input
            .dataset
            .as_mut()
            .ok_or_else(|| SpecError::NotFound(format!("input dataset of {}", path)))
    }

    /// `/primary/processed/tier` of the input dataset.
    pub fn input_dataset_path(&self) -> Option<String> {
        self.input
            .dataset
            .as_ref()
            .map(|ds| format!("/{}/{}/{}", ds.primary, ds.processed, ds.tier))
    }

    /// Bookkeeping URL of the input dataset.
    pub fn dbs_url(&self) -> Option<&str> {
        self.input.dataset.as_ref().and_then(|ds| ds.dbsurl.as_deref())
    }

    /// Replace the block whitelist of the input dataset.
    pub fn set_input_block_whitelist(&mut self, blocks: Vec<String>) -> Result<()> {
        self.input_dataset_mut()?.blocks.whitelist = blocks;
        Ok(())
    }

    /// Block whitelist of the input dataset.
    pub fn input_block_whitelist(&self) -> Option<&[String]> {
        self.input.dataset.as_ref().map(|ds| ds.blocks.whitelist.as_slice())
    }

    /// Replace the block blacklist of the input dataset.
    pub fn set_input_block_blacklist(&mut self, blocks: Vec<String>) -> Result<()> {
        self.input_dataset_mut()?.blocks.blacklist = blocks;
        Ok(())
    }

    /// Block blacklist of the input dataset.
    pub fn input_block_blacklist(&self) -> Option<&[String]> {
        self.input.dataset.as_ref().map(|ds| ds.blocks.blacklist.as_slice())
    }

    /// Replace the run whitelist of the input dataset.
    pub fn set_input_run_whitelist(&mut self, runs: Vec<u32>) -> Result<()> {
        self.input_dataset_mut()?.runs.whitelist = runs;
        Ok(())
    }

    /// Run whitelist of the input dataset.
    pub fn input_run_whitelist(&self) -> Option<&[u32]> {
        self.input.dataset.as_ref().map(|ds| ds.runs.whitelist.as_slice())
    }

    /// Replace the run blacklist of the input dataset.
    pub fn set_input_run_blacklist(&mut self, runs: Vec<u32>) -> Result<()> {
        self.input_dataset_mut()?.runs.blacklist = runs;
        Ok(())
    }

    /// Run blacklist of the input dataset.
    pub fn input_run_blacklist(&self) -> Option<&[u32]> {
        self.input.dataset.as_ref().map(|ds| ds.runs.blacklist.as_slice())
    }

    // === Production ===

    /// Merge production options into the production section, creating it.
    pub fn add_production(&mut self, total_events: Option<u64>, extras: &ConfigSection) {
        let production = self.production.get_or_insert_with(ProductionSection::default);
        if total_events.is_some() {
            production.total_events = total_events;
        }
        production.extras.merge_from(extras);
    }

    /// Production section, if any.
    pub fn production(&self) -> Option<&ProductionSection> {
        self.production.as_ref()
    }

    /// Set the first event and lumi, creating the production section.
    pub fn set_first_event_and_lumi(&mut self, first_event: u64, first_lumi: u64) {
        let production = self.production.get_or_insert_with(ProductionSection::default);
        production.first_event = Some(first_event);
        production.first_lumi = Some(first_lumi);
    }

    /// First event to produce, 1 unless set.
    pub fn first_event(&self) -> u64 {
        self.production
            .as_ref()
            .and_then(|p| p.first_event)
            .unwrap_or(1)
    }

    /// First lumi to produce, 1 unless set.
    pub fn first_lumi(&self) -> u64 {
        self.production
            .as_ref()
            .and_then(|p| p.first_lumi)
            .unwrap_or(1)
    }

    /// Events to produce; required for production tasks.
    pub fn total_events(&self) -> Result<u64> {
        self.production
            .as_ref()
            .and_then(|p| p.total_events)
            .ok_or_else(|| SpecError::MissingRequiredField("production.totalEvents".to_string()))
    }

    // === Generators ===

    /// Merge `settings` into the named generator section.
    pub fn add_generator(&mut self, generator: &str, settings: &ConfigSection) {
        self.generators.section_mut(generator).merge_from(settings);
    }

    /// Names of the configured generators.
    pub fn list_generators(&self) -> Vec<&str> {
        self.generators.list_sections()
    }

    /// Settings of a generator; empty when it does not exist.
    pub fn generator_settings(&self, generator: &str) -> ConfigSection {
        self.generators.section(generator).cloned().unwrap_or_default()
    }

    // === Environment ===

    /// Set one environment entry.
    pub fn set_environment_variable(&mut self, key: impl Into<String>, value: impl Into<ConfigValue>) {
        self.environment.set(key, value);
    }

    /// Scalar environment entries as plain strings for the execution
    /// engine. Nested sections, lists and nulls are not exported.
    pub fn environment_variables(&self) -> BTreeMap<String, String> {
        self.environment
            .iter()
            .filter_map(|(k, v)| match v {
                ConfigValue::Scalar(s) if !s.is_null() => Some((k.to_string(), s.to_string())),
                _ => None,
            })
            .collect()
    }

    // === Site constraints ===

    /// Sites jobs may run at.
    pub fn site_whitelist(&self) -> &BTreeSet<String> {
        &self.constraints.whitelist
    }

    /// Replace the site whitelist.
    pub fn set_site_whitelist<I, S>(&mut self, sites: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.constraints.whitelist = sites.into_iter().map(Into::into).collect();
    }

    /// Sites jobs must avoid.
    pub fn site_blacklist(&self) -> &BTreeSet<String> {
        &self.constraints.blacklist
    }

    /// Replace the site blacklist.
    pub fn set_site_blacklist<I, S>(&mut self, sites: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.constraints.blacklist = sites.into_iter().map(Into::into).collect();
    }

    /// `(trustlists, trustPUlists)`
    pub fn trust_sitelists(&self) -> (bool, bool) {
        (self.constraints.trustlists, self.constraints.trust_pu_lists)
    }

    /// Set both trust flags.
    pub fn set_trust_sitelists(&mut self, trust_sitelists: bool, trust_pu_sitelists: bool) {
        self.constraints.trustlists = trust_sitelists;
        self.constraints.trust_pu_lists = trust_pu_sitelists;
    }

    // === Parameters ===

    /// Processing version, 0 unless set.
    pub fn processing_version(&self) -> u32 {
        self.parameters.processing_version
    }

    /// Processing string, if set.
    pub fn processing_string(&self) -> Option<&str> {
        self.parameters.processing_string.as_deref()
    }

    /// Acquisition era, if set.
    pub fn acquisition_era(&self) -> Option<&str> {
        self.parameters.acquisition_era.as_deref()
    }

    /// Override the primary subscription sub-type.
    pub fn set_primary_sub_type(&mut self, sub_type: impl Into<String>) {
        self.parameters.primary_sub_type = Some(sub_type.into());
    }

    /// Sub-type of the primary subscription, the task type when unset.
    pub fn primary_sub_type(&self) -> Option<String> {
        self.parameters
            .primary_sub_type
            .clone()
            .or_else(|| self.task_type.map(|t| t.to_string()))
    }

    /// Request prep id, if set.
    pub fn prep_id(&self) -> Option<&str> {
        self.prep_id.as_deref()
    }

    // === LFN bases ===

    /// Merged LFN base, if set.
    pub fn merged_lfn_base(&self) -> Option<&str> {
        self.merged_lfn_base.as_deref()
    }

    /// Unmerged LFN base, if set.
    pub fn unmerged_lfn_base(&self) -> Option<&str> {
        self.unmerged_lfn_base.as_deref()
    }

    /// Base LFN of the task log archive, `defaults.log` until naming sets it.
    pub fn task_log_base_lfn<'a>(&'a self, defaults: &'a LfnDefaults) -> &'a str {
        self.log_base_lfn.as_deref().unwrap_or(&defaults.log)
    }

    /// Set the log archive base.
    pub fn set_task_log_base_lfn(&mut self, base: impl Into<String>) {
        self.log_base_lfn = Some(base.into());
    }

    // === Notifications & monitoring ===

    /// Add a target notified on workflow completion.
    pub fn add_notification(&mut self, target: impl Into<String>) {
        self.notifications.push(target.into());
    }

    /// Completion notification targets.
    pub fn notifications(&self) -> &[String] {
        &self.notifications
    }

    /// Watchdog limits, if any.
    pub fn performance_monitor(&self) -> Option<&PerformanceMonitor> {
        self.performance_monitor.as_ref()
    }

    pub(crate) fn performance_monitor_mut(&mut self) -> &mut PerformanceMonitor {
        self.performance_monitor.get_or_insert_with(PerformanceMonitor::default)
    }
}
