//! Processing steps and their output modules.
//!
//! Steps are executed by an external engine; the tree only keeps what
//! naming, subscriptions and resource propagation need to read or write.

use serde::{Deserialize, Serialize};

use crate::dataset::DatasetPath;
use crate::error::{Result, SpecError};

/// Kind of a processing step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StepType {
    /// Framework processing step; the only kind producing named datasets
    #[serde(rename = "CMSSW")]
    Cmssw,
    /// Stage output files out
    StageOut,
    /// Archive the job logs
    LogArchive,
    /// Collect log archives
    LogCollect,
    /// Delete input files
    DeleteFiles,
    /// Alignment and calibration harvesting
    AlcaHarvest,
    /// Upload DQM histograms
    #[serde(rename = "DQMUpload")]
    DqmUpload,
}

/// An output module of a processing step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputModule {
    /// Output module name, unique within its task
    pub name: String,

    /// Primary dataset name
    pub primary_dataset: String,

    /// Derived by the naming deriver
    #[serde(default)]
    pub processed_dataset: String,

    /// Data tier
    pub data_tier: String,

    /// Skim filter name, folded into the processed dataset
    #[serde(default)]
    pub filter_name: Option<String>,

    /// Where the step writes this output
    #[serde(default)]
    pub lfn_base: Option<String>,

    /// Where the merged output ends up
    #[serde(default)]
    pub merged_lfn_base: Option<String>,
}

impl OutputModule {
    /// Create an output module; the processed dataset is filled in later.
    pub fn new(
        name: impl Into<String>,
        primary_dataset: impl Into<String>,
        data_tier: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            primary_dataset: primary_dataset.into(),
            processed_dataset: String::new(),
            data_tier: data_tier.into(),
            filter_name: None,
            lfn_base: None,
            merged_lfn_base: None,
        }
    }

    /// Set the skim filter name.
    pub fn with_filter(mut self, filter_name: impl Into<String>) -> Self {
        self.filter_name = Some(filter_name.into());
        self
    }

    /// The dataset this module writes.
    pub fn dataset(&self) -> DatasetPath {
        DatasetPath::new(
            self.primary_dataset.clone(),
            self.processed_dataset.clone(),
            self.data_tier.clone(),
        )
    }
}

/// A processing step of a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    /// Step name, unique within its task
    pub name: String,
    /// Kind of step
    pub step_type: StepType,

    #[serde(default)]
    output_modules: Vec<OutputModule>,

    /// Whether the outputs are kept (and therefore named and subscribed)
    #[serde(default = "default_keep_output")]
    pub keep_output: bool,

    /// Modules whose output is discarded
    #[serde(default)]
    pub ignored_output_modules: Vec<String>,

    /// Cores the step runs on
    #[serde(default)]
    pub number_of_cores: Option<u32>,

    /// Framework release
    #[serde(default)]
    pub cmssw_version: Option<String>,

    /// Scram architecture
    #[serde(default)]
    pub scram_arch: Option<String>,

    /// Id of the configuration in the config cache
    #[serde(default)]
    pub config_cache_id: Option<String>,

    /// Dataset a harvesting step runs over
    #[serde(default)]
    pub dataset_name: Option<String>,
}

fn default_keep_output() -> bool {
    true
}

impl Step {
    /// Create an empty step.
    pub fn new(name: impl Into<String>, step_type: StepType) -> Self {
        Self {
            name: name.into(),
            step_type,
            output_modules: Vec::new(),
            keep_output: true,
            ignored_output_modules: Vec::new(),
            number_of_cores: None,
            cmssw_version: None,
            scram_arch: None,
            config_cache_id: None,
            dataset_name: None,
        }
    }

    /// Whether this is a framework processing step.
    pub fn is_cmssw(&self) -> bool {
        self.step_type == StepType::Cmssw
    }

    /// Add an output module. Names are unique per step; use
    /// [`crate::TaskNode::add_output_module`] once the step belongs to a task,
    /// since subscriptions are keyed by module name across the whole task.
    pub fn add_output_module(&mut self, module: OutputModule) -> Result<&mut OutputModule> {
        if self.output_module(&module.name).is_some() {
            return Err(SpecError::DuplicateName {
                parent: self.name.clone(),
                name: module.name,
            });
        }
        self.output_modules.push(module);
        let last = self.output_modules.len() - 1;
        Ok(&mut self.output_modules[last])
    }

    /// Output modules in declaration order.
    pub fn output_modules(&self) -> &[OutputModule] {
        &self.output_modules
    }

    pub(crate) fn output_modules_mut(&mut self) -> &mut [OutputModule] {
        &mut self.output_modules
    }

    /// Names of the output modules.
    pub fn list_output_modules(&self) -> Vec<&str> {
        self.output_modules.iter().map(|m| m.name.as_str()).collect()
    }

    /// Look up an output module by name.
    pub fn output_module(&self, name: &str) -> Option<&OutputModule> {
        self.output_modules.iter().find(|m| m.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_output_module() {
        let mut step = Step::new("cmsRun1", StepType::Cmssw);
        step.add_output_module(OutputModule::new("AODoutput", "SingleMuon", "AOD")).unwrap();

        let err = step
            .add_output_module(OutputModule::new("AODoutput", "SingleMuon", "MINIAOD"))
            .unwrap_err();
        assert_eq!(
            err,
            SpecError::DuplicateName {
                parent: "cmsRun1".to_string(),
                name: "AODoutput".to_string()
            }
        );
        assert_eq!(step.list_output_modules(), vec!["AODoutput"]);
    }

    #[test]
    fn test_step_type_wire_names() {
        assert_eq!(serde_json::to_string(&StepType::Cmssw).unwrap(), "\"CMSSW\"");
        let parsed: StepType = serde_json::from_str("\"StageOut\"").unwrap();
        assert_eq!(parsed, StepType::StageOut);
    }
}
