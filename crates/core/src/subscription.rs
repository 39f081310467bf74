//! Output dataset subscriptions.
//!
//! Each kept output module of a task gets at most one subscription record,
//! keyed by the output module name. The data-placement service reads them
//! through [`TaskNode::subscription_information`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::config::SubscriptionDefaults;
use crate::dataset::DatasetPath;
use crate::task::TaskNode;

/// Transfer priority of a subscription.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubscriptionPriority {
    /// Low priority
    #[default]
    Low,
    /// Normal priority
    Normal,
    /// High priority
    High,
}

/// Replication type of a subscription.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubscriptionType {
    /// Keep the source copy
    #[default]
    Replica,
    /// Remove the source copy
    Move,
}

/// Placement request for the dataset written by one output module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionRecord {
    /// Output module the record belongs to
    pub output_module: String,
    /// Dataset the module writes
    pub dataset: String,
    /// Sites holding the custodial copy
    pub custodial_sites: Vec<String>,
    /// Other destination sites
    pub non_custodial_sites: Vec<String>,
    /// Sites where the transfer is approved automatically
    pub auto_approve_sites: Vec<String>,
    /// Transfer priority
    pub priority: SubscriptionPriority,
    /// Replication type at custodial sites
    pub custodial_sub_type: SubscriptionType,
    /// Replication type at other sites
    pub non_custodial_sub_type: SubscriptionType,
    /// Accounting group at custodial sites
    pub custodial_group: String,
    /// Accounting group at other sites
    pub non_custodial_group: String,
    /// Delete the source copy once transferred
    pub delete_from_source: bool,
}

impl SubscriptionRecord {
    fn new(output_module: &str, dataset: &DatasetPath, defaults: &SubscriptionDefaults) -> Self {
        Self {
            output_module: output_module.to_string(),
            dataset: dataset.to_string(),
            custodial_sites: Vec::new(),
            non_custodial_sites: Vec::new(),
            auto_approve_sites: Vec::new(),
            priority: defaults.priority,
            custodial_sub_type: defaults.custodial_sub_type,
            non_custodial_sub_type: defaults.non_custodial_sub_type,
            custodial_group: defaults.custodial_group.clone(),
            non_custodial_group: defaults.non_custodial_group.clone(),
            delete_from_source: defaults.delete_from_source,
        }
    }

    fn apply(&mut self, request: &SubscriptionRequest) {
        if let Some(sites) = &request.custodial_sites {
            self.custodial_sites = sites.clone();
        }
        if let Some(sites) = &request.non_custodial_sites {
            self.non_custodial_sites = sites.clone();
        }
        if let Some(sites) = &request.auto_approve_sites {
            self.auto_approve_sites = sites.clone();
        }
        if let Some(priority) = request.priority {
            self.priority = priority;
        }
        if let Some(sub_type) = request.custodial_sub_type {
            self.custodial_sub_type = sub_type;
        }
        if let Some(sub_type) = request.non_custodial_sub_type {
            self.non_custodial_sub_type = sub_type;
        }
        if let Some(group) = &request.custodial_group {
            self.custodial_group = group.clone();
        }
        if let Some(group) = &request.non_custodial_group {
            self.non_custodial_group = group.clone();
        }
        if let Some(delete) = request.delete_from_source {
            self.delete_from_source = delete;
        }
    }
}

/// Subscription fields to set, plus filters selecting the output modules.
///
/// `None` leaves the existing value (or the default, for a new record) alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SubscriptionRequest {
    /// Sites holding the custodial copy
    pub custodial_sites: Option<Vec<String>>,
    /// Other destination sites
    pub non_custodial_sites: Option<Vec<String>>,
    /// Sites where the transfer is approved automatically
    pub auto_approve_sites: Option<Vec<String>>,
    /// Transfer priority
    pub priority: Option<SubscriptionPriority>,
    /// Replication type at custodial sites
    pub custodial_sub_type: Option<SubscriptionType>,
    /// Replication type at other sites
    pub non_custodial_sub_type: Option<SubscriptionType>,
    /// Accounting group at custodial sites
    pub custodial_group: Option<String>,
    /// Accounting group at other sites
    pub non_custodial_group: Option<String>,
    /// Delete the source copy once transferred
    pub delete_from_source: Option<bool>,

    /// Only modules writing this primary dataset
    pub primary_dataset: Option<String>,
    /// Only modules writing this data tier
    pub data_tier: Option<String>,
    /// Only skim (`Some(true)`) or non-skim (`Some(false)`) outputs
    pub skim: Option<bool>,
}

impl SubscriptionRequest {
    fn selects(&self, dataset: &DatasetPath) -> bool {
        self.primary_dataset.as_ref().map_or(true, |p| *p == dataset.primary)
            && self.data_tier.as_ref().map_or(true, |t| *t == dataset.tier)
            && self.skim.map_or(true, |s| s == dataset.is_skim())
    }
}

/// An output module and the dataset it writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputDataset {
    /// Output module name
    pub output_module: String,
    /// Dataset it writes
    pub dataset: DatasetPath,
}

impl TaskNode {
    /// Output modules of every kept CMSSW step, with their datasets.
    pub fn list_output_datasets_and_modules(&self) -> Vec<OutputDataset> {
        self.steps
            .iter()
            .filter(|step| step.is_cmssw() && step.keep_output)
            .flat_map(|step| step.output_modules())
            .map(|module| OutputDataset {
                output_module: module.name.clone(),
                dataset: module.dataset(),
            })
            .collect()
    }

    /// Create or update subscription records for the selected output modules.
    ///
    /// A module seen for the first time gets a record built from `defaults`;
    /// only the fields the request supplies are then overwritten.
    pub fn set_subscription_information(
        &mut self,
        request: &SubscriptionRequest,
        defaults: &SubscriptionDefaults,
    ) {
        for output in self.list_output_datasets_and_modules() {
            if !request.selects(&output.dataset) {
                continue;
            }
            let pos = match self
                .subscriptions
                .iter()
                .position(|s| s.output_module == output.output_module)
            {
                Some(pos) => pos,
                None => {
                    self.subscriptions.push(SubscriptionRecord::new(
                        &output.output_module,
                        &output.dataset,
                        defaults,
                    ));
                    self.subscriptions.len() - 1
                }
            };
            debug!(task = %self.path_name, module = %output.output_module, "updating subscription");
            self.subscriptions[pos].apply(request);
        }
    }

    /// Point an existing subscription record at a new dataset.
    ///
    /// Modules without a record are left alone.
    pub fn update_subscription_dataset(&mut self, output_module: &str, dataset: &DatasetPath) {
        if let Some(record) = self
            .subscriptions
            .iter_mut()
            .find(|s| s.output_module == output_module)
        {
            record.dataset = dataset.to_string();
        }
    }

    /// Subscription record of one output module.
    pub fn subscription(&self, output_module: &str) -> Option<&SubscriptionRecord> {
        self.subscriptions.iter().find(|s| s.output_module == output_module)
    }

    /// Subscription records keyed by dataset.
    pub fn subscription_information(&self) -> BTreeMap<String, SubscriptionRecord> {
        self.subscriptions
            .iter()
            .map(|s| (s.dataset.clone(), s.clone()))
            .collect()
    }
}
