//! Assignment documents.
//!
//! An assignment is the JSON document an operator hands over when a
//! workload is assigned: naming parameters, placement, and resources. Each
//! field is optional; values are either one value for every task or a map
//! from task name to value.

use serde::Deserialize;
use tracing::info;
use wmspec_core::{
    LfnBases, LumiMask, PropertyValue, Result, SpecDefaults, SubscriptionRequest, TaskNode, TaskTree,
};

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Assignment {
    pub acquisition_era: Option<PropertyValue<String>>,
    pub processing_version: Option<PropertyValue<u32>>,
    pub processing_string: Option<PropertyValue<String>>,

    pub merged_lfn_base: Option<String>,
    pub unmerged_lfn_base: Option<String>,

    #[serde(rename = "prepID")]
    pub prep_id: Option<PropertyValue<String>>,

    pub lumi_mask: Option<LumiMask>,
    pub override_lumi_mask: bool,

    pub site_whitelist: Option<Vec<String>>,
    pub site_blacklist: Option<Vec<String>>,
    pub trust_sitelists: Option<bool>,
    #[serde(rename = "trustPUSitelists")]
    pub trust_pu_sitelists: Option<bool>,

    #[serde(rename = "maxRSS")]
    pub max_rss: Option<PropertyValue<u64>>,
    #[serde(rename = "maxVSize")]
    pub max_vsize: Option<PropertyValue<u64>>,
    pub soft_timeout: Option<u64>,
    pub grace_period: Option<u64>,
    pub memory: Option<PropertyValue<u64>>,
    pub multicore: Option<PropertyValue<u32>>,

    /// Run whose directory is appended to every output LFN
    pub run: Option<u32>,

    pub subscription: Option<SubscriptionRequest>,
}

impl Assignment {
    /// Apply to the whole tree, then rederive output names.
    pub fn apply(&self, tree: &mut TaskTree, defaults: &SpecDefaults) -> Result<()> {
        let root = tree.root_mut();

        if let Some(era) = &self.acquisition_era {
            root.set_acquisition_era(era);
        }
        if let Some(version) = &self.processing_version {
            root.set_processing_version(version);
        }
        if let Some(ps) = &self.processing_string {
            root.set_processing_string(ps);
        }
        if self.merged_lfn_base.is_some() || self.unmerged_lfn_base.is_some() {
            let bases = LfnBases::new(
                self.merged_lfn_base.as_deref().unwrap_or(&defaults.lfn.merged),
                self.unmerged_lfn_base.as_deref().unwrap_or(&defaults.lfn.unmerged),
            );
            root.set_lfn_base(&PropertyValue::from(bases))?;
        }
        if let Some(prep_id) = &self.prep_id {
            root.set_prep_id(prep_id);
        }
        if let Some(mask) = &self.lumi_mask {
            root.set_lumi_mask(mask, self.override_lumi_mask)?;
        }

        root.set_performance_monitor(
            self.max_rss.as_ref(),
            self.max_vsize.as_ref(),
            self.soft_timeout,
            self.grace_period,
        );
        if self.memory.is_some() {
            root.set_job_resource_information(None, None, self.memory.as_ref());
        }
        if let Some(cores) = &self.multicore {
            root.set_number_of_cores(cores);
        }

        root.visit_mut(&mut |task: &mut TaskNode| {
            if let Some(sites) = &self.site_whitelist {
                task.set_site_whitelist(sites.iter().cloned());
            }
            if let Some(sites) = &self.site_blacklist {
                task.set_site_blacklist(sites.iter().cloned());
            }
            if self.trust_sitelists.is_some() || self.trust_pu_sitelists.is_some() {
                let (trust, trust_pu) = task.trust_sitelists();
                task.set_trust_sitelists(
                    self.trust_sitelists.unwrap_or(trust),
                    self.trust_pu_sitelists.unwrap_or(trust_pu),
                );
            }
        });

        tree.update_lfns_and_datasets(self.run, &defaults.lfn)?;

        if let Some(request) = &self.subscription {
            tree.root_mut().visit_mut(&mut |task: &mut TaskNode| {
                task.set_subscription_information(request, &defaults.subscription);
            });
        }

        info!(workload = tree.name(), "assignment applied");
        Ok(())
    }
}
