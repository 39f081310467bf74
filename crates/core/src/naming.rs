//! Output dataset and LFN naming.
//!
//! Names are derived from the task's acquisition era, processing string and
//! processing version, so they must be recomputed whenever one of those
//! changes. Recomputation also refreshes subscription records.

use tracing::debug;

use crate::config::LfnDefaults;
use crate::dataset::{validate_lfn, DatasetPath};
use crate::error::{Result, SpecError};
use crate::task::{TaskNode, TaskType};
use crate::tree::TaskTree;

/// Data tiers whose merged output feeds a harvesting task.
const DQM_TIERS: [&str; 2] = ["DQM", "DQMIO"];

/// `{processingString}-v{version}`, or `v{version}` without a processing string.
pub fn processing_era(processing_string: Option<&str>, version: u32) -> String {
    match processing_string {
        Some(ps) if !ps.is_empty() => format!("{}-v{}", ps, version),
        _ => format!("v{}", version),
    }
}

/// Largest run number that fits the nine-digit run directory.
pub const MAX_RUN_NUMBER: u32 = 999_999_999;

/// `/xxx/xxx/xxx` path suffix of a zero-padded nine-digit run number.
///
/// Runs above [`MAX_RUN_NUMBER`] have no such directory and are rejected.
pub fn run_suffix(run: u32) -> Result<String> {
    if run > MAX_RUN_NUMBER {
        return Err(SpecError::InvalidLfn(format!(
            "run {} does not fit a nine-digit run directory",
            run
        )));
    }
    let padded = format!("{:09}", run);
    Ok(format!("/{}/{}/{}", &padded[0..3], &padded[3..6], &padded[6..9]))
}

/// Names derived for one output module, not yet written.
struct DerivedNames {
    processed: String,
    unmerged_lfn: String,
    merged_lfn: String,
}

impl TaskNode {
    /// Recompute processed dataset names and LFNs of every CMSSW output
    /// module in this task and its descendants.
    ///
    /// `run`, when non-zero, appends the run directory to every LFN. Every
    /// name in the subtree is derived and validated first; on error no task
    /// is modified.
    pub fn update_lfns_and_datasets(&mut self, run: Option<u32>, defaults: &LfnDefaults) -> Result<()> {
        let suffix = match run.filter(|r| *r > 0) {
            Some(r) => run_suffix(r)?,
            None => String::new(),
        };

        let mut derived = Vec::new();
        self.derive_subtree(&suffix, defaults, &mut derived)?;

        let mut derived = derived.into_iter();
        self.apply_subtree(&mut derived, defaults);
        Ok(())
    }

    /// Pre-order, one entry per task, matching [`Self::apply_subtree`].
    fn derive_subtree(&self, suffix: &str, defaults: &LfnDefaults, out: &mut Vec<Vec<DerivedNames>>) -> Result<()> {
        out.push(self.derive_outputs(suffix, defaults)?);
        for child in &self.children {
            child.derive_subtree(suffix, defaults, out)?;
        }
        Ok(())
    }

    fn derive_outputs(&self, suffix: &str, defaults: &LfnDefaults) -> Result<Vec<DerivedNames>> {
        let has_outputs = self
            .steps
            .iter()
            .any(|s| s.is_cmssw() && !s.output_modules().is_empty());
        if !has_outputs {
            return Ok(Vec::new());
        }

        let era = self.parameters.acquisition_era.as_deref().ok_or_else(|| {
            SpecError::MissingRequiredField(format!("parameters.acquisitionEra of {}", self.path_name))
        })?;
        let proc_era = processing_era(
            self.parameters.processing_string.as_deref(),
            self.parameters.processing_version,
        );
        let merged_base = self.merged_lfn_base.as_deref().unwrap_or(&defaults.merged);
        let unmerged_base = self.unmerged_lfn_base.as_deref().unwrap_or(&defaults.unmerged);
        let is_merge = self.task_type == Some(TaskType::Merge);

        let mut derived = Vec::new();
        for module in self
            .steps
            .iter()
            .filter(|s| s.is_cmssw())
            .flat_map(|s| s.output_modules())
        {
            let (processed, path_segment) = match module.filter_name.as_deref() {
                Some(filter) => (
                    format!("{}-{}-{}", era, filter, proc_era),
                    format!("{}-{}", filter, proc_era),
                ),
                None => (format!("{}-{}", era, proc_era), proc_era.clone()),
            };
            let tail = format!(
                "{}/{}/{}/{}{}",
                era, module.primary_dataset, module.data_tier, path_segment, suffix
            );
            let merged_lfn = format!("{}/{}", merged_base, tail);
            let unmerged_lfn = if is_merge {
                merged_lfn.clone()
            } else {
                format!("{}/{}", unmerged_base, tail)
            };
            validate_lfn(&merged_lfn)?;
            validate_lfn(&unmerged_lfn)?;

            derived.push(DerivedNames {
                processed,
                unmerged_lfn,
                merged_lfn,
            });
        }
        Ok(derived)
    }

    fn apply_subtree<I>(&mut self, derived: &mut I, defaults: &LfnDefaults)
    where
        I: Iterator<Item = Vec<DerivedNames>>,
    {
        let mut names = derived.next().unwrap_or_default().into_iter();

        let mut renamed = Vec::new();
        for step in self.steps.iter_mut().filter(|s| s.is_cmssw()) {
            for module in step.output_modules_mut() {
                let Some(DerivedNames { processed, unmerged_lfn, merged_lfn }) = names.next() else {
                    break;
                };
                module.processed_dataset = processed;
                module.lfn_base = Some(unmerged_lfn);
                module.merged_lfn_base = Some(merged_lfn);
                debug!(module = %module.name, dataset = %module.dataset(), "renamed output");
                renamed.push((module.name.clone(), module.dataset()));
            }
        }

        // Kept or not, a renamed module's subscription follows its dataset
        let is_merge = self.task_type == Some(TaskType::Merge);
        for (module, dataset) in &renamed {
            self.update_subscription_dataset(module, dataset);
            if is_merge && DQM_TIERS.contains(&dataset.tier.as_str()) {
                self.update_harvesting_dataset(dataset);
            }
        }

        let unmerged_base = self
            .unmerged_lfn_base
            .clone()
            .unwrap_or_else(|| defaults.unmerged.clone());
        self.set_task_log_base_lfn(unmerged_base);

        for child in &mut self.children {
            child.apply_subtree(derived, defaults);
        }
    }

    fn update_harvesting_dataset(&mut self, dataset: &DatasetPath) {
        for child in self
            .children
            .iter_mut()
            .filter(|c| c.task_type == Some(TaskType::Harvesting))
        {
            for step in child.steps.iter_mut().filter(|s| s.is_cmssw()) {
                step.dataset_name = Some(dataset.to_string());
            }
        }
    }
}

impl TaskTree {
    /// Recompute output names across the whole tree.
    pub fn update_lfns_and_datasets(&mut self, run: Option<u32>, defaults: &LfnDefaults) -> Result<()> {
        self.root_mut().update_lfns_and_datasets(run, defaults)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SpecDefaults;
    use crate::propagate::PropertyValue;
    use crate::step::{OutputModule, StepType};
    use crate::subscription::SubscriptionRequest;

    fn add_outputs(task: &mut TaskNode, modules: Vec<OutputModule>) {
        let step = task.make_step("cmsRun1", StepType::Cmssw);
        for module in modules {
            step.add_output_module(module).unwrap();
        }
    }

    fn reco_tree() -> TaskTree {
        let mut tree = TaskTree::new("DataProcessing");
        let root = tree.root_mut();
        root.set_task_type(TaskType::Processing);
        add_outputs(root, vec![
            OutputModule::new("AODoutput", "SingleMuon", "AOD"),
            OutputModule::new("DQMoutput", "SingleMuon", "DQMIO"),
        ]);

        let merge = root.add_task("DataProcessingMergeDQMoutput").unwrap();
        merge.set_task_type(TaskType::Merge);
        add_outputs(merge, vec![OutputModule::new("Merged", "SingleMuon", "DQMIO")]);

        let harvest = merge.add_task("HarvestDQM").unwrap();
        harvest.set_task_type(TaskType::Harvesting);
        harvest.make_step("cmsRun1", StepType::Cmssw);

        tree.root_mut().set_acquisition_era(&PropertyValue::from("Run2024A".to_string()));
        tree.root_mut().set_processing_version(&PropertyValue::from(3));
        tree
    }

    #[test]
    fn test_processing_era() {
        assert_eq!(processing_era(None, 3), "v3");
        assert_eq!(processing_era(Some("PromptReco"), 1), "PromptReco-v1");
        assert_eq!(run_suffix(380001).unwrap(), "/000/380/001");
        assert_eq!(run_suffix(MAX_RUN_NUMBER).unwrap(), "/999/999/999");
        assert!(matches!(run_suffix(1_000_000_000), Err(SpecError::InvalidLfn(_))));
    }

    #[test]
    fn test_unmerged_lfn() {
        let mut tree = reco_tree();
        tree.update_lfns_and_datasets(None, &LfnDefaults::default()).unwrap();

        let module = tree.root().get_step("cmsRun1").unwrap().output_module("AODoutput").unwrap();
        assert_eq!(module.lfn_base.as_deref(), Some("/store/unmerged/Run2024A/SingleMuon/AOD/v3"));
        assert_eq!(module.merged_lfn_base.as_deref(), Some("/store/data/Run2024A/SingleMuon/AOD/v3"));
        assert_eq!(module.processed_dataset, "Run2024A-v3");
    }

    #[test]
    fn test_filter_and_processing_string() {
        let mut task = TaskNode::new("Skim");
        add_outputs(&mut task, vec![OutputModule::new("SKIMStreamZMu", "SingleMuon", "RAW-RECO").with_filter("ZMu")]);
        task.set_acquisition_era(&PropertyValue::from("Run2024A".to_string()));
        task.set_processing_string(&PropertyValue::from("PromptReco".to_string()));
        task.set_processing_version(&PropertyValue::from(2));
        task.update_lfns_and_datasets(Some(380001), &LfnDefaults::default()).unwrap();

        let module = task.steps()[0].output_module("SKIMStreamZMu").unwrap();
        assert_eq!(module.processed_dataset, "Run2024A-ZMu-PromptReco-v2");
        assert!(module.dataset().is_skim());
        assert_eq!(
            module.lfn_base.as_deref(),
            Some("/store/unmerged/Run2024A/SingleMuon/RAW-RECO/ZMu-PromptReco-v2/000/380/001")
        );
    }

    #[test]
    fn test_merge_uses_merged_lfn_and_updates_harvesting() {
        let mut tree = reco_tree();
        tree.update_lfns_and_datasets(None, &LfnDefaults::default()).unwrap();

        let merge = tree.find("/DataProcessing/DataProcessingMergeDQMoutput").unwrap();
        let module = merge.steps()[0].output_module("Merged").unwrap();
        assert_eq!(module.lfn_base, module.merged_lfn_base);

        let harvest = tree.find("/DataProcessing/DataProcessingMergeDQMoutput/HarvestDQM").unwrap();
        assert_eq!(
            harvest.steps()[0].dataset_name.as_deref(),
            Some("/SingleMuon/Run2024A-v3/DQMIO")
        );
    }

    #[test]
    fn test_subscriptions_follow_renames() {
        let mut tree = reco_tree();
        let defaults = SpecDefaults::default();
        tree.update_lfns_and_datasets(None, &defaults.lfn).unwrap();
        tree.root_mut()
            .set_subscription_information(&SubscriptionRequest::default(), &defaults.subscription);

        tree.root_mut().set_processing_version(&PropertyValue::from(4));
        tree.update_lfns_and_datasets(None, &defaults.lfn).unwrap();

        let record = tree.root().subscription("AODoutput").unwrap();
        assert_eq!(record.dataset, "/SingleMuon/Run2024A-v4/AOD");
    }

    #[test]
    fn test_log_base_follows_unmerged_base() {
        let mut tree = reco_tree();
        tree.update_lfns_and_datasets(None, &LfnDefaults::default()).unwrap();
        assert_eq!(tree.root().task_log_base_lfn(&LfnDefaults::default()), "/store/unmerged");
    }

    #[test]
    fn test_acquisition_era_required() {
        let mut task = TaskNode::new("DataProcessing");
        add_outputs(&mut task, vec![OutputModule::new("AODoutput", "SingleMuon", "AOD")]);
        assert!(matches!(
            task.update_lfns_and_datasets(None, &LfnDefaults::default()),
            Err(SpecError::MissingRequiredField(_))
        ));

        // Tasks without outputs need no era
        let mut bare = TaskNode::new("LogCollect");
        assert!(bare.update_lfns_and_datasets(None, &LfnDefaults::default()).is_ok());
    }

    #[test]
    fn test_invalid_lfn_base() {
        let mut task = TaskNode::new("DataProcessing");
        add_outputs(&mut task, vec![OutputModule::new("AODoutput", "SingleMuon", "AOD")]);
        task.set_acquisition_era(&PropertyValue::from("Run 2024".to_string()));
        assert!(matches!(
            task.update_lfns_and_datasets(None, &LfnDefaults::default()),
            Err(SpecError::InvalidLfn(_))
        ));
    }
    #[test]
    fn test_invalid_module_leaves_tree_untouched() {
        let mut tree = reco_tree();
        let defaults = SpecDefaults::default();
        tree.update_lfns_and_datasets(None, &defaults.lfn).unwrap();
        let root = tree.root_mut();
        root.steps[0]
            .add_output_module(OutputModule::new("BADoutput", "Single Muon", "AOD"))
            .unwrap();
        root.set_subscription_information(&SubscriptionRequest::default(), &defaults.subscription);

        tree.root_mut().set_processing_version(&PropertyValue::from(4));
        let expected = tree.clone();
        assert!(matches!(
            tree.update_lfns_and_datasets(None, &defaults.lfn),
            Err(SpecError::InvalidLfn(_))
        ));
        assert_eq!(tree, expected);

        let module = tree.root().get_step("cmsRun1").unwrap().output_module("AODoutput").unwrap();
        let record = tree.root().subscription("AODoutput").unwrap();
        assert_eq!(module.processed_dataset, "Run2024A-v3");
        assert_eq!(record.dataset, module.dataset().to_string());
    }

    #[test]
    fn test_invalid_descendant_blocks_root_rename() {
        let mut tree = reco_tree();
        let defaults = SpecDefaults::default();
        tree.update_lfns_and_datasets(None, &defaults.lfn).unwrap();
        tree.root_mut()
            .set_subscription_information(&SubscriptionRequest::default(), &defaults.subscription);

        let harvest = tree
            .find_mut("/DataProcessing/DataProcessingMergeDQMoutput/HarvestDQM")
            .unwrap();
        add_outputs(harvest, vec![OutputModule::new("DQMoutput", "Single Muon", "DQMIO")]);

        tree.root_mut().set_processing_version(&PropertyValue::from(4));
        assert!(tree.update_lfns_and_datasets(None, &defaults.lfn).is_err());

        let module = tree.root().get_step("cmsRun1").unwrap().output_module("AODoutput").unwrap();
        assert_eq!(module.processed_dataset, "Run2024A-v3");
        assert_eq!(
            tree.root().subscription("AODoutput").unwrap().dataset,
            "/SingleMuon/Run2024A-v3/AOD"
        );
    }

    #[test]
    fn test_dropped_output_still_updates_subscription_and_harvesting() {
        let mut tree = reco_tree();
        let defaults = SpecDefaults::default();
        tree.root_mut().set_processing_version(&PropertyValue::from(1));
        tree.update_lfns_and_datasets(None, &defaults.lfn).unwrap();

        let merge = tree.find_mut("/DataProcessing/DataProcessingMergeDQMoutput").unwrap();
        merge.set_subscription_information(&SubscriptionRequest::default(), &defaults.subscription);
        assert_eq!(
            merge.subscription("Merged").unwrap().dataset,
            "/SingleMuon/Run2024A-v1/DQMIO"
        );
        merge.steps[0].keep_output = false;

        tree.root_mut().set_processing_version(&PropertyValue::from(5));
        tree.update_lfns_and_datasets(None, &defaults.lfn).unwrap();

        let merge = tree.find("/DataProcessing/DataProcessingMergeDQMoutput").unwrap();
        let module = merge.steps()[0].output_module("Merged").unwrap();
        assert_eq!(module.dataset().to_string(), "/SingleMuon/Run2024A-v5/DQMIO");
        assert_eq!(merge.subscription("Merged").unwrap().dataset, "/SingleMuon/Run2024A-v5/DQMIO");
        assert!(merge.list_output_datasets_and_modules().is_empty());

        let harvest = tree.find("/DataProcessing/DataProcessingMergeDQMoutput/HarvestDQM").unwrap();
        assert_eq!(
            harvest.steps()[0].dataset_name.as_deref(),
            Some("/SingleMuon/Run2024A-v5/DQMIO")
        );
    }

    #[test]
    fn test_oversized_run_is_rejected_before_renaming() {
        let mut tree = reco_tree();
        let expected = tree.clone();
        assert!(tree.update_lfns_and_datasets(Some(4_000_000_000), &LfnDefaults::default()).is_err());
        assert_eq!(tree, expected);
    }
}
