//! Property propagation down the task tree.
//!
//! A propagated value is either uniform or keyed by task name. Each task
//! resolves its own value (its entry in the mapping, else the value its
//! parent resolved), stores it, and hands the stored value to its children
//! as their fallback.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::dataset::validate_lfn;
use crate::error::{Result, SpecError};
use crate::lumi::LumiMask;
use crate::section::{ConfigValue, Scalar};
use crate::task::TaskNode;

/// A value applied uniformly or per task name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue<T> {
    /// Same value for every task
    Uniform(T),
    /// Sparse per-task overrides; absent tasks inherit from their parent
    PerTask(BTreeMap<String, T>),
}

impl<T: Clone> PropertyValue<T> {
    /// Build a per-task mapping.
    pub fn per_task<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, T)>,
        K: Into<String>,
    {
        Self::PerTask(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Value for `task_name`, falling back to `inherited`.
    pub fn resolve(&self, task_name: &str, inherited: Option<&T>) -> Option<T> {
        match self {
            Self::Uniform(v) => Some(v.clone()),
            Self::PerTask(map) => map.get(task_name).or(inherited).cloned(),
        }
    }

    /// Every value that could be applied.
    pub fn values(&self) -> Vec<&T> {
        match self {
            Self::Uniform(v) => vec![v],
            Self::PerTask(map) => map.values().collect(),
        }
    }
}

impl<T> From<T> for PropertyValue<T> {
    fn from(v: T) -> Self {
        Self::Uniform(v)
    }
}

/// Merged and unmerged LFN bases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LfnBases {
    /// Merged LFN base
    pub merged: String,
    /// Unmerged LFN base
    pub unmerged: String,
}

impl LfnBases {
    /// Pair of bases.
    pub fn new(merged: impl Into<String>, unmerged: impl Into<String>) -> Self {
        Self {
            merged: merged.into(),
            unmerged: unmerged.into(),
        }
    }
}

/// Assignment-time property applied with [`TaskNode::set_properties`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskProperty {
    /// Processing version
    ProcessingVersion(PropertyValue<u32>),
    /// Acquisition era
    AcquisitionEra(PropertyValue<String>),
    /// Processing string
    ProcessingString(PropertyValue<String>),
    /// Max resident set size in KiB
    #[serde(rename = "MaxRSS")]
    MaxRss(PropertyValue<u64>),
    /// Max virtual size in KiB
    MaxVSize(PropertyValue<u64>),
}

impl TaskNode {
    /// Resolve `value` here, let `apply` store it and return what the
    /// children inherit, then recurse.
    pub(crate) fn cascade<T, F>(&mut self, value: &PropertyValue<T>, inherited: Option<T>, apply: &mut F)
    where
        T: Clone,
        F: FnMut(&mut TaskNode, Option<T>) -> Option<T>,
    {
        let resolved = value.resolve(&self.name, inherited.as_ref());
        let carried = apply(self, resolved);
        for child in &mut self.children {
            child.cascade(value, carried.clone(), apply);
        }
    }

    fn takes_resource_limits(&self) -> bool {
        self.task_type
            .map(|t| t.takes_resource_limits())
            .unwrap_or(false)
    }

    /// Set the acquisition era here and below.
    pub fn set_acquisition_era(&mut self, era: &PropertyValue<String>) {
        debug!(task = %self.path_name, "propagating acquisition era");
        self.cascade(era, None, &mut |task: &mut TaskNode, resolved: Option<String>| {
            task.parameters.acquisition_era = resolved.clone();
            resolved
        });
    }

    /// Tasks with no resolved version get 0.
    pub fn set_processing_version(&mut self, version: &PropertyValue<u32>) {
        debug!(task = %self.path_name, "propagating processing version");
        self.cascade(version, None, &mut |task: &mut TaskNode, resolved: Option<u32>| {
            let version = resolved.unwrap_or(0);
            task.parameters.processing_version = version;
            Some(version)
        });
    }

    /// Set the processing string here and below.
    pub fn set_processing_string(&mut self, processing_string: &PropertyValue<String>) {
        debug!(task = %self.path_name, "propagating processing string");
        self.cascade(
            processing_string,
            None,
            &mut |task: &mut TaskNode, resolved: Option<String>| {
                task.parameters.processing_string = resolved.clone();
                resolved
            },
        );
    }

    /// Record a max RSS limit on every Processing, Production and Skim task.
    /// Other task types are skipped but their descendants still inherit.
    pub fn set_max_rss(&mut self, max_rss: &PropertyValue<u64>) {
        debug!(task = %self.path_name, "propagating max RSS");
        self.cascade(max_rss, None, &mut |task: &mut TaskNode, resolved: Option<u64>| {
            if let Some(limit) = resolved.filter(|v| *v > 0) {
                if task.takes_resource_limits() {
                    task.performance_monitor_mut().max_rss = Some(limit);
                }
            }
            resolved
        });
    }

    /// Same scoping as [`TaskNode::set_max_rss`].
    pub fn set_max_vsize(&mut self, max_vsize: &PropertyValue<u64>) {
        debug!(task = %self.path_name, "propagating max VSize");
        self.cascade(max_vsize, None, &mut |task: &mut TaskNode, resolved: Option<u64>| {
            if let Some(limit) = resolved.filter(|v| *v > 0) {
                if task.takes_resource_limits() {
                    task.performance_monitor_mut().max_vsize = Some(limit);
                }
            }
            resolved
        });
    }

    /// Set the core count of every processing step of eligible tasks.
    pub fn set_number_of_cores(&mut self, cores: &PropertyValue<u32>) {
        debug!(task = %self.path_name, "propagating number of cores");
        self.cascade(cores, None, &mut |task: &mut TaskNode, resolved: Option<u32>| {
            if let Some(n) = resolved.filter(|v| *v > 0) {
                if task.takes_resource_limits() {
                    for step in task.steps.iter_mut().filter(|s| s.is_cmssw()) {
                        step.number_of_cores = Some(n);
                    }
                }
            }
            resolved
        });
    }

    /// Update the watchdog limits. Timeouts apply to this task only; the
    /// hard timeout is the soft timeout plus the grace period.
    pub fn set_performance_monitor(
        &mut self,
        max_rss: Option<&PropertyValue<u64>>,
        max_vsize: Option<&PropertyValue<u64>>,
        soft_timeout: Option<u64>,
        grace_period: Option<u64>,
    ) {
        if max_rss.is_none() && max_vsize.is_none() && soft_timeout.is_none() && grace_period.is_none() {
            return;
        }
        if let Some(rss) = max_rss {
            self.set_max_rss(rss);
        }
        if let Some(vsize) = max_vsize {
            self.set_max_vsize(vsize);
        }
        if let Some(soft) = soft_timeout.filter(|v| *v > 0) {
            let monitor = self.performance_monitor_mut();
            monitor.soft_timeout = Some(soft);
            if let Some(grace) = grace_period.filter(|v| *v > 0) {
                monitor.hard_timeout = Some(soft + grace);
            }
        }
    }

    /// Set the prepID where none is set yet. A task that already carries a
    /// prepID keeps it, and its own prepID is what its children inherit.
    pub fn set_prep_id(&mut self, prep_id: &PropertyValue<String>) {
        debug!(task = %self.path_name, "propagating prepID");
        self.cascade(prep_id, None, &mut |task: &mut TaskNode, resolved: Option<String>| {
            let current_empty = task.prep_id.as_deref().map_or(true, str::is_empty);
            match resolved {
                Some(new) if current_empty && !new.is_empty() => task.prep_id = Some(new),
                Some(new) if !current_empty && task.prep_id.as_deref() != Some(new.as_str()) => {
                    debug!(task = %task.path_name, ignored = %new, "prepID already set");
                }
                _ => {}
            }
            task.prep_id.clone()
        });
    }

    /// Set the merged and unmerged LFN bases. Every candidate base is
    /// checked before any task is touched.
    pub fn set_lfn_base(&mut self, bases: &PropertyValue<LfnBases>) -> Result<()> {
        for b in bases.values() {
            validate_lfn(&b.merged)?;
            validate_lfn(&b.unmerged)?;
        }
        debug!(task = %self.path_name, "propagating LFN bases");
        self.cascade(bases, None, &mut |task: &mut TaskNode, resolved: Option<LfnBases>| {
            if let Some(b) = &resolved {
                task.merged_lfn_base = Some(b.merged.clone());
                task.unmerged_lfn_base = Some(b.unmerged.clone());
            }
            resolved
        });
        Ok(())
    }

    /// Attach a lumi mask to this task and its descendants.
    ///
    /// An empty mask is a no-op. Without `override_existing`, a task that
    /// already holds run/lumi lists stops the propagation at that task.
    pub fn set_lumi_mask(&mut self, mask: &LumiMask, override_existing: bool) -> Result<()> {
        if mask.is_empty() {
            return Ok(());
        }
        mask.validate()?;
        let (runs, lumis) = mask.to_run_lumi_lists();
        self.apply_run_lumi_lists(&runs, &lumis, override_existing);
        Ok(())
    }

    fn apply_run_lumi_lists(&mut self, runs: &[u32], lumis: &[String], override_existing: bool) {
        if !override_existing && self.has_run_lumi_lists() {
            debug!(task = %self.path_name, "keeping existing lumi mask");
            return;
        }
        let params = &mut self.input.splitting.params;
        params.set("runs", ConfigValue::list(runs.iter().copied()));
        params.set("lumis", ConfigValue::list(lumis.iter().cloned()));
        for child in &mut self.children {
            child.apply_run_lumi_lists(runs, lumis, override_existing);
        }
    }

    fn has_run_lumi_lists(&self) -> bool {
        let params = &self.input.splitting.params;
        let present = |key: &str| params.get_list(key).map_or(false, |l: &[Scalar]| !l.is_empty());
        present("runs") && present("lumis")
    }

    /// The lumi mask held by this task; empty when none is set.
    pub fn lumi_mask(&self) -> Result<LumiMask> {
        if !self.has_run_lumi_lists() {
            return Ok(LumiMask::new());
        }
        let params = &self.input.splitting.params;
        let runs = params
            .get_list("runs")
            .unwrap_or_default()
            .iter()
            .map(|s| {
                s.as_i64()
                    .and_then(|r| u32::try_from(r).ok())
                    .ok_or_else(|| SpecError::InvalidSplittingInput(format!("bad run number {:?}", s)))
            })
            .collect::<Result<Vec<u32>>>()?;
        let lumis = params
            .get_list("lumis")
            .unwrap_or_default()
            .iter()
            .map(|s| {
                s.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| SpecError::InvalidSplittingInput(format!("bad lumi list {:?}", s)))
            })
            .collect::<Result<Vec<String>>>()?;
        LumiMask::from_run_lumi_lists(&runs, &lumis)
    }

    /// Apply assignment-time properties in order.
    pub fn set_properties(&mut self, properties: &[TaskProperty]) {
        for property in properties {
            match property {
                TaskProperty::ProcessingVersion(v) => self.set_processing_version(v),
                TaskProperty::AcquisitionEra(v) => self.set_acquisition_era(v),
                TaskProperty::ProcessingString(v) => self.set_processing_string(v),
                TaskProperty::MaxRss(v) => self.set_max_rss(v),
                TaskProperty::MaxVSize(v) => self.set_max_vsize(v),
            }
        }
    }
}
