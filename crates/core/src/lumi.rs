//! Lumi masks: per-run inclusive lumi-section ranges.
//!
//! Job splitting stores a mask as two parallel lists under the splitting
//! parameters: `runs` (run numbers) and `lumis` (one comma-joined string of
//! range bounds per run, e.g. `"1,4,23,45"` for `[[1,4],[23,45]]`).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{Result, SpecError};

/// Mapping from run number to inclusive lumi ranges.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LumiMask(BTreeMap<u32, Vec<(u32, u32)>>);

impl LumiMask {
    /// Empty mask.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert of one run's ranges.
    pub fn with_run(mut self, run: u32, ranges: Vec<(u32, u32)>) -> Self {
        self.0.insert(run, ranges);
        self
    }

    /// Whether no run is selected.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Selected runs in ascending order.
    pub fn runs(&self) -> impl Iterator<Item = u32> + '_ {
        self.0.keys().copied()
    }

    /// Lumi ranges of one run.
    pub fn ranges(&self, run: u32) -> Option<&[(u32, u32)]> {
        self.0.get(&run).map(Vec::as_slice)
    }

    /// Whether the mask selects `lumi` of `run`.
    pub fn contains(&self, run: u32, lumi: u32) -> bool {
        self.0
            .get(&run)
            .map(|ranges| ranges.iter().any(|&(lo, hi)| lo <= lumi && lumi <= hi))
            .unwrap_or(false)
    }

    /// Check every range is ordered.
    pub fn validate(&self) -> Result<()> {
        for (run, ranges) in &self.0 {
            if let Some((lo, hi)) = ranges.iter().find(|(lo, hi)| lo > hi) {
                return Err(SpecError::InvalidSplittingInput(format!(
                    "run {} has inverted lumi range [{}, {}]",
                    run, lo, hi
                )));
            }
        }
        Ok(())
    }

    /// Split into the parallel `runs` / `lumis` lists.
    pub fn to_run_lumi_lists(&self) -> (Vec<u32>, Vec<String>) {
        let mut runs = Vec::with_capacity(self.0.len());
        let mut lumis = Vec::with_capacity(self.0.len());
        for (run, ranges) in &self.0 {
            runs.push(*run);
            let bounds: Vec<String> = ranges
                .iter()
                .flat_map(|(lo, hi)| [lo.to_string(), hi.to_string()])
                .collect();
            lumis.push(bounds.join(","));
        }
        (runs, lumis)
    }

    /// Rebuild a mask from the parallel `runs` / `lumis` lists.
    ///
    /// The lists must have the same length and every lumi string must hold
    /// an even number of bounds.
    pub fn from_run_lumi_lists(runs: &[u32], lumis: &[String]) -> Result<Self> {
        if runs.len() != lumis.len() {
            return Err(SpecError::InvalidSplittingInput(format!(
                "{} runs but {} lumi lists",
                runs.len(),
                lumis.len()
            )));
        }

        let mut mask = BTreeMap::new();
        for (run, lumi) in runs.iter().zip(lumis) {
            let bounds = parse_bounds(lumi)?;
            if bounds.len() % 2 != 0 {
                return Err(SpecError::InvalidSplittingInput(format!(
                    "odd number of lumi bounds for run {}: '{}'",
                    run, lumi
                )));
            }
            let ranges = bounds.chunks(2).map(|pair| (pair[0], pair[1])).collect();
            mask.insert(*run, ranges);
        }
        Ok(Self(mask))
    }
}

fn parse_bounds(lumi: &str) -> Result<Vec<u32>> {
    if lumi.trim().is_empty() {
        return Ok(Vec::new());
    }
    lumi.split(',')
        .map(|b| {
            b.trim().parse::<u32>().map_err(|_| {
                SpecError::InvalidSplittingInput(format!("bad lumi bound '{}' in '{}'", b, lumi))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_lumi_lists() {
        let mask = LumiMask::new()
            .with_run(3, vec![(1, 4), (23, 45)])
            .with_run(4, vec![(5, 84), (234, 445)]);

        let (runs, lumis) = mask.to_run_lumi_lists();
        assert_eq!(runs, vec![3, 4]);
        assert_eq!(lumis, vec!["1,4,23,45", "5,84,234,445"]);

        assert_eq!(LumiMask::from_run_lumi_lists(&runs, &lumis).unwrap(), mask);
    }

    #[test]
    fn test_mismatched_lengths() {
        let err = LumiMask::from_run_lumi_lists(&[1, 2], &["1,2".to_string()]).unwrap_err();
        assert!(matches!(err, SpecError::InvalidSplittingInput(_)));
    }

    #[test]
    fn test_odd_bounds() {
        let err = LumiMask::from_run_lumi_lists(&[1], &["1,2,3".to_string()]).unwrap_err();
        assert!(matches!(err, SpecError::InvalidSplittingInput(_)));
    }

    #[test]
    fn test_contains() {
        let mask = LumiMask::new().with_run(380001, vec![(1, 10), (20, 20)]);
        assert!(mask.contains(380001, 10));
        assert!(mask.contains(380001, 20));
        assert!(!mask.contains(380001, 15));
        assert!(!mask.contains(380002, 1));
    }

    #[test]
    fn test_inverted_range() {
        let mask = LumiMask::new().with_run(1, vec![(9, 3)]);
        assert!(mask.validate().is_err());
    }

    #[test]
    fn test_json_shape() {
        let mask: LumiMask = serde_json::from_str(r#"{"380001": [[1, 10], [20, 30]]}"#).unwrap();
        assert_eq!(mask.ranges(380001), Some(&[(1, 10), (20, 30)][..]));
    }
}
