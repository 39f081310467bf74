//! Dataset path and LFN lexicon.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use crate::error::{Result, SpecError};

static DATASET_RE: OnceLock<Regex> = OnceLock::new();
static LFN_RE: OnceLock<Regex> = OnceLock::new();

fn dataset_re() -> &'static Regex {
    DATASET_RE.get_or_init(|| {
        Regex::new(r"^/([A-Za-z0-9_.\-]+)/([A-Za-z0-9_.\-]+)/([A-Za-z0-9_\-]+)$")
            .expect("dataset pattern is valid")
    })
}

fn lfn_re() -> &'static Regex {
    LFN_RE.get_or_init(|| {
        Regex::new(r"^(/[A-Za-z0-9_.\-]+)+$").expect("lfn pattern is valid")
    })
}

/// A dataset name of the form `/primary/processed/tier`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DatasetPath {
    /// Primary dataset
    pub primary: String,
    /// Processed dataset (era, filter, processing string and version)
    pub processed: String,
    /// Data tier
    pub tier: String,
}

impl DatasetPath {
    /// Assemble from parts without validation.
    pub fn new(
        primary: impl Into<String>,
        processed: impl Into<String>,
        tier: impl Into<String>,
    ) -> Self {
        Self {
            primary: primary.into(),
            processed: processed.into(),
            tier: tier.into(),
        }
    }

    /// Skim outputs carry a filter name, which gives the processed
    /// dataset four hyphen-separated segments.
    pub fn is_skim(&self) -> bool {
        self.processed.split('-').count() == 4
    }
}

impl fmt::Display for DatasetPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/{}/{}", self.primary, self.processed, self.tier)
    }
}

impl FromStr for DatasetPath {
    type Err = SpecError;

    fn from_str(s: &str) -> Result<Self> {
        let caps = dataset_re()
            .captures(s)
            .ok_or_else(|| SpecError::InvalidDatasetPath(s.to_string()))?;
        Ok(Self::new(&caps[1], &caps[2], &caps[3]))
    }
}

impl TryFrom<String> for DatasetPath {
    type Error = SpecError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<DatasetPath> for String {
    fn from(d: DatasetPath) -> Self {
        d.to_string()
    }
}

/// Check an LFN or LFN base against the lexicon: absolute, slash-separated,
/// no empty segments.
pub fn validate_lfn(candidate: &str) -> Result<()> {
    if lfn_re().is_match(candidate) {
        Ok(())
    } else {
        Err(SpecError::InvalidLfn(candidate.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let ds: DatasetPath = "/SingleMuon/Run2024A-v3/AOD".parse().unwrap();
        assert_eq!(ds.primary, "SingleMuon");
        assert_eq!(ds.processed, "Run2024A-v3");
        assert_eq!(ds.tier, "AOD");
        assert_eq!(ds.to_string(), "/SingleMuon/Run2024A-v3/AOD");
    }

    #[test]
    fn test_rejects_malformed() {
        for bad in ["SingleMuon/Run2024A-v3/AOD", "/SingleMuon/AOD", "/a/b/c/d", "/a//c"] {
            assert!(
                matches!(bad.parse::<DatasetPath>(), Err(SpecError::InvalidDatasetPath(_))),
                "{} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_skim_heuristic() {
        let skim = DatasetPath::new("MinBias", "Run2024A-ZMu-PromptReco-v1", "RAW-RECO");
        let plain = DatasetPath::new("MinBias", "Run2024A-PromptReco-v1", "RECO");
        assert!(skim.is_skim());
        assert!(!plain.is_skim());
    }

    #[test]
    fn test_lfn_lexicon() {
        assert!(validate_lfn("/store/unmerged/Run2024A/SingleMuon/AOD/v3").is_ok());
        assert!(validate_lfn("/store/data/Run2024A/SingleMuon/AOD/v3/000/123/456").is_ok());
        assert!(validate_lfn("store/unmerged").is_err());
        assert!(validate_lfn("/store//unmerged").is_err());
        assert!(validate_lfn("/store/un merged").is_err());
    }
}
