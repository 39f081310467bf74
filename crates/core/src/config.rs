//! Fallback values used when a workload leaves a setting unspecified.

use serde::{Deserialize, Serialize};

use crate::subscription::{SubscriptionPriority, SubscriptionType};

/// Merged LFN base used when no task sets one.
pub const DEFAULT_MERGED_LFN_BASE: &str = "/store/data";

/// Unmerged LFN base used when no task sets one.
pub const DEFAULT_UNMERGED_LFN_BASE: &str = "/store/unmerged";

/// Base LFN for task log archives.
pub const DEFAULT_LOG_BASE_LFN: &str = "/store/temp/WMAgent/unmerged";

/// Group a subscription is accounted to by default.
pub const DEFAULT_SUBSCRIPTION_GROUP: &str = "DataOps";

/// All defaults, loadable as a JSON overlay.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SpecDefaults {
    /// LFN base fallbacks
    pub lfn: LfnDefaults,

    /// Values a freshly created subscription record starts with
    pub subscription: SubscriptionDefaults,
}

impl SpecDefaults {
    /// Parse a JSON overlay; keys it omits keep their defaults.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

/// LFN base fallbacks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LfnDefaults {
    /// Merged LFN base
    pub merged: String,
    /// Unmerged LFN base
    pub unmerged: String,
    /// Log archive base until naming sets one
    pub log: String,
}

impl Default for LfnDefaults {
    fn default() -> Self {
        Self {
            merged: DEFAULT_MERGED_LFN_BASE.to_string(),
            unmerged: DEFAULT_UNMERGED_LFN_BASE.to_string(),
            log: DEFAULT_LOG_BASE_LFN.to_string(),
        }
    }
}

/// Initial values of a new subscription record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SubscriptionDefaults {
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

impl Default for SubscriptionDefaults {
    fn default() -> Self {
        Self {
            priority: SubscriptionPriority::Low,
            custodial_sub_type: SubscriptionType::Replica,
            non_custodial_sub_type: SubscriptionType::Replica,
            custodial_group: DEFAULT_SUBSCRIPTION_GROUP.to_string(),
            non_custodial_group: DEFAULT_SUBSCRIPTION_GROUP.to_string(),
            delete_from_source: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlay_keeps_unspecified_defaults() {
        let defaults = SpecDefaults::from_json(
            r#"{"lfn": {"unmerged": "/store/backfill/1"}, "subscription": {"priority": "High"}}"#,
        )
        .unwrap();

        assert_eq!(defaults.lfn.unmerged, "/store/backfill/1");
        assert_eq!(defaults.lfn.merged, DEFAULT_MERGED_LFN_BASE);
        assert_eq!(defaults.lfn.log, DEFAULT_LOG_BASE_LFN);
        assert_eq!(defaults.subscription.priority, SubscriptionPriority::High);
        assert_eq!(defaults.subscription.custodial_group, "DataOps");
    }

    #[test]
    fn test_empty_overlay_is_default() {
        assert_eq!(SpecDefaults::from_json("{}").unwrap(), SpecDefaults::default());
    }
}
