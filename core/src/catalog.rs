use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CatalogError;
use crate::signals::SignalId;

/// A diagnosable condition of the tracking pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueType {
    PermissionsNotGranted,
    HealthBridgeNotInstalled,
    PlatformUnsupported,
    NoDataRecorded,
    StaleData,
    BatteryOptimizationEnabled,
    DataDiscrepancy,
    MultipleConflictingSources,
    ManualEntriesDetected,
}

impl IssueType {
    pub fn as_str(self) -> &'static str {
        match self {
            IssueType::PermissionsNotGranted => "permissions_not_granted",
            IssueType::HealthBridgeNotInstalled => "health_bridge_not_installed",
            IssueType::PlatformUnsupported => "platform_unsupported",
            IssueType::NoDataRecorded => "no_data_recorded",
            IssueType::StaleData => "stale_data",
            IssueType::BatteryOptimizationEnabled => "battery_optimization_enabled",
            IssueType::DataDiscrepancy => "data_discrepancy",
            IssueType::MultipleConflictingSources => "multiple_conflicting_sources",
            IssueType::ManualEntriesDetected => "manual_entries_detected",
        }
    }
}

impl fmt::Display for IssueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Evidence on `signal` equal to `fires_when` points toward the issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Indicator {
    pub signal: SignalId,
    pub fires_when: bool,
}

const fn fires(signal: SignalId, fires_when: bool) -> Indicator {
    Indicator { signal, fires_when }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IssueDefinition {
    pub issue_type: IssueType,
    pub prior_probability: f64,
    pub severity: f64,
    pub actionability: f64,
    /// P(indicator fires | issue present)
    pub likelihood_given_true: f64,
    /// P(indicator fires | issue absent)
    pub likelihood_given_false: f64,
    pub indicators: &'static [Indicator],
    pub summary: &'static str,
    pub remediation: &'static str,
}

impl IssueDefinition {
    pub fn relevant_signals(&self) -> impl Iterator<Item = SignalId> + '_ {
        self.indicators.iter().map(|indicator| indicator.signal)
    }
}

/// Built-in catalog. Declaration order is the last tie-breaker when ranking.
pub static CATALOG: &[IssueDefinition] = &[
    IssueDefinition {
        issue_type: IssueType::PermissionsNotGranted,
        prior_probability: 0.15,
        severity: 1.0,
        actionability: 0.9,
        likelihood_given_true: 0.95,
        likelihood_given_false: 0.05,
        indicators: &[fires(SignalId::PermissionsGranted, false)],
        summary: "activity permissions are not granted",
        remediation: "Open the app's health permissions and allow access to steps and activity.",
    },
    IssueDefinition {
        issue_type: IssueType::HealthBridgeNotInstalled,
        prior_probability: 0.10,
        severity: 0.9,
        actionability: 0.8,
        likelihood_given_true: 0.95,
        likelihood_given_false: 0.05,
        indicators: &[fires(SignalId::HealthBridgeInstalled, false)],
        summary: "the health data bridge is not installed",
        remediation: "Install or update the health data bridge app from the store, then reopen the app.",
    },
    IssueDefinition {
        issue_type: IssueType::PlatformUnsupported,
        prior_probability: 0.05,
        severity: 1.0,
        actionability: 0.1,
        likelihood_given_true: 0.95,
        likelihood_given_false: 0.05,
        indicators: &[fires(SignalId::PlatformSupported, false)],
        summary: "this device cannot share activity data",
        remediation: "Activity tracking needs a newer OS version; update the device if an update is offered.",
    },
    IssueDefinition {
        issue_type: IssueType::NoDataRecorded,
        prior_probability: 0.10,
        severity: 0.8,
        actionability: 0.5,
        likelihood_given_true: 0.90,
        likelihood_given_false: 0.10,
        indicators: &[
            fires(SignalId::DataPresent, false),
            fires(SignalId::TodayActivity, false),
        ],
        summary: "no activity data is being recorded",
        remediation: "Carry the phone or wear the tracker for a while, then check that a tracking app is recording steps.",
    },
    IssueDefinition {
        issue_type: IssueType::StaleData,
        prior_probability: 0.20,
        severity: 0.7,
        actionability: 0.6,
        likelihood_given_true: 0.85,
        likelihood_given_false: 0.15,
        indicators: &[
            fires(SignalId::DataFresh, false),
            fires(SignalId::SyncRecent, false),
        ],
        summary: "activity data has stopped updating",
        remediation: "Open the tracking app to force a sync and keep it allowed to run in the background.",
    },
    IssueDefinition {
        issue_type: IssueType::BatteryOptimizationEnabled,
        prior_probability: 0.25,
        severity: 0.6,
        actionability: 0.9,
        likelihood_given_true: 0.90,
        likelihood_given_false: 0.20,
        indicators: &[fires(SignalId::BatteryOptimizationEnabled, true)],
        summary: "battery optimization restricts background syncing",
        remediation: "Exclude the app from battery optimization in the system battery settings.",
    },
    IssueDefinition {
        issue_type: IssueType::DataDiscrepancy,
        prior_probability: 0.10,
        severity: 0.4,
        actionability: 0.6,
        likelihood_given_true: 0.90,
        likelihood_given_false: 0.10,
        indicators: &[fires(SignalId::SourceCountsAgree, false)],
        summary: "sources report different totals for the same day",
        remediation: "Pick one preferred source for steps in the health settings so totals stop competing.",
    },
    IssueDefinition {
        issue_type: IssueType::MultipleConflictingSources,
        prior_probability: 0.20,
        severity: 0.3,
        actionability: 0.7,
        likelihood_given_true: 0.90,
        likelihood_given_false: 0.10,
        indicators: &[fires(SignalId::MultipleSources, true)],
        summary: "several apps or devices write activity data",
        remediation: "Review which apps write steps and disable the ones you no longer use.",
    },
    IssueDefinition {
        issue_type: IssueType::ManualEntriesDetected,
        prior_probability: 0.10,
        severity: 0.2,
        actionability: 0.5,
        likelihood_given_true: 0.90,
        likelihood_given_false: 0.10,
        indicators: &[fires(SignalId::ManualEntries, true)],
        summary: "manually entered activity is mixed with tracked data",
        remediation: "Manual entries are counted alongside tracked ones; remove duplicates if totals look too high.",
    },
];

/// A known cause-and-effect pairing between two issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CausalLink {
    pub cause: IssueType,
    pub effect: IssueType,
    pub explanation: &'static str,
}

pub static CAUSAL_LINKS: &[CausalLink] = &[
    CausalLink {
        cause: IssueType::BatteryOptimizationEnabled,
        effect: IssueType::StaleData,
        explanation: "the system suspends background sync, so new activity arrives late or not at all",
    },
    CausalLink {
        cause: IssueType::MultipleConflictingSources,
        effect: IssueType::DataDiscrepancy,
        explanation: "each source counts the same movement differently, so daily totals disagree",
    },
    CausalLink {
        cause: IssueType::ManualEntriesDetected,
        effect: IssueType::DataDiscrepancy,
        explanation: "manual entries are not deduplicated against tracked activity",
    },
    CausalLink {
        cause: IssueType::PermissionsNotGranted,
        effect: IssueType::NoDataRecorded,
        explanation: "without permission the app cannot read any activity",
    },
    CausalLink {
        cause: IssueType::HealthBridgeNotInstalled,
        effect: IssueType::NoDataRecorded,
        explanation: "the bridge is the only path activity data takes into the app",
    },
    CausalLink {
        cause: IssueType::PlatformUnsupported,
        effect: IssueType::NoDataRecorded,
        explanation: "the device has no supported way to share activity data",
    },
];

pub fn find_definition(catalog: &[IssueDefinition], issue: IssueType) -> Option<&IssueDefinition> {
    catalog.iter().find(|def| def.issue_type == issue)
}

/// Reject catalogs that could push scores out of `[0, 1]` or reference unknown issues.
pub fn validate_catalog(catalog: &[IssueDefinition], links: &[CausalLink]) -> Result<(), CatalogError> {
    let mut seen = BTreeSet::new();
    for def in catalog {
        if !seen.insert(def.issue_type) {
            return Err(CatalogError::DuplicateIssue(def.issue_type));
        }
        for (field, value) in [
            ("prior_probability", def.prior_probability),
            ("severity", def.severity),
            ("actionability", def.actionability),
            ("likelihood_given_true", def.likelihood_given_true),
            ("likelihood_given_false", def.likelihood_given_false),
        ] {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(CatalogError::OutOfRange {
                    issue: def.issue_type,
                    field,
                    value,
                });
            }
        }
    }

    for link in links {
        if !seen.contains(&link.cause) || !seen.contains(&link.effect) {
            return Err(CatalogError::DanglingLink {
                cause: link.cause,
                effect: link.effect,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{CATALOG, CAUSAL_LINKS, IssueDefinition, IssueType, validate_catalog};
    use crate::config::DEFAULT_REPORTING_THRESHOLD;
    use crate::error::CatalogError;

    #[test]
    fn builtin_catalog_is_valid() {
        assert_eq!(validate_catalog(CATALOG, CAUSAL_LINKS), Ok(()));
    }

    #[test]
    fn priors_alone_never_reach_the_reporting_threshold() {
        for def in CATALOG {
            assert!(
                def.prior_probability <= DEFAULT_REPORTING_THRESHOLD,
                "{} would be reported without any evidence",
                def.issue_type
            );
        }
    }

    #[test]
    fn indicators_cover_every_signal() {
        let mut covered: Vec<_> = CATALOG.iter().flat_map(|def| def.relevant_signals()).collect();
        covered.sort();
        covered.dedup();
        assert_eq!(covered, crate::signals::SignalId::ALL.to_vec());
    }

    #[test]
    fn duplicate_issue_is_rejected() {
        let catalog = [CATALOG[0], CATALOG[0]];
        assert_eq!(
            validate_catalog(&catalog, &[]),
            Err(CatalogError::DuplicateIssue(IssueType::PermissionsNotGranted))
        );
    }

    #[test]
    fn out_of_range_probability_is_rejected() {
        let catalog = [IssueDefinition {
            severity: 1.5,
            ..CATALOG[0]
        }];
        assert!(matches!(
            validate_catalog(&catalog, &[]),
            Err(CatalogError::OutOfRange { field: "severity", .. })
        ));

        let catalog = [IssueDefinition {
            likelihood_given_false: f64::NAN,
            ..CATALOG[0]
        }];
        assert!(validate_catalog(&catalog, &[]).is_err());
    }

    #[test]
    fn links_must_reference_catalog_issues() {
        let catalog = [CATALOG[0]];
        assert!(matches!(
            validate_catalog(&catalog, CAUSAL_LINKS),
            Err(CatalogError::DanglingLink { .. })
        ));
    }
}
