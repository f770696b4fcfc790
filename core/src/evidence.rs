use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::activity::{ActivitySummary, DataFreshnessStatus};
use crate::config::EngineConfig;
use crate::error::{CheckerError, codes};
use crate::signals::{
    ActivitySample, BatteryOptimization, PermissionStatus, PlatformSupport, SignalId,
};

const PLATFORM_SIGNALS: &[SignalId] = &[SignalId::PlatformSupported, SignalId::HealthBridgeInstalled];
const PERMISSION_SIGNALS: &[SignalId] = &[SignalId::PermissionsGranted];
const BATTERY_SIGNALS: &[SignalId] = &[SignalId::BatteryOptimizationEnabled];
const ACTIVITY_SIGNALS: &[SignalId] = &[
    SignalId::DataPresent,
    SignalId::TodayActivity,
    SignalId::DataFresh,
    SignalId::SyncRecent,
    SignalId::MultipleSources,
    SignalId::SourceCountsAgree,
    SignalId::ManualEntries,
];

/// A reliability-weighted observation about one signal.
///
/// `observed == None` is unknown evidence: the check was attempted and failed.
/// It carries zero reliability and never moves a posterior.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evidence {
    pub signal: SignalId,
    pub observed: Option<bool>,
    pub reliability: f64,
    pub detail: String,
}

impl Evidence {
    pub fn is_usable(&self) -> bool {
        self.observed.is_some() && self.reliability > 0.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SignalReading {
    Observed(Evidence),
    /// Omitted from scoring; the issues it feeds keep their prior.
    NotApplicable(SignalId),
}

impl SignalReading {
    pub fn signal(&self) -> SignalId {
        match self {
            SignalReading::Observed(evidence) => evidence.signal,
            SignalReading::NotApplicable(signal) => *signal,
        }
    }

    pub fn status(&self) -> CheckStatus {
        match self {
            SignalReading::Observed(evidence) if evidence.observed.is_some() => CheckStatus::Checked,
            SignalReading::Observed(_) => CheckStatus::Failed,
            SignalReading::NotApplicable(_) => CheckStatus::NotApplicable,
        }
    }

    pub fn detail(&self) -> &str {
        match self {
            SignalReading::Observed(evidence) => &evidence.detail,
            SignalReading::NotApplicable(_) => "not applicable on this platform",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Checked,
    Failed,
    NotApplicable,
}

impl CheckStatus {
    pub fn code(self) -> &'static str {
        match self {
            CheckStatus::Checked => codes::CHECKED,
            CheckStatus::Failed => codes::CHECK_FAILED,
            CheckStatus::NotApplicable => codes::NOT_APPLICABLE,
        }
    }
}

/// One reading per catalog signal, kept in `SignalId::ALL` order.
#[derive(Debug, Clone, PartialEq)]
pub struct EvidenceSet {
    readings: Vec<SignalReading>,
}

impl EvidenceSet {
    /// Order readings by signal declaration. A signal nobody reported on is
    /// recorded as a failed check, so the set is always complete.
    pub fn from_readings(readings: impl IntoIterator<Item = SignalReading>) -> Self {
        let mut by_signal: BTreeMap<SignalId, SignalReading> = BTreeMap::new();
        for reading in readings {
            by_signal.entry(reading.signal()).or_insert(reading);
        }

        let readings = SignalId::ALL
            .iter()
            .map(|signal| {
                by_signal.remove(signal).unwrap_or_else(|| {
                    SignalReading::Observed(unknown(*signal, "no checker reported this signal"))
                })
            })
            .collect();
        Self { readings }
    }

    pub fn readings(&self) -> &[SignalReading] {
        &self.readings
    }

    /// Usable evidence for a signal, if any.
    pub fn get(&self, signal: SignalId) -> Option<&Evidence> {
        self.readings.iter().find_map(|reading| match reading {
            SignalReading::Observed(evidence) if evidence.signal == signal && evidence.is_usable() => {
                Some(evidence)
            }
            _ => None,
        })
    }

    pub fn observed(&self, signal: SignalId) -> Option<bool> {
        self.get(signal).and_then(|evidence| evidence.observed)
    }

    pub fn usable_count(&self) -> usize {
        self.readings
            .iter()
            .filter(|reading| matches!(reading, SignalReading::Observed(e) if e.is_usable()))
            .count()
    }

    pub fn with_status(&self, status: CheckStatus) -> impl Iterator<Item = &SignalReading> {
        self.readings
            .iter()
            .filter(move |reading| reading.status() == status)
    }
}

/// Converts raw checker results into readings. Never fails: every outcome,
/// including errors, maps to exactly one reading per signal the checker feeds.
pub struct EvidenceNormalizer<'a> {
    config: &'a EngineConfig,
    now: DateTime<Utc>,
}

impl<'a> EvidenceNormalizer<'a> {
    pub fn new(config: &'a EngineConfig, now: DateTime<Utc>) -> Self {
        Self { config, now }
    }

    pub fn platform(&self, result: Result<PlatformSupport, CheckerError>) -> Vec<SignalReading> {
        let support = match result {
            Ok(support) => support,
            Err(err) => return failure_readings(PLATFORM_SIGNALS, &err),
        };

        let supported = self.observe(
            SignalId::PlatformSupported,
            support != PlatformSupport::Unsupported,
            match support {
                PlatformSupport::Unsupported => "this OS version cannot host the health bridge",
                _ => "platform supported",
            },
        );
        let bridge = match support {
            PlatformSupport::Available => {
                self.observe(SignalId::HealthBridgeInstalled, true, "health bridge installed")
            }
            PlatformSupport::BridgeNotInstalled => self.observe(
                SignalId::HealthBridgeInstalled,
                false,
                "health bridge not installed or unavailable",
            ),
            PlatformSupport::Unsupported => SignalReading::NotApplicable(SignalId::HealthBridgeInstalled),
        };
        vec![supported, bridge]
    }

    pub fn permissions(&self, result: Result<PermissionStatus, CheckerError>) -> Vec<SignalReading> {
        match result {
            Ok(status) => vec![self.observe(
                SignalId::PermissionsGranted,
                status == PermissionStatus::Granted,
                status.as_str(),
            )],
            Err(err) => failure_readings(PERMISSION_SIGNALS, &err),
        }
    }

    pub fn battery(&self, result: Result<BatteryOptimization, CheckerError>) -> Vec<SignalReading> {
        match result {
            Ok(BatteryOptimization::Enabled) => vec![self.observe(
                SignalId::BatteryOptimizationEnabled,
                true,
                "enabled for the app",
            )],
            Ok(BatteryOptimization::Disabled) => vec![self.observe(
                SignalId::BatteryOptimizationEnabled,
                false,
                "disabled for the app",
            )],
            Err(err) => failure_readings(BATTERY_SIGNALS, &err),
        }
    }

    pub fn activity(&self, result: Result<Vec<ActivitySample>, CheckerError>) -> Vec<SignalReading> {
        let samples = match result {
            Ok(samples) => samples,
            Err(err) => return failure_readings(ACTIVITY_SIGNALS, &err),
        };
        let activity = &self.config.activity;
        let summary = ActivitySummary::from_samples(&samples, self.now, activity);

        let mut readings = Vec::with_capacity(ACTIVITY_SIGNALS.len());
        readings.push(self.observe(
            SignalId::DataPresent,
            summary.has_data(),
            if summary.has_data() {
                format!(
                    "{} sample(s) from {} source(s)",
                    summary.sample_count,
                    summary.sources.len()
                )
            } else {
                "no samples in the lookback window".to_string()
            },
        ));
        readings.push(self.observe(
            SignalId::TodayActivity,
            summary.today_total > 0,
            if summary.today_total > 0 {
                format!("{} recorded today", summary.today_total)
            } else {
                "nothing recorded today".to_string()
            },
        ));
        readings.push(match summary.freshness {
            Some(freshness) => self.observe(
                SignalId::DataFresh,
                freshness.status == DataFreshnessStatus::Fresh,
                format!(
                    "newest sample is {} day(s) old ({})",
                    freshness.age_days,
                    match freshness.status {
                        DataFreshnessStatus::Fresh => "fresh",
                        DataFreshnessStatus::Lagging => "lagging",
                        DataFreshnessStatus::Stale => "stale",
                    }
                ),
            ),
            None => self.observe(SignalId::DataFresh, false, "no samples to date"),
        });
        readings.push(match summary.sync_age_hours(self.now) {
            Some(hours) => self.observe(
                SignalId::SyncRecent,
                hours <= activity.sync_stale_after_hours,
                format!("last synced {hours}h ago"),
            ),
            None => SignalReading::NotApplicable(SignalId::SyncRecent),
        });
        readings.push(self.observe(
            SignalId::MultipleSources,
            summary.sources.len() > 1,
            match summary.sources.len() {
                0 => "no sources reporting".to_string(),
                1 => "single source".to_string(),
                n => format!(
                    "{n} sources: {}",
                    summary.sources.iter().cloned().collect::<Vec<_>>().join(", ")
                ),
            },
        ));
        readings.push(if summary.has_data() {
            let agree = summary.counts_agree(activity.discrepancy_tolerance);
            let detail = match summary.worst_discrepancy {
                Some(d) if !agree => format!(
                    "sources differ by {:.0}% on {}",
                    d.ratio * 100.0,
                    d.date
                ),
                Some(_) => "sources agree within tolerance".to_string(),
                None => "no overlapping sources to compare".to_string(),
            };
            self.observe(SignalId::SourceCountsAgree, agree, detail)
        } else {
            SignalReading::NotApplicable(SignalId::SourceCountsAgree)
        });
        readings.push(self.observe(
            SignalId::ManualEntries,
            !summary.manual_sources.is_empty(),
            if summary.manual_sources.is_empty() {
                "no manual entries".to_string()
            } else {
                format!(
                    "manual entries from {}",
                    summary.manual_sources.iter().cloned().collect::<Vec<_>>().join(", ")
                )
            },
        ));
        readings
    }

    fn observe(&self, signal: SignalId, observed: bool, detail: impl Into<String>) -> SignalReading {
        SignalReading::Observed(Evidence {
            signal,
            observed: Some(observed),
            reliability: self.config.reliability(signal),
            detail: detail.into(),
        })
    }
}

fn unknown(signal: SignalId, detail: impl Into<String>) -> Evidence {
    Evidence {
        signal,
        observed: None,
        reliability: 0.0,
        detail: detail.into(),
    }
}

fn failure_readings(signals: &[SignalId], err: &CheckerError) -> Vec<SignalReading> {
    signals
        .iter()
        .map(|signal| match err {
            CheckerError::NotApplicable => SignalReading::NotApplicable(*signal),
            _ => SignalReading::Observed(unknown(*signal, format!("could not be checked ({err})"))),
        })
        .collect()
}
