use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CheckerError;

/// One observable fact about the tracking pipeline.
///
/// Declaration order is the audit order: every report lists its checks in
/// exactly this order, whatever order the underlying calls settled in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalId {
    PlatformSupported,
    HealthBridgeInstalled,
    PermissionsGranted,
    BatteryOptimizationEnabled,
    DataPresent,
    TodayActivity,
    DataFresh,
    SyncRecent,
    MultipleSources,
    SourceCountsAgree,
    ManualEntries,
}

impl SignalId {
    pub const ALL: [SignalId; 11] = [
        SignalId::PlatformSupported,
        SignalId::HealthBridgeInstalled,
        SignalId::PermissionsGranted,
        SignalId::BatteryOptimizationEnabled,
        SignalId::DataPresent,
        SignalId::TodayActivity,
        SignalId::DataFresh,
        SignalId::SyncRecent,
        SignalId::MultipleSources,
        SignalId::SourceCountsAgree,
        SignalId::ManualEntries,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SignalId::PlatformSupported => "platform_supported",
            SignalId::HealthBridgeInstalled => "health_bridge_installed",
            SignalId::PermissionsGranted => "permissions_granted",
            SignalId::BatteryOptimizationEnabled => "battery_optimization_enabled",
            SignalId::DataPresent => "data_present",
            SignalId::TodayActivity => "today_activity",
            SignalId::DataFresh => "data_fresh",
            SignalId::SyncRecent => "sync_recent",
            SignalId::MultipleSources => "multiple_sources",
            SignalId::SourceCountsAgree => "source_counts_agree",
            SignalId::ManualEntries => "manual_entries",
        }
    }

    /// Human label used in the reasoning trace.
    pub fn label(self) -> &'static str {
        match self {
            SignalId::PlatformSupported => "Platform support",
            SignalId::HealthBridgeInstalled => "Health bridge installation",
            SignalId::PermissionsGranted => "Activity permissions",
            SignalId::BatteryOptimizationEnabled => "Battery optimization",
            SignalId::DataPresent => "Activity data presence",
            SignalId::TodayActivity => "Activity recorded today",
            SignalId::DataFresh => "Activity data freshness",
            SignalId::SyncRecent => "Last sync time",
            SignalId::MultipleSources => "Data source count",
            SignalId::SourceCountsAgree => "Cross-source agreement",
            SignalId::ManualEntries => "Manual entries",
        }
    }

    /// Reliability applied when configuration does not override it.
    /// Signals derived from sample heuristics are noisier than direct OS queries.
    pub fn default_reliability(self) -> f64 {
        match self {
            SignalId::TodayActivity | SignalId::DataFresh | SignalId::ManualEntries => 0.9,
            SignalId::SourceCountsAgree => 0.85,
            SignalId::SyncRecent => 0.8,
            _ => 1.0,
        }
    }
}

impl fmt::Display for SignalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionStatus {
    Granted,
    PartiallyGranted,
    Denied,
    NotDetermined,
}

impl PermissionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PermissionStatus::Granted => "granted",
            PermissionStatus::PartiallyGranted => "partially granted",
            PermissionStatus::Denied => "denied",
            PermissionStatus::NotDetermined => "not yet requested",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatteryOptimization {
    Enabled,
    Disabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlatformSupport {
    Available,
    BridgeNotInstalled,
    Unsupported,
}

/// A daily activity total as reported by one data source. Read-only to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivitySample {
    pub date: NaiveDate,
    pub count: u64,
    /// Source identifier (app package, device name, "manual_entry", ...)
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_synced: Option<DateTime<Utc>>,
}

/// Future returned by every checker query.
pub type CheckFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, CheckerError>> + Send + 'a>>;

pub trait PermissionChecker: Send + Sync {
    fn permission_status(&self) -> CheckFuture<'_, PermissionStatus>;
}

pub trait BatteryChecker: Send + Sync {
    fn battery_optimization(&self) -> CheckFuture<'_, BatteryOptimization>;
}

pub trait PlatformChecker: Send + Sync {
    fn platform_support(&self) -> CheckFuture<'_, PlatformSupport>;
}

pub trait ActivityReader: Send + Sync {
    fn recent_samples(&self) -> CheckFuture<'_, Vec<ActivitySample>>;
}

/// The injected set of signal sources a run queries.
#[derive(Clone)]
pub struct SignalCheckers {
    pub permissions: Arc<dyn PermissionChecker>,
    pub battery: Arc<dyn BatteryChecker>,
    pub platform: Arc<dyn PlatformChecker>,
    pub activity: Arc<dyn ActivityReader>,
}

#[cfg(test)]
mod tests {
    use super::SignalId;

    #[test]
    fn all_signals_are_listed_in_declaration_order() {
        let mut sorted = SignalId::ALL;
        sorted.sort();
        assert_eq!(sorted, SignalId::ALL);
        assert_eq!(SignalId::ALL.len(), 11);
    }

    #[test]
    fn serde_names_match_as_str() {
        for signal in SignalId::ALL {
            let json = serde_json::to_value(signal).unwrap();
            assert_eq!(json, serde_json::Value::String(signal.as_str().to_string()));
        }
    }

    #[test]
    fn default_reliability_stays_in_unit_interval() {
        for signal in SignalId::ALL {
            let r = signal.default_reliability();
            assert!(r > 0.0 && r <= 1.0, "{signal} has reliability {r}");
        }
    }
}
