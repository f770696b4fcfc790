use std::collections::BTreeMap;
use std::time::Duration;

use regex::Regex;

use crate::signals::SignalId;

pub const DEFAULT_CHECKER_TIMEOUT_MS: u64 = 3_000;
pub const DEFAULT_REPORTING_THRESHOLD: f64 = 0.3;
pub const DEFAULT_BROKEN_SEVERITY: f64 = 0.85;
pub const DEFAULT_MINOR_SEVERITY_CEILING: f64 = 0.5;
pub const DEFAULT_NO_ISSUE_CONFIDENCE: f64 = 0.85;
pub const DEFAULT_UNKNOWN_CONFIDENCE: f64 = 0.5;
pub const DEFAULT_FRESH_WITHIN_DAYS: i64 = 1;
pub const DEFAULT_STALE_AFTER_DAYS: i64 = 3;
pub const DEFAULT_SYNC_STALE_AFTER_HOURS: i64 = 6;
pub const DEFAULT_DISCREPANCY_TOLERANCE: f64 = 0.2;
pub const DEFAULT_MANUAL_SOURCE_PATTERN: &str = r"(?i)manual|user[_-]?(entered|input)";

/// Tuning for one diagnostic engine. Immutable once the engine is built.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Per-checker deadline; a call that misses it counts as failed
    pub checker_timeout: Duration,
    /// Issues at or below this confidence are dropped from the report
    pub reporting_threshold: f64,
    /// Primary issues at or above this severity mark tracking as broken
    pub broken_severity: f64,
    /// Issues below this severity are notes, never the primary issue
    pub minor_severity_ceiling: f64,
    pub no_issue_confidence: f64,
    pub unknown_confidence: f64,
    pub activity: ActivityConfig,
    pub reliability_overrides: BTreeMap<SignalId, f64>,
}

/// Heuristics used to turn raw activity samples into signals.
#[derive(Debug, Clone)]
pub struct ActivityConfig {
    pub fresh_within_days: i64,
    pub stale_after_days: i64,
    pub sync_stale_after_hours: i64,
    /// Largest tolerated `(max - min) / max` between sources on one date
    pub discrepancy_tolerance: f64,
    pub manual_source_pattern: Regex,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            checker_timeout: Duration::from_millis(DEFAULT_CHECKER_TIMEOUT_MS),
            reporting_threshold: DEFAULT_REPORTING_THRESHOLD,
            broken_severity: DEFAULT_BROKEN_SEVERITY,
            minor_severity_ceiling: DEFAULT_MINOR_SEVERITY_CEILING,
            no_issue_confidence: DEFAULT_NO_ISSUE_CONFIDENCE,
            unknown_confidence: DEFAULT_UNKNOWN_CONFIDENCE,
            activity: ActivityConfig::default(),
            reliability_overrides: BTreeMap::new(),
        }
    }
}

impl Default for ActivityConfig {
    fn default() -> Self {
        Self {
            fresh_within_days: DEFAULT_FRESH_WITHIN_DAYS,
            stale_after_days: DEFAULT_STALE_AFTER_DAYS,
            sync_stale_after_hours: DEFAULT_SYNC_STALE_AFTER_HOURS,
            discrepancy_tolerance: DEFAULT_DISCREPANCY_TOLERANCE,
            manual_source_pattern: default_manual_source_pattern(),
        }
    }
}

fn default_manual_source_pattern() -> Regex {
    Regex::new(DEFAULT_MANUAL_SOURCE_PATTERN).expect("default manual source pattern is valid")
}

impl EngineConfig {
    /// Build from `PULSECHECK_*` environment variables. Missing, unparsable or
    /// out-of-range values keep their defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) over an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let parse = |key: &str| lookup(key).map(|raw| raw.trim().to_string());
        let unit = |key: &str| {
            parse(key)
                .and_then(|raw| raw.parse::<f64>().ok())
                .filter(|v| (0.0..=1.0).contains(v))
        };
        let count = |key: &str| {
            parse(key)
                .and_then(|raw| raw.parse::<i64>().ok())
                .filter(|v| *v >= 0)
        };

        let manual_source_pattern = match lookup("PULSECHECK_MANUAL_SOURCE_PATTERN") {
            Some(raw) => match Regex::new(&raw) {
                Ok(pattern) => pattern,
                Err(err) => {
                    tracing::warn!(
                        error = %err,
                        "invalid PULSECHECK_MANUAL_SOURCE_PATTERN; using default"
                    );
                    default_manual_source_pattern()
                }
            },
            None => default_manual_source_pattern(),
        };

        let mut fresh_within_days =
            count("PULSECHECK_FRESH_WITHIN_DAYS").unwrap_or(defaults.activity.fresh_within_days);
        let mut stale_after_days =
            count("PULSECHECK_STALE_AFTER_DAYS").unwrap_or(defaults.activity.stale_after_days);
        if stale_after_days < fresh_within_days {
            tracing::warn!(
                fresh_within_days,
                stale_after_days,
                "PULSECHECK_STALE_AFTER_DAYS below PULSECHECK_FRESH_WITHIN_DAYS; using default freshness windows"
            );
            fresh_within_days = defaults.activity.fresh_within_days;
            stale_after_days = defaults.activity.stale_after_days;
        }

        Self {
            checker_timeout: parse("PULSECHECK_CHECKER_TIMEOUT_MS")
                .and_then(|raw| raw.parse::<u64>().ok())
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis)
                .unwrap_or(defaults.checker_timeout),
            reporting_threshold: unit("PULSECHECK_REPORTING_THRESHOLD")
                .unwrap_or(defaults.reporting_threshold),
            broken_severity: unit("PULSECHECK_BROKEN_SEVERITY").unwrap_or(defaults.broken_severity),
            minor_severity_ceiling: unit("PULSECHECK_MINOR_SEVERITY_CEILING")
                .unwrap_or(defaults.minor_severity_ceiling),
            no_issue_confidence: defaults.no_issue_confidence,
            unknown_confidence: defaults.unknown_confidence,
            activity: ActivityConfig {
                fresh_within_days,
                stale_after_days,
                sync_stale_after_hours: count("PULSECHECK_SYNC_STALE_AFTER_HOURS")
                    .unwrap_or(defaults.activity.sync_stale_after_hours),
                discrepancy_tolerance: unit("PULSECHECK_DISCREPANCY_TOLERANCE")
                    .unwrap_or(defaults.activity.discrepancy_tolerance),
                manual_source_pattern,
            },
            reliability_overrides: defaults.reliability_overrides,
        }
    }

    /// Reliability for a signal, override first. Always within `[0, 1]`.
    pub fn reliability(&self, signal: SignalId) -> f64 {
        let value = self
            .reliability_overrides
            .get(&signal)
            .copied()
            .unwrap_or_else(|| signal.default_reliability());
        if value.is_nan() {
            0.0
        } else {
            value.clamp(0.0, 1.0)
        }
    }
}
