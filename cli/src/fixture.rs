//! Checkers that replay recorded results from a JSON fixture.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use serde::Deserialize;

use pulsecheck_core::CheckerError;
use pulsecheck_core::signals::{
    ActivityReader, ActivitySample, BatteryChecker, BatteryOptimization, CheckFuture,
    PermissionChecker, PermissionStatus, PlatformChecker, PlatformSupport, SignalCheckers,
};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Fixture {
    #[serde(default)]
    pub permissions: Option<FixtureEntry<PermissionStatus>>,
    #[serde(default)]
    pub battery: Option<FixtureEntry<BatteryOptimization>>,
    #[serde(default)]
    pub platform: Option<FixtureEntry<PlatformSupport>>,
    #[serde(default)]
    pub activity: Option<FixtureEntry<Vec<FixtureSample>>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FixtureEntry<T> {
    #[serde(flatten)]
    pub outcome: FixtureOutcome<T>,
    /// Simulated latency before the outcome is returned
    #[serde(default)]
    pub delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FixtureOutcome<T> {
    Ok { value: T },
    NotApplicable,
    Failed { message: String },
    /// Never settles; exercises the per-checker timeout
    Hang,
}

/// Sample with either an absolute date or one relative to the run.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FixtureSample {
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub days_ago: Option<i64>,
    pub count: u64,
    pub source: String,
    #[serde(default)]
    pub last_synced: Option<DateTime<Utc>>,
    #[serde(default)]
    pub synced_hours_ago: Option<i64>,
}

impl FixtureSample {
    fn resolve(&self, now: DateTime<Utc>) -> Result<ActivitySample, String> {
        let date = match (self.date, self.days_ago) {
            (Some(date), None) => date,
            (None, Some(days)) => TimeDelta::try_days(days)
                .and_then(|delta| now.checked_sub_signed(delta))
                .ok_or_else(|| format!("sample from '{}' has an out-of-range days_ago", self.source))?
                .date_naive(),
            (None, None) => now.date_naive(),
            (Some(_), Some(_)) => {
                return Err(format!(
                    "sample from '{}' sets both date and days_ago",
                    self.source
                ));
            }
        };
        let last_synced = match (self.last_synced, self.synced_hours_ago) {
            (Some(_), Some(_)) => {
                return Err(format!(
                    "sample from '{}' sets both last_synced and synced_hours_ago",
                    self.source
                ));
            }
            (Some(ts), None) => Some(ts),
            (None, Some(hours)) => Some(
                TimeDelta::try_hours(hours)
                    .and_then(|delta| now.checked_sub_signed(delta))
                    .ok_or_else(|| {
                        format!(
                            "sample from '{}' has an out-of-range synced_hours_ago",
                            self.source
                        )
                    })?,
            ),
            (None, None) => None,
        };
        Ok(ActivitySample {
            date,
            count: self.count,
            source: self.source.clone(),
            last_synced,
        })
    }
}

impl<T> FixtureOutcome<T> {
    fn try_map<U>(self, f: impl FnOnce(T) -> Result<U, String>) -> Result<FixtureOutcome<U>, String> {
        Ok(match self {
            FixtureOutcome::Ok { value } => FixtureOutcome::Ok { value: f(value)? },
            FixtureOutcome::NotApplicable => FixtureOutcome::NotApplicable,
            FixtureOutcome::Failed { message } => FixtureOutcome::Failed { message },
            FixtureOutcome::Hang => FixtureOutcome::Hang,
        })
    }
}

struct Replay<T> {
    outcome: FixtureOutcome<T>,
    delay: Duration,
}

impl<T: Clone + Send + Sync + 'static> Replay<T> {
    fn from_entry(entry: Option<FixtureEntry<T>>) -> Self {
        match entry {
            Some(entry) => Self {
                outcome: entry.outcome,
                delay: Duration::from_millis(entry.delay_ms),
            },
            None => Self {
                outcome: FixtureOutcome::NotApplicable,
                delay: Duration::ZERO,
            },
        }
    }

    fn replay(&self) -> CheckFuture<'_, T> {
        let outcome = self.outcome.clone();
        let delay = self.delay;
        Box::pin(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            match outcome {
                FixtureOutcome::Ok { value } => Ok(value),
                FixtureOutcome::NotApplicable => Err(CheckerError::NotApplicable),
                FixtureOutcome::Failed { message } => Err(CheckerError::Failed(message)),
                FixtureOutcome::Hang => std::future::pending().await,
            }
        })
    }
}

impl PermissionChecker for Replay<PermissionStatus> {
    fn permission_status(&self) -> CheckFuture<'_, PermissionStatus> {
        self.replay()
    }
}

impl BatteryChecker for Replay<BatteryOptimization> {
    fn battery_optimization(&self) -> CheckFuture<'_, BatteryOptimization> {
        self.replay()
    }
}

impl PlatformChecker for Replay<PlatformSupport> {
    fn platform_support(&self) -> CheckFuture<'_, PlatformSupport> {
        self.replay()
    }
}

impl ActivityReader for Replay<Vec<ActivitySample>> {
    fn recent_samples(&self) -> CheckFuture<'_, Vec<ActivitySample>> {
        self.replay()
    }
}

impl Fixture {
    pub fn parse(raw: &str) -> Result<Self, String> {
        serde_json::from_str(raw).map_err(|e| format!("Invalid fixture JSON: {e}"))
    }

    /// Checkers replaying this fixture. A checker missing from the fixture
    /// reports itself as not applicable.
    pub fn into_checkers(self, now: DateTime<Utc>) -> Result<SignalCheckers, String> {
        let activity: Option<FixtureEntry<Vec<ActivitySample>>> = match self.activity {
            Some(entry) => Some(FixtureEntry {
                outcome: entry.outcome.try_map(|samples| {
                    samples.iter().map(|sample| sample.resolve(now)).collect()
                })?,
                delay_ms: entry.delay_ms,
            }),
            None => None,
        };

        Ok(SignalCheckers {
            permissions: Arc::new(Replay::from_entry(self.permissions)),
            battery: Arc::new(Replay::from_entry(self.battery)),
            platform: Arc::new(Replay::from_entry(self.platform)),
            activity: Arc::new(Replay::from_entry(activity)),
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{Fixture, FixtureOutcome};
    use pulsecheck_core::CheckerError;
    use pulsecheck_core::signals::{ActivityReader, PermissionChecker, PermissionStatus};

    #[test]
    fn parses_every_outcome_kind() {
        let fixture = Fixture::parse(
            r#"{
                "permissions": {"status": "ok", "value": "denied"},
                "battery": {"status": "hang"},
                "platform": {"status": "failed", "message": "service crashed", "delay_ms": 20},
                "activity": {"status": "not_applicable"}
            }"#,
        )
        .unwrap();
        assert!(matches!(
            fixture.permissions.unwrap().outcome,
            FixtureOutcome::Ok {
                value: PermissionStatus::Denied
            }
        ));
        assert!(matches!(fixture.battery.unwrap().outcome, FixtureOutcome::Hang));
        let platform = fixture.platform.unwrap();
        assert_eq!(platform.delay_ms, 20);
        assert!(matches!(platform.outcome, FixtureOutcome::Failed { .. }));
        assert!(matches!(
            fixture.activity.unwrap().outcome,
            FixtureOutcome::NotApplicable
        ));
    }

    #[test]
    fn bundled_fixtures_load() {
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap();
        for raw in [
            include_str!("../../fixtures/healthy.json"),
            include_str!("../../fixtures/permissions_denied.json"),
            include_str!("../../fixtures/conflicting_sources.json"),
            include_str!("../../fixtures/total_failure.json"),
            include_str!("../../fixtures/hanging_checker.json"),
        ] {
            let fixture = Fixture::parse(raw).unwrap();
            assert!(fixture.into_checkers(now).is_ok());
        }
    }

    #[test]
    fn unknown_checker_key_is_rejected() {
        assert!(Fixture::parse(r#"{"gps": {"status": "hang"}}"#).is_err());
    }

    #[test]
    fn conflicting_sample_dates_are_rejected() {
        let fixture = Fixture::parse(
            r#"{"activity": {"status": "ok", "value": [
                {"date": "2026-03-01", "days_ago": 2, "count": 10, "source": "watch"}
            ]}}"#,
        )
        .unwrap();
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap();
        assert!(fixture.into_checkers(now).is_err());
    }

    #[test]
    fn out_of_range_offsets_are_rejected() {
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap();
        for sample in [
            r#"{"days_ago": 9223372036854775807, "count": 10, "source": "watch"}"#,
            r#"{"days_ago": -9223372036854775808, "count": 10, "source": "watch"}"#,
            r#"{"synced_hours_ago": 9223372036854775807, "count": 10, "source": "watch"}"#,
            r#"{"days_ago": 500000000, "count": 10, "source": "watch"}"#,
        ] {
            let raw = format!(r#"{{"activity": {{"status": "ok", "value": [{sample}]}}}}"#);
            let err = Fixture::parse(&raw).unwrap().into_checkers(now).err().unwrap();
            assert!(err.contains("out-of-range"), "{err}");
        }
    }

    #[tokio::test]
    async fn replays_relative_samples_and_missing_checkers() {
        let fixture = Fixture::parse(
            r#"{"activity": {"status": "ok", "value": [
                {"days_ago": 1, "count": 4200, "source": "watch", "synced_hours_ago": 3}
            ]}}"#,
        )
        .unwrap();
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap();
        let checkers = fixture.into_checkers(now).unwrap();

        let samples = checkers.activity.recent_samples().await.unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].date, Utc.with_ymd_and_hms(2026, 3, 9, 0, 0, 0).unwrap().date_naive());
        assert_eq!(samples[0].last_synced, Some(Utc.with_ymd_and_hms(2026, 3, 10, 9, 0, 0).unwrap()));

        assert_eq!(
            checkers.permissions.permission_status().await,
            Err(CheckerError::NotApplicable)
        );
    }
}
