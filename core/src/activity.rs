use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::config::ActivityConfig;
use crate::signals::ActivitySample;

/// Freshness bucket for the newest activity sample.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DataFreshnessStatus {
    Fresh,
    Lagging,
    Stale,
}

/// Freshness metadata derived from the newest sample date.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct DataFreshness {
    /// Whole days between the newest sample and the run date.
    pub age_days: i64,
    pub status: DataFreshnessStatus,
}

impl DataFreshness {
    pub fn from_newest(newest: NaiveDate, today: NaiveDate, config: &ActivityConfig) -> Self {
        let age_days = today.signed_duration_since(newest).num_days().max(0);
        let status = if age_days <= config.fresh_within_days {
            DataFreshnessStatus::Fresh
        } else if age_days <= config.stale_after_days {
            DataFreshnessStatus::Lagging
        } else {
            DataFreshnessStatus::Stale
        };

        Self { age_days, status }
    }
}

/// Everything the activity signals need, computed once per run.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivitySummary {
    pub sample_count: usize,
    pub today_total: u64,
    pub freshness: Option<DataFreshness>,
    pub newest_sync: Option<DateTime<Utc>>,
    pub sources: BTreeSet<String>,
    pub manual_sources: BTreeSet<String>,
    /// Widest cross-source spread among dates reported by more than one source
    pub worst_discrepancy: Option<SourceDiscrepancy>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceDiscrepancy {
    pub date: NaiveDate,
    /// `(max - min) / max` over per-source totals, in `[0, 1]`
    pub ratio: f64,
}

impl ActivitySummary {
    pub fn from_samples(
        samples: &[ActivitySample],
        now: DateTime<Utc>,
        config: &ActivityConfig,
    ) -> Self {
        let today = now.date_naive();
        let today_total = samples
            .iter()
            .filter(|s| s.date == today)
            .fold(0u64, |acc, s| acc.saturating_add(s.count));
        let freshness = samples
            .iter()
            .map(|s| s.date)
            .max()
            .map(|newest| DataFreshness::from_newest(newest, today, config));
        let newest_sync = samples.iter().filter_map(|s| s.last_synced).max();
        let sources: BTreeSet<String> = samples.iter().map(|s| s.source.clone()).collect();
        let manual_sources = sources
            .iter()
            .filter(|source| config.manual_source_pattern.is_match(source))
            .cloned()
            .collect();

        Self {
            sample_count: samples.len(),
            today_total,
            freshness,
            newest_sync,
            sources,
            manual_sources,
            worst_discrepancy: worst_discrepancy(samples),
        }
    }

    pub fn has_data(&self) -> bool {
        self.sample_count > 0
    }

    pub fn sync_age_hours(&self, now: DateTime<Utc>) -> Option<i64> {
        self.newest_sync
            .map(|synced| now.signed_duration_since(synced).num_hours().max(0))
    }

    pub fn counts_agree(&self, tolerance: f64) -> bool {
        self.worst_discrepancy
            .is_none_or(|discrepancy| discrepancy.ratio <= tolerance)
    }
}

fn worst_discrepancy(samples: &[ActivitySample]) -> Option<SourceDiscrepancy> {
    // date -> source -> total
    let mut per_date: BTreeMap<NaiveDate, BTreeMap<&str, u64>> = BTreeMap::new();
    for sample in samples {
        let total = per_date
            .entry(sample.date)
            .or_default()
            .entry(sample.source.as_str())
            .or_default();
        *total = total.saturating_add(sample.count);
    }

    let mut worst: Option<SourceDiscrepancy> = None;
    for (date, totals) in per_date {
        if totals.len() < 2 {
            continue;
        }
        let max = totals.values().copied().max().unwrap_or(0);
        let min = totals.values().copied().min().unwrap_or(0);
        let ratio = if max == 0 {
            0.0
        } else {
            (max - min) as f64 / max as f64
        };
        if worst.is_none_or(|current| ratio > current.ratio) {
            worst = Some(SourceDiscrepancy { date, ratio });
        }
    }
    worst
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::{ActivitySummary, DataFreshness, DataFreshnessStatus};
    use crate::config::ActivityConfig;
    use crate::signals::ActivitySample;

    fn sample(days_ago: i64, count: u64, source: &str) -> ActivitySample {
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap();
        ActivitySample {
            date: (now - Duration::days(days_ago)).date_naive(),
            count,
            source: source.to_string(),
            last_synced: None,
        }
    }

    fn now() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap()
    }

    #[test]
    fn freshness_is_fresh_within_window() {
        let config = ActivityConfig::default();
        let today = now().date_naive();
        let freshness =
            DataFreshness::from_newest(today - Duration::days(config.fresh_within_days), today, &config);
        assert_eq!(freshness.status, DataFreshnessStatus::Fresh);
    }

    #[test]
    fn freshness_lags_before_stale_threshold() {
        let config = ActivityConfig::default();
        let today = now().date_naive();
        let freshness = DataFreshness::from_newest(
            today - Duration::days(config.fresh_within_days + 1),
            today,
            &config,
        );
        assert_eq!(freshness.status, DataFreshnessStatus::Lagging);
    }

    #[test]
    fn freshness_is_stale_after_threshold() {
        let config = ActivityConfig::default();
        let today = now().date_naive();
        let freshness = DataFreshness::from_newest(
            today - Duration::days(config.stale_after_days + 1),
            today,
            &config,
        );
        assert_eq!(freshness.status, DataFreshnessStatus::Stale);
    }

    #[test]
    fn freshness_caps_future_dates_at_zero() {
        let config = ActivityConfig::default();
        let today = now().date_naive();
        let freshness = DataFreshness::from_newest(today + Duration::days(2), today, &config);
        assert_eq!(freshness.age_days, 0);
        assert_eq!(freshness.status, DataFreshnessStatus::Fresh);
    }

    #[test]
    fn discrepancy_only_compares_sources_on_the_same_date() {
        let config = ActivityConfig::default();
        let samples = vec![
            sample(0, 9_000, "watch"),
            sample(1, 1_000, "phone"),
        ];
        let summary = ActivitySummary::from_samples(&samples, now(), &config);
        assert_eq!(summary.sources.len(), 2);
        assert!(summary.worst_discrepancy.is_none());
        assert!(summary.counts_agree(config.discrepancy_tolerance));
    }

    #[test]
    fn discrepancy_reports_widest_spread() {
        let config = ActivityConfig::default();
        let samples = vec![
            sample(0, 10_000, "watch"),
            sample(0, 9_500, "phone"),
            sample(1, 8_000, "watch"),
            sample(1, 2_000, "phone"),
        ];
        let summary = ActivitySummary::from_samples(&samples, now(), &config);
        let worst = summary.worst_discrepancy.unwrap();
        assert_eq!(worst.date, (now() - Duration::days(1)).date_naive());
        assert!((worst.ratio - 0.75).abs() < 1e-9);
        assert!(!summary.counts_agree(config.discrepancy_tolerance));
    }

    #[test]
    fn summary_counts_today_and_manual_sources() {
        let config = ActivityConfig::default();
        let samples = vec![
            sample(0, 7_000, "com.google.android.gms"),
            sample(0, 300, "manual_entry"),
            sample(2, 4_000, "com.google.android.gms"),
        ];
        let summary = ActivitySummary::from_samples(&samples, now(), &config);
        assert_eq!(summary.today_total, 7_300);
        assert_eq!(summary.manual_sources.len(), 1);
        assert!(summary.manual_sources.contains("manual_entry"));
    }

    #[test]
    fn zero_totals_do_not_divide_by_zero() {
        let config = ActivityConfig::default();
        let samples = vec![sample(0, 0, "watch"), sample(0, 0, "phone")];
        let summary = ActivitySummary::from_samples(&samples, now(), &config);
        assert_eq!(summary.worst_discrepancy.unwrap().ratio, 0.0);
    }
}
