use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::task::{JoinError, JoinHandle};
use uuid::Uuid;

use crate::catalog::{CATALOG, CAUSAL_LINKS, CausalLink, IssueDefinition, validate_catalog};
use crate::chains::detect_chains;
use crate::config::EngineConfig;
use crate::error::{CatalogError, CheckerError};
use crate::evidence::{EvidenceNormalizer, EvidenceSet};
use crate::report::{DiagnosticReport, ReportAssembler};
use crate::scoring::score_catalog;
use crate::signals::SignalCheckers;

/// Runs diagnostics against one injected set of checkers.
///
/// Holds no mutable state: concurrent and consecutive runs never observe each
/// other, and the catalog is a shared read-only table.
pub struct DiagnosticEngine {
    checkers: SignalCheckers,
    catalog: &'static [IssueDefinition],
    links: &'static [CausalLink],
    config: EngineConfig,
}

impl DiagnosticEngine {
    /// Engine over the built-in catalog.
    pub fn new(checkers: SignalCheckers, config: EngineConfig) -> Self {
        Self {
            checkers,
            catalog: CATALOG,
            links: CAUSAL_LINKS,
            config,
        }
    }

    pub fn with_catalog(
        checkers: SignalCheckers,
        config: EngineConfig,
        catalog: &'static [IssueDefinition],
        links: &'static [CausalLink],
    ) -> Result<Self, CatalogError> {
        validate_catalog(catalog, links)?;
        Ok(Self {
            checkers,
            catalog,
            links,
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn catalog(&self) -> &'static [IssueDefinition] {
        self.catalog
    }

    /// Query every checker and build a report. Never fails: checker errors,
    /// timeouts and panics all degrade to unknown evidence.
    pub async fn run_diagnostic(&self) -> DiagnosticReport {
        self.diagnose_at(Utc::now()).await
    }

    /// Same as [`run_diagnostic`](Self::run_diagnostic) with an explicit clock.
    pub async fn diagnose_at(&self, now: DateTime<Utc>) -> DiagnosticReport {
        let started = Instant::now();
        let run_id = Uuid::now_v7();
        let evidence = self.collect_evidence(now).await;
        let report = self.evaluate(&evidence, run_id, now);

        tracing::info!(
            run_id = %run_id,
            tracking_status = report.tracking_status.as_str(),
            primary_issue = report
                .primary_issue
                .as_ref()
                .map_or("none", |p| p.issue_type.as_str()),
            secondary_issues = report.secondary_issues.len(),
            causal_chains = report.causal_chains.len(),
            usable_evidence = evidence.usable_count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "diagnostic run complete"
        );
        report
    }

    /// Score, link and assemble from already-collected evidence. Pure.
    pub fn evaluate(&self, evidence: &EvidenceSet, run_id: Uuid, now: DateTime<Utc>) -> DiagnosticReport {
        let scored = score_catalog(self.catalog, evidence);
        let chains = detect_chains(&scored, self.links, self.config.reporting_threshold);
        ReportAssembler::new(self.catalog, &self.config).assemble(&scored, chains, evidence, run_id, now)
    }

    async fn collect_evidence(&self, now: DateTime<Utc>) -> EvidenceSet {
        let limit = self.config.checker_timeout;

        let platform = self.checkers.platform.clone();
        let permissions = self.checkers.permissions.clone();
        let battery = self.checkers.battery.clone();
        let activity = self.checkers.activity.clone();

        let (platform, permissions, battery, activity) = tokio::join!(
            settle(
                "platform",
                limit,
                spawn_checker(async move { platform.platform_support().await })
            ),
            settle(
                "permissions",
                limit,
                spawn_checker(async move { permissions.permission_status().await })
            ),
            settle(
                "battery",
                limit,
                spawn_checker(async move { battery.battery_optimization().await })
            ),
            settle(
                "activity",
                limit,
                spawn_checker(async move { activity.recent_samples().await })
            ),
        );

        let normalizer = EvidenceNormalizer::new(&self.config, now);
        let mut readings = normalizer.platform(platform);
        readings.extend(normalizer.permissions(permissions));
        readings.extend(normalizer.battery(battery));
        readings.extend(normalizer.activity(activity));
        EvidenceSet::from_readings(readings)
    }
}

/// Spawned checker task that is aborted when its handle is dropped.
///
/// A plain `JoinHandle` detaches on drop; this one ties the task to the run
/// that spawned it, so an abandoned run or a missed deadline stops the checker.
struct CheckerTask<T>(JoinHandle<T>);

impl<T> Drop for CheckerTask<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

impl<T> Future for CheckerTask<T> {
    type Output = Result<T, JoinError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.get_mut().0).poll(cx)
    }
}

fn spawn_checker<T, F>(future: F) -> CheckerTask<Result<T, CheckerError>>
where
    F: Future<Output = Result<T, CheckerError>> + Send + 'static,
    T: Send + 'static,
{
    CheckerTask(tokio::spawn(future))
}

/// Wait for one checker task under its own deadline. The task is aborted
/// when this future completes or is dropped, whichever comes first.
async fn settle<T>(
    checker: &'static str,
    limit: Duration,
    task: CheckerTask<Result<T, CheckerError>>,
) -> Result<T, CheckerError> {
    let result = match tokio::time::timeout(limit, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(err)) => Err(CheckerError::Failed(format!("checker task ended abnormally: {err}"))),
        Err(_) => Err(CheckerError::TimedOut(limit)),
    };

    match &result {
        Ok(_) => tracing::debug!(checker, "checker settled"),
        Err(CheckerError::NotApplicable) => {
            tracing::debug!(checker, "checker not applicable on this platform")
        }
        Err(err) => tracing::warn!(
            checker,
            error = %err,
            code = err.code(),
            "checker failed; signals recorded as unknown"
        ),
    }
    result
}
