use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::catalog::{IssueDefinition, IssueType, find_definition};
use crate::chains::CausalChain;
use crate::config::EngineConfig;
use crate::evidence::{CheckStatus, EvidenceSet};
use crate::scoring::{ScoredIssue, clamp_unit, rank};
use crate::signals::SignalId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingStatus {
    Working,
    Degraded,
    Broken,
    Unknown,
}

impl TrackingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TrackingStatus::Working => "working",
            TrackingStatus::Degraded => "degraded",
            TrackingStatus::Broken => "broken",
            TrackingStatus::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceBand {
    High,
    Medium,
    Low,
}

impl ConfidenceBand {
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence >= 0.75 {
            ConfidenceBand::High
        } else if confidence >= 0.5 {
            ConfidenceBand::Medium
        } else {
            ConfidenceBand::Low
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ConfidenceBand::High => "high",
            ConfidenceBand::Medium => "medium",
            ConfidenceBand::Low => "low",
        }
    }
}

/// Outcome of one attempted check, for callers that audit without parsing text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckRecord {
    pub signal: SignalId,
    pub status: CheckStatus,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReasoningTrace {
    /// One entry per signal, in signal declaration order, whatever its outcome.
    pub checks_performed: Vec<String>,
    pub check_outcomes: Vec<CheckRecord>,
    pub reasoning: String,
}

/// The single output of a diagnostic run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagnosticReport {
    /// UUIDv7, time-sortable
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub primary_issue: Option<ScoredIssue>,
    pub secondary_issues: Vec<ScoredIssue>,
    pub causal_chains: Vec<CausalChain>,
    pub tracking_status: TrackingStatus,
    pub overall_confidence: f64,
    pub confidence_band: ConfidenceBand,
    pub is_working_despite_issues: bool,
    pub reasoning: ReasoningTrace,
}

pub struct ReportAssembler<'a> {
    catalog: &'a [IssueDefinition],
    config: &'a EngineConfig,
}

impl<'a> ReportAssembler<'a> {
    pub fn new(catalog: &'a [IssueDefinition], config: &'a EngineConfig) -> Self {
        Self { catalog, config }
    }

    pub fn assemble(
        &self,
        scored: &[ScoredIssue],
        causal_chains: Vec<CausalChain>,
        evidence: &EvidenceSet,
        run_id: Uuid,
        generated_at: DateTime<Utc>,
    ) -> DiagnosticReport {
        let reported: Vec<&ScoredIssue> = rank(scored)
            .into_iter()
            .filter(|issue| issue.confidence > self.config.reporting_threshold)
            .collect();

        let primary_issue = reported
            .iter()
            .find(|issue| !self.is_minor(issue))
            .map(|issue| (*issue).clone());
        let secondary_issues: Vec<ScoredIssue> = reported
            .iter()
            .filter(|issue| Some(issue.issue_type) != primary_issue.as_ref().map(|p| p.issue_type))
            .map(|issue| (*issue).clone())
            .collect();

        let tracking_status = self.tracking_status(primary_issue.as_ref(), evidence);
        let overall_confidence = match (&primary_issue, tracking_status) {
            (Some(primary), _) => clamp_unit(primary.confidence),
            (None, TrackingStatus::Working) => clamp_unit(self.config.no_issue_confidence),
            (None, _) => clamp_unit(self.config.unknown_confidence),
        };
        let is_working_despite_issues =
            tracking_status == TrackingStatus::Working && !secondary_issues.is_empty();

        let reasoning = ReasoningTrace {
            checks_performed: evidence
                .readings()
                .iter()
                .map(|reading| format!("{}: {}", reading.signal().label(), reading.detail()))
                .collect(),
            check_outcomes: evidence
                .readings()
                .iter()
                .map(|reading| CheckRecord {
                    signal: reading.signal(),
                    status: reading.status(),
                    detail: reading.detail().to_string(),
                })
                .collect(),
            reasoning: self.explain(
                primary_issue.as_ref(),
                &secondary_issues,
                &causal_chains,
                tracking_status,
                evidence,
            ),
        };

        DiagnosticReport {
            run_id,
            generated_at,
            primary_issue,
            secondary_issues,
            causal_chains,
            tracking_status,
            overall_confidence,
            confidence_band: ConfidenceBand::from_confidence(overall_confidence),
            is_working_despite_issues,
            reasoning,
        }
    }

    fn is_minor(&self, issue: &ScoredIssue) -> bool {
        issue.severity < self.config.minor_severity_ceiling
    }

    fn tracking_status(&self, primary: Option<&ScoredIssue>, evidence: &EvidenceSet) -> TrackingStatus {
        if evidence.usable_count() == 0 {
            return TrackingStatus::Unknown;
        }
        match primary {
            Some(issue)
                if issue.severity >= self.config.broken_severity
                    || evidence.observed(SignalId::DataPresent) == Some(false) =>
            {
                TrackingStatus::Broken
            }
            Some(_) => TrackingStatus::Degraded,
            None if evidence.observed(SignalId::DataFresh) == Some(true) => TrackingStatus::Working,
            None => TrackingStatus::Unknown,
        }
    }

    fn summary(&self, issue: IssueType) -> &'static str {
        find_definition(self.catalog, issue)
            .map(|def| def.summary)
            .unwrap_or_else(|| issue.as_str())
    }

    fn explain(
        &self,
        primary: Option<&ScoredIssue>,
        secondary: &[ScoredIssue],
        chains: &[CausalChain],
        status: TrackingStatus,
        evidence: &EvidenceSet,
    ) -> String {
        let mut parts: Vec<String> = Vec::new();
        let attempted = evidence.readings().len();

        if evidence.usable_count() == 0 {
            parts.push(format!(
                "None of the {attempted} checks could be completed, so the tracking status is unknown."
            ));
        }

        match primary {
            Some(issue) => {
                let band = ConfidenceBand::from_confidence(issue.confidence);
                let because: Vec<String> = issue
                    .evidence_used
                    .iter()
                    .filter_map(|signal| evidence.get(*signal))
                    .map(|e| format!("{} reported {}", e.signal.label().to_lowercase(), e.detail))
                    .collect();
                let mut sentence = format!(
                    "Most likely issue: {} ({} confidence, {:.0}%)",
                    self.summary(issue.issue_type),
                    band.as_str(),
                    issue.confidence * 100.0
                );
                if because.is_empty() {
                    sentence.push_str(", based on how often this happens rather than a direct check.");
                } else {
                    sentence.push_str(&format!(" because {}.", because.join(" and ")));
                }
                parts.push(sentence);
                if let Some(def) = find_definition(self.catalog, issue.issue_type) {
                    parts.push(format!("Suggested fix: {}", def.remediation));
                }
            }
            None if status == TrackingStatus::Working => {
                parts.push(
                    "Tracking looks healthy: fresh activity data is arriving and no blocking issue was found."
                        .to_string(),
                );
            }
            None if evidence.usable_count() > 0 => {
                parts.push(
                    "No specific issue stood out, but fresh activity data could not be confirmed."
                        .to_string(),
                );
            }
            None => {}
        }

        if !secondary.is_empty() {
            let label = if primary.is_some() { "Also detected" } else { "Minor notes" };
            let notes: Vec<String> = secondary
                .iter()
                .map(|issue| {
                    format!(
                        "{} ({} confidence)",
                        self.summary(issue.issue_type),
                        ConfidenceBand::from_confidence(issue.confidence).as_str()
                    )
                })
                .collect();
            parts.push(format!("{label}: {}.", notes.join("; ")));
        }

        for chain in chains {
            parts.push(format!(
                "Why this matters: {} leads to {}, because {} (link strength {:.0}%).",
                self.summary(chain.cause_issue_type),
                self.summary(chain.effect_issue_type),
                chain.explanation,
                chain.strength * 100.0
            ));
        }

        let failed: Vec<&str> = evidence
            .with_status(CheckStatus::Failed)
            .map(|reading| reading.signal().label())
            .collect();
        if !failed.is_empty() {
            parts.push(format!(
                "{} of {attempted} checks could not be completed: {}.",
                failed.len(),
                failed.join(", ")
            ));
        }

        let skipped: Vec<&str> = evidence
            .with_status(CheckStatus::NotApplicable)
            .map(|reading| reading.signal().label())
            .collect();
        if !skipped.is_empty() {
            parts.push(format!("Not applicable on this device: {}.", skipped.join(", ")));
        }

        parts.join(" ")
    }
}
