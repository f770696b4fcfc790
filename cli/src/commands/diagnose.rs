use std::time::Duration;

use chrono::Utc;
use clap::ValueEnum;

use pulsecheck_core::{DiagnosticEngine, DiagnosticReport, EngineConfig};

use crate::fixture::Fixture;
use crate::util::{EXIT_FIXTURE_ERROR, EXIT_OK, print_json, read_input, report_error};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Text,
}

pub struct DiagnoseArgs {
    pub fixture: String,
    pub format: OutputFormat,
    pub raw: bool,
    pub timeout_ms: Option<u64>,
}

const FIXTURE_HINT: &str = "Each checker entry is {\"status\": \"ok\", \"value\": ...}, \
{\"status\": \"not_applicable\"}, {\"status\": \"failed\", \"message\": ...} or {\"status\": \"hang\"}. \
See fixtures/ for complete files.";

pub async fn run(args: DiagnoseArgs) -> i32 {
    let raw_fixture = match read_input(&args.fixture) {
        Ok(raw) => raw,
        Err(message) => return report_error("fixture_error", &message, None, EXIT_FIXTURE_ERROR),
    };
    let fixture = match Fixture::parse(&raw_fixture) {
        Ok(fixture) => fixture,
        Err(message) => {
            return report_error("fixture_error", &message, Some(FIXTURE_HINT), EXIT_FIXTURE_ERROR);
        }
    };

    let now = Utc::now();
    let checkers = match fixture.into_checkers(now) {
        Ok(checkers) => checkers,
        Err(message) => {
            return report_error("fixture_error", &message, Some(FIXTURE_HINT), EXIT_FIXTURE_ERROR);
        }
    };

    let mut config = EngineConfig::from_env();
    if let Some(ms) = args.timeout_ms {
        config.checker_timeout = Duration::from_millis(ms);
    }

    tracing::debug!(
        fixture = %args.fixture,
        timeout_ms = config.checker_timeout.as_millis() as u64,
        "replaying fixture"
    );
    let engine = DiagnosticEngine::new(checkers, config);
    let report = engine.diagnose_at(now).await;

    match args.format {
        OutputFormat::Json => match print_json(&report, args.raw) {
            Ok(()) => EXIT_OK,
            Err(message) => report_error("output_error", &message, None, EXIT_FIXTURE_ERROR),
        },
        OutputFormat::Text => {
            print!("{}", render_text(&report));
            EXIT_OK
        }
    }
}

fn percent(value: f64) -> f64 {
    (value * 100.0).round()
}

pub fn render_text(report: &DiagnosticReport) -> String {
    let mut lines = vec![format!(
        "Tracking status: {} ({} confidence, {}%)",
        report.tracking_status.as_str(),
        report.confidence_band.as_str(),
        percent(report.overall_confidence)
    )];
    lines.push(match &report.primary_issue {
        Some(primary) => format!(
            "Primary issue:   {} ({}%, score {:.2})",
            primary.issue_type,
            percent(primary.confidence),
            primary.utility_score
        ),
        None => "Primary issue:   none".to_string(),
    });
    lines.extend(report.secondary_issues.iter().map(|issue| {
        format!(
            "Also:            {} ({}%)",
            issue.issue_type,
            percent(issue.confidence)
        )
    }));
    lines.extend(report.causal_chains.iter().map(|chain| {
        format!(
            "Chain:           {} -> {} ({}%)",
            chain.cause_issue_type,
            chain.effect_issue_type,
            percent(chain.strength)
        )
    }));
    if report.is_working_despite_issues {
        lines.push("Tracking works despite the issues above.".to_string());
    }

    lines.push(String::new());
    lines.push("Checks:".to_string());
    lines.extend(
        report
            .reasoning
            .checks_performed
            .iter()
            .map(|check| format!("  - {check}")),
    );
    lines.push(String::new());
    lines.push(report.reasoning.reasoning.clone());

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::render_text;
    use crate::fixture::Fixture;
    use pulsecheck_core::{DiagnosticEngine, EngineConfig, TrackingStatus};

    #[tokio::test]
    async fn denied_fixture_renders_broken_status() {
        let fixture = Fixture::parse(
            r#"{
                "permissions": {"status": "ok", "value": "denied"},
                "battery": {"status": "ok", "value": "disabled"},
                "platform": {"status": "ok", "value": "available"},
                "activity": {"status": "ok", "value": []}
            }"#,
        )
        .unwrap();
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap();
        let engine = DiagnosticEngine::new(fixture.into_checkers(now).unwrap(), EngineConfig::default());
        let report = engine.diagnose_at(now).await;
        assert_eq!(report.tracking_status, TrackingStatus::Broken);

        let text = render_text(&report);
        assert!(text.starts_with("Tracking status: broken"));
        assert!(text.contains("Primary issue:   permissions_not_granted"));
        assert_eq!(text.matches("\n  - ").count(), 11);
        assert!(text.contains("\nChecks:\n"));
        assert!(text.ends_with(&format!("{}\n", report.reasoning.reasoning)));
    }
}
