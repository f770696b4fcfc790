//! Posterior confidence and utility scoring over the issue catalog.
//!
//! Each issue starts from its prior and absorbs relevant evidence one record
//! at a time (naive sequential Bayesian fusion: records are treated as
//! conditionally independent). The utility score then blends confidence with
//! the static severity and actionability of the issue:
//!
//! ```text
//! score = severity * 0.4 + confidence * 0.4 + actionability * 0.2
//! ```

use std::cmp::Ordering;

use serde::Serialize;

use crate::catalog::{IssueDefinition, IssueType};
use crate::evidence::EvidenceSet;
use crate::signals::SignalId;

pub const SEVERITY_WEIGHT: f64 = 0.4;
pub const CONFIDENCE_WEIGHT: f64 = 0.4;
pub const ACTIONABILITY_WEIGHT: f64 = 0.2;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredIssue {
    pub issue_type: IssueType,
    pub confidence: f64,
    pub utility_score: f64,
    pub severity: f64,
    pub evidence_used: Vec<SignalId>,
}

/// Clamp into `[0, 1]`, mapping NaN to 0.
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Single Bayesian update.
///
/// A zero denominator (both likelihoods zero, or an extreme prior meeting a
/// zero likelihood) has no posterior; the prior's nearest boundary is returned.
pub fn bayes_update(prior: f64, likelihood_true: f64, likelihood_false: f64) -> f64 {
    let prior = clamp_unit(prior);
    let l_true = clamp_unit(likelihood_true);
    let l_false = clamp_unit(likelihood_false);

    let numerator = l_true * prior;
    let denominator = numerator + l_false * (1.0 - prior);
    if denominator <= 0.0 {
        return if prior >= 0.5 { 1.0 } else { 0.0 };
    }
    clamp_unit(numerator / denominator)
}

/// Pull a likelihood toward the uninformative 0.5 as reliability drops.
fn temper(likelihood: f64, reliability: f64) -> f64 {
    let reliability = clamp_unit(reliability);
    reliability * clamp_unit(likelihood) + (1.0 - reliability) * 0.5
}

/// Posterior for one issue plus the signals that moved it.
pub fn posterior(def: &IssueDefinition, evidence: &EvidenceSet) -> (f64, Vec<SignalId>) {
    let mut confidence = clamp_unit(def.prior_probability);
    let mut used = Vec::new();

    for indicator in def.indicators {
        let Some(record) = evidence.get(indicator.signal) else {
            continue;
        };
        let Some(observed) = record.observed else {
            continue;
        };
        let (l_true, l_false) = if observed == indicator.fires_when {
            (def.likelihood_given_true, def.likelihood_given_false)
        } else {
            (1.0 - def.likelihood_given_true, 1.0 - def.likelihood_given_false)
        };
        confidence = bayes_update(
            confidence,
            temper(l_true, record.reliability),
            temper(l_false, record.reliability),
        );
        used.push(indicator.signal);
    }

    (confidence, used)
}

pub fn utility_score(severity: f64, confidence: f64, actionability: f64) -> f64 {
    clamp_unit(
        clamp_unit(severity) * SEVERITY_WEIGHT
            + clamp_unit(confidence) * CONFIDENCE_WEIGHT
            + clamp_unit(actionability) * ACTIONABILITY_WEIGHT,
    )
}

/// Score every catalog entry, in catalog order. Never fails.
pub fn score_catalog(catalog: &[IssueDefinition], evidence: &EvidenceSet) -> Vec<ScoredIssue> {
    catalog
        .iter()
        .map(|def| {
            let (confidence, evidence_used) = posterior(def, evidence);
            ScoredIssue {
                issue_type: def.issue_type,
                confidence,
                utility_score: utility_score(def.severity, confidence, def.actionability),
                severity: clamp_unit(def.severity),
                evidence_used,
            }
        })
        .collect()
}

/// Ranking order: higher utility score, then higher severity, then catalog order.
///
/// Expects `scored` in catalog order; the sort is stable, so the final
/// tie-breaker falls out of the input order.
pub fn rank(scored: &[ScoredIssue]) -> Vec<&ScoredIssue> {
    let mut ranked: Vec<&ScoredIssue> = scored.iter().collect();
    ranked.sort_by(|a, b| compare_rank(a, b));
    ranked
}

fn compare_rank(a: &ScoredIssue, b: &ScoredIssue) -> Ordering {
    b.utility_score
        .total_cmp(&a.utility_score)
        .then_with(|| b.severity.total_cmp(&a.severity))
}

#[cfg(test)]
mod tests {
    use super::{ScoredIssue, bayes_update, posterior, rank, score_catalog, utility_score};
    use crate::catalog::{CATALOG, IssueDefinition, IssueType, find_definition};
    use crate::evidence::{Evidence, EvidenceSet, SignalReading};
    use crate::signals::SignalId;

    fn evidence(signal: SignalId, observed: bool, reliability: f64) -> SignalReading {
        SignalReading::Observed(Evidence {
            signal,
            observed: Some(observed),
            reliability,
            detail: String::new(),
        })
    }

    fn def(issue: IssueType) -> &'static IssueDefinition {
        find_definition(CATALOG, issue).unwrap()
    }

    #[test]
    fn update_matches_closed_form() {
        let posterior = bayes_update(0.15, 0.95, 0.05);
        let expected = (0.95 * 0.15) / (0.95 * 0.15 + 0.05 * 0.85);
        assert!((posterior - expected).abs() < 1e-12);
    }

    #[test]
    fn update_stays_in_unit_interval_over_grid() {
        let steps: Vec<f64> = (0..=20).map(|i| i as f64 / 20.0).collect();
        for &prior in &steps {
            for &l_true in &steps {
                for &l_false in &steps {
                    let p = bayes_update(prior, l_true, l_false);
                    assert!(
                        (0.0..=1.0).contains(&p),
                        "prior={prior} l_true={l_true} l_false={l_false} gave {p}"
                    );
                }
            }
        }
    }

    #[test]
    fn zero_denominator_clamps_to_prior_boundary() {
        assert_eq!(bayes_update(0.4, 0.0, 0.0), 0.0);
        assert_eq!(bayes_update(0.7, 0.0, 0.0), 1.0);
        assert_eq!(bayes_update(1.0, 0.0, 0.3), 1.0);
        assert_eq!(bayes_update(0.0, 0.3, 0.0), 0.0);
    }

    #[test]
    fn out_of_range_inputs_are_clamped() {
        assert!((0.0..=1.0).contains(&bayes_update(1.4, 2.0, -1.0)));
        assert_eq!(bayes_update(f64::NAN, 0.9, 0.1), 0.0);
        assert!((0.0..=1.0).contains(&utility_score(3.0, f64::NAN, -2.0)));
    }

    #[test]
    fn utility_weights_are_fixed() {
        let score = utility_score(1.0, 0.5, 0.0);
        assert!((score - 0.6).abs() < 1e-12);
        let score = utility_score(0.0, 0.0, 1.0);
        assert!((score - 0.2).abs() < 1e-12);
    }

    #[test]
    fn no_usable_evidence_keeps_the_prior() {
        let set = EvidenceSet::from_readings(vec![SignalReading::NotApplicable(
            SignalId::PermissionsGranted,
        )]);
        let (confidence, used) = posterior(def(IssueType::PermissionsNotGranted), &set);
        assert_eq!(confidence, 0.15);
        assert!(used.is_empty());
    }

    #[test]
    fn firing_evidence_raises_confidence_and_clear_evidence_lowers_it() {
        let denied = EvidenceSet::from_readings(vec![evidence(SignalId::PermissionsGranted, false, 1.0)]);
        let granted = EvidenceSet::from_readings(vec![evidence(SignalId::PermissionsGranted, true, 1.0)]);
        let (up, used) = posterior(def(IssueType::PermissionsNotGranted), &denied);
        let (down, _) = posterior(def(IssueType::PermissionsNotGranted), &granted);
        assert!(up > 0.75);
        assert!(down < 0.02);
        assert_eq!(used, vec![SignalId::PermissionsGranted]);
    }

    #[test]
    fn lower_reliability_moves_the_posterior_less() {
        let sure = EvidenceSet::from_readings(vec![evidence(SignalId::DataFresh, false, 1.0)]);
        let noisy = EvidenceSet::from_readings(vec![evidence(SignalId::DataFresh, false, 0.5)]);
        let (sure_conf, _) = posterior(def(IssueType::StaleData), &sure);
        let (noisy_conf, _) = posterior(def(IssueType::StaleData), &noisy);
        assert!(sure_conf > noisy_conf);
        assert!(noisy_conf > def(IssueType::StaleData).prior_probability);
    }

    #[test]
    fn sequential_fusion_compounds_agreeing_evidence() {
        let one = EvidenceSet::from_readings(vec![evidence(SignalId::DataPresent, false, 1.0)]);
        let two = EvidenceSet::from_readings(vec![
            evidence(SignalId::DataPresent, false, 1.0),
            evidence(SignalId::TodayActivity, false, 1.0),
        ]);
        let (single, _) = posterior(def(IssueType::NoDataRecorded), &one);
        let (double, used) = posterior(def(IssueType::NoDataRecorded), &two);
        assert!((single - 0.5).abs() < 1e-12);
        assert!((double - 0.9).abs() < 1e-12);
        assert_eq!(used.len(), 2);
    }

    #[test]
    fn scoring_is_deterministic() {
        let set = EvidenceSet::from_readings(vec![
            evidence(SignalId::PermissionsGranted, false, 1.0),
            evidence(SignalId::MultipleSources, true, 1.0),
            evidence(SignalId::DataFresh, false, 0.9),
        ]);
        assert_eq!(score_catalog(CATALOG, &set), score_catalog(CATALOG, &set));
    }

    #[test]
    fn ties_prefer_severity_then_catalog_order() {
        let issue = |issue_type, utility_score, severity| ScoredIssue {
            issue_type,
            confidence: 0.5,
            utility_score,
            severity,
            evidence_used: Vec::new(),
        };
        let scored = vec![
            issue(IssueType::StaleData, 0.6, 0.5),
            issue(IssueType::DataDiscrepancy, 0.6, 0.5),
            issue(IssueType::NoDataRecorded, 0.6, 0.8),
            issue(IssueType::ManualEntriesDetected, 0.7, 0.1),
        ];
        let order: Vec<IssueType> = rank(&scored).iter().map(|s| s.issue_type).collect();
        assert_eq!(
            order,
            vec![
                IssueType::ManualEntriesDetected,
                IssueType::NoDataRecorded,
                IssueType::StaleData,
                IssueType::DataDiscrepancy,
            ]
        );
    }
}
