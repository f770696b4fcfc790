use serde::Serialize;

use crate::catalog::{CausalLink, IssueType};
use crate::scoring::{ScoredIssue, clamp_unit};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CausalChain {
    pub cause_issue_type: IssueType,
    pub effect_issue_type: IssueType,
    pub strength: f64,
    pub explanation: &'static str,
}

/// Emit a chain for every table link whose cause and effect were both
/// reported. Pairs missing from the table are never linked, however often
/// they co-occur.
pub fn detect_chains(
    scored: &[ScoredIssue],
    links: &[CausalLink],
    reporting_threshold: f64,
) -> Vec<CausalChain> {
    let reported = |issue: IssueType| {
        scored
            .iter()
            .find(|s| s.issue_type == issue && s.confidence > reporting_threshold)
    };

    let mut chains: Vec<CausalChain> = Vec::new();
    for link in links {
        let (Some(cause), Some(effect)) = (reported(link.cause), reported(link.effect)) else {
            continue;
        };
        if chains
            .iter()
            .any(|c| c.cause_issue_type == link.cause && c.effect_issue_type == link.effect)
        {
            continue;
        }
        chains.push(CausalChain {
            cause_issue_type: link.cause,
            effect_issue_type: link.effect,
            strength: clamp_unit(cause.confidence * effect.confidence),
            explanation: link.explanation,
        });
    }
    chains
}

#[cfg(test)]
mod tests {
    use super::detect_chains;
    use crate::catalog::{CAUSAL_LINKS, IssueType};
    use crate::scoring::ScoredIssue;

    fn scored(issue_type: IssueType, confidence: f64) -> ScoredIssue {
        ScoredIssue {
            issue_type,
            confidence,
            utility_score: 0.5,
            severity: 0.5,
            evidence_used: Vec::new(),
        }
    }

    #[test]
    fn links_known_pair_with_product_strength() {
        let issues = vec![
            scored(IssueType::BatteryOptimizationEnabled, 0.6),
            scored(IssueType::StaleData, 0.8),
        ];
        let chains = detect_chains(&issues, CAUSAL_LINKS, 0.3);
        assert_eq!(chains.len(), 1);
        assert_eq!(chains[0].cause_issue_type, IssueType::BatteryOptimizationEnabled);
        assert_eq!(chains[0].effect_issue_type, IssueType::StaleData);
        assert!((chains[0].strength - 0.48).abs() < 1e-12);
    }

    #[test]
    fn skips_pairs_below_threshold() {
        let issues = vec![
            scored(IssueType::BatteryOptimizationEnabled, 0.9),
            scored(IssueType::StaleData, 0.3),
        ];
        assert!(detect_chains(&issues, CAUSAL_LINKS, 0.3).is_empty());
    }

    #[test]
    fn never_links_pairs_missing_from_the_table() {
        let issues = vec![
            scored(IssueType::BatteryOptimizationEnabled, 0.9),
            scored(IssueType::DataDiscrepancy, 0.9),
            scored(IssueType::StaleData, 0.1),
        ];
        assert!(detect_chains(&issues, CAUSAL_LINKS, 0.3).is_empty());
    }

    #[test]
    fn one_effect_may_have_several_causes() {
        let issues = vec![
            scored(IssueType::MultipleConflictingSources, 0.7),
            scored(IssueType::ManualEntriesDetected, 0.4),
            scored(IssueType::DataDiscrepancy, 0.5),
        ];
        let chains = detect_chains(&issues, CAUSAL_LINKS, 0.3);
        assert_eq!(chains.len(), 2);
        assert!(chains.iter().all(|c| c.effect_issue_type == IssueType::DataDiscrepancy));
    }
}
