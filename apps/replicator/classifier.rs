use crate::proposals::Proposal;

/// Outcome of inspecting a closed proposal's score distribution.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Nobody voted; nothing to replicate.
    NoOp,
    /// Votes were cast but the quorum threshold was not reached.
    NoQuorum,
    Replicate(VoteTotals),
}

/// Aggregated scores for a replicable outcome. Labels are matched
/// case-sensitively against the canonical "Yes"/"No"/"Abstain" strings;
/// proposals without an Abstain choice simply leave that bucket at zero.
#[derive(Debug, Clone, PartialEq)]
pub struct VoteTotals {
    pub yes: f64,
    pub no: f64,
    pub abstain: f64,
    pub total: f64,
    /// Human-readable per-choice percentages, zero-score choices omitted.
    pub breakdown: Vec<String>,
}

pub fn classify(proposal: &Proposal) -> Decision {
    let total: f64 = proposal.scores.iter().sum();

    if total == 0.0 {
        return Decision::NoOp;
    }

    if proposal.quorum > total {
        return Decision::NoQuorum;
    }

    let mut totals = VoteTotals {
        yes: 0.0,
        no: 0.0,
        abstain: 0.0,
        total,
        breakdown: vec![],
    };

    for (choice, score) in proposal.choices.iter().zip(proposal.scores.iter()) {
        if *score == 0.0 {
            continue;
        }

        match choice.as_str() {
            "Yes" => totals.yes += score,
            "No" => totals.no += score,
            "Abstain" => totals.abstain += score,
            _ => {}
        }

        let percentage = score * 100.0 / total;
        totals
            .breakdown
            .push(format!("{:.2}% {}", percentage, choice));
    }

    Decision::Replicate(totals)
}

#[cfg(test)]
mod classifier_tests {
    use super::*;
    use crate::proposals::SpaceRef;
    use proptest::prelude::*;

    fn proposal(choices: Vec<&str>, scores: Vec<f64>, quorum: f64) -> Proposal {
        Proposal {
            id: "0xproposal".to_string(),
            title: "Test proposal".to_string(),
            body: String::new(),
            choices: choices.into_iter().map(String::from).collect(),
            start: 0,
            end: 100,
            snapshot: "19000000".to_string(),
            state: "closed".to_string(),
            created: 0,
            proposal_type: "single-choice".to_string(),
            scores,
            quorum,
            network: "1".to_string(),
            space: SpaceRef {
                id: "sdbal.eth".to_string(),
                name: "Balancer".to_string(),
                symbol: "sdBAL".to_string(),
            },
        }
    }

    #[test]
    fn zero_total_is_noop_even_with_zero_quorum() {
        let decision = classify(&proposal(vec!["Yes", "No"], vec![0.0, 0.0], 0.0));
        assert_eq!(decision, Decision::NoOp);
    }

    #[test]
    fn below_quorum_is_no_quorum() {
        let decision = classify(&proposal(vec!["Yes", "No"], vec![10.0, 5.0], 100.0));
        assert_eq!(decision, Decision::NoQuorum);
    }

    #[test]
    fn clearing_quorum_aggregates_yes_no() {
        match classify(&proposal(vec!["Yes", "No"], vec![70.0, 30.0], 50.0)) {
            Decision::Replicate(totals) => {
                assert_eq!(totals.yes, 70.0);
                assert_eq!(totals.no, 30.0);
                assert_eq!(totals.abstain, 0.0);
                assert_eq!(totals.breakdown, vec!["70.00% Yes", "30.00% No"]);
            }
            other => panic!("expected Replicate, got {:?}", other),
        }
    }

    #[test]
    fn abstain_is_tracked_as_third_bucket() {
        match classify(&proposal(
            vec!["Against", "For", "Abstain"],
            vec![10.0, 60.0, 30.0],
            50.0,
        )) {
            Decision::Replicate(totals) => {
                // Against/For labels do not hit the canonical buckets.
                assert_eq!(totals.yes, 0.0);
                assert_eq!(totals.no, 0.0);
                assert_eq!(totals.abstain, 30.0);
                assert_eq!(totals.total, 100.0);
            }
            other => panic!("expected Replicate, got {:?}", other),
        }
    }

    #[test]
    fn label_match_is_case_sensitive() {
        match classify(&proposal(vec!["yes", "No"], vec![70.0, 30.0], 50.0)) {
            Decision::Replicate(totals) => {
                assert_eq!(totals.yes, 0.0);
                assert_eq!(totals.no, 30.0);
            }
            other => panic!("expected Replicate, got {:?}", other),
        }
    }

    #[test]
    fn zero_score_choices_are_left_out_of_the_breakdown() {
        match classify(&proposal(
            vec!["Yes", "No", "Abstain"],
            vec![100.0, 0.0, 0.0],
            50.0,
        )) {
            Decision::Replicate(totals) => {
                assert_eq!(totals.breakdown, vec!["100.00% Yes"]);
            }
            other => panic!("expected Replicate, got {:?}", other),
        }
    }

    proptest! {
        #[test]
        fn buckets_never_exceed_the_total(
            yes in 0.0f64..1e12,
            no in 0.0f64..1e12,
            abstain in 0.0f64..1e12,
            quorum in 0.0f64..1e12,
        ) {
            let p = proposal(vec!["Yes", "No", "Abstain"], vec![yes, no, abstain], quorum);
            match classify(&p) {
                Decision::NoOp => prop_assert_eq!(yes + no + abstain, 0.0),
                Decision::NoQuorum => {
                    prop_assert!(yes + no + abstain > 0.0);
                    prop_assert!(quorum > yes + no + abstain);
                }
                Decision::Replicate(totals) => {
                    prop_assert!(totals.yes + totals.no + totals.abstain <= totals.total * (1.0 + f64::EPSILON));
                    prop_assert!(totals.total > 0.0);
                }
            }
        }
    }
}
