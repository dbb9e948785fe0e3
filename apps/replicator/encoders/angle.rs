use crate::{
    intent::{EncodedVote, Protocol, VoteIntent, VoteTally},
    origin::AngleOnchainProposal,
    proposals::Proposal,
    spaces::SpaceConfig,
};
use alloy::primitives::{utils::parse_ether, U256};
use utils::errors::OperationError;

/// Angle mirror proposals carry their percentage splits as choice labels in
/// the protocol-mandated Against/For/Abstain order. The locker's voting
/// power at the origin snapshot timestamp is distributed proportionally;
/// the truncation remainder is folded into abstain so the three amounts sum
/// exactly to the voting power.
pub fn encode(
    proposal: &Proposal,
    origin: &AngleOnchainProposal,
    voting_power: U256,
    config: &SpaceConfig,
) -> Result<EncodedVote, OperationError> {
    if proposal.choices.len() != 3 {
        return Err(OperationError::new(
            "angle_encode",
            format!(
                "expected 3 choices (Against/For/Abstain), got {}",
                proposal.choices.len()
            ),
        ));
    }

    let against = parse_percentage(&proposal.choices[0])?;
    let for_votes = parse_percentage(&proposal.choices[1])?;
    let abstain = parse_percentage(&proposal.choices[2])?;

    let total = against + for_votes + abstain;
    if total.is_zero() {
        return Err(OperationError::new(
            "angle_encode",
            "choice percentages sum to zero",
        ));
    }

    let pct_against = against * U256::from(100) / total;
    let pct_for = for_votes * U256::from(100) / total;

    let against_amount = pct_against * voting_power / U256::from(100);
    let for_amount = pct_for * voting_power / U256::from(100);
    let abstain_amount = voting_power - against_amount - for_amount;

    Ok(EncodedVote::Angle {
        intent: VoteIntent {
            protocol: Protocol::Angle,
            space: config.space,
            target_id: origin.id.clone(),
            tally: VoteTally {
                yes: for_amount,
                no: against_amount,
                abstain: abstain_amount,
            },
            voting_power_base: voting_power,
            proposal_title: proposal.title.clone(),
            deadline: config.deadline_for(proposal.end),
            breakdown: proposal
                .choices
                .iter()
                .zip(["Against", "For", "Abstain"])
                .map(|(pct, label)| format!("{pct}% {label}"))
                .collect(),
        },
    })
}

fn parse_percentage(choice: &str) -> Result<U256, OperationError> {
    parse_ether(choice).map_err(|e| {
        OperationError::new(
            "angle_encode",
            format!("choice {choice:?} is not a decimal percentage: {e}"),
        )
    })
}

#[cfg(test)]
mod angle_encoder_tests {
    use super::*;
    use crate::proposals::SpaceRef;
    use crate::spaces::space_config;
    use proptest::prelude::*;

    fn angle_proposal(choices: Vec<&str>) -> Proposal {
        Proposal {
            id: "0xangle".to_string(),
            title: "Savings rate update".to_string(),
            body: String::new(),
            choices: choices.into_iter().map(String::from).collect(),
            start: 0,
            end: 1_700_000_000,
            snapshot: "19000000".to_string(),
            state: "closed".to_string(),
            created: 0,
            proposal_type: "single-choice".to_string(),
            scores: vec![],
            quorum: 0.0,
            network: "1".to_string(),
            space: SpaceRef {
                id: "sdangle.eth".to_string(),
                name: "Angle".to_string(),
                symbol: "sdANGLE".to_string(),
            },
        }
    }

    fn origin() -> AngleOnchainProposal {
        AngleOnchainProposal {
            id: "0x0000000000000000000000000000000000000000000000000000000000000042".to_string(),
            description: "ipfs://QmHash".to_string(),
            snapshot_block: "19000000".to_string(),
            snapshot_timestamp: "1700000000".to_string(),
        }
    }

    #[test]
    fn splits_voting_power_by_percentage_labels() {
        let proposal = angle_proposal(vec!["10", "60", "30"]);
        let config = space_config("sdangle.eth").unwrap();

        match encode(&proposal, &origin(), U256::from(1000), config).unwrap() {
            EncodedVote::Angle { intent } => {
                assert_eq!(intent.tally.no, U256::from(100));
                assert_eq!(intent.tally.yes, U256::from(600));
                assert_eq!(intent.tally.abstain, U256::from(300));
                assert_eq!(intent.tally.total(), U256::from(1000));
            }
            other => panic!("expected Angle vote, got {:?}", other),
        }
    }

    #[test]
    fn wrong_choice_count_aborts_encoding() {
        let proposal = angle_proposal(vec!["Yes", "No"]);
        let config = space_config("sdangle.eth").unwrap();
        let err = encode(&proposal, &origin(), U256::from(1000), config).unwrap_err();
        assert_eq!(err.operation, "angle_encode");
        assert!(err.message.contains("3 choices"));
    }

    #[test]
    fn non_numeric_choice_labels_are_reported() {
        let proposal = angle_proposal(vec!["Against", "For", "Abstain"]);
        let config = space_config("sdangle.eth").unwrap();
        let err = encode(&proposal, &origin(), U256::from(1000), config).unwrap_err();
        assert!(err.message.contains("not a decimal percentage"));
    }

    proptest! {
        #[test]
        fn amounts_always_sum_to_the_voting_power(
            against in 0u32..1000,
            for_votes in 0u32..1000,
            abstain in 1u32..1000,
            power in 1u64..u64::MAX,
        ) {
            let against_s = against.to_string();
            let for_s = for_votes.to_string();
            let abstain_s = abstain.to_string();
            let proposal = angle_proposal(vec![&against_s, &for_s, &abstain_s]);
            let config = space_config("sdangle.eth").unwrap();
            let vote = encode(&proposal, &origin(), U256::from(power), config).unwrap();
            match vote {
                EncodedVote::Angle { intent } => {
                    prop_assert_eq!(intent.tally.total(), U256::from(power));
                }
                _ => prop_assert!(false),
            }
        }
    }
}
