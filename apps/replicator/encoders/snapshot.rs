use crate::{
    classifier::VoteTotals,
    intent::{
        fixed_point_amount, ChoiceSelection, EncodedVote, OffchainTarget, Protocol, VoteIntent,
        VoteTally,
    },
    proposals::Proposal,
    spaces::SpaceConfig,
};
use alloy::primitives::U256;
use utils::errors::OperationError;

/// How the mirror outcome maps onto the origin proposal's choice set.
pub fn select_choice(origin_type: &str, scores: &[f64]) -> ChoiceSelection {
    match origin_type {
        "single-choice" | "basic" => {
            let mut best_index = 0u32;
            let mut best_score = -1.0;
            for (i, score) in scores.iter().enumerate() {
                if *score > best_score {
                    best_score = *score;
                    best_index = (i + 1) as u32;
                }
            }
            ChoiceSelection::Single(best_index)
        }
        _ => ChoiceSelection::Weighted(
            scores
                .iter()
                .enumerate()
                .filter(|(_, score)| **score != 0.0)
                .map(|(i, score)| ((i + 1) as u32, *score))
                .collect(),
        ),
    }
}

pub fn encode(
    proposal: &Proposal,
    totals: &VoteTotals,
    origin: &Proposal,
    config: &SpaceConfig,
) -> Result<EncodedVote, OperationError> {
    let choice = select_choice(&origin.proposal_type, &proposal.scores);

    let to_fixed = |amount: f64| {
        fixed_point_amount(amount).map_err(|e| OperationError::new("snapshot_encode", e.to_string()))
    };

    // The vote reason names the locker the replica speaks for.
    let symbol = if config.space == "sdapw.eth" {
        "SPECTRA".to_string()
    } else {
        proposal
            .space
            .symbol
            .strip_prefix("sd")
            .unwrap_or(&proposal.space.symbol)
            .to_string()
    };

    Ok(EncodedVote::Offchain {
        intent: VoteIntent {
            protocol: Protocol::GenericSnapshot,
            space: config.space,
            target_id: origin.id.clone(),
            tally: VoteTally {
                yes: to_fixed(totals.yes)?,
                no: to_fixed(totals.no)?,
                abstain: to_fixed(totals.abstain)?,
            },
            voting_power_base: crate::encoders::curve::PCT_BASE,
            proposal_title: proposal.title.clone(),
            deadline: config.deadline_for(proposal.end),
            breakdown: totals.breakdown.clone(),
        },
        target: OffchainTarget {
            space: origin.space.id.clone(),
            proposal: origin.id.clone(),
            proposal_type: origin.proposal_type.clone(),
        },
        choice,
        signer_envs: config.signer_envs,
        reason: format!("{symbol} Liquid Locker"),
    })
}
