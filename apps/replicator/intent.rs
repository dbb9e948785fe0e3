use alloy::primitives::{
    utils::{parse_ether, UnitsError},
    U256,
};
use serde_json::{json, Value};

/// Origin governance backend a mirror-space outcome is replicated onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    Curve,
    Angle,
    GenericSnapshot,
    YieldBasis,
}

/// Curve runs two Aragon voting apps; the body link tells us which one the
/// proposal belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GovernanceTrack {
    Ownership,
    Parameter,
}

impl GovernanceTrack {
    pub fn vote_type(&self) -> u8 {
        match self {
            GovernanceTrack::Ownership => 0,
            GovernanceTrack::Parameter => 1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoteTally {
    pub yes: U256,
    pub no: U256,
    pub abstain: U256,
}

impl VoteTally {
    pub fn total(&self) -> U256 {
        self.yes + self.no + self.abstain
    }
}

/// One replication decision, produced for a closed proposal that cleared
/// quorum with a non-zero total score. Consumed exactly once by the matching
/// protocol strategy and never mutated after creation.
#[derive(Debug, Clone)]
pub struct VoteIntent {
    pub protocol: Protocol,
    pub space: &'static str,
    pub target_id: String,
    pub tally: VoteTally,
    pub voting_power_base: U256,
    pub proposal_title: String,
    pub deadline: i64,
    pub breakdown: Vec<String>,
}

/// Choice payload for an off-chain replica vote.
#[derive(Debug, Clone, PartialEq)]
pub enum ChoiceSelection {
    /// 1-based index of the winning choice.
    Single(u32),
    /// 1-based index to raw score, zero-score choices omitted.
    Weighted(Vec<(u32, f64)>),
}

impl ChoiceSelection {
    pub fn to_choice_json(&self) -> Value {
        match self {
            ChoiceSelection::Single(index) => json!(index),
            ChoiceSelection::Weighted(weights) => {
                let map: serde_json::Map<String, Value> = weights
                    .iter()
                    .map(|(index, score)| (index.to_string(), json!(score)))
                    .collect();
                Value::Object(map)
            }
        }
    }
}

/// Off-chain replica target, resolved from the origin space's index.
#[derive(Debug, Clone)]
pub struct OffchainTarget {
    pub space: String,
    pub proposal: String,
    pub proposal_type: String,
}

/// Protocol-specific vote payload handed to the execution strategies.
#[derive(Debug, Clone)]
pub enum EncodedVote {
    Curve {
        intent: VoteIntent,
        track: GovernanceTrack,
    },
    Angle {
        intent: VoteIntent,
    },
    YieldBasis {
        intent: VoteIntent,
        try_early_execution: bool,
    },
    Offchain {
        intent: VoteIntent,
        target: OffchainTarget,
        choice: ChoiceSelection,
        signer_envs: &'static [&'static str],
        reason: String,
    },
}

impl EncodedVote {
    pub fn intent(&self) -> &VoteIntent {
        match self {
            EncodedVote::Curve { intent, .. }
            | EncodedVote::Angle { intent }
            | EncodedVote::YieldBasis { intent, .. }
            | EncodedVote::Offchain { intent, .. } => intent,
        }
    }

    pub fn protocol(&self) -> Protocol {
        self.intent().protocol
    }
}

/// Scores arrive as floats from the proposal index; normalize to 18-decimal
/// fixed point before any ratio math so splits stay exact.
pub fn fixed_point_amount(score: f64) -> Result<U256, UnitsError> {
    parse_ether(&score.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_point_amount_scales_to_18_decimals() {
        assert_eq!(
            fixed_point_amount(70.0).unwrap(),
            U256::from(70u64) * U256::from(1_000_000_000_000_000_000u64)
        );
        assert_eq!(
            fixed_point_amount(0.5).unwrap(),
            U256::from(500_000_000_000_000_000u64)
        );
    }

    #[test]
    fn weighted_choice_serializes_as_one_based_map() {
        let choice = ChoiceSelection::Weighted(vec![(1, 70.0), (3, 30.0)]);
        assert_eq!(
            choice.to_choice_json(),
            serde_json::json!({"1": 70.0, "3": 30.0})
        );
    }

    #[test]
    fn single_choice_serializes_as_number() {
        assert_eq!(ChoiceSelection::Single(2).to_choice_json(), serde_json::json!(2));
    }
}
