use crate::{
    execution::{signer_from_env, BatchExecution, VotingStrategy, GAS_BUMP_PCT, MIN_GAS_LIMIT},
    intent::{EncodedVote, GovernanceTrack},
    rpc_providers,
};
use alloy::{
    network::EthereumWallet,
    primitives::{address, Address, U256},
    providers::{Provider, ProviderBuilder},
    sol,
};
use anyhow::{Context, Result};
use async_trait::async_trait;

pub const CURVE_SAFE_MODULE: Address = address!("b118fbE8B01dB24EdE7E87DFD19693cfca13e992");
pub const CURVE_OWNERSHIP_VOTER: Address = address!("E478de485ad2fe566d49342Cbd03E49ed7DB3356");
pub const CURVE_PARAMETER_VOTER: Address = address!("BCfF8B0b9419b9A88c44546519b1e909cF330399");
pub const CRV_LOCKER: Address = address!("52f541764E6e90eeBc5c21Ff570De0e2D63766B6");

sol! {
    #[sol(rpc)]
    contract CurveVoterModule {
        struct Vote {
            uint256 voteId;
            uint256 yeaPct;
            uint256 nayPct;
            uint8 voteType;
        }
        function votes(Vote[] calldata _votes) external;
        function getVoterState(uint256 _voteId, address _voter) external view returns (uint8);
    }
}

pub struct CurveStrategy;

fn vote_params(votes: &[&EncodedVote]) -> Result<Vec<CurveVoterModule::Vote>> {
    votes
        .iter()
        .map(|vote| match vote {
            EncodedVote::Curve { intent, track } => {
                let vote_id: U256 = intent
                    .target_id
                    .parse()
                    .context("curve vote id is not numeric")?;
                Ok(CurveVoterModule::Vote {
                    voteId: vote_id,
                    yeaPct: intent.tally.yes,
                    nayPct: intent.tally.no,
                    voteType: track.vote_type(),
                })
            }
            _ => anyhow::bail!("non-curve vote in curve batch"),
        })
        .collect()
}

fn voter_address(track: GovernanceTrack) -> Address {
    match track {
        GovernanceTrack::Ownership => CURVE_OWNERSHIP_VOTER,
        GovernanceTrack::Parameter => CURVE_PARAMETER_VOTER,
    }
}

fn pct(part: U256, total: U256) -> f64 {
    (part * U256::from(10_000u64) / total).to::<u64>() as f64 / 100.0
}

#[async_trait]
impl VotingStrategy for CurveStrategy {
    fn name(&self) -> &'static str {
        "Curve"
    }

    fn filter_votes<'a>(&self, votes: &'a [EncodedVote]) -> Vec<&'a EncodedVote> {
        votes
            .iter()
            .filter(|vote| matches!(vote, EncodedVote::Curve { .. }))
            .collect()
    }

    async fn execute(&self, votes: &[&EncodedVote]) -> Result<BatchExecution> {
        let params = vote_params(votes)?;

        let signer = signer_from_env("SAFE_PROPOSER_PK")?;
        let account = signer.address();
        let rpc_url = std::env::var("ETHEREUM_NODE_URL").context("ETHEREUM_NODE_URL not set!")?;
        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(signer))
            .connect_http(rpc_url.parse()?)
            .erased();

        let module = CurveVoterModule::new(CURVE_SAFE_MODULE, provider.clone());
        let call = module.votes(params).from(account);

        // Dry-run first so a revert costs nothing.
        if let Err(e) = call.call().await {
            return Ok(BatchExecution::SimulationFailed {
                reason: e.to_string(),
            });
        }

        let gas = call.estimate_gas().await.context("estimate gas")?;
        let fees = provider
            .estimate_eip1559_fees()
            .await
            .context("estimate fees")?;

        let gas_limit = (gas.saturating_mul(GAS_BUMP_PCT) / 100).max(MIN_GAS_LIMIT);
        let max_fee = fees.max_fee_per_gas * GAS_BUMP_PCT as u128 / 100;
        let max_priority = fees.max_priority_fee_per_gas * GAS_BUMP_PCT as u128 / 100;

        let receipt = call
            .gas(gas_limit)
            .max_fee_per_gas(max_fee)
            .max_priority_fee_per_gas(max_priority)
            .send()
            .await
            .context("submit votes")?
            .get_receipt()
            .await
            .context("await receipt")?;

        if receipt.status() {
            Ok(BatchExecution::Mined {
                tx_hash: receipt.transaction_hash,
            })
        } else {
            Ok(BatchExecution::Reverted {
                tx_hash: receipt.transaction_hash,
            })
        }
    }

    async fn verify(&self, votes: &[&EncodedVote]) -> Result<bool> {
        let provider = rpc_providers::get_provider("ethereum")?;

        for vote in votes {
            let (intent, track) = match vote {
                EncodedVote::Curve { intent, track } => (intent, *track),
                _ => continue,
            };

            let vote_id: U256 = intent.target_id.parse().context("curve vote id")?;
            let voting_app = CurveVoterModule::new(voter_address(track), provider.clone());
            let state = voting_app
                .getVoterState(vote_id, CRV_LOCKER)
                .call()
                .await
                .context("getVoterState")?;

            // 0 is Absent: the batch ran but this vote never registered.
            if state == 0 {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn format_success_message(&self, votes: &[&EncodedVote], tx_hash: &str) -> String {
        let mut message = String::new();
        for vote in votes {
            let intent = vote.intent();
            let total = intent.tally.yes + intent.tally.no;
            if total.is_zero() {
                continue;
            }
            message += &format!("✅ {}\n", intent.proposal_title);
            message += &format!(
                "Result : Yes {:.2}% - No {:.2}%\n\n",
                pct(intent.tally.yes, total),
                pct(intent.tally.no, total)
            );
        }
        message += &format!("Tx : <a href=\"https://etherscan.io/tx/{tx_hash}\">etherscan.io</a>");
        message
    }
}

#[cfg(test)]
mod curve_strategy_tests {
    use super::*;
    use crate::intent::{Protocol, VoteIntent, VoteTally};

    fn curve_vote(vote_id: &str, track: GovernanceTrack) -> EncodedVote {
        EncodedVote::Curve {
            intent: VoteIntent {
                protocol: Protocol::Curve,
                space: "sdcrv.eth",
                target_id: vote_id.to_string(),
                tally: VoteTally {
                    yes: U256::from(700_000_000_000_000_000u64),
                    no: U256::from(300_000_000_000_000_000u64),
                    abstain: U256::ZERO,
                },
                voting_power_base: U256::from(1_000_000_000_000_000_000u64),
                proposal_title: "Add gauge".to_string(),
                deadline: 0,
                breakdown: vec![],
            },
            track,
        }
    }

    #[test]
    fn filter_keeps_only_curve_votes() {
        let votes = vec![
            curve_vote("1", GovernanceTrack::Ownership),
            EncodedVote::Angle {
                intent: VoteIntent {
                    protocol: Protocol::Angle,
                    space: "sdangle.eth",
                    target_id: "0x1".to_string(),
                    tally: VoteTally::default(),
                    voting_power_base: U256::ZERO,
                    proposal_title: "angle".to_string(),
                    deadline: 0,
                    breakdown: vec![],
                },
            },
        ];

        let filtered = CurveStrategy.filter_votes(&votes);
        assert_eq!(filtered.len(), 1);
        assert!(matches!(filtered[0], EncodedVote::Curve { .. }));
    }

    #[test]
    fn vote_params_map_tracks_to_vote_types() {
        let ownership = curve_vote("12", GovernanceTrack::Ownership);
        let parameter = curve_vote("13", GovernanceTrack::Parameter);
        let votes: Vec<&EncodedVote> = vec![&ownership, &parameter];

        let params = vote_params(&votes).unwrap();
        assert_eq!(params[0].voteId, U256::from(12));
        assert_eq!(params[0].voteType, 0);
        assert_eq!(params[1].voteType, 1);
        assert_eq!(params[0].yeaPct, U256::from(700_000_000_000_000_000u64));
    }

    #[test]
    fn non_numeric_vote_id_fails_param_building() {
        let bad = curve_vote("not-a-number", GovernanceTrack::Ownership);
        let votes: Vec<&EncodedVote> = vec![&bad];
        assert!(vote_params(&votes).is_err());
    }

    #[test]
    fn success_message_includes_percentages_and_tx_link() {
        let vote = curve_vote("12", GovernanceTrack::Ownership);
        let votes: Vec<&EncodedVote> = vec![&vote];
        let message = CurveStrategy.format_success_message(&votes, "0xdeadbeef");

        assert!(message.contains("✅ Add gauge"));
        assert!(message.contains("Yes 70.00% - No 30.00%"));
        assert!(message.contains("etherscan.io/tx/0xdeadbeef"));
    }
}
