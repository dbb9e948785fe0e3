use crate::{
    execution::{signer_from_env, BatchExecution, VotingStrategy, GAS_BUMP_PCT, MIN_GAS_LIMIT},
    intent::EncodedVote,
    rpc_providers,
    voting_power::{AngleGovernor, ANGLE_GOVERNOR, ANGLE_LOCKER},
};
use alloy::{
    network::EthereumWallet,
    primitives::{Bytes, B256, U256},
    providers::{Provider, ProviderBuilder},
    sol_types::SolValue,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use itertools::Itertools;
use tracing::info;

pub struct AngleStrategy;

/// The governor takes the Against/For/Abstain amounts as ABI-encoded params
/// on its fractional-voting path; support and reason stay empty.
fn vote_call_params(vote: &EncodedVote) -> Result<(U256, Bytes)> {
    match vote {
        EncodedVote::Angle { intent } => {
            let proposal_id: U256 = intent
                .target_id
                .parse()
                .context("angle proposal id is not a uint256")?;
            let params = (intent.tally.no, intent.tally.yes, intent.tally.abstain).abi_encode();
            Ok((proposal_id, Bytes::from(params)))
        }
        _ => anyhow::bail!("non-angle vote in angle batch"),
    }
}

#[async_trait]
impl VotingStrategy for AngleStrategy {
    fn name(&self) -> &'static str {
        "Angle"
    }

    fn filter_votes<'a>(&self, votes: &'a [EncodedVote]) -> Vec<&'a EncodedVote> {
        votes
            .iter()
            .filter(|vote| matches!(vote, EncodedVote::Angle { .. }))
            .collect()
    }

    async fn execute(&self, votes: &[&EncodedVote]) -> Result<BatchExecution> {
        let signer = signer_from_env("SAFE_PROPOSER_PK")?;
        let account = signer.address();
        let rpc_url = std::env::var("ETHEREUM_NODE_URL").context("ETHEREUM_NODE_URL not set!")?;
        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(signer))
            .connect_http(rpc_url.parse()?)
            .erased();

        let governor = AngleGovernor::new(ANGLE_GOVERNOR, provider.clone());

        // The governor has no batched entry point; every vote is its own
        // transaction, simulated before anything is submitted.
        let mut calls = Vec::with_capacity(votes.len());
        for vote in votes {
            let (proposal_id, params) = vote_call_params(vote)?;
            let call = governor
                .castVoteWithReasonAndParams(proposal_id, 0, String::new(), params)
                .from(account);

            if let Err(e) = call.call().await {
                return Ok(BatchExecution::SimulationFailed {
                    reason: e.to_string(),
                });
            }

            calls.push(call);
        }

        let fees = provider
            .estimate_eip1559_fees()
            .await
            .context("estimate fees")?;
        let max_fee = fees.max_fee_per_gas * GAS_BUMP_PCT as u128 / 100;
        let max_priority = fees.max_priority_fee_per_gas * GAS_BUMP_PCT as u128 / 100;

        let mut last_tx: B256 = B256::ZERO;
        for call in calls {
            let gas = call.estimate_gas().await.context("estimate gas")?;
            let gas_limit = (gas.saturating_mul(GAS_BUMP_PCT) / 100).max(MIN_GAS_LIMIT);

            let receipt = call
                .gas(gas_limit)
                .max_fee_per_gas(max_fee)
                .max_priority_fee_per_gas(max_priority)
                .send()
                .await
                .context("submit vote")?
                .get_receipt()
                .await
                .context("await receipt")?;

            if !receipt.status() {
                return Ok(BatchExecution::Reverted {
                    tx_hash: receipt.transaction_hash,
                });
            }

            info!(tx = %receipt.transaction_hash, "Angle vote mined");
            last_tx = receipt.transaction_hash;
        }

        Ok(BatchExecution::Mined { tx_hash: last_tx })
    }

    async fn verify(&self, votes: &[&EncodedVote]) -> Result<bool> {
        let provider = rpc_providers::get_provider("ethereum")?;
        let governor = AngleGovernor::new(ANGLE_GOVERNOR, provider);

        for vote in votes {
            let intent = vote.intent();
            let proposal_id: U256 = intent.target_id.parse().context("angle proposal id")?;
            let voted = governor
                .hasVoted(proposal_id, ANGLE_LOCKER)
                .call()
                .await
                .context("hasVoted")?;

            if !voted {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn format_success_message(&self, votes: &[&EncodedVote], tx_hash: &str) -> String {
        let lines = votes
            .iter()
            .map(|vote| {
                let intent = vote.intent();
                format!(
                    "✅ {}\nVote : ({})",
                    intent.proposal_title,
                    intent.breakdown.join(",")
                )
            })
            .join("\n");

        format!("{lines}\nTx : <a href=\"https://etherscan.io/tx/{tx_hash}\">etherscan.io</a>")
    }
}
