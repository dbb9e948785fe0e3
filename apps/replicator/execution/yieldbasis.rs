use crate::{
    execution::{signer_from_env, BatchExecution, VotingStrategy, GAS_BUMP_PCT, MIN_GAS_LIMIT},
    intent::EncodedVote,
    rpc_providers,
    voting_power::YB_LOCKER,
};
use alloy::{
    network::EthereumWallet,
    primitives::{address, Address, U256},
    providers::{Provider, ProviderBuilder},
    sol,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use itertools::Itertools;

pub const YB_SAFE_MODULE: Address = address!("82499D0f7b0A648e8a99c8ab395c2cd3a9B7B8fD");
pub const YB_PLUGIN: Address = address!("d7df8bd42e81a0fd68ac78254afdc0d7b6cbae9f");

sol! {
    #[sol(rpc)]
    contract YieldBasisVoterModule {
        struct Tally {
            uint256 abstain;
            uint256 yes;
            uint256 no;
        }
        struct Vote {
            uint256 voteId;
            Tally tally;
            bool tryEarlyExecution;
        }
        function votes(Vote[] calldata _votes) external;
        function getVotes(uint256 _proposalId, address _account) external view returns (Tally memory);
    }
}

pub struct YieldBasisStrategy;

fn vote_params(votes: &[&EncodedVote]) -> Result<Vec<YieldBasisVoterModule::Vote>> {
    votes
        .iter()
        .map(|vote| match vote {
            EncodedVote::YieldBasis {
                intent,
                try_early_execution,
            } => {
                let vote_id: U256 = intent
                    .target_id
                    .parse()
                    .context("yieldbasis proposal index is not numeric")?;
                Ok(YieldBasisVoterModule::Vote {
                    voteId: vote_id,
                    tally: YieldBasisVoterModule::Tally {
                        abstain: intent.tally.abstain,
                        yes: intent.tally.yes,
                        no: intent.tally.no,
                    },
                    tryEarlyExecution: *try_early_execution,
                })
            }
            _ => anyhow::bail!("non-yieldbasis vote in yieldbasis batch"),
        })
        .collect()
}

fn pct(part: U256, total: U256) -> f64 {
    (part * U256::from(10_000u64) / total).to::<u64>() as f64 / 100.0
}

#[async_trait]
impl VotingStrategy for YieldBasisStrategy {
    fn name(&self) -> &'static str {
        "YieldBasis"
    }

    fn filter_votes<'a>(&self, votes: &'a [EncodedVote]) -> Vec<&'a EncodedVote> {
        votes
            .iter()
            .filter(|vote| matches!(vote, EncodedVote::YieldBasis { .. }))
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

        let module = YieldBasisVoterModule::new(YB_SAFE_MODULE, provider.clone());
        let call = module.votes(params).from(account);

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
        let plugin = YieldBasisVoterModule::new(YB_PLUGIN, provider);

        for vote in votes {
            let intent = vote.intent();
            let vote_id: U256 = intent.target_id.parse().context("yieldbasis vote id")?;
            let tally = plugin
                .getVotes(vote_id, YB_LOCKER)
                .call()
                .await
                .context("getVotes")?;

            // An all-zero tally means the locker's vote never registered.
            if (tally.abstain + tally.yes + tally.no).is_zero() {
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
                let total = intent.tally.total();
                if total.is_zero() {
                    return format!("✅ {}", intent.proposal_title);
                }
                format!(
                    "✅ {}\nResult : Yes {:.2}% - No {:.2}% - Abstain {:.2}%",
                    intent.proposal_title,
                    pct(intent.tally.yes, total),
                    pct(intent.tally.no, total),
                    pct(intent.tally.abstain, total)
                )
            })
            .join("\n");

        format!("{lines}\nTx : <a href=\"https://etherscan.io/tx/{tx_hash}\">etherscan.io</a>")
    }
}
