use crate::intent::EncodedVote;
use alloy::{primitives::B256, signers::local::PrivateKeySigner};
use anyhow::{Context, Result};
use async_trait::async_trait;
use itertools::Itertools;
use tracing::{error, info, warn};
use utils::errors::OperationError;

pub mod angle;
pub mod curve;
pub mod snapshot;
pub mod yieldbasis;

pub const MIN_GAS_LIMIT: u64 = 2_000_000;
/// Gas and fee safety margin, in percent.
pub const GAS_BUMP_PCT: u64 = 150;

/// Result of one strategy's execute step.
#[derive(Debug)]
pub enum BatchExecution {
    /// The dry run failed; nothing was submitted and no funds were spent.
    SimulationFailed { reason: String },
    /// Submitted and mined, but the transaction reverted.
    Reverted { tx_hash: B256 },
    /// Submitted and mined successfully; verification still pending.
    Mined { tx_hash: B256 },
    /// Off-chain submission; per-vote failures carry the affected space.
    Offchain {
        submitted: usize,
        failures: Vec<(&'static str, OperationError)>,
    },
}

/// Terminal state of a batch after execution and verification.
#[derive(Debug)]
pub enum BatchOutcome {
    Verified {
        tx_hash: B256,
    },
    /// The transaction succeeded but at least one included vote did not
    /// register on-chain.
    VerificationFailed {
        tx_hash: B256,
    },
    Reverted {
        tx_hash: B256,
    },
    SimulationFailed {
        reason: String,
    },
    Offchain {
        submitted: usize,
        failures: Vec<(&'static str, OperationError)>,
    },
    Failed {
        error: String,
    },
}

#[derive(Debug)]
pub struct BatchReport {
    pub strategy: &'static str,
    pub outcome: BatchOutcome,
    pub message: String,
    pub spaces: Vec<&'static str>,
}

impl BatchReport {
    /// Spaces whose watermark must not advance because their votes did not
    /// demonstrably land.
    pub fn failed_spaces(&self) -> Vec<&'static str> {
        match &self.outcome {
            BatchOutcome::Verified { .. } => vec![],
            BatchOutcome::Offchain { failures, .. } => {
                failures.iter().map(|(space, _)| *space).unique().collect()
            }
            _ => self.spaces.clone(),
        }
    }
}

/// Per-protocol execution: filter the global vote list, push one batched
/// relay call (or the off-chain equivalent), and confirm every included vote
/// actually registered.
#[async_trait]
pub trait VotingStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn filter_votes<'a>(&self, votes: &'a [EncodedVote]) -> Vec<&'a EncodedVote>;

    async fn execute(&self, votes: &[&EncodedVote]) -> Result<BatchExecution>;

    /// Re-read external vote state for every included vote. A transaction
    /// can succeed while an individual sub-vote silently no-ops.
    async fn verify(&self, votes: &[&EncodedVote]) -> Result<bool>;

    fn format_success_message(&self, votes: &[&EncodedVote], tx_hash: &str) -> String;
}

pub async fn run_batches(
    strategies: &[Box<dyn VotingStrategy>],
    votes: &[EncodedVote],
) -> Vec<BatchReport> {
    let mut reports = Vec::new();

    for strategy in strategies {
        let batch = strategy.filter_votes(votes);
        if batch.is_empty() {
            continue;
        }

        let spaces: Vec<&'static str> = batch
            .iter()
            .map(|vote| vote.intent().space)
            .unique()
            .collect();

        info!(
            strategy = strategy.name(),
            votes = batch.len(),
            "Batch pending"
        );

        let outcome = match strategy.execute(&batch).await {
            Err(e) => {
                error!(strategy = strategy.name(), error = %format!("{e:#}"), "Batch execution failed");
                BatchOutcome::Failed {
                    error: format!("{e:#}"),
                }
            }
            Ok(BatchExecution::SimulationFailed { reason }) => {
                warn!(strategy = strategy.name(), reason = %reason, "Batch simulation failed");
                BatchOutcome::SimulationFailed { reason }
            }
            Ok(BatchExecution::Reverted { tx_hash }) => {
                error!(strategy = strategy.name(), tx = %tx_hash, "Batch transaction reverted");
                BatchOutcome::Reverted { tx_hash }
            }
            Ok(BatchExecution::Offchain {
                submitted,
                failures,
            }) => BatchOutcome::Offchain {
                submitted,
                failures,
            },
            Ok(BatchExecution::Mined { tx_hash }) => {
                info!(strategy = strategy.name(), tx = %tx_hash, "Batch mined, verifying votes");
                match strategy.verify(&batch).await {
                    Ok(true) => BatchOutcome::Verified { tx_hash },
                    Ok(false) => BatchOutcome::VerificationFailed { tx_hash },
                    Err(e) => {
                        warn!(strategy = strategy.name(), error = %format!("{e:#}"), "Vote verification errored");
                        BatchOutcome::VerificationFailed { tx_hash }
                    }
                }
            }
        };

        let message = outcome_message(strategy.as_ref(), &batch, &outcome);

        reports.push(BatchReport {
            strategy: strategy.name(),
            outcome,
            message,
            spaces,
        });
    }

    reports
}

fn outcome_message(
    strategy: &dyn VotingStrategy,
    batch: &[&EncodedVote],
    outcome: &BatchOutcome,
) -> String {
    let titles = || {
        batch
            .iter()
            .map(|vote| vote.intent().proposal_title.as_str())
            .join(", ")
    };

    match outcome {
        BatchOutcome::Verified { tx_hash } => {
            strategy.format_success_message(batch, &format!("{tx_hash:#x}"))
        }
        BatchOutcome::VerificationFailed { tx_hash } => format!(
            "❌ {} votes sent but at least one did not register on-chain\nTx : <a href=\"https://etherscan.io/tx/{tx_hash:#x}\">etherscan.io</a>",
            strategy.name()
        ),
        BatchOutcome::Reverted { tx_hash } => format!(
            "❌ {} votes ({}) sent but the tx reverted\nTx : <a href=\"https://etherscan.io/tx/{tx_hash:#x}\">etherscan.io</a>",
            strategy.name(),
            titles()
        ),
        BatchOutcome::SimulationFailed { reason } => format!(
            "❌ {} votes ({}) aborted before submission: {reason}",
            strategy.name(),
            titles()
        ),
        BatchOutcome::Failed { error } => {
            format!("❌ {} votes ({}) failed: {error}", strategy.name(), titles())
        }
        BatchOutcome::Offchain {
            submitted,
            failures,
        } => {
            if failures.is_empty() {
                format!("✅ Vote replication done ({submitted} replicas)")
            } else {
                let detail = failures
                    .iter()
                    .map(|(space, err)| format!("{space}: {err}"))
                    .join("\n");
                format!(
                    "❌ Vote replication failed for {} of {} replicas\n{detail}",
                    failures.len(),
                    submitted + failures.len()
                )
            }
        }
    }
}

pub(crate) fn signer_from_env(env_var: &str) -> Result<PrivateKeySigner> {
    let pk = std::env::var(env_var).with_context(|| format!("{env_var} not set!"))?;
    pk.parse::<PrivateKeySigner>()
        .with_context(|| format!("{env_var} is not a valid private key"))
}
