use crate::{
    execution::{signer_from_env, BatchExecution, VotingStrategy},
    hub::HubClient,
    intent::EncodedVote,
    proposals::ProposalFetcher,
};
use anyhow::Result;
use async_trait::async_trait;
use itertools::Itertools;
use std::sync::Arc;
use tracing::{info, warn};
use utils::{errors::OperationError, retry::RetryPolicy};

/// Snapshot-to-snapshot replication. Each vote is submitted independently
/// per authorized signer; one signer failing does not block the others, but
/// a vote with no successful signer at all is escalated.
pub struct GenericSnapshotStrategy {
    hub: Arc<HubClient>,
    fetcher: Arc<ProposalFetcher>,
    retry: RetryPolicy,
}

impl GenericSnapshotStrategy {
    pub fn new(hub: Arc<HubClient>, fetcher: Arc<ProposalFetcher>) -> Self {
        Self::with_retry(hub, fetcher, RetryPolicy::offchain_vote())
    }

    pub fn with_retry(
        hub: Arc<HubClient>,
        fetcher: Arc<ProposalFetcher>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            hub,
            fetcher,
            retry,
        }
    }
}

#[async_trait]
impl VotingStrategy for GenericSnapshotStrategy {
    fn name(&self) -> &'static str {
        "GenericSnapshot"
    }

    fn filter_votes<'a>(&self, votes: &'a [EncodedVote]) -> Vec<&'a EncodedVote> {
        votes
            .iter()
            .filter(|vote| matches!(vote, EncodedVote::Offchain { .. }))
            .collect()
    }

    async fn execute(&self, votes: &[&EncodedVote]) -> Result<BatchExecution> {
        let mut submitted = 0usize;
        let mut failures: Vec<(&'static str, OperationError)> = Vec::new();

        for vote in votes {
            let (intent, target, choice, signer_envs, reason) = match vote {
                EncodedVote::Offchain {
                    intent,
                    target,
                    choice,
                    signer_envs,
                    reason,
                } => (intent, target, choice, signer_envs, reason),
                _ => continue,
            };

            let mut errors: Vec<String> = Vec::new();
            let mut successes = 0usize;

            for env_var in signer_envs.iter() {
                let signer = match signer_from_env(env_var) {
                    Ok(signer) => signer,
                    Err(e) => {
                        errors.push(format!("{env_var}: {e:#}"));
                        continue;
                    }
                };

                let result = self
                    .retry
                    .run(|| self.hub.submit_vote(&signer, target, choice, reason))
                    .await;

                match result {
                    Ok(()) => successes += 1,
                    Err(e) => {
                        warn!(
                            signer = %signer.address(),
                            proposal = %target.proposal,
                            error = %format!("{e:#}"),
                            "Replica vote submission exhausted its retries"
                        );
                        errors.push(format!("{env_var}: {e:#}"));
                    }
                }
            }

            if successes == 0 {
                failures.push((
                    intent.space,
                    OperationError::new("replicate_vote", errors.join("; ")),
                ));
            } else {
                if !errors.is_empty() {
                    warn!(
                        proposal = %target.proposal,
                        failed_signers = errors.len(),
                        "Replica landed from a subset of signers"
                    );
                }
                submitted += 1;
                info!(
                    space = intent.space,
                    proposal = %target.proposal,
                    "Replica vote dispatched"
                );
            }
        }

        Ok(BatchExecution::Offchain {
            submitted,
            failures,
        })
    }

    async fn verify(&self, votes: &[&EncodedVote]) -> Result<bool> {
        for vote in votes {
            let (target, signer_envs) = match vote {
                EncodedVote::Offchain {
                    target,
                    signer_envs,
                    ..
                } => (target, signer_envs),
                _ => continue,
            };

            let mut recorded = false;
            for env_var in signer_envs.iter() {
                let Ok(signer) = signer_from_env(env_var) else {
                    continue;
                };
                if self
                    .fetcher
                    .has_vote(&target.proposal, &signer.address().to_string())
                    .await?
                {
                    recorded = true;
                    break;
                }
            }

            if !recorded {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn format_success_message(&self, votes: &[&EncodedVote], _tx_hash: &str) -> String {
        votes
            .iter()
            .map(|vote| {
                let intent = vote.intent();
                format!(
                    "✅ {}\nVote : ({})",
                    intent.proposal_title,
                    intent.breakdown.join(",")
                )
            })
            .join("\n")
    }
}
