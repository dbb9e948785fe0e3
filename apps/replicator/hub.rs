use crate::intent::{ChoiceSelection, OffchainTarget};
use alloy::{
    hex,
    primitives::B256,
    signers::{local::PrivateKeySigner, Signer},
    sol_types::{eip712_domain, Eip712Domain},
};
use anyhow::{Context, Result};
use chrono::Utc;
use serde_json::{json, Value};
use tracing::{info, warn};

const APP_NAME: &str = "replicator";

const DOMAIN: Eip712Domain = eip712_domain! {
    name: "snapshot",
    version: "0.1.4",
};

// The sequencer verifies the signature against the exact struct layout, so
// the numeric-choice and weighted-choice envelopes need separate Vote
// definitions with the same struct name.
mod single_choice {
    alloy::sol! {
        struct Vote {
            address from;
            string space;
            uint64 timestamp;
            bytes32 proposal;
            uint32 choice;
            string reason;
            string app;
            string metadata;
        }
    }
}

mod weighted_choice {
    alloy::sol! {
        struct Vote {
            address from;
            string space;
            uint64 timestamp;
            bytes32 proposal;
            string choice;
            string reason;
            string app;
            string metadata;
        }
    }
}

pub struct HubClient {
    sequencer_url: String,
    client: reqwest_middleware::ClientWithMiddleware,
}

impl HubClient {
    pub fn new(sequencer_url: String) -> Self {
        let retry_policy =
            reqwest_retry::policies::ExponentialBackoff::builder().build_with_max_retries(2);
        let client = reqwest_middleware::ClientBuilder::new(reqwest::Client::new())
            .with(reqwest_retry::RetryTransientMiddleware::new_with_policy(
                retry_policy,
            ))
            .build();

        Self {
            sequencer_url,
            client,
        }
    }

    /// Sign and submit one replica vote to the hub's write endpoint.
    pub async fn submit_vote(
        &self,
        signer: &PrivateKeySigner,
        target: &OffchainTarget,
        choice: &ChoiceSelection,
        reason: &str,
    ) -> Result<()> {
        let from = signer.address();
        let timestamp = Utc::now().timestamp() as u64;
        let proposal: B256 = target
            .proposal
            .parse()
            .context("proposal id is not a 32-byte hash")?;

        let (signature, choice_value, choice_type) = match choice {
            ChoiceSelection::Single(index) => {
                let vote = single_choice::Vote {
                    from,
                    space: target.space.clone(),
                    timestamp,
                    proposal,
                    choice: *index,
                    reason: reason.to_string(),
                    app: APP_NAME.to_string(),
                    metadata: "{}".to_string(),
                };
                let signature = signer.sign_typed_data(&vote, &DOMAIN).await?;
                (signature, json!(index), "uint32")
            }
            ChoiceSelection::Weighted(_) => {
                let choice_string = choice.to_choice_json().to_string();
                let vote = weighted_choice::Vote {
                    from,
                    space: target.space.clone(),
                    timestamp,
                    proposal,
                    choice: choice_string.clone(),
                    reason: reason.to_string(),
                    app: APP_NAME.to_string(),
                    metadata: "{}".to_string(),
                };
                let signature = signer.sign_typed_data(&vote, &DOMAIN).await?;
                (signature, json!(choice_string), "string")
            }
        };

        let envelope = json!({
            "address": from.to_string(),
            "sig": format!("0x{}", hex::encode(signature.as_bytes())),
            "data": {
                "domain": {
                    "name": "snapshot",
                    "version": "0.1.4",
                },
                "types": vote_types(choice_type),
                "message": {
                    "from": from.to_string(),
                    "space": target.space,
                    "timestamp": timestamp,
                    "proposal": target.proposal,
                    "choice": choice_value,
                    "reason": reason,
                    "app": APP_NAME,
                    "metadata": "{}",
                },
            },
        });

        let response = self
            .client
            .post(&self.sequencer_url)
            .json(&envelope)
            .send()
            .await
            .context("sequencer request")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, body = %body, "Sequencer rejected the vote");
            anyhow::bail!("sequencer returned {status}: {body}");
        }

        info!(
            voter = %from,
            space = %target.space,
            proposal = %target.proposal,
            "Replica vote submitted"
        );

        Ok(())
    }
}

fn vote_types(choice_type: &str) -> Value {
    json!({
        "Vote": [
            {"name": "from", "type": "address"},
            {"name": "space", "type": "string"},
            {"name": "timestamp", "type": "uint64"},
            {"name": "proposal", "type": "bytes32"},
            {"name": "choice", "type": choice_type},
            {"name": "reason", "type": "string"},
            {"name": "app", "type": "string"},
            {"name": "metadata", "type": "string"},
        ]
    })
}
