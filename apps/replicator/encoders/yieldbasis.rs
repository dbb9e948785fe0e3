use crate::{
    classifier::VoteTotals,
    intent::{fixed_point_amount, EncodedVote, Protocol, VoteIntent, VoteTally},
    proposals::Proposal,
    snapshot_api::SnapshotApiHandler,
    spaces::SpaceConfig,
};
use alloy::primitives::U256;
use anyhow::Result;
use serde::Deserialize;
use std::sync::Arc;
use utils::errors::OperationError;

#[derive(Debug, Clone, Deserialize)]
pub struct YbProposal {
    pub id: String,
    #[serde(rename = "incrementalId")]
    pub incremental_id: i64,
    pub title: String,
    #[serde(rename = "proposalIndex")]
    pub proposal_index: String,
    #[serde(rename = "snapshotTimestamp")]
    pub snapshot_timestamp: i64,
    #[serde(rename = "startDate")]
    pub start_date: i64,
    #[serde(rename = "endDate")]
    pub end_date: i64,
    pub settings: YbSettings,
    #[serde(default)]
    pub executed: Option<YbExecution>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct YbSettings {
    #[serde(rename = "votingMode")]
    pub voting_mode: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct YbExecution {
    #[serde(rename = "blockNumber")]
    pub block_number: i64,
}

impl YbProposal {
    pub fn is_executed(&self) -> bool {
        self.executed
            .as_ref()
            .map(|execution| execution.block_number > 0)
            .unwrap_or(false)
    }
}

#[derive(Debug, Deserialize)]
struct YbGraphQLResponse {
    data: Option<YbProposals>,
}

#[derive(Debug, Deserialize)]
struct YbProposals {
    proposals: Vec<YbProposal>,
}

/// Last 1000 YieldBasis governance proposals on mainnet.
pub async fn fetch_yb_proposals(
    api: &Arc<SnapshotApiHandler>,
    url: &str,
) -> Result<Vec<YbProposal>> {
    let query = r#"
        query {
            proposals: Proposal(limit: 1000, where: {chainId: {_eq: 1}}) {
                id
                incrementalId
                title
                proposalIndex
                snapshotTimestamp
                startDate
                endDate
                settings {
                    votingMode
                }
                executed {
                    blockNumber
                }
            }
        }"#;

    let response: YbGraphQLResponse = api.fetch(url, query.to_string()).await?;
    Ok(response.data.map(|data| data.proposals).unwrap_or_default())
}

/// Mirror titles are "#<incrementalId> - <title>".
pub fn incremental_id_from_title(title: &str) -> Option<i64> {
    let digits: String = title
        .trim()
        .strip_prefix('#')?
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

pub fn resolve_by_title<'a>(title: &str, proposals: &'a [YbProposal]) -> Option<&'a YbProposal> {
    let incremental_id = incremental_id_from_title(title)?;
    proposals
        .iter()
        .find(|proposal| proposal.incremental_id == incremental_id)
}

/// Split the decayed voting power proportionally to the Yes/No/Abstain score
/// buckets; the rounding remainder lands in abstain. A proposal nobody voted
/// on abstains with the full power.
pub fn encode(
    proposal: &Proposal,
    totals: &VoteTotals,
    origin: &YbProposal,
    voting_power: U256,
    config: &SpaceConfig,
) -> Result<EncodedVote, OperationError> {
    let to_fixed = |amount: f64| {
        fixed_point_amount(amount)
            .map_err(|e| OperationError::new("yieldbasis_encode", e.to_string()))
    };

    let yes_fp = to_fixed(totals.yes)?;
    let no_fp = to_fixed(totals.no)?;
    let abstain_fp = to_fixed(totals.abstain)?;
    let total_fp = yes_fp + no_fp + abstain_fp;

    let tally = if total_fp.is_zero() {
        VoteTally {
            yes: U256::ZERO,
            no: U256::ZERO,
            abstain: voting_power,
        }
    } else {
        let yes = voting_power * yes_fp / total_fp;
        let no = voting_power * no_fp / total_fp;
        VoteTally {
            yes,
            no,
            abstain: voting_power - yes - no,
        }
    };

    Ok(EncodedVote::YieldBasis {
        intent: VoteIntent {
            protocol: Protocol::YieldBasis,
            space: config.space,
            target_id: origin.proposal_index.clone(),
            tally,
            voting_power_base: voting_power,
            proposal_title: proposal.title.clone(),
            deadline: config.deadline_for(proposal.end),
            breakdown: totals.breakdown.clone(),
        },
        try_early_execution: false,
    })
}

#[cfg(test)]
mod yieldbasis_encoder_tests {
    use super::*;
    use crate::proposals::SpaceRef;
    use crate::spaces::space_config;

    fn yb_origin(incremental_id: i64) -> YbProposal {
        YbProposal {
            id: "yb-1".to_string(),
            incremental_id,
            title: "Raise the fee cap".to_string(),
            proposal_index: "31".to_string(),
            snapshot_timestamp: 1_700_000_000,
            start_date: 1_700_000_000,
            end_date: 1_700_600_000,
            settings: YbSettings { voting_mode: 0 },
            executed: None,
        }
    }

    fn mirror(scores: Vec<f64>) -> Proposal {
        Proposal {
            id: "0xyb".to_string(),
            title: "#31 - Raise the fee cap".to_string(),
            body: String::new(),
            choices: vec!["Yes".into(), "No".into(), "Abstain".into()],
            start: 0,
            end: 1_700_000_000,
            snapshot: "19000000".to_string(),
            state: "closed".to_string(),
            created: 0,
            proposal_type: "single-choice".to_string(),
            scores,
            quorum: 0.0,
            network: "1".to_string(),
            space: SpaceRef {
                id: "sdyb.eth".to_string(),
                name: "YieldBasis".to_string(),
                symbol: "sdYB".to_string(),
            },
        }
    }

    fn totals(yes: f64, no: f64, abstain: f64) -> VoteTotals {
        VoteTotals {
            yes,
            no,
            abstain,
            total: yes + no + abstain,
            breakdown: vec![],
        }
    }

    #[test]
    fn parses_incremental_id_from_mirror_title() {
        assert_eq!(incremental_id_from_title("#31 - Raise the fee cap"), Some(31));
        assert_eq!(incremental_id_from_title("Raise the fee cap"), None);
        assert_eq!(incremental_id_from_title("#x - nope"), None);
    }

    #[test]
    fn resolves_by_incremental_id() {
        let proposals = vec![yb_origin(30), yb_origin(31)];
        let origin = resolve_by_title("#31 - Raise the fee cap", &proposals).unwrap();
        assert_eq!(origin.incremental_id, 31);
        assert!(resolve_by_title("#99 - missing", &proposals).is_none());
    }

    #[test]
    fn executed_proposals_are_flagged() {
        let mut origin = yb_origin(31);
        assert!(!origin.is_executed());
        origin.executed = Some(YbExecution { block_number: 19_500_000 });
        assert!(origin.is_executed());
    }

    #[test]
    fn splits_power_with_remainder_into_abstain() {
        let config = space_config("sdyb.eth").unwrap();
        let vote = encode(
            &mirror(vec![50.0, 25.0, 25.0]),
            &totals(50.0, 25.0, 25.0),
            &yb_origin(31),
            U256::from(1001),
            config,
        )
        .unwrap();

        match vote {
            EncodedVote::YieldBasis {
                intent,
                try_early_execution,
            } => {
                assert!(!try_early_execution);
                assert_eq!(intent.target_id, "31");
                assert_eq!(intent.tally.yes, U256::from(500));
                assert_eq!(intent.tally.no, U256::from(250));
                // 1001 - 500 - 250: truncation remainder stays in abstain.
                assert_eq!(intent.tally.abstain, U256::from(251));
                assert_eq!(intent.tally.total(), U256::from(1001));
            }
            other => panic!("expected YieldBasis vote, got {:?}", other),
        }
    }

    #[test]
    fn zero_total_abstains_with_full_power() {
        let config = space_config("sdyb.eth").unwrap();
        let vote = encode(
            &mirror(vec![0.0, 0.0, 0.0]),
            &totals(0.0, 0.0, 0.0),
            &yb_origin(31),
            U256::from(777),
            config,
        )
        .unwrap();

        match vote {
            EncodedVote::YieldBasis { intent, .. } => {
                assert_eq!(intent.tally.yes, U256::ZERO);
                assert_eq!(intent.tally.no, U256::ZERO);
                assert_eq!(intent.tally.abstain, U256::from(777));
            }
            other => panic!("expected YieldBasis vote, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn fetches_proposals_from_the_data_api() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/graphql")
            .with_status(200)
            .with_body(
                serde_json::json!({"data": {"proposals": [{
                    "id": "yb-1",
                    "incrementalId": 31,
                    "title": "Raise the fee cap",
                    "proposalIndex": "31",
                    "snapshotTimestamp": 1_700_000_000i64,
                    "startDate": 1_700_000_000i64,
                    "endDate": 1_700_600_000i64,
                    "settings": {"votingMode": 0},
                    "executed": null
                }]}})
                .to_string(),
            )
            .create_async()
            .await;

        let api = Arc::new(crate::snapshot_api::SnapshotApiHandler::new(
            crate::snapshot_api::SnapshotApiConfig::default(),
        ));
        let proposals = fetch_yb_proposals(&api, &format!("{}/graphql", server.url()))
            .await
            .unwrap();

        assert_eq!(proposals.len(), 1);
        assert_eq!(proposals[0].incremental_id, 31);
        assert!(!proposals[0].is_executed());
    }
}
