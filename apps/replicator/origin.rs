use crate::{
    proposals::{Proposal, ProposalFetcher},
    snapshot_api::SnapshotApiHandler,
    spaces::SpaceConfig,
};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Origin counterpart of a mirror proposal, or the reason none was found.
#[derive(Debug, Clone)]
pub enum Resolution {
    Offchain(Proposal),
    OnchainAngle(AngleOnchainProposal),
    Unresolved(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct AngleOnchainProposal {
    pub id: String,
    pub description: String,
    #[serde(rename = "snapshotBlock")]
    pub snapshot_block: String,
    #[serde(rename = "snapshotTimestamp")]
    pub snapshot_timestamp: String,
}

#[derive(Debug, Deserialize)]
struct AngleGraphQLResponse {
    data: Option<AngleProposals>,
}

#[derive(Debug, Deserialize)]
struct AngleProposals {
    proposals: Vec<AngleOnchainProposal>,
}

pub struct OriginResolver {
    fetcher: Arc<ProposalFetcher>,
    api: Arc<SnapshotApiHandler>,
    subgraph_url: String,
    ipfs_gateway_url: String,
    ipfs_client: reqwest_middleware::ClientWithMiddleware,
}

impl OriginResolver {
    pub fn new(
        fetcher: Arc<ProposalFetcher>,
        api: Arc<SnapshotApiHandler>,
        subgraph_url: String,
        ipfs_gateway_url: String,
    ) -> Self {
        let retry_policy =
            reqwest_retry::policies::ExponentialBackoff::builder().build_with_max_retries(3);
        let ipfs_client = reqwest_middleware::ClientBuilder::new(reqwest::Client::new())
            .with(reqwest_retry::RetryTransientMiddleware::new_with_policy(
                retry_policy,
            ))
            .build();

        Self {
            fetcher,
            api,
            subgraph_url,
            ipfs_gateway_url,
            ipfs_client,
        }
    }

    /// Resolve the origin counterpart of a mirror proposal. Off-chain spaces
    /// match by title; the Angle space falls back to its on-chain governor
    /// when the proposal index has no counterpart.
    pub async fn resolve(&self, proposal: &Proposal, config: &SpaceConfig) -> Resolution {
        let origin_space = match config.origin_space {
            Some(space) => space,
            None => return Resolution::Unresolved("space has no off-chain origin".to_string()),
        };

        let title = config.origin_title(&proposal.title);

        match self.fetcher.origin_by_title(origin_space, &title).await {
            Ok(Some(origin)) => {
                info!(
                    mirror = %proposal.id,
                    origin = %origin.id,
                    origin_space,
                    "Resolved origin proposal by title"
                );
                return Resolution::Offchain(origin);
            }
            Ok(None) => {}
            Err(e) => {
                return Resolution::Unresolved(format!("origin index query failed: {e:#}"));
            }
        }

        if config.protocol == crate::intent::Protocol::Angle {
            return match self.resolve_angle_onchain(proposal).await {
                Ok(Some(origin)) => Resolution::OnchainAngle(origin),
                Ok(None) => {
                    Resolution::Unresolved("no on-chain proposal at snapshot block".to_string())
                }
                Err(e) => Resolution::Unresolved(format!("on-chain resolution failed: {e:#}")),
            };
        }

        Resolution::Unresolved(format!("no origin proposal titled like {title:?}"))
    }

    /// Query the governance subgraph by exact snapshot-block equality. With a
    /// single candidate the match is accepted as-is; with several, each
    /// candidate's IPFS description is fetched and compared against the
    /// mirror title. A failed content fetch aborts resolution: guessing the
    /// wrong proposal would cast an irreversible on-chain vote.
    pub async fn resolve_angle_onchain(
        &self,
        proposal: &Proposal,
    ) -> Result<Option<AngleOnchainProposal>> {
        let query = format!(
            r#"
        {{
            proposals(
                where: {{ snapshotBlock: {} }},
                orderBy: "creationBlock",
                orderDirection: desc,
                first: 1000
            ) {{
                id
                description
                snapshotBlock
                snapshotTimestamp
            }}
        }}"#,
            proposal.snapshot
        );

        let response: AngleGraphQLResponse = self
            .api
            .fetch(&self.subgraph_url, query)
            .await
            .context("angle subgraph query")?;

        let mut candidates = response
            .data
            .map(|data| data.proposals)
            .unwrap_or_default();

        if candidates.is_empty() {
            return Ok(None);
        }

        if candidates.len() == 1 {
            return Ok(Some(candidates.remove(0)));
        }

        for candidate in candidates {
            let description = self
                .fetch_ipfs_description(&candidate.description)
                .await
                .context("candidate description fetch")?;

            if description.to_lowercase() == proposal.title.to_lowercase() {
                return Ok(Some(candidate));
            }
        }

        Ok(None)
    }

    async fn fetch_ipfs_description(&self, description: &str) -> Result<String> {
        let path = description.replace("ipfs://", "ipfs/");
        let url = format!("{}/{}", self.ipfs_gateway_url, path);

        let response = self.ipfs_client.get(&url).send().await?;
        if !response.status().is_success() {
            warn!(url = %url, status = %response.status(), "IPFS gateway refused description fetch");
            anyhow::bail!("IPFS fetch returned {}", response.status());
        }

        let body = response.text().await?;
        // Descriptions are stored with a one-character prefix ahead of the
        // title text.
        Ok(body.chars().skip(1).collect())
    }
}

#[cfg(test)]
mod origin_resolver_tests {
    use super::*;
    use crate::snapshot_api::{SnapshotApiConfig, SnapshotApiHandler};
    use crate::spaces::space_config;
    use serde_json::json;

    fn mirror_proposal(title: &str, snapshot: &str) -> Proposal {
        Proposal {
            id: "0xmirror".to_string(),
            title: title.to_string(),
            body: String::new(),
            choices: vec!["Against".into(), "For".into(), "Abstain".into()],
            start: 0,
            end: 100,
            snapshot: snapshot.to_string(),
            state: "closed".to_string(),
            created: 0,
            proposal_type: "single-choice".to_string(),
            scores: vec![10.0, 60.0, 30.0],
            quorum: 0.0,
            network: "1".to_string(),
            space: crate::proposals::SpaceRef {
                id: "sdangle.eth".to_string(),
                name: "Angle".to_string(),
                symbol: "sdANGLE".to_string(),
            },
        }
    }

    fn resolver_for(server: &mockito::Server) -> OriginResolver {
        let api = Arc::new(SnapshotApiHandler::new(SnapshotApiConfig::default()));
        let fetcher = Arc::new(ProposalFetcher::new(
            api.clone(),
            format!("{}/graphql", server.url()),
        ));
        OriginResolver::new(
            fetcher,
            api,
            format!("{}/subgraph", server.url()),
            format!("{}/gateway", server.url()),
        )
    }

    #[tokio::test]
    async fn single_subgraph_candidate_is_accepted() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/subgraph")
            .with_status(200)
            .with_body(
                json!({"data": {"proposals": [{
                    "id": "0x01",
                    "description": "ipfs://QmHash",
                    "snapshotBlock": "19000000",
                    "snapshotTimestamp": "1700000000"
                }]}})
                .to_string(),
            )
            .create_async()
            .await;

        let resolver = resolver_for(&server);
        let origin = resolver
            .resolve_angle_onchain(&mirror_proposal("Upgrade the savings rate", "19000000"))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(origin.id, "0x01");
        assert_eq!(origin.snapshot_timestamp, "1700000000");
    }

    #[tokio::test]
    async fn multiple_candidates_disambiguate_by_description() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/subgraph")
            .with_status(200)
            .with_body(
                json!({"data": {"proposals": [
                    {"id": "0x01", "description": "ipfs://QmOne", "snapshotBlock": "19000000", "snapshotTimestamp": "1700000000"},
                    {"id": "0x02", "description": "ipfs://QmTwo", "snapshotBlock": "19000000", "snapshotTimestamp": "1700000000"}
                ]}})
                .to_string(),
            )
            .create_async()
            .await;
        server
            .mock("GET", "/gateway/ipfs/QmOne")
            .with_status(200)
            .with_body("#Something else")
            .create_async()
            .await;
        server
            .mock("GET", "/gateway/ipfs/QmTwo")
            .with_status(200)
            .with_body("#Upgrade The Savings Rate")
            .create_async()
            .await;

        let resolver = resolver_for(&server);
        let origin = resolver
            .resolve_angle_onchain(&mirror_proposal("Upgrade the savings rate", "19000000"))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(origin.id, "0x02");
    }

    #[tokio::test]
    async fn failed_description_fetch_aborts_resolution() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/subgraph")
            .with_status(200)
            .with_body(
                json!({"data": {"proposals": [
                    {"id": "0x01", "description": "ipfs://QmOne", "snapshotBlock": "19000000", "snapshotTimestamp": "1700000000"},
                    {"id": "0x02", "description": "ipfs://QmTwo", "snapshotBlock": "19000000", "snapshotTimestamp": "1700000000"}
                ]}})
                .to_string(),
            )
            .create_async()
            .await;
        server
            .mock("GET", "/gateway/ipfs/QmOne")
            .with_status(404)
            .create_async()
            .await;

        let resolver = resolver_for(&server);
        let result = resolver
            .resolve_angle_onchain(&mirror_proposal("Upgrade the savings rate", "19000000"))
            .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn offchain_resolution_prefers_the_index_match() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/graphql")
            .with_status(200)
            .with_body(
                json!({"data": {"proposals": [{
                    "id": "0xorigin",
                    "title": "BIP-123: do the thing",
                    "body": "",
                    "choices": ["Yes", "No"],
                    "start": 0,
                    "end": 100,
                    "snapshot": "19000000",
                    "state": "closed",
                    "created": 10,
                    "type": "single-choice",
                    "network": "1",
                    "space": {"id": "balancer.eth", "name": "Balancer", "symbol": "BAL"}
                }]}})
                .to_string(),
            )
            .create_async()
            .await;

        let resolver = resolver_for(&server);
        let config = space_config("sdbal.eth").unwrap();
        let mut mirror = mirror_proposal("BIP-123: do the thing", "19000000");
        mirror.space.id = "sdbal.eth".to_string();

        match resolver.resolve(&mirror, config).await {
            Resolution::Offchain(origin) => assert_eq!(origin.id, "0xorigin"),
            other => panic!("expected Offchain, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn generic_space_with_no_match_is_unresolved() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/graphql")
            .with_status(200)
            .with_body(json!({"data": {"proposals": []}}).to_string())
            .create_async()
            .await;

        let resolver = resolver_for(&server);
        let config = space_config("sdbal.eth").unwrap();
        let mirror = mirror_proposal("BIP-999", "19000000");

        match resolver.resolve(&mirror, config).await {
            Resolution::Unresolved(reason) => assert!(reason.contains("BIP-999")),
            other => panic!("expected Unresolved, got {:?}", other),
        }
    }
}
