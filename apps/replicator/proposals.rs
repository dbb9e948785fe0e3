use crate::snapshot_api::SnapshotApiHandler;
use anyhow::Result;
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct GraphQLResponse {
    data: Option<GraphQLProposals>,
}

#[derive(Debug, Deserialize)]
struct GraphQLProposals {
    proposals: Vec<Proposal>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpaceRef {
    pub id: String,
    pub name: String,
    pub symbol: String,
}

/// Value snapshot of a proposal as returned by the hub; never mutated after
/// the fetch.
#[derive(Debug, Clone, Deserialize)]
pub struct Proposal {
    pub id: String,
    pub title: String,
    pub body: String,
    pub choices: Vec<String>,
    pub start: i64,
    pub end: i64,
    pub snapshot: String,
    pub state: String,
    pub created: i64,
    #[serde(rename = "type", default)]
    pub proposal_type: String,
    #[serde(default)]
    pub scores: Vec<f64>,
    #[serde(default)]
    pub quorum: f64,
    pub network: String,
    pub space: SpaceRef,
}

const PROPOSAL_FIELDS: &str = r#"
            id
            title
            body
            choices
            start
            end
            snapshot
            state
            created
            type
            scores
            quorum
            network
            space {
                id
                name
                symbol
            }"#;

pub struct ProposalFetcher {
    api: Arc<SnapshotApiHandler>,
    graphql_url: String,
}

impl ProposalFetcher {
    pub fn new(api: Arc<SnapshotApiHandler>, graphql_url: String) -> Self {
        Self { api, graphql_url }
    }

    /// Closed proposals whose voting ended inside the (since, until] window.
    pub async fn closed_in_window(
        &self,
        space: &str,
        since: i64,
        until: i64,
    ) -> Result<Vec<Proposal>> {
        let query = format!(
            r#"
        {{
          proposals(
            where: {{
              space_in: [{space:?}],
              end_gte: {since},
              end_lte: {until},
              state: "closed"
            }},
            orderBy: "created",
            orderDirection: desc,
            first: 1000
          ) {{{PROPOSAL_FIELDS}
          }}
        }}"#
        );

        let response: GraphQLResponse = self.api.fetch(&self.graphql_url, query).await?;
        let proposals = response.data.map(|data| data.proposals).unwrap_or_default();

        debug!(space, since, until, count = proposals.len(), "Fetched closed proposals");

        Ok(proposals)
    }

    /// Most recently created origin proposal whose title contains `title`.
    pub async fn origin_by_title(
        &self,
        origin_space: &str,
        title: &str,
    ) -> Result<Option<Proposal>> {
        let title = escape_graphql_string(title);
        let query = format!(
            r#"
        {{
          proposals(
            where: {{ space_in: [{origin_space:?}], title_contains: "{title}" }},
            orderBy: "created",
            orderDirection: desc,
            first: 1
          ) {{{PROPOSAL_FIELDS}
          }}
        }}"#
        );

        let response: GraphQLResponse = self.api.fetch(&self.graphql_url, query).await?;
        Ok(response
            .data
            .and_then(|data| data.proposals.into_iter().next()))
    }

    /// Whether the hub already records a vote by `voter` on `proposal`.
    pub async fn has_vote(&self, proposal: &str, voter: &str) -> Result<bool> {
        #[derive(Debug, Deserialize)]
        struct VotesResponse {
            data: Option<VotesInner>,
        }

        #[derive(Debug, Deserialize)]
        struct VotesInner {
            votes: Vec<VoteRef>,
        }

        #[derive(Debug, Deserialize)]
        struct VoteRef {
            #[allow(dead_code)]
            id: String,
        }

        let query = format!(
            r#"
        {{
          votes(
            where: {{ proposal: {proposal:?}, voter: {voter:?} }},
            first: 1
          ) {{
            id
          }}
        }}"#
        );

        let response: VotesResponse = self.api.fetch(&self.graphql_url, query).await?;
        Ok(response
            .data
            .map(|data| !data.votes.is_empty())
            .unwrap_or(false))
    }
}

fn escape_graphql_string(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
