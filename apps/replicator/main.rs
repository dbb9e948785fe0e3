use anyhow::{Context, Result};
use chrono::Utc;
use dotenv::dotenv;
use std::{collections::HashSet, sync::Arc};
use tracing::{debug, error, info};
use utils::errors::{OperationError, PROPOSAL_FETCH_FAILED, WATERMARK_LOAD_FAILED, WATERMARK_SAVE_FAILED};
use utils::tracing::setup_tracing;

mod classifier;
mod config;
mod encoders;
mod execution;
mod hub;
mod intent;
mod notify;
mod origin;
mod proposals;
mod rpc_providers;
mod snapshot_api;
mod spaces;
mod voting_power;
mod watermark;

use classifier::{classify, Decision, VoteTotals};
use execution::{
    angle::AngleStrategy, curve::CurveStrategy, run_batches, snapshot::GenericSnapshotStrategy,
    yieldbasis::YieldBasisStrategy, VotingStrategy,
};
use hub::HubClient;
use intent::{EncodedVote, Protocol};
use notify::Notifier;
use origin::{OriginResolver, Resolution};
use proposals::{Proposal, ProposalFetcher};
use snapshot_api::{SnapshotApiConfig, SnapshotApiHandler};
use spaces::{SpaceConfig, SPACES};
use watermark::{prune, HandledEntry, HandledStore, WatermarkStore};

static SNAPSHOT_MAX_RETRIES: usize = 5;
static SNAPSHOT_MAX_CONCURRENT_REQUESTS: usize = 5;
static SNAPSHOT_MAX_QUEUE: usize = 100;

/// First run (or a lost watermark) only looks this far back.
static CLOSED_WINDOW_FALLBACK: i64 = 15 * 60;
/// Handled proposal ids are kept long enough to cover watermark overlap.
static HANDLED_MAX_AGE: i64 = 48 * 3600;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    setup_tracing();
    config::load()?;

    let notifier = Notifier::from_env(&config::get_config().telegram);

    match run(&notifier).await {
        Ok(()) => Ok(()),
        Err(e) => {
            error!(error = %format!("{e:#}"), "Replication run failed");
            notifier
                .fatal(&format!("Replication run failed: {e:#}"))
                .await;
            Err(e)
        }
    }
}

#[derive(Default)]
struct SpaceRun {
    votes: Vec<EncodedVote>,
    /// Proposals that reached a terminal state during processing.
    handled: Vec<HandledEntry>,
    /// Proposals whose encoded vote still has to survive dispatch; the
    /// handled entry is committed only for spaces whose batch landed.
    dispatched: Vec<(&'static str, HandledEntry)>,
}

async fn run(notifier: &Notifier) -> Result<()> {
    let settings = config::get_config();

    let api = Arc::new(SnapshotApiHandler::new(SnapshotApiConfig::default()));
    let fetcher = Arc::new(ProposalFetcher::new(
        api.clone(),
        settings.endpoints.hub_graphql_url.clone(),
    ));
    let resolver = OriginResolver::new(
        fetcher.clone(),
        api.clone(),
        settings.endpoints.angle_subgraph_url.clone(),
        settings.endpoints.ipfs_gateway_url.clone(),
    );
    let hub = Arc::new(HubClient::new(settings.endpoints.hub_sequencer_url.clone()));

    let watermark_store = WatermarkStore::new(&settings.storage.data_dir);
    let handled_store = HandledStore::new(&settings.storage.data_dir);

    let mut watermarks = watermark_store.load().context(WATERMARK_LOAD_FAILED)?;
    let mut handled = handled_store.load()?;
    let handled_ids: HashSet<String> = handled
        .iter()
        .map(|entry| entry.id.to_lowercase())
        .collect();

    let now = Utc::now().timestamp();

    let mut votes: Vec<EncodedVote> = Vec::new();
    let mut dispatched: Vec<(&'static str, HandledEntry)> = Vec::new();
    // Spaces whose window could not even be fetched keep their watermark.
    let mut fetch_failed: HashSet<&'static str> = HashSet::new();

    for space in SPACES {
        let since = watermarks
            .get(space.space)
            .copied()
            .unwrap_or(now - CLOSED_WINDOW_FALLBACK);

        match process_space(space, &fetcher, &resolver, &api, notifier, &handled_ids, since, now)
            .await
        {
            Ok(mut outcome) => {
                votes.append(&mut outcome.votes);
                handled.append(&mut outcome.handled);
                dispatched.append(&mut outcome.dispatched);
            }
            Err(e) => {
                let err =
                    OperationError::new("process_space", format!("{}: {e:#}", space.space));
                error!(space = space.space, error = %err, "Space processing failed");
                notifier.operation_error(&err).await;
                fetch_failed.insert(space.space);
            }
        }
    }

    let strategies: Vec<Box<dyn VotingStrategy>> = vec![
        Box::new(CurveStrategy),
        Box::new(AngleStrategy),
        Box::new(YieldBasisStrategy),
        Box::new(GenericSnapshotStrategy::new(hub, fetcher.clone())),
    ];

    let reports = run_batches(&strategies, &votes).await;

    let mut failed_spaces: HashSet<&'static str> = fetch_failed;
    for report in &reports {
        notifier.governance(&report.message).await;
        failed_spaces.extend(report.failed_spaces());
    }

    for (space, entry) in dispatched {
        if !failed_spaces.contains(space) {
            handled.push(entry);
        }
    }

    // Watermarks advance per space, and only once that space's votes have
    // demonstrably been dispatched; a crash before this point re-processes
    // the same window, which downstream submission tolerates.
    for space in SPACES {
        if !failed_spaces.contains(space.space) {
            watermarks.insert(space.space.to_string(), now);
        } else {
            info!(space = space.space, "Keeping watermark, dispatch incomplete");
        }
    }

    watermark_store
        .save(&watermarks)
        .context(WATERMARK_SAVE_FAILED)?;
    handled_store.save(&prune(handled, now, HANDLED_MAX_AGE))?;

    info!(
        votes = votes.len(),
        batches = reports.len(),
        "Replication run complete"
    );

    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn process_space(
    space: &'static SpaceConfig,
    fetcher: &Arc<ProposalFetcher>,
    resolver: &OriginResolver,
    api: &Arc<SnapshotApiHandler>,
    notifier: &Notifier,
    handled_ids: &HashSet<String>,
    since: i64,
    now: i64,
) -> Result<SpaceRun> {
    let proposals = fetcher
        .closed_in_window(space.space, since, now)
        .await
        .context(PROPOSAL_FETCH_FAILED)?;

    let mut run = SpaceRun::default();

    for proposal in proposals {
        if handled_ids.contains(&proposal.id.to_lowercase()) {
            continue;
        }

        if space.skips_gauge_votes() && proposal.title.contains("Gauge vote") {
            debug!(space = space.space, title = %proposal.title, "Skipping gauge vote");
            run.handled.push(HandledEntry {
                id: proposal.id.clone(),
                ts: now,
            });
            continue;
        }

        info!(space = space.space, proposal = %proposal.id, title = %proposal.title, "Processing closed proposal");

        let mut text = notify::closed_header(space.token, space.space, &proposal);
        let entry = HandledEntry {
            id: proposal.id.clone(),
            ts: now,
        };

        match classify(&proposal) {
            Decision::NoOp => {
                text += "✅ Nothing to replicate";
                notifier.governance(&text).await;
                run.handled.push(entry);
            }
            Decision::NoQuorum => {
                text += "❌ No replication: quorum not reached";
                notifier.governance(&text).await;
                run.handled.push(entry);
            }
            Decision::Replicate(totals) => {
                match encode_for_space(space, &proposal, &totals, resolver, api).await {
                    Ok(Some(vote)) => {
                        if let EncodedVote::Offchain { target, .. } = &vote {
                            text += &notify::origin_link_line(&target.space, &target.proposal);
                        }
                        text += &notify::breakdown_line(&vote.intent().breakdown);
                        text += &notify::deadline_line(vote.intent().deadline);
                        notifier.governance(&text).await;

                        run.dispatched.push((space.space, entry));
                        run.votes.push(vote);
                    }
                    Ok(None) => {
                        // Already settled on the origin side; nothing to do.
                        run.handled.push(entry);
                    }
                    Err(err) => {
                        text += &format!("❌ {err}");
                        notifier.governance(&text).await;
                        notifier.operation_error(&err).await;
                        run.handled.push(entry);
                    }
                }
            }
        }
    }

    Ok(run)
}

/// Route a replicable outcome to its protocol encoder, fetching whatever
/// external state that encoder needs. Failures are scoped to this proposal.
async fn encode_for_space(
    space: &'static SpaceConfig,
    proposal: &Proposal,
    totals: &VoteTotals,
    resolver: &OriginResolver,
    api: &Arc<SnapshotApiHandler>,
) -> Result<Option<EncodedVote>, OperationError> {
    let settings = config::get_config();

    match space.protocol {
        Protocol::Curve => encoders::curve::encode(proposal, totals, space).map(Some),

        Protocol::GenericSnapshot => match resolver.resolve(proposal, space).await {
            Resolution::Offchain(origin) => {
                encoders::snapshot::encode(proposal, totals, &origin, space).map(Some)
            }
            Resolution::OnchainAngle(_) => Err(OperationError::new(
                "resolve_origin",
                "unexpected on-chain resolution for a snapshot-only space",
            )),
            Resolution::Unresolved(reason) => {
                Err(OperationError::new("resolve_origin", reason))
            }
        },

        Protocol::Angle => match resolver.resolve(proposal, space).await {
            Resolution::Offchain(origin) => {
                encoders::snapshot::encode(proposal, totals, &origin, space).map(Some)
            }
            Resolution::OnchainAngle(origin) => {
                let snapshot_timestamp: u64 = origin.snapshot_timestamp.parse().map_err(|_| {
                    OperationError::new(
                        "angle_encode",
                        format!(
                            "origin snapshot timestamp {:?} is not numeric",
                            origin.snapshot_timestamp
                        ),
                    )
                })?;

                let provider = rpc_providers::get_provider("ethereum")
                    .map_err(|e| OperationError::new("angle_encode", format!("{e:#}")))?;
                let voting_power =
                    voting_power::angle_voting_power(&provider, snapshot_timestamp)
                        .await
                        .map_err(|e| {
                            OperationError::new(
                                "angle_encode",
                                format!("voting power read failed: {e:#}"),
                            )
                        })?;

                encoders::angle::encode(proposal, &origin, voting_power, space).map(Some)
            }
            Resolution::Unresolved(reason) => {
                Err(OperationError::new("resolve_origin", reason))
            }
        },

        Protocol::YieldBasis => {
            let yb_proposals =
                encoders::yieldbasis::fetch_yb_proposals(api, &settings.endpoints.yieldbasis_graphql_url)
                    .await
                    .map_err(|e| {
                        OperationError::new("yieldbasis_encode", format!("proposal fetch: {e:#}"))
                    })?;

            let origin = encoders::yieldbasis::resolve_by_title(&proposal.title, &yb_proposals)
                .ok_or_else(|| {
                    OperationError::new(
                        "yieldbasis_encode",
                        format!("no on-chain proposal matching {:?}", proposal.title),
                    )
                })?;

            if origin.is_executed() {
                info!(title = %proposal.title, "Origin proposal already executed, skipping");
                return Ok(None);
            }

            let proposal_index = origin.proposal_index.parse().map_err(|_| {
                OperationError::new(
                    "yieldbasis_encode",
                    format!("proposal index {:?} is not numeric", origin.proposal_index),
                )
            })?;

            let provider = rpc_providers::get_provider("ethereum")
                .map_err(|e| OperationError::new("yieldbasis_encode", format!("{e:#}")))?;
            let voting_power = voting_power::yieldbasis_voting_power(&provider, proposal_index)
                .await
                .map_err(|e| {
                    OperationError::new(
                        "yieldbasis_encode",
                        format!("voting power read failed: {e:#}"),
                    )
                })?;

            encoders::yieldbasis::encode(proposal, totals, origin, voting_power, space).map(Some)
        }
    }
}
