use anyhow::{anyhow, Result};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::{
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};
use tokio::{
    sync::{mpsc, oneshot, Mutex, Semaphore},
    time::sleep,
};
use tracing::{debug, error, warn};

use crate::{SNAPSHOT_MAX_CONCURRENT_REQUESTS, SNAPSHOT_MAX_QUEUE, SNAPSHOT_MAX_RETRIES};

const USER_AGENT: &str = "metagov-replicator/0.2 reqwest/0.12";
/// Stop issuing requests once the hub says fewer than this many remain.
const RATE_LIMIT_FLOOR: u32 = 30;

#[derive(Clone)]
pub struct SnapshotApiConfig {
    pub max_retries: usize,
    pub concurrency: usize,
    pub queue_size: usize,
}

impl Default for SnapshotApiConfig {
    fn default() -> Self {
        Self {
            max_retries: SNAPSHOT_MAX_RETRIES,
            concurrency: SNAPSHOT_MAX_CONCURRENT_REQUESTS,
            queue_size: SNAPSHOT_MAX_QUEUE,
        }
    }
}

struct GraphqlJob {
    url: String,
    query: String,
    reply: oneshot::Sender<Result<String>>,
}

/// Tracks the hub's `ratelimit-*` response headers so queued requests back
/// off before tripping a 429.
struct RateGate {
    remaining: AtomicU32,
    reset_at: Mutex<Instant>,
}

impl RateGate {
    fn new() -> Self {
        Self {
            remaining: AtomicU32::new(u32::MAX),
            reset_at: Mutex::new(Instant::now()),
        }
    }

    fn record(&self, response: &reqwest::Response) {
        if let Some(remaining) = header_u64(response, "ratelimit-remaining") {
            self.remaining.store(remaining as u32, Ordering::SeqCst);
        }
        if let Some(reset) = header_u64(response, "ratelimit-reset") {
            if let Ok(mut reset_at) = self.reset_at.try_lock() {
                *reset_at = Instant::now() + Duration::from_secs(reset);
            }
        }
    }

    async fn wait_if_depleted(&self) {
        if self.remaining.load(Ordering::SeqCst) > RATE_LIMIT_FLOOR {
            return;
        }

        let reset_at = *self.reset_at.lock().await;
        let wait = reset_at.saturating_duration_since(Instant::now());
        if !wait.is_zero() {
            debug!(?wait, "Rate limit nearly exhausted, waiting for the reset window");
            sleep(wait + Duration::from_millis(100)).await;
        }
    }
}

/// Queued GraphQL client for the proposal index: requests funnel through a
/// bounded queue and a concurrency semaphore so a burst of spaces never
/// hammers the hub.
#[derive(Clone)]
pub struct SnapshotApiHandler {
    sender: mpsc::Sender<GraphqlJob>,
}

impl SnapshotApiHandler {
    pub fn new(config: SnapshotApiConfig) -> Self {
        let (sender, receiver) = mpsc::channel(config.queue_size);

        tokio::spawn(run_queue(config, receiver));

        Self { sender }
    }

    pub async fn fetch<T>(&self, url: &str, query: String) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(GraphqlJob {
                url: url.to_string(),
                query,
                reply,
            })
            .await
            .map_err(|_| anyhow!("GraphQL queue is gone"))?;

        let body = response.await??;
        serde_json::from_str(&body).map_err(|e| anyhow!("Failed to parse response: {e}"))
    }
}

async fn run_queue(config: SnapshotApiConfig, mut receiver: mpsc::Receiver<GraphqlJob>) {
    let client = Client::new();
    let semaphore = Arc::new(Semaphore::new(config.concurrency));
    let gate = Arc::new(RateGate::new());

    while let Some(job) = receiver.recv().await {
        let permit = semaphore.clone().acquire_owned().await.unwrap();
        let client = client.clone();
        let gate = gate.clone();
        let max_retries = config.max_retries;

        tokio::spawn(async move {
            let result = request_with_retries(&client, &gate, &job.url, &job.query, max_retries).await;
            if job.reply.send(result).is_err() {
                error!("GraphQL caller went away before the response arrived");
            }
            drop(permit);
        });
    }
}

async fn request_with_retries(
    client: &Client,
    gate: &RateGate,
    url: &str,
    query: &str,
    max_retries: usize,
) -> Result<String> {
    let mut backoff = Duration::from_secs(1);

    for attempt in 0..=max_retries {
        gate.wait_if_depleted().await;

        let sent = client
            .post(url)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .json(&serde_json::json!({ "query": query }))
            .send()
            .await;

        match sent {
            Ok(response) => {
                gate.record(&response);

                if response.status().is_success() {
                    return Ok(response.text().await?);
                }

                if response.status() == StatusCode::TOO_MANY_REQUESTS {
                    let retry_after = header_u64(&response, "retry-after")
                        .map(Duration::from_secs)
                        .unwrap_or(backoff);
                    warn!(attempt, ?retry_after, "Rate limited by the proposal index");
                    sleep(retry_after).await;
                    backoff = retry_after;
                    continue;
                }

                return Err(anyhow!("HTTP error: {}", response.status()));
            }
            Err(e) => {
                if attempt == max_retries {
                    return Err(anyhow!("Request failed after {} attempts: {e}", attempt + 1));
                }
                warn!(attempt, error = %e, ?backoff, "GraphQL request failed, retrying");
                sleep(backoff).await;
                backoff *= 2;
            }
        }
    }

    Err(anyhow!("Max retries reached"))
}

fn header_u64(response: &reqwest::Response, name: &str) -> Option<u64> {
    response
        .headers()
        .get(name)?
        .to_str()
        .ok()?
        .parse()
        .ok()
}
