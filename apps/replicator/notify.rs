use crate::{config::TelegramConfig, proposals::Proposal};
use chrono::DateTime;
use serde_json::json;
use tracing::{error, info};
use utils::errors::OperationError;

/// Outbound human-readable reports. Sends are fire-and-forget: a dead
/// notification channel must never take the replication run down with it.
pub struct Notifier {
    api_base: String,
    token: Option<String>,
    governance_chat_id: String,
    error_chat_id: String,
    client: reqwest_middleware::ClientWithMiddleware,
}

impl Notifier {
    pub fn from_env(config: &TelegramConfig) -> Self {
        Self::new(
            "https://api.telegram.org".to_string(),
            std::env::var("TG_API_KEY").ok(),
            config.governance_chat_id.clone(),
            config.error_chat_id.clone(),
        )
    }

    pub fn new(
        api_base: String,
        token: Option<String>,
        governance_chat_id: String,
        error_chat_id: String,
    ) -> Self {
        let retry_policy =
            reqwest_retry::policies::ExponentialBackoff::builder().build_with_max_retries(2);
        let client = reqwest_middleware::ClientBuilder::new(reqwest::Client::new())
            .with(reqwest_retry::RetryTransientMiddleware::new_with_policy(
                retry_policy,
            ))
            .build();

        Self {
            api_base,
            token,
            governance_chat_id,
            error_chat_id,
            client,
        }
    }

    pub async fn governance(&self, text: &str) {
        self.send(&self.governance_chat_id, text).await;
    }

    pub async fn operation_error(&self, err: &OperationError) {
        let text = format!("Bot replicator\n{err}");
        self.send(&self.error_chat_id, &text).await;
    }

    pub async fn fatal(&self, message: &str) {
        let text = format!("Bot replicator\n{message}");
        self.send(&self.error_chat_id, &text).await;
    }

    async fn send(&self, chat_id: &str, text: &str) {
        let token = match &self.token {
            Some(token) => token.clone(),
            None => {
                info!(chat_id, text, "Telegram token not configured, logging instead");
                return;
            }
        };

        let url = format!("{}/bot{}/sendMessage", self.api_base, token);
        let payload = json!({
            "chat_id": chat_id,
            "text": text,
            "parse_mode": "html",
            "link_preview_options": { "is_disabled": true },
        });

        match self.client.post(&url).json(&payload).send().await {
            Ok(response) if response.status().is_success() => {
                info!(chat_id, "Notification sent");
            }
            Ok(response) => {
                error!(chat_id, status = %response.status(), "Failed to send notification");
            }
            Err(e) => {
                error!(chat_id, error = %e, "Failed to send notification");
            }
        }
    }
}

pub fn closed_header(token: &str, space: &str, proposal: &Proposal) -> String {
    format!(
        "🔒 {} : {}. <a href='https://snapshot.org/#/{}/proposal/{}'>mirror</a>\n",
        token,
        proposal.title.replace("<>", ""),
        space,
        proposal.id
    )
}

pub fn origin_link_line(origin_space: &str, origin_id: &str) -> String {
    format!(
        "Snapshot : <a href='https://snapshot.org/#/{origin_space}/proposal/{origin_id}'>{origin_space}</a>\n"
    )
}

pub fn breakdown_line(breakdown: &[String]) -> String {
    format!("Vote : ({})\n", breakdown.join(","))
}

pub fn deadline_line(deadline: i64) -> String {
    let formatted = DateTime::from_timestamp(deadline, 0)
        .map(|dt| dt.format("%b %e, %Y %H:%M UTC").to_string())
        .unwrap_or_else(|| deadline.to_string());
    format!("Deadline : {formatted}\n")
}
