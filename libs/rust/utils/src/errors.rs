use thiserror::Error;

/// Error shape consumed by the notification path: every failure that ends up
/// in front of a human carries the name of the operation that failed plus a
/// readable message.
#[derive(Debug, Clone, Error)]
#[error("{operation}: {message}")]
pub struct OperationError {
    pub operation: &'static str,
    pub message: String,
}

impl OperationError {
    pub fn new(operation: &'static str, message: impl Into<String>) -> Self {
        Self {
            operation,
            message: message.into(),
        }
    }
}

//env
pub const ETHEREUM_NODE_URL_NOT_SET: &str = "ETHEREUM_NODE_URL not set!";
pub const TG_API_KEY_NOT_SET: &str = "TG_API_KEY not set!";
pub const SAFE_PROPOSER_PK_NOT_SET: &str = "SAFE_PROPOSER_PK not set!";
pub const REPLICATION_PK_NOT_SET: &str = "REPLICATION_PK not set!";

//replicator
pub const PROPOSAL_FETCH_FAILED: &str = "Failed to fetch proposals";
pub const ORIGIN_UNRESOLVED: &str = "Failed to resolve origin proposal";
pub const WATERMARK_LOAD_FAILED: &str = "Failed to load watermark state";
pub const WATERMARK_SAVE_FAILED: &str = "Failed to save watermark state";
