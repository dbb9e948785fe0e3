use anyhow::Result;
use once_cell::sync::OnceCell;
use serde::Deserialize;
use std::{env, fs};
use tracing::warn;

pub static CONFIG: OnceCell<ReplicatorConfig> = OnceCell::new();

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ReplicatorConfig {
    pub endpoints: EndpointsConfig,
    pub storage: StorageConfig,
    pub telegram: TelegramConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EndpointsConfig {
    pub hub_graphql_url: String,
    pub hub_sequencer_url: String,
    pub angle_subgraph_url: String,
    pub ipfs_gateway_url: String,
    pub yieldbasis_graphql_url: String,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            hub_graphql_url: "https://hub.snapshot.org/graphql".to_string(),
            hub_sequencer_url: "https://seq.snapshot.org".to_string(),
            angle_subgraph_url: "https://api.goldsky.com/api/public/project_cltpyx1eh5g5v01xi0a5h5xea/subgraphs/governance-eth/prod/gn".to_string(),
            ipfs_gateway_url: "https://angle-blog.infura-ipfs.io".to_string(),
            yieldbasis_graphql_url: "https://data.yieldbasis.com/api/v1/graphql".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: "./data".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    pub governance_chat_id: String,
    pub error_chat_id: String,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            governance_chat_id: "-1002204618754".to_string(),
            error_chat_id: "-1002354704686".to_string(),
        }
    }
}

pub fn load() -> Result<()> {
    let config = load_config();
    CONFIG
        .set(config)
        .map_err(|_| anyhow::anyhow!("Replicator config already initialized"))?;
    Ok(())
}

pub fn get_config() -> &'static ReplicatorConfig {
    CONFIG.get().expect("Replicator config not initialized")
}

fn load_config() -> ReplicatorConfig {
    let path = env::var("REPLICATOR_CONFIG_PATH").unwrap_or_else(|_| "replicator.yaml".to_string());
    match fs::read_to_string(&path) {
        Ok(contents) => match serde_yaml::from_str::<ReplicatorConfig>(&contents) {
            Ok(config) => config,
            Err(err) => {
                warn!(error = %err, path = %path, "Failed to parse replicator config, using defaults");
                ReplicatorConfig::default()
            }
        },
        Err(_) => ReplicatorConfig::default(),
    }
}
