use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use anyhow::Result;
use lazy_static::lazy_static;

lazy_static! {
    pub static ref ETHEREUM_PROVIDER: DynProvider = create_provider("ETHEREUM_NODE_URL");
}

fn create_provider(env_var: &str) -> DynProvider {
    let rpc_url = std::env::var(env_var).unwrap_or_else(|_| panic!("{} not set!", env_var));
    ProviderBuilder::new()
        .connect_http(rpc_url.parse().unwrap())
        .erased()
}

pub fn get_provider(network: &str) -> Result<DynProvider> {
    match network.to_lowercase().as_str() {
        "ethereum" => Ok(ETHEREUM_PROVIDER.clone()),
        _ => Err(anyhow::anyhow!("Unsupported network: {}", network)),
    }
}
