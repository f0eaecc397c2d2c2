use anyhow::{Context, Result};

use std::env;

/// Shared address of the pre-funded genesis account. Every node seeds the
/// same account so independently constructed ledgers agree on genesis state.
pub const DEFAULT_PREMINE_ADDRESS: &str = "aa76348bfc1a4b67a4f0d0af7d0c2843";

const DEFAULT_BLOCK_SIZE: usize = 10;

/// Node configuration, read from the environment at startup.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// TCP port the HTTP server binds
    pub port: u16,

    /// URL peers use to reach this node
    pub node_url: String,

    /// Maximum end-user transactions per block (the reward rides on top)
    pub block_size: usize,

    /// Address of the pre-funded genesis account
    pub premine_address: String,

    /// Existing node to register with on startup, if joining a network
    pub seed_node_url: Option<String>,
}

impl NodeConfig {
    /// Reads the configuration from the environment.
    ///
    /// `PORT` is required and must parse; everything else has a default.
    /// `NODE_URL` defaults to a loopback URL on the configured port.
    pub fn from_env() -> Result<Self> {
        let port: u16 = env::var("PORT")
            .context("PORT environment variable is required")?
            .parse()
            .context("PORT must be a valid TCP port number")?;

        let node_url =
            env::var("NODE_URL").unwrap_or_else(|_| format!("http://127.0.0.1:{}", port));

        let block_size = match env::var("BLOCK_SIZE") {
            Ok(raw) => raw
                .parse()
                .context("BLOCK_SIZE must be a positive integer")?,
            Err(_) => DEFAULT_BLOCK_SIZE,
        };

        let premine_address =
            env::var("GENESIS_PRE_MINE_ACC").unwrap_or_else(|_| DEFAULT_PREMINE_ADDRESS.to_string());

        let seed_node_url = env::var("SEED_NODE_URL").ok().filter(|url| !url.is_empty());

        Ok(NodeConfig {
            port,
            node_url,
            block_size,
            premine_address,
            seed_node_url,
        })
    }
}
