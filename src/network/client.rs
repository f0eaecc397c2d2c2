use futures::future::join_all;
use log::{info, warn};
use serde_json::json;
use thiserror::Error;

use std::time::Duration;

use crate::blockchain::{Block, NodeSnapshot, Transaction};

const PEER_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum PeerError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("peer {url} responded with status {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
}

/// Outcome of a best-effort fan-out to the peer set.
///
/// Unreachable peers are reported, never treated as a failure of the local
/// operation that triggered the broadcast.
#[derive(Debug, Clone, Default)]
pub struct BroadcastSummary {
    pub delivered: usize,
    pub failed: Vec<String>,
}

/// HTTP client for node-to-node calls.
///
/// Every call carries a timeout so one dead peer cannot stall a fan-out, and
/// callers are expected to release the ledger lock before invoking anything
/// here.
#[derive(Debug, Clone)]
pub struct PeerClient {
    http: reqwest::Client,
}

impl PeerClient {
    pub fn new() -> reqwest::Result<Self> {
        let http = reqwest::Client::builder().timeout(PEER_TIMEOUT).build()?;
        Ok(PeerClient { http })
    }

    async fn post_json(&self, url: String, body: serde_json::Value) -> Result<(), PeerError> {
        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|source| PeerError::Request {
                url: url.clone(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(PeerError::Status {
                url,
                status: response.status(),
            });
        }
        Ok(())
    }

    async fn fan_out(&self, requests: Vec<(String, serde_json::Value)>) -> BroadcastSummary {
        let results = join_all(
            requests
                .into_iter()
                .map(|(url, body)| self.post_json(url, body)),
        )
        .await;

        let mut summary = BroadcastSummary::default();
        for result in results {
            match result {
                Ok(()) => summary.delivered += 1,
                Err(err) => {
                    warn!("broadcast delivery failed: {}", err);
                    let url = match err {
                        PeerError::Request { url, .. } => url,
                        PeerError::Status { url, .. } => url,
                    };
                    summary.failed.push(url);
                }
            }
        }
        summary
    }

    /// Delivers a pooled transaction to every peer, concurrently.
    pub async fn broadcast_transaction(
        &self,
        peers: &[String],
        txn: &Transaction,
    ) -> BroadcastSummary {
        let requests = peers
            .iter()
            .map(|peer| {
                (
                    format!("{}/internal/receive-new-transaction", peer),
                    json!(txn),
                )
            })
            .collect();
        let summary = self.fan_out(requests).await;
        info!(
            "transaction {} broadcast to {} peers ({} unreachable)",
            txn.txn_id,
            summary.delivered,
            summary.failed.len()
        );
        summary
    }

    /// Delivers a freshly mined block to every peer, concurrently.
    pub async fn broadcast_block(&self, peers: &[String], block: &Block) -> BroadcastSummary {
        let requests = peers
            .iter()
            .map(|peer| {
                (
                    format!("{}/internal/receive-new-block", peer),
                    json!({ "newBlock": block }),
                )
            })
            .collect();
        let summary = self.fan_out(requests).await;
        info!(
            "block {} broadcast to {} peers ({} unreachable)",
            block.index,
            summary.delivered,
            summary.failed.len()
        );
        summary
    }

    /// Joins the network through a seed node: the seed registers this node's
    /// URL, announces it to the rest of the network and pushes the full
    /// roster back.
    pub async fn join_network(&self, seed: &str, node_url: &str) -> Result<(), PeerError> {
        self.post_json(
            format!("{}/register-and-broadcast-node", seed),
            json!({ "newNodeURL": node_url }),
        )
        .await
    }

    /// Asks one peer to register `node_url` (registration only, no re-broadcast).
    pub async fn register_node(&self, peer: &str, node_url: &str) -> Result<(), PeerError> {
        self.post_json(
            format!("{}/internal/register-node", peer),
            json!({ "newNodeURL": node_url }),
        )
        .await
    }

    /// Announces a joining node to every existing peer, concurrently.
    pub async fn announce_node(&self, peers: &[String], node_url: &str) -> BroadcastSummary {
        let requests = peers
            .iter()
            .map(|peer| {
                (
                    format!("{}/internal/register-node", peer),
                    json!({ "newNodeURL": node_url }),
                )
            })
            .collect();
        self.fan_out(requests).await
    }

    /// Sends the full network roster to one peer, typically the node that
    /// just joined.
    pub async fn register_bulk(&self, peer: &str, roster: &[String]) -> Result<(), PeerError> {
        self.post_json(
            format!("{}/internal/register-nodes-bulk", peer),
            json!({ "allNetworkNodes": roster }),
        )
        .await
    }

    async fn fetch_snapshot(&self, peer: String) -> (String, Result<NodeSnapshot, PeerError>) {
        let url = format!("{}/blockchain", peer);
        let result = async {
            let response = self
                .http
                .get(&url)
                .send()
                .await
                .map_err(|source| PeerError::Request {
                    url: url.clone(),
                    source,
                })?;
            if !response.status().is_success() {
                return Err(PeerError::Status {
                    url: url.clone(),
                    status: response.status(),
                });
            }
            response
                .json::<NodeSnapshot>()
                .await
                .map_err(|source| PeerError::Request {
                    url: url.clone(),
                    source,
                })
        }
        .await;
        (peer, result)
    }

    /// Fetches every peer's chain snapshot, concurrently. Unreachable peers
    /// come back as per-peer errors for the caller to skip.
    pub async fn fetch_snapshots(
        &self,
        peers: &[String],
    ) -> Vec<(String, Result<NodeSnapshot, PeerError>)> {
        join_all(peers.iter().map(|peer| self.fetch_snapshot(peer.clone()))).await
    }
}
