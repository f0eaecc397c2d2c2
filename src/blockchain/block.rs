use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::transaction::Transaction;

/// Sentinel proof-of-work counter carried by the genesis block.
pub const GENESIS_NONCE: u64 = 100;

/// Sentinel previous-hash carried by the genesis block.
pub const GENESIS_PREV_HASH: &str = "NA";

/// Sentinel hash carried by the genesis block. Never satisfies the
/// proof-of-work target and is never re-validated against it.
pub const GENESIS_HASH: &str = "genesisHash";

/// A block in the chain.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    /// Position in the chain, 1-based
    pub index: u64,

    /// Timestamp when the block was assembled
    #[schema(value_type = String, example = "2024-01-01T12:00:00Z")]
    pub timestamp: DateTime<Utc>,

    /// Ordered transaction list, block reward conventionally last
    pub transactions: Vec<Transaction>,

    /// Proof-of-work counter found by the miner
    pub nonce: u64,

    /// Hash of this block's data, meets the proof-of-work target
    pub hash: String,

    /// Hash of the preceding block
    pub prev_block_hash: String,

    /// Address credited the gas fees and block reward
    pub miner: String,

    /// Commitment over the full account set after executing this block
    pub state_root: String,

    /// Commitment over this block's ordered transaction list
    pub merkle_root: String,
}

impl Block {
    /// Synthesizes the genesis block.
    ///
    /// The genesis block is never mined: its nonce, hashes and empty
    /// transaction list are fixed sentinel values, and only the state root
    /// (over the pre-funded genesis account) is computed.
    pub fn genesis(state_root: String) -> Self {
        Block {
            index: 1,
            timestamp: Utc::now(),
            transactions: Vec::new(),
            nonce: GENESIS_NONCE,
            hash: GENESIS_HASH.to_string(),
            prev_block_hash: GENESIS_PREV_HASH.to_string(),
            miner: String::new(),
            state_root,
            merkle_root: String::new(),
        }
    }

    /// True iff this block carries the exact genesis sentinel values.
    pub fn is_valid_genesis(&self) -> bool {
        self.nonce == GENESIS_NONCE
            && self.prev_block_hash == GENESIS_PREV_HASH
            && self.hash == GENESIS_HASH
            && self.transactions.is_empty()
    }
}
