use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Debit address marking a block-reward transaction.
pub const SYSTEM_ADDRESS: &str = "system";

/// Fixed amount credited to the miner of each block.
pub const BLOCK_REWARD: f64 = 12.5;

/// A value transfer between two accounts.
///
/// The serde form of this struct (field order as declared, camelCase names)
/// is the canonical serialization fed to the hashing engine, so reordering
/// fields changes every block hash.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// Unique identifier for the transaction
    #[serde(rename = "txnID")]
    pub txn_id: String,

    /// Address the amount and gas are debited from
    pub debit_address: String,

    /// Address the amount is credited to
    pub credit_address: String,

    /// Amount being transferred, always positive
    pub amount: f64,

    /// Fee paid to whichever node mines the block containing this transaction
    pub gas: f64,

    /// The debit account's expected sequence number at submission time
    pub nonce: u64,
}

impl Transaction {
    /// Creates a new end-user transaction with a generated id.
    pub fn new(debit_address: &str, credit_address: &str, amount: f64, gas: f64, nonce: u64) -> Self {
        Transaction {
            txn_id: Uuid::new_v4().simple().to_string(),
            debit_address: debit_address.to_string(),
            credit_address: credit_address.to_string(),
            amount,
            gas,
            nonce,
        }
    }

    /// Creates the block-reward transaction crediting the miner.
    ///
    /// Rewards are debited from the system address, carry no gas, and their
    /// nonce is not meaningful (rewards never debit a real account).
    pub fn block_reward(miner_address: &str) -> Self {
        Transaction {
            txn_id: Uuid::new_v4().simple().to_string(),
            debit_address: SYSTEM_ADDRESS.to_string(),
            credit_address: miner_address.to_string(),
            amount: BLOCK_REWARD,
            gas: 0.0,
            nonce: 0,
        }
    }

    /// True iff this is a block-reward transaction.
    pub fn is_reward(&self) -> bool {
        self.debit_address == SYSTEM_ADDRESS
    }
}
