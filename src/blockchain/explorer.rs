use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::block::Block;
use super::transaction::Transaction;

/// Committed-chain view of an address: net transferred balance and every
/// transaction referencing it.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddressSummary {
    /// Sum of credited amounts minus debited amounts across the chain
    pub address_balance: f64,

    /// All committed transactions debiting or crediting the address
    pub address_transactions: Vec<Transaction>,
}

/// Looks a block up by hash. Not-found is a plain None, never an error.
pub fn find_block(chain: &[Block], block_hash: &str) -> Option<Block> {
    chain.iter().find(|block| block.hash == block_hash).cloned()
}

/// Looks a committed transaction up by id, scanning every block.
///
/// Returns the containing block alongside the transaction.
pub fn find_transaction(chain: &[Block], txn_id: &str) -> Option<(Block, Transaction)> {
    for block in chain {
        if let Some(txn) = block.transactions.iter().find(|txn| txn.txn_id == txn_id) {
            return Some((block.clone(), txn.clone()));
        }
    }
    None
}

/// Summarizes all committed activity for an address.
pub fn address_summary(chain: &[Block], address: &str) -> AddressSummary {
    let mut summary = AddressSummary {
        address_balance: 0.0,
        address_transactions: Vec::new(),
    };

    for block in chain {
        for txn in &block.transactions {
            if txn.debit_address != address && txn.credit_address != address {
                continue;
            }
            if txn.credit_address == address {
                summary.address_balance += txn.amount;
            }
            if txn.debit_address == address {
                summary.address_balance -= txn.amount;
            }
            summary.address_transactions.push(txn.clone());
        }
    }

    summary
}
