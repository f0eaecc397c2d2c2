use log::debug;

use std::cmp::Ordering;

use super::transaction::Transaction;

/// Selects up to `max_block_size` pending transactions for the next block.
///
/// Accounts with a single pending transaction carry no sequencing risk, so
/// they are admitted first in descending gas order, where the miner earns the most
/// from them. Accounts with several pending transactions must be included in
/// strict ascending nonce order or a later block would reject them for
/// sequencing, so they only fill whatever capacity remains, account by
/// account in the order they first appear in the pool.
///
/// Selection is a preview: the pool is never mutated here, transactions are
/// only removed at block commit.
pub fn select_for_block(pending: &[Transaction], max_block_size: usize) -> Vec<Transaction> {
    debug!(
        "selecting up to {} of {} pending transactions",
        max_block_size,
        pending.len()
    );

    // group by debit address, preserving first-appearance order
    let mut groups: Vec<(String, Vec<Transaction>)> = Vec::new();
    for txn in pending {
        match groups.iter_mut().find(|(addr, _)| *addr == txn.debit_address) {
            Some((_, txns)) => txns.push(txn.clone()),
            None => groups.push((txn.debit_address.clone(), vec![txn.clone()])),
        }
    }

    let mut selected: Vec<Transaction> = groups
        .iter()
        .filter(|(_, txns)| txns.len() == 1)
        .map(|(_, txns)| txns[0].clone())
        .collect();
    selected.sort_by(|a, b| b.gas.partial_cmp(&a.gas).unwrap_or(Ordering::Equal));
    selected.truncate(max_block_size);

    if selected.len() < max_block_size {
        let mut remaining = max_block_size - selected.len();

        'accounts: for (_, txns) in groups.iter().filter(|(_, txns)| txns.len() > 1) {
            let mut ordered = txns.clone();
            ordered.sort_by_key(|txn| txn.nonce);

            for txn in ordered {
                if remaining == 0 {
                    break 'accounts;
                }
                selected.push(txn);
                remaining -= 1;
            }
        }
    }

    debug!("{} transactions selected for next block", selected.len());
    selected
}
