use log::{debug, warn};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use std::collections::HashMap;

use super::account::Account;
use super::transaction::Transaction;
use super::validation::{validate_transaction, ValidationError, ValidationMode};

/// A transaction dropped during batch execution, with the reason recorded.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FailedTransaction {
    #[serde(rename = "txnID")]
    pub txn_id: String,
    pub failure_reason: String,
}

/// Outcome of executing a transaction batch against an account set.
#[derive(Debug, Clone, Default)]
pub struct ExecutionReport {
    /// Transactions applied successfully, in execution order
    pub processed: Vec<Transaction>,

    /// Transactions dropped, each with its failure reason
    pub failures: Vec<FailedTransaction>,
}

/// Creates a zero-balance placeholder for every address a batch references
/// that the account set does not hold yet.
///
/// Block simulation and commit both run against account sets that may predate
/// the accounts a block creates; without placeholders the existence check
/// would spuriously fail during re-validation.
pub fn ensure_referenced_accounts(
    accounts: &mut HashMap<String, Account>,
    transactions: &[Transaction],
) {
    for txn in transactions {
        if !txn.is_reward() {
            accounts
                .entry(txn.debit_address.clone())
                .or_insert_with(|| Account::with_address("", &txn.debit_address));
        }
        accounts
            .entry(txn.credit_address.clone())
            .or_insert_with(|| Account::with_address("", &txn.credit_address));
    }
}

/// Re-validates and executes a transaction batch against `accounts`,
/// mutating it in place.
///
/// Works identically on the live account map, a simulation clone, or a fresh
/// map being rebuilt during consensus; the caller chooses the target.
///
/// Each end-user transaction is validated in block re-execution mode (exact
/// current nonce of the account instance), then the debit account pays amount
/// plus gas and advances its nonce, the miner is credited the gas, and the
/// beneficiary is credited the amount (created if new). A failed transaction
/// is recorded and skipped without aborting the rest; a later transaction
/// from the same account will then cascade-fail its own sequencing check.
/// Gas already credited for earlier successes is not clawed back.
///
/// The block reward is executed last by convention (it is the last entry of
/// a well-formed batch) and only counts as processed when at least one
/// end-user transaction succeeded.
pub fn execute_transactions(
    accounts: &mut HashMap<String, Account>,
    transactions: &[Transaction],
    miner_address: &str,
) -> ExecutionReport {
    let mut report = ExecutionReport::default();

    for txn in transactions {
        if txn.is_reward() {
            if report.processed.is_empty() {
                debug!(
                    "skipping block reward {}: no end-user transaction succeeded",
                    txn.txn_id
                );
                continue;
            }
            accounts
                .entry(txn.credit_address.clone())
                .or_insert_with(|| Account::with_address("", &txn.credit_address))
                .credit(txn.amount);
            report.processed.push(txn.clone());
            continue;
        }

        if let Err(err) = validate_transaction(
            accounts,
            &[],
            &txn.debit_address,
            txn.amount,
            txn.gas,
            ValidationMode::BlockReExecution { nonce: txn.nonce },
        ) {
            let reason = match &err {
                ValidationError::NonceMismatch { .. } => {
                    format!("transaction sequencing failed: {}", err)
                }
                _ => format!("re-validation failed: {}", err),
            };
            warn!("dropping transaction {}: {}", txn.txn_id, reason);
            report.failures.push(FailedTransaction {
                txn_id: txn.txn_id.clone(),
                failure_reason: reason,
            });
            continue;
        }

        let total = txn.amount + txn.gas;
        let debited = match accounts.get_mut(&txn.debit_address) {
            Some(debit_account) => {
                if debit_account.debit(total) {
                    debit_account.increment_nonce();
                    true
                } else {
                    false
                }
            }
            // validation guarantees existence; guard anyway
            None => false,
        };
        if !debited {
            let reason = format!(
                "debit check failed: cannot debit {} from {}",
                total, txn.debit_address
            );
            warn!("dropping transaction {}: {}", txn.txn_id, reason);
            report.failures.push(FailedTransaction {
                txn_id: txn.txn_id.clone(),
                failure_reason: reason,
            });
            continue;
        }

        // gas is the miner's as soon as the paying transaction has executed
        accounts
            .entry(miner_address.to_string())
            .or_insert_with(|| Account::with_address("", miner_address))
            .credit(txn.gas);

        accounts
            .entry(txn.credit_address.clone())
            .or_insert_with(|| Account::with_address("", &txn.credit_address))
            .credit(txn.amount);

        report.processed.push(txn.clone());
    }

    report
}
