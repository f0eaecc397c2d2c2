use thiserror::Error;

use std::collections::HashMap;

use super::account::Account;
use super::transaction::{Transaction, BLOCK_REWARD, SYSTEM_ADDRESS};

/// Admission failures. Returned as values and reported back to the caller;
/// validation never mutates ledger state.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("block reward amount {got} does not match the configured reward {expected}")]
    RewardMismatch { expected: f64, got: f64 },

    #[error("debit address {address} not found on the ledger")]
    AddressNotFound { address: String },

    #[error(
        "insufficient funds in {address}: debit {amount} plus gas {gas} totals {total}, balance is {balance}"
    )]
    InsufficientFunds {
        address: String,
        amount: f64,
        gas: f64,
        total: f64,
        balance: f64,
    },

    #[error("transaction nonce {got} out of sequence, account expects {expected}")]
    NonceMismatch { expected: u64, got: u64 },
}

/// Which call site is asking, and therefore what "the right next nonce" means.
///
/// The three modes have different temporal assumptions and must not be
/// conflated: creation trusts the caller to have fetched the next nonce,
/// peer-received checks against the nonce advanced past the account's queued
/// pending transactions, and block re-execution checks against the exact
/// current nonce of the account instance being mutated between transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationMode {
    /// Client submitting a brand-new transaction; no nonce check here.
    Creation,

    /// Transaction arriving from a peer before entering the pool; the nonce
    /// must equal the latest computed nonce for the debit account.
    PeerReceived { nonce: u64 },

    /// Transaction being re-validated during block execution; the nonce must
    /// equal the account's current nonce exactly.
    BlockReExecution { nonce: u64 },
}

/// The next nonce a new transaction from `debit_address` should carry.
///
/// The account's stored nonce when nothing is queued for the address,
/// otherwise one past the highest nonce among its pending transactions.
pub fn latest_nonce(
    accounts: &HashMap<String, Account>,
    pending: &[Transaction],
    debit_address: &str,
) -> Result<u64, ValidationError> {
    let account = accounts
        .get(debit_address)
        .ok_or_else(|| ValidationError::AddressNotFound {
            address: debit_address.to_string(),
        })?;

    let max_pending = pending
        .iter()
        .filter(|txn| txn.debit_address == debit_address)
        .map(|txn| txn.nonce)
        .max();

    Ok(match max_pending {
        Some(nonce) => nonce + 1,
        None => account.nonce,
    })
}

/// Context-sensitive transaction admission.
///
/// Rules apply in order and short-circuit on the first failure: the system
/// reward special case, debit account existence, funds covering amount plus
/// gas, then the mode-dependent nonce check.
pub fn validate_transaction(
    accounts: &HashMap<String, Account>,
    pending: &[Transaction],
    debit_address: &str,
    amount: f64,
    gas: f64,
    mode: ValidationMode,
) -> Result<(), ValidationError> {
    if debit_address == SYSTEM_ADDRESS {
        if amount != BLOCK_REWARD {
            return Err(ValidationError::RewardMismatch {
                expected: BLOCK_REWARD,
                got: amount,
            });
        }
        return Ok(());
    }

    let account = accounts
        .get(debit_address)
        .ok_or_else(|| ValidationError::AddressNotFound {
            address: debit_address.to_string(),
        })?;

    let total = amount + gas;
    if !account.debit_check(total) {
        return Err(ValidationError::InsufficientFunds {
            address: debit_address.to_string(),
            amount,
            gas,
            total,
            balance: account.balance,
        });
    }

    match mode {
        ValidationMode::Creation => {}
        ValidationMode::PeerReceived { nonce } => {
            let expected = latest_nonce(accounts, pending, debit_address)?;
            if nonce != expected {
                return Err(ValidationError::NonceMismatch {
                    expected,
                    got: nonce,
                });
            }
        }
        ValidationMode::BlockReExecution { nonce } => {
            if nonce != account.nonce {
                return Err(ValidationError::NonceMismatch {
                    expected: account.nonce,
                    got: nonce,
                });
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn funded_accounts() -> HashMap<String, Account> {
        let mut accounts = HashMap::new();
        let mut acc = Account::with_address("funded", "debit-addr");
        acc.credit(500.0);
        accounts.insert(acc.address.clone(), acc);
        accounts
    }

    #[test]
    fn test_reward_amount_must_match_exactly() {
        let accounts = HashMap::new();

        assert!(validate_transaction(
            &accounts,
            &[],
            SYSTEM_ADDRESS,
            BLOCK_REWARD,
            0.0,
            ValidationMode::Creation,
        )
        .is_ok());

        let err = validate_transaction(
            &accounts,
            &[],
            SYSTEM_ADDRESS,
            BLOCK_REWARD + 1.0,
            0.0,
            ValidationMode::Creation,
        )
        .unwrap_err();
        assert_eq!(
            err,
            ValidationError::RewardMismatch {
                expected: BLOCK_REWARD,
                got: BLOCK_REWARD + 1.0,
            }
        );
    }

    #[test]
    fn test_unknown_debit_address_rejected() {
        let accounts = funded_accounts();
        let err = validate_transaction(
            &accounts,
            &[],
            "missing-addr",
            10.0,
            1.0,
            ValidationMode::Creation,
        )
        .unwrap_err();
        assert_eq!(
            err,
            ValidationError::AddressNotFound {
                address: "missing-addr".to_string(),
            }
        );
    }

    #[test]
    fn test_insufficient_funds_includes_gas() {
        let accounts = funded_accounts();

        // amount alone fits, amount + gas does not
        let err = validate_transaction(
            &accounts,
            &[],
            "debit-addr",
            495.0,
            10.0,
            ValidationMode::Creation,
        )
        .unwrap_err();
        assert_eq!(
            err,
            ValidationError::InsufficientFunds {
                address: "debit-addr".to_string(),
                amount: 495.0,
                gas: 10.0,
                total: 505.0,
                balance: 500.0,
            }
        );
    }

    #[test]
    fn test_creation_mode_skips_nonce_check() {
        let accounts = funded_accounts();
        // wildly wrong nonce would fail other modes; creation has no nonce rule
        assert!(validate_transaction(
            &accounts,
            &[],
            "debit-addr",
            10.0,
            1.0,
            ValidationMode::Creation,
        )
        .is_ok());
    }

    #[test]
    fn test_peer_received_checks_latest_nonce_past_pending() {
        let accounts = funded_accounts();
        let pending = vec![
            Transaction::new("debit-addr", "credit-addr", 10.0, 1.0, 0),
            Transaction::new("debit-addr", "credit-addr", 10.0, 1.0, 1),
        ];

        // two pending txns queued: the only acceptable nonce is max + 1
        assert!(validate_transaction(
            &accounts,
            &pending,
            "debit-addr",
            10.0,
            1.0,
            ValidationMode::PeerReceived { nonce: 2 },
        )
        .is_ok());

        // the bare account nonce is stale once pendings are queued
        let err = validate_transaction(
            &accounts,
            &pending,
            "debit-addr",
            10.0,
            1.0,
            ValidationMode::PeerReceived { nonce: 0 },
        )
        .unwrap_err();
        assert_eq!(err, ValidationError::NonceMismatch { expected: 2, got: 0 });
    }

    #[test]
    fn test_block_re_execution_checks_exact_account_nonce() {
        let mut accounts = funded_accounts();
        accounts.get_mut("debit-addr").unwrap().increment_nonce();

        assert!(validate_transaction(
            &accounts,
            &[],
            "debit-addr",
            10.0,
            1.0,
            ValidationMode::BlockReExecution { nonce: 1 },
        )
        .is_ok());

        let err = validate_transaction(
            &accounts,
            &[],
            "debit-addr",
            10.0,
            1.0,
            ValidationMode::BlockReExecution { nonce: 0 },
        )
        .unwrap_err();
        assert_eq!(err, ValidationError::NonceMismatch { expected: 1, got: 0 });
    }

    #[test]
    fn test_latest_nonce_variants() {
        let accounts = funded_accounts();

        // no pendings: the stored account nonce
        assert_eq!(latest_nonce(&accounts, &[], "debit-addr").unwrap(), 0);

        // pendings queued: one past the highest pending nonce
        let pending = vec![
            Transaction::new("debit-addr", "credit-addr", 10.0, 1.0, 0),
            Transaction::new("other-addr", "credit-addr", 10.0, 1.0, 7),
        ];
        assert_eq!(latest_nonce(&accounts, &pending, "debit-addr").unwrap(), 1);

        // unknown address is an error
        assert!(latest_nonce(&accounts, &[], "missing").is_err());
    }
}
