use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// An account on the ledger.
///
/// The balance must never be observed negative after a committed operation,
/// and the nonce counts this account's successfully confirmed debits. All
/// state changes go through the methods below.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Account {
    /// Display name, no uniqueness requirement
    pub nickname: String,

    /// Stable unique identifier for the account
    pub address: String,

    /// Current spendable balance
    pub balance: f64,

    /// Count of confirmed debits, used for transaction sequencing
    pub nonce: u64,
}

impl Account {
    /// Creates a new account with a generated address, zero balance and zero nonce.
    pub fn new(nickname: &str) -> Self {
        Account {
            nickname: nickname.to_string(),
            address: Uuid::new_v4().simple().to_string(),
            balance: 0.0,
            nonce: 0,
        }
    }

    /// Creates an account with a caller-supplied address.
    ///
    /// Used for seeding the genesis pre-mine account and for creating
    /// placeholder accounts for addresses a block references but the ledger
    /// has not seen yet.
    pub fn with_address(nickname: &str, address: &str) -> Self {
        Account {
            nickname: nickname.to_string(),
            address: address.to_string(),
            balance: 0.0,
            nonce: 0,
        }
    }

    /// Increases the balance. Amounts are assumed non-negative by the caller.
    pub fn credit(&mut self, amount: f64) {
        self.balance += amount;
    }

    /// Returns true iff debiting `amount` would not overdraw the account.
    pub fn debit_check(&self, amount: f64) -> bool {
        self.balance - amount >= 0.0
    }

    /// Decreases the balance if funds allow.
    ///
    /// Returns false with no mutation when the debit would overdraw.
    pub fn debit(&mut self, amount: f64) -> bool {
        if !self.debit_check(amount) {
            return false;
        }
        self.balance -= amount;
        true
    }

    /// Advances the debit counter. Called exactly once per successfully
    /// debited end-user transaction, never for credits.
    pub fn increment_nonce(&mut self) {
        self.nonce += 1;
    }
}
