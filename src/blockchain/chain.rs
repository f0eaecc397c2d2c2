use chrono::Utc;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::account::Account;
use super::block::Block;
use super::crypto::{hash_block, proof_of_work, state_root, transactions_root, POW_PREFIX};
use super::execution::{ensure_referenced_accounts, execute_transactions, FailedTransaction};
use super::selection::select_for_block;
use super::transaction::Transaction;
use super::validation::{latest_nonce, validate_transaction, ValidationError, ValidationMode};

/// Balance seeded into the genesis pre-mine account.
pub const PREMINE_BALANCE: f64 = 1000.0;

/// Errors from a mining attempt. The pool is left untouched in both cases.
#[derive(Debug, Clone, Error)]
pub enum MineError {
    #[error("no eligible transactions identified for new block")]
    NoEligibleTransactions,

    #[error("only {processed} transactions processed successfully; block abandoned")]
    InsufficientProcessed {
        processed: usize,
        failures: Vec<FailedTransaction>,
    },
}

/// Terminal failures of the block-reception state machine.
///
/// Every variant before `CommitFailed` leaves the real ledger untouched;
/// `CommitFailed` guards against non-determinism between the simulation and
/// commit passes and should not occur in practice.
#[derive(Debug, Clone, Error)]
pub enum ReceiveBlockError {
    #[error("block does not extend the local chain (hash ok: {correct_hash}, index ok: {correct_index})")]
    StructuralMismatch {
        correct_hash: bool,
        correct_index: bool,
    },

    #[error("block transactions failed simulation")]
    SimulationFailed { failures: Vec<FailedTransaction> },

    #[error("declared state root {declared} does not match simulated state root {computed}")]
    StateRootMismatch { declared: String, computed: String },

    #[error("declared merkle root {declared} does not match computed merkle root {computed}")]
    MerkleRootMismatch { declared: String, computed: String },

    #[error("block transactions failed during commit after passing simulation")]
    CommitFailed { failures: Vec<FailedTransaction> },
}

/// Reasons a candidate chain was not adopted. The local ledger is unchanged
/// in every case.
#[derive(Debug, Clone, Error)]
pub enum ConsensusError {
    #[error("candidate chain is not longer than the local chain")]
    NotLonger,

    #[error("candidate chain failed structural validation")]
    InvalidStructure,

    #[error("block {block_index} failed re-execution while rebuilding account state")]
    ReExecutionFailed {
        block_index: u64,
        failures: Vec<FailedTransaction>,
    },
}

/// Everything a node shares about itself over `/blockchain`, and everything
/// consensus consumes from a peer (only `chain` and `pendingTransactions`).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NodeSnapshot {
    pub chain: Vec<Block>,
    pub pending_transactions: Vec<Transaction>,
    #[serde(default)]
    pub accounts: Vec<Account>,
    #[serde(default)]
    pub network_nodes: Vec<String>,
    #[serde(default)]
    pub current_node_url: String,
}

/// The mutable ledger aggregate: chain, accounts and the pending pool.
///
/// All three are mutated together by mining, block reception and consensus,
/// so they live behind a single lock (single-writer discipline); read-only
/// queries share read locks.
#[derive(Debug)]
struct LedgerState {
    chain: Vec<Block>,
    accounts: HashMap<String, Account>,
    pending: Vec<Transaction>,
}

/// A node's ledger. Cheap to clone; clones share the same underlying state.
#[derive(Debug, Clone)]
pub struct Blockchain {
    state: Arc<RwLock<LedgerState>>,
    premine_address: String,
    max_block_size: usize,
}

impl Blockchain {
    /// Creates a ledger with a synthesized genesis block and the single
    /// pre-funded genesis account.
    pub fn new(premine_address: &str, max_block_size: usize) -> Self {
        let mut accounts = HashMap::new();
        let mut premine = Account::with_address("genesis-pre-mine", premine_address);
        premine.credit(PREMINE_BALANCE);
        accounts.insert(premine.address.clone(), premine);

        let genesis = Block::genesis(state_root(&accounts));
        info!(
            "ledger initialized: genesis block created, pre-mine account {} funded with {}",
            premine_address, PREMINE_BALANCE
        );

        Blockchain {
            state: Arc::new(RwLock::new(LedgerState {
                chain: vec![genesis],
                accounts,
                pending: Vec::new(),
            })),
            premine_address: premine_address.to_string(),
            max_block_size,
        }
    }

    /// Creates an account, generating an address unless one is supplied.
    ///
    /// Returns None (no mutation) when the address is already present.
    pub fn create_account(&self, nickname: &str, address: Option<&str>) -> Option<Account> {
        let mut state = self.state.write().unwrap();

        let account = match address {
            Some(addr) => Account::with_address(nickname, addr),
            None => Account::new(nickname),
        };
        if state.accounts.contains_key(&account.address) {
            info!("account {} already exists, creation skipped", account.address);
            return None;
        }

        info!("account {} ({}) created", account.address, nickname);
        state
            .accounts
            .insert(account.address.clone(), account.clone());
        Some(account)
    }

    pub fn get_account(&self, address: &str) -> Option<Account> {
        self.state.read().unwrap().accounts.get(address).cloned()
    }

    /// All accounts, ordered by address for stable output.
    pub fn accounts(&self) -> Vec<Account> {
        let state = self.state.read().unwrap();
        let mut accounts: Vec<Account> = state.accounts.values().cloned().collect();
        accounts.sort_by(|a, b| a.address.cmp(&b.address));
        accounts
    }

    pub fn chain(&self) -> Vec<Block> {
        self.state.read().unwrap().chain.clone()
    }

    pub fn pending_transactions(&self) -> Vec<Transaction> {
        self.state.read().unwrap().pending.clone()
    }

    /// The next nonce a new transaction debiting `address` should carry,
    /// advanced past the address's already-pending transactions.
    pub fn latest_nonce(&self, address: &str) -> Result<u64, ValidationError> {
        let state = self.state.read().unwrap();
        latest_nonce(&state.accounts, &state.pending, address)
    }

    /// Creates a transaction from an already-schema-valid client submission.
    ///
    /// The node computes the nonce itself, validates in creation mode and
    /// pools the transaction for the next block.
    pub fn create_transaction(
        &self,
        debit_address: &str,
        credit_address: &str,
        amount: f64,
        gas: f64,
    ) -> Result<Transaction, ValidationError> {
        let mut state = self.state.write().unwrap();

        let nonce = latest_nonce(&state.accounts, &state.pending, debit_address)?;
        validate_transaction(
            &state.accounts,
            &state.pending,
            debit_address,
            amount,
            gas,
            ValidationMode::Creation,
        )?;

        let txn = Transaction::new(debit_address, credit_address, amount, gas, nonce);
        info!("transaction {} added to pending pool", txn.txn_id);
        state.pending.push(txn.clone());
        Ok(txn)
    }

    /// Admits a transaction broadcast by a peer.
    ///
    /// The supplied nonce must match the latest computed nonce for the debit
    /// account, since the peer may race other pendings for the same account.
    /// Re-delivery of an already-pooled transaction is a no-op.
    pub fn receive_transaction(&self, txn: Transaction) -> Result<(), ValidationError> {
        let mut state = self.state.write().unwrap();

        if state.pending.iter().any(|t| t.txn_id == txn.txn_id) {
            info!("transaction {} already pooled, ignoring re-delivery", txn.txn_id);
            return Ok(());
        }

        validate_transaction(
            &state.accounts,
            &state.pending,
            &txn.debit_address,
            txn.amount,
            txn.gas,
            ValidationMode::PeerReceived { nonce: txn.nonce },
        )?;

        info!("peer transaction {} added to pending pool", txn.txn_id);
        state.pending.push(txn);
        Ok(())
    }

    /// Assembles and mines the next block.
    ///
    /// Selects from the pool, appends the block reward, re-validates and
    /// executes the batch against the live accounts, commits the proof-of-work
    /// block and removes the processed transactions from the pool. When fewer
    /// than two transactions survive execution (no end-user transaction
    /// succeeded) the attempt is abandoned and the pre-execution account
    /// state restored.
    pub fn mine(&self, miner_address: &str) -> Result<Block, MineError> {
        let mut state = self.state.write().unwrap();

        let mut batch = select_for_block(&state.pending, self.max_block_size);
        if batch.is_empty() {
            return Err(MineError::NoEligibleTransactions);
        }
        batch.push(Transaction::block_reward(miner_address));

        let snapshot = state.accounts.clone();
        let report = execute_transactions(&mut state.accounts, &batch, miner_address);
        if report.processed.len() < 2 {
            warn!(
                "mine abandoned: {} of {} transactions processed, restoring account state",
                report.processed.len(),
                batch.len()
            );
            state.accounts = snapshot;
            return Err(MineError::InsufficientProcessed {
                processed: report.processed.len(),
                failures: report.failures,
            });
        }

        let merkle_root = transactions_root(&report.processed);
        let new_state_root = state_root(&state.accounts);
        let last = state.chain.last().unwrap();
        let prev_block_hash = last.hash.clone();
        let index = last.index + 1;

        let nonce = proof_of_work(&prev_block_hash, &report.processed);
        let hash = hash_block(&prev_block_hash, &report.processed, nonce);

        let block = Block {
            index,
            timestamp: Utc::now(),
            transactions: report.processed,
            nonce,
            hash,
            prev_block_hash,
            miner: miner_address.to_string(),
            state_root: new_state_root,
            merkle_root,
        };

        let mined: Vec<String> = block.transactions.iter().map(|t| t.txn_id.clone()).collect();
        state.pending.retain(|t| !mined.contains(&t.txn_id));
        state.chain.push(block.clone());

        info!(
            "block {} mined with {} transactions, hash {}",
            block.index,
            block.transactions.len(),
            block.hash
        );
        Ok(block)
    }

    /// Validates and commits a block produced by another node.
    ///
    /// Structural check, then a full simulation on cloned accounts, then
    /// verification of both declared commitments against the simulated state,
    /// and only then execution against the real ledger. The block must be
    /// reproducible from its transaction list alone; nothing the sender
    /// claims about state is trusted.
    pub fn receive_block(&self, block: Block) -> Result<(), ReceiveBlockError> {
        let mut state = self.state.write().unwrap();

        let last = state.chain.last().unwrap();
        let correct_hash = last.hash == block.prev_block_hash;
        let correct_index = last.index + 1 == block.index;
        if !correct_hash || !correct_index {
            warn!(
                "block {} rejected: does not extend local chain tip {}",
                block.index, last.index
            );
            return Err(ReceiveBlockError::StructuralMismatch {
                correct_hash,
                correct_index,
            });
        }

        // simulate on a clone; the real ledger stays untouched on any failure
        let mut simulated = state.accounts.clone();
        ensure_referenced_accounts(&mut simulated, &block.transactions);
        let simulation = execute_transactions(&mut simulated, &block.transactions, &block.miner);
        if !simulation.failures.is_empty() {
            warn!(
                "block {} rejected: {} transactions failed simulation",
                block.index,
                simulation.failures.len()
            );
            return Err(ReceiveBlockError::SimulationFailed {
                failures: simulation.failures,
            });
        }

        let computed_state_root = state_root(&simulated);
        if computed_state_root != block.state_root {
            return Err(ReceiveBlockError::StateRootMismatch {
                declared: block.state_root,
                computed: computed_state_root,
            });
        }
        let computed_merkle_root = transactions_root(&block.transactions);
        if computed_merkle_root != block.merkle_root {
            return Err(ReceiveBlockError::MerkleRootMismatch {
                declared: block.merkle_root,
                computed: computed_merkle_root,
            });
        }

        // commit by re-executing against the real accounts; the clone is
        // discarded rather than copied back so the commit is auditable as a
        // plain re-run of the block
        ensure_referenced_accounts(&mut state.accounts, &block.transactions);
        let commit = execute_transactions(&mut state.accounts, &block.transactions, &block.miner);
        if !commit.failures.is_empty() {
            warn!(
                "block {} failed post-simulation commit, {} failures",
                block.index,
                commit.failures.len()
            );
            return Err(ReceiveBlockError::CommitFailed {
                failures: commit.failures,
            });
        }

        let committed: Vec<String> = block.transactions.iter().map(|t| t.txn_id.clone()).collect();
        state.pending.retain(|t| !committed.contains(&t.txn_id));
        info!("block {} accepted and appended to chain", block.index);
        state.chain.push(block);
        Ok(())
    }

    /// Structural validity of a full chain: exact genesis sentinel, linked
    /// hashes, and the proof-of-work target met by every subsequent block's
    /// recomputed hash.
    pub fn chain_is_valid(chain: &[Block]) -> bool {
        let genesis = match chain.first() {
            Some(block) => block,
            None => return false,
        };
        if !genesis.is_valid_genesis() {
            warn!("chain invalid: genesis block does not match sentinel values");
            return false;
        }

        for window in chain.windows(2) {
            let (prev, current) = (&window[0], &window[1]);

            if current.prev_block_hash != prev.hash {
                warn!(
                    "chain invalid: block {} prevBlockHash does not link to block {}",
                    current.index, prev.index
                );
                return false;
            }

            let recomputed = hash_block(&prev.hash, &current.transactions, current.nonce);
            if !recomputed.starts_with(POW_PREFIX) {
                warn!(
                    "chain invalid: block {} recomputed hash misses the proof-of-work target",
                    current.index
                );
                return false;
            }
        }
        true
    }

    /// Rebuilds account state by re-executing every block from genesis
    /// against a fresh account set seeded with the pre-mine account.
    fn rebuild_accounts(
        &self,
        chain: &[Block],
    ) -> Result<HashMap<String, Account>, ConsensusError> {
        let mut accounts = HashMap::new();
        let mut premine = Account::with_address("genesis-pre-mine", &self.premine_address);
        premine.credit(PREMINE_BALANCE);
        accounts.insert(premine.address.clone(), premine);

        for block in chain.iter().skip(1) {
            ensure_referenced_accounts(&mut accounts, &block.transactions);
            let report = execute_transactions(&mut accounts, &block.transactions, &block.miner);
            if !report.failures.is_empty() {
                return Err(ConsensusError::ReExecutionFailed {
                    block_index: block.index,
                    failures: report.failures,
                });
            }
        }
        Ok(accounts)
    }

    /// Longest-valid-chain replacement.
    ///
    /// The candidate must be strictly longer and structurally valid, and its
    /// entire history must re-execute cleanly from genesis. Only then are
    /// chain, accounts and pending pool swapped, atomically and only while
    /// the candidate is still strictly longer than the local chain. Any
    /// failure leaves the local ledger exactly as it was.
    pub fn try_replace_chain(
        &self,
        candidate: Vec<Block>,
        pending: Vec<Transaction>,
    ) -> Result<usize, ConsensusError> {
        if candidate.len() <= self.state.read().unwrap().chain.len() {
            return Err(ConsensusError::NotLonger);
        }
        if !Self::chain_is_valid(&candidate) {
            return Err(ConsensusError::InvalidStructure);
        }

        // the expensive rebuild runs on scratch data, outside the write lock
        let accounts = self.rebuild_accounts(&candidate)?;

        let mut state = self.state.write().unwrap();
        if candidate.len() <= state.chain.len() {
            return Err(ConsensusError::NotLonger);
        }

        let length = candidate.len();
        state.chain = candidate;
        state.accounts = accounts;
        state.pending = pending;
        info!("local chain replaced by peer chain of {} blocks", length);
        Ok(length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::block::{GENESIS_HASH, GENESIS_NONCE, GENESIS_PREV_HASH};
    use crate::blockchain::transaction::BLOCK_REWARD;

    const PREMINE_ADDR: &str = "test-premine-addr";
    const MINER_ADDR: &str = "test-miner-addr";
    const CREDIT_ADDR: &str = "test-credit-addr";

    fn test_ledger() -> Blockchain {
        Blockchain::new(PREMINE_ADDR, 10)
    }

    #[test]
    fn test_genesis_invariant() {
        let ledger = test_ledger();
        let chain = ledger.chain();

        assert_eq!(chain.len(), 1);
        assert_eq!(chain[0].index, 1);
        assert_eq!(chain[0].nonce, GENESIS_NONCE);
        assert_eq!(chain[0].prev_block_hash, GENESIS_PREV_HASH);
        assert_eq!(chain[0].hash, GENESIS_HASH);
        assert!(chain[0].transactions.is_empty());
        assert!(!chain[0].state_root.is_empty());

        let accounts = ledger.accounts();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].address, PREMINE_ADDR);
        assert_eq!(accounts[0].balance, PREMINE_BALANCE);
        assert_eq!(accounts[0].nonce, 0);
    }

    #[test]
    fn test_create_account_rejects_duplicate_address() {
        let ledger = test_ledger();

        let created = ledger.create_account("alice", Some("addr-1")).unwrap();
        assert_eq!(created.address, "addr-1");
        assert_eq!(created.balance, 0.0);

        // duplicate is a no-op signal, not an error
        assert!(ledger.create_account("mallory", Some("addr-1")).is_none());
        assert!(ledger.create_account("dup", Some(PREMINE_ADDR)).is_none());
        assert_eq!(ledger.accounts().len(), 2);
    }

    #[test]
    fn test_create_transaction_computes_nonce_and_pools() {
        let ledger = test_ledger();

        let first = ledger
            .create_transaction(PREMINE_ADDR, CREDIT_ADDR, 100.0, 10.0)
            .unwrap();
        assert_eq!(first.nonce, 0);

        // second submission sees the queued pending and advances past it
        let second = ledger
            .create_transaction(PREMINE_ADDR, CREDIT_ADDR, 100.0, 10.0)
            .unwrap();
        assert_eq!(second.nonce, 1);

        assert_eq!(ledger.pending_transactions().len(), 2);
    }

    #[test]
    fn test_create_transaction_validation_failures_leave_pool_untouched() {
        let ledger = test_ledger();

        let err = ledger
            .create_transaction("unknown-addr", CREDIT_ADDR, 10.0, 1.0)
            .unwrap_err();
        assert!(matches!(err, ValidationError::AddressNotFound { .. }));

        let err = ledger
            .create_transaction(PREMINE_ADDR, CREDIT_ADDR, PREMINE_BALANCE, 1.0)
            .unwrap_err();
        assert!(matches!(err, ValidationError::InsufficientFunds { .. }));

        assert!(ledger.pending_transactions().is_empty());
    }

    #[test]
    fn test_receive_transaction_enforces_latest_nonce() {
        let ledger = test_ledger();
        ledger
            .create_transaction(PREMINE_ADDR, CREDIT_ADDR, 100.0, 10.0)
            .unwrap();

        // stale nonce (0) is rejected: one pending is already queued
        let stale = Transaction::new(PREMINE_ADDR, CREDIT_ADDR, 50.0, 5.0, 0);
        let err = ledger.receive_transaction(stale).unwrap_err();
        assert!(matches!(err, ValidationError::NonceMismatch { expected: 1, got: 0 }));

        let next = Transaction::new(PREMINE_ADDR, CREDIT_ADDR, 50.0, 5.0, 1);
        ledger.receive_transaction(next.clone()).unwrap();
        assert_eq!(ledger.pending_transactions().len(), 2);

        // re-delivery of the same transaction is a no-op
        ledger.receive_transaction(next).unwrap();
        assert_eq!(ledger.pending_transactions().len(), 2);
    }

    #[test]
    fn test_mine_end_to_end() {
        let ledger = test_ledger();
        let txn = ledger
            .create_transaction(PREMINE_ADDR, CREDIT_ADDR, 100.0, 10.0)
            .unwrap();

        let block = ledger.mine(MINER_ADDR).unwrap();

        assert_eq!(block.index, 2);
        assert_eq!(block.transactions.len(), 2);
        assert_eq!(block.transactions[0].txn_id, txn.txn_id);
        assert!(block.transactions[1].is_reward());
        assert!(block.hash.starts_with(POW_PREFIX));
        assert_eq!(block.prev_block_hash, GENESIS_HASH);

        // balances: premine -110, credit +100, miner +gas+reward
        assert_eq!(ledger.get_account(PREMINE_ADDR).unwrap().balance, 890.0);
        assert_eq!(ledger.get_account(PREMINE_ADDR).unwrap().nonce, 1);
        assert_eq!(ledger.get_account(CREDIT_ADDR).unwrap().balance, 100.0);
        assert_eq!(
            ledger.get_account(MINER_ADDR).unwrap().balance,
            10.0 + BLOCK_REWARD
        );

        assert!(ledger.pending_transactions().is_empty());
        assert_eq!(ledger.chain().len(), 2);

        // stored commitments reproduce from the block's own contents
        assert_eq!(block.merkle_root, transactions_root(&block.transactions));
        assert_eq!(
            block.hash,
            hash_block(&block.prev_block_hash, &block.transactions, block.nonce)
        );
    }

    #[test]
    fn test_mine_with_empty_pool_fails() {
        let ledger = test_ledger();
        assert!(matches!(
            ledger.mine(MINER_ADDR),
            Err(MineError::NoEligibleTransactions)
        ));
        assert_eq!(ledger.chain().len(), 1);
    }

    #[test]
    fn test_mine_restores_state_when_nothing_survives() {
        let ledger = test_ledger();

        // force a stale-nonce transaction straight into the pool
        {
            let mut state = ledger.state.write().unwrap();
            state
                .pending
                .push(Transaction::new(PREMINE_ADDR, CREDIT_ADDR, 100.0, 10.0, 7));
        }

        let err = ledger.mine(MINER_ADDR).unwrap_err();
        match err {
            MineError::InsufficientProcessed { processed, failures } => {
                assert_eq!(processed, 0);
                assert_eq!(failures.len(), 1);
            }
            other => panic!("unexpected error: {:?}", other),
        }

        // abandoned attempt left no trace on the accounts or the chain
        assert_eq!(ledger.get_account(PREMINE_ADDR).unwrap().balance, PREMINE_BALANCE);
        assert!(ledger.get_account(MINER_ADDR).is_none());
        assert_eq!(ledger.chain().len(), 1);
        // the stale transaction stays pooled
        assert_eq!(ledger.pending_transactions().len(), 1);
    }

    #[test]
    fn test_receive_block_commits_peer_block() {
        let miner_node = test_ledger();
        miner_node
            .create_transaction(PREMINE_ADDR, CREDIT_ADDR, 100.0, 10.0)
            .unwrap();
        let block = miner_node.mine(MINER_ADDR).unwrap();

        let receiving_node = test_ledger();
        receiving_node.receive_block(block.clone()).unwrap();

        assert_eq!(receiving_node.chain().len(), 2);
        assert_eq!(
            receiving_node.get_account(PREMINE_ADDR).unwrap().balance,
            890.0
        );
        assert_eq!(
            receiving_node.get_account(CREDIT_ADDR).unwrap().balance,
            100.0
        );
        assert_eq!(
            receiving_node.get_account(MINER_ADDR).unwrap().balance,
            10.0 + BLOCK_REWARD
        );
    }

    #[test]
    fn test_receive_block_structural_rejection() {
        let miner_node = test_ledger();
        miner_node
            .create_transaction(PREMINE_ADDR, CREDIT_ADDR, 100.0, 10.0)
            .unwrap();
        let block = miner_node.mine(MINER_ADDR).unwrap();

        let receiving_node = test_ledger();

        let mut bad_hash = block.clone();
        bad_hash.prev_block_hash = "wrongHash".to_string();
        match receiving_node.receive_block(bad_hash).unwrap_err() {
            ReceiveBlockError::StructuralMismatch { correct_hash, correct_index } => {
                assert!(!correct_hash);
                assert!(correct_index);
            }
            other => panic!("unexpected error: {:?}", other),
        }

        let mut bad_index = block;
        bad_index.index = 10;
        match receiving_node.receive_block(bad_index).unwrap_err() {
            ReceiveBlockError::StructuralMismatch { correct_hash, correct_index } => {
                assert!(correct_hash);
                assert!(!correct_index);
            }
            other => panic!("unexpected error: {:?}", other),
        }

        assert_eq!(receiving_node.chain().len(), 1);
    }

    #[test]
    fn test_receive_block_simulation_never_mutates_ledger() {
        let miner_node = test_ledger();
        miner_node
            .create_transaction(PREMINE_ADDR, CREDIT_ADDR, 100.0, 10.0)
            .unwrap();
        let mut block = miner_node.mine(MINER_ADDR).unwrap();

        // overspend the premine account so simulation must fail
        block.transactions[0].amount = PREMINE_BALANCE * 2.0;

        let receiving_node = test_ledger();
        let err = receiving_node.receive_block(block).unwrap_err();
        assert!(matches!(err, ReceiveBlockError::SimulationFailed { .. }));

        assert_eq!(receiving_node.chain().len(), 1);
        assert_eq!(
            receiving_node.get_account(PREMINE_ADDR).unwrap().balance,
            PREMINE_BALANCE
        );
        assert!(receiving_node.get_account(MINER_ADDR).is_none());
    }

    #[test]
    fn test_receive_block_commitment_mismatches() {
        let miner_node = test_ledger();
        miner_node
            .create_transaction(PREMINE_ADDR, CREDIT_ADDR, 100.0, 10.0)
            .unwrap();
        let block = miner_node.mine(MINER_ADDR).unwrap();

        let receiving_node = test_ledger();

        let mut bad_state = block.clone();
        bad_state.state_root = "wrongRoot".to_string();
        assert!(matches!(
            receiving_node.receive_block(bad_state).unwrap_err(),
            ReceiveBlockError::StateRootMismatch { .. }
        ));

        let mut bad_merkle = block;
        bad_merkle.merkle_root = "wrongRoot".to_string();
        assert!(matches!(
            receiving_node.receive_block(bad_merkle).unwrap_err(),
            ReceiveBlockError::MerkleRootMismatch { .. }
        ));

        assert_eq!(receiving_node.chain().len(), 1);
        assert_eq!(
            receiving_node.get_account(PREMINE_ADDR).unwrap().balance,
            PREMINE_BALANCE
        );
    }

    #[test]
    fn test_chain_is_valid_on_mined_history() {
        let ledger = test_ledger();
        ledger
            .create_transaction(PREMINE_ADDR, CREDIT_ADDR, 100.0, 10.0)
            .unwrap();
        ledger.mine(MINER_ADDR).unwrap();
        ledger
            .create_transaction(PREMINE_ADDR, CREDIT_ADDR, 50.0, 5.0)
            .unwrap();
        ledger.mine(MINER_ADDR).unwrap();

        let chain = ledger.chain();
        assert_eq!(chain.len(), 3);
        assert!(Blockchain::chain_is_valid(&chain));

        // broken link
        let mut broken = chain.clone();
        broken[2].prev_block_hash = "severed".to_string();
        assert!(!Blockchain::chain_is_valid(&broken));

        // tampered transactions no longer hash under the target
        let mut tampered = chain.clone();
        tampered[1].transactions[0].amount = 999.0;
        assert!(!Blockchain::chain_is_valid(&tampered));

        // tampered genesis
        let mut fake_genesis = chain;
        fake_genesis[0].nonce = 0;
        assert!(!Blockchain::chain_is_valid(&fake_genesis));
    }

    #[test]
    fn test_consensus_adopts_longer_valid_chain() {
        let long_node = test_ledger();
        long_node
            .create_transaction(PREMINE_ADDR, CREDIT_ADDR, 100.0, 10.0)
            .unwrap();
        long_node.mine(MINER_ADDR).unwrap();
        long_node
            .create_transaction(PREMINE_ADDR, CREDIT_ADDR, 50.0, 5.0)
            .unwrap();
        long_node.mine(MINER_ADDR).unwrap();

        let short_node = test_ledger();
        let leftover = Transaction::new(PREMINE_ADDR, CREDIT_ADDR, 1.0, 1.0, 2);
        let length = short_node
            .try_replace_chain(long_node.chain(), vec![leftover.clone()])
            .unwrap();

        assert_eq!(length, 3);
        assert_eq!(short_node.chain().len(), 3);
        // account state rebuilt from the adopted history
        assert_eq!(
            short_node.get_account(PREMINE_ADDR).unwrap().balance,
            long_node.get_account(PREMINE_ADDR).unwrap().balance
        );
        assert_eq!(short_node.get_account(PREMINE_ADDR).unwrap().nonce, 2);
        assert_eq!(
            short_node.get_account(MINER_ADDR).unwrap().balance,
            long_node.get_account(MINER_ADDR).unwrap().balance
        );
        // pending pool replaced wholesale
        let pending = short_node.pending_transactions();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].txn_id, leftover.txn_id);
    }

    #[test]
    fn test_consensus_rejects_shorter_or_equal_chain() {
        let node = test_ledger();
        node.create_transaction(PREMINE_ADDR, CREDIT_ADDR, 100.0, 10.0)
            .unwrap();
        node.mine(MINER_ADDR).unwrap();

        let genesis_only = test_ledger();
        assert!(matches!(
            node.try_replace_chain(genesis_only.chain(), Vec::new()),
            Err(ConsensusError::NotLonger)
        ));
        assert_eq!(node.chain().len(), 2);
    }

    #[test]
    fn test_consensus_atomicity_on_re_execution_failure() {
        let long_node = test_ledger();
        long_node
            .create_transaction(PREMINE_ADDR, CREDIT_ADDR, 100.0, 10.0)
            .unwrap();
        long_node.mine(MINER_ADDR).unwrap();
        long_node
            .create_transaction(PREMINE_ADDR, CREDIT_ADDR, 50.0, 5.0)
            .unwrap();
        long_node.mine(MINER_ADDR).unwrap();

        // candidate passes structure but double-spends during re-execution:
        // bump an amount and recompute the block so PoW still holds
        let mut candidate = long_node.chain();
        candidate[1].transactions[0].amount = PREMINE_BALANCE * 2.0;
        let prev_hash = candidate[0].hash.clone();
        let txns = candidate[1].transactions.clone();
        let nonce = proof_of_work(&prev_hash, &txns);
        candidate[1].nonce = nonce;
        candidate[1].hash = hash_block(&prev_hash, &txns, nonce);
        candidate[2].prev_block_hash = candidate[1].hash.clone();
        let prev_hash = candidate[1].hash.clone();
        let txns = candidate[2].transactions.clone();
        let nonce = proof_of_work(&prev_hash, &txns);
        candidate[2].nonce = nonce;
        candidate[2].hash = hash_block(&prev_hash, &txns, nonce);

        let short_node = test_ledger();
        short_node
            .create_transaction(PREMINE_ADDR, CREDIT_ADDR, 10.0, 1.0)
            .unwrap();

        let err = short_node
            .try_replace_chain(candidate, Vec::new())
            .unwrap_err();
        match err {
            ConsensusError::ReExecutionFailed { block_index, .. } => assert_eq!(block_index, 2),
            other => panic!("unexpected error: {:?}", other),
        }

        // ledger exactly as before the attempt
        assert_eq!(short_node.chain().len(), 1);
        assert_eq!(
            short_node.get_account(PREMINE_ADDR).unwrap().balance,
            PREMINE_BALANCE
        );
        assert_eq!(short_node.pending_transactions().len(), 1);
    }

    #[test]
    fn test_state_root_round_trip_from_committed_block() {
        let ledger = test_ledger();
        ledger
            .create_transaction(PREMINE_ADDR, CREDIT_ADDR, 100.0, 10.0)
            .unwrap();
        let block = ledger.mine(MINER_ADDR).unwrap();

        // rebuilding post-block state from scratch reproduces the stored root
        let rebuilt = ledger.rebuild_accounts(&ledger.chain()).unwrap();
        assert_eq!(state_root(&rebuilt), block.state_root);
    }
}
