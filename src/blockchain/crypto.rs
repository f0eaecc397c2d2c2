use serde::Serialize;
use sha2::{Digest, Sha256};

use std::collections::HashMap;

use super::account::Account;
use super::transaction::Transaction;

/// Required hex prefix of a valid block hash. Fixed difficulty.
pub const POW_PREFIX: &str = "0000";

/// SHA-256 of a string, hex encoded.
pub fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

fn hash_payload(prev_hash: &str, data_json: &str, nonce: u64) -> String {
    let mut payload = String::with_capacity(prev_hash.len() + 20 + data_json.len());
    payload.push_str(prev_hash);
    payload.push_str(&nonce.to_string());
    payload.push_str(data_json);
    sha256_hex(&payload)
}

/// Hashes a block's data: previous hash, proof-of-work nonce and the
/// canonical JSON serialization of the block's data.
///
/// Byte-for-byte reproducible for identical logical content; the serde form
/// of `data` is part of the wire contract.
pub fn hash_block<T: Serialize>(prev_hash: &str, data: &T, nonce: u64) -> String {
    let data_json = serde_json::to_string(data).unwrap();
    hash_payload(prev_hash, &data_json, nonce)
}

/// Searches for the smallest nonce whose block hash meets the
/// proof-of-work target.
///
/// Linear scan from zero; runs to completion at the fixed difficulty, so the
/// caller is responsible for keeping it off the HTTP executor.
pub fn proof_of_work<T: Serialize>(prev_hash: &str, data: &T) -> u64 {
    let data_json = serde_json::to_string(data).unwrap();
    let mut nonce = 0u64;
    while !hash_payload(prev_hash, &data_json, nonce).starts_with(POW_PREFIX) {
        nonce += 1;
    }
    nonce
}

/// Reduces a list of hashes to a single Merkle root.
///
/// Adjacent pairs are combined by hashing their concatenation; an odd level
/// duplicates its last element. The empty list's root is the hash of the
/// empty string. Input order is significant.
pub fn merkle_root(hashes: &[String]) -> String {
    if hashes.is_empty() {
        return sha256_hex("");
    }

    let mut level: Vec<String> = hashes.to_vec();
    while level.len() > 1 {
        if level.len() % 2 != 0 {
            level.push(level[level.len() - 1].clone());
        }
        level = level
            .chunks(2)
            .map(|pair| sha256_hex(&format!("{}{}", pair[0], pair[1])))
            .collect();
    }
    level.remove(0)
}

/// Merkle root over a block's ordered transaction list.
///
/// Each leaf is the hash of the transaction's canonical JSON, so the root is
/// sensitive to transaction order.
pub fn transactions_root(transactions: &[Transaction]) -> String {
    let leaves: Vec<String> = transactions
        .iter()
        .map(|txn| sha256_hex(&serde_json::to_string(txn).unwrap()))
        .collect();
    merkle_root(&leaves)
}

/// Commitment over the full account set.
///
/// Account leaves are sorted lexicographically before reduction so the root
/// is independent of map iteration order; cloned account sets used for
/// simulation are populated in arbitrary order.
pub fn state_root(accounts: &HashMap<String, Account>) -> String {
    let mut leaves: Vec<String> = accounts
        .values()
        .map(|acc| sha256_hex(&format!("{}:{}-{}", acc.address, acc.balance, acc.nonce)))
        .collect();
    leaves.sort();
    merkle_root(&leaves)
}
