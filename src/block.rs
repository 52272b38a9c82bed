//! Block records and the proof-of-work that produces their hash.

use num_bigint::{BigInt, Sign};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::codec::{int64_to_bytes, sha256};
use crate::config::{DIFFICULTY, MAX_NONCE};
use crate::error::{EngineError, Result};
use crate::merkle::merkle_root;
use crate::transaction::Transaction;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Block {
    pub timestamp: i64,
    pub transactions: Vec<Transaction>,
    pub prev_block_hash: Vec<u8>,
    pub hash: Vec<u8>,
    pub nonce: i64,
}

fn current_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the unix epoch")
        .as_secs() as i64
}

/// `1 << (256 - DIFFICULTY)`, the threshold a mined hash must fall strictly below.
fn target() -> BigInt {
    BigInt::from(1) << (256 - DIFFICULTY)
}

fn preimage(timestamp: i64, tx_summary: &[u8], prev_block_hash: &[u8], nonce: i64) -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(&int64_to_bytes(timestamp));
    data.extend_from_slice(tx_summary);
    data.extend_from_slice(prev_block_hash);
    data.extend_from_slice(&int64_to_bytes(nonce));
    data.extend_from_slice(&int64_to_bytes(DIFFICULTY as i64));
    data
}

fn transactions_summary(transactions: &[Transaction]) -> Result<Vec<u8>> {
    let leaves: Vec<Vec<u8>> = transactions
        .iter()
        .map(Transaction::serialize)
        .collect::<Result<_>>()?;
    Ok(merkle_root(&leaves))
}

fn hash_meets_target(hash: &[u8]) -> bool {
    BigInt::from_bytes_be(Sign::Plus, hash) < target()
}

impl Block {
    /// Builds and mines a new block over `transactions` on top of `prev_block_hash`.
    pub fn new_block(transactions: Vec<Transaction>, prev_block_hash: Vec<u8>) -> Result<Block> {
        let timestamp = current_timestamp();
        let tx_summary = transactions_summary(&transactions)?;

        let (hash, nonce) = mine(timestamp, &tx_summary, &prev_block_hash)?;

        Ok(Block {
            timestamp,
            transactions,
            prev_block_hash,
            hash,
            nonce,
        })
    }

    /// The genesis block: one coinbase transaction, empty previous hash.
    pub fn genesis(coinbase: Transaction) -> Result<Block> {
        Block::new_block(vec![coinbase], Vec::new())
    }

    /// Recomputes the hash for `self.nonce` and checks it equals `self.hash` and
    /// meets the difficulty target.
    pub fn validate(&self) -> Result<bool> {
        let tx_summary = transactions_summary(&self.transactions)?;
        let recomputed = sha256(&preimage(
            self.timestamp,
            &tx_summary,
            &self.prev_block_hash,
            self.nonce,
        ));
        Ok(recomputed == self.hash && hash_meets_target(&recomputed))
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        bincode::serde::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| EngineError::BlockCodec(e.to_string()))
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Block> {
        let (block, _) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())
            .map_err(|e| EngineError::BlockCodec(e.to_string()))?;
        Ok(block)
    }
}

/// Searches for the first nonce whose hash meets the difficulty target, starting at
/// zero. Fails with [`EngineError::MiningExhausted`] at [`MAX_NONCE`].
fn mine(timestamp: i64, tx_summary: &[u8], prev_block_hash: &[u8]) -> Result<(Vec<u8>, i64)> {
    let mut nonce: i64 = 0;
    loop {
        let hash = sha256(&preimage(timestamp, tx_summary, prev_block_hash, nonce));
        if hash_meets_target(&hash) {
            tracing::info!(nonce, hash = %data_encoding::HEXLOWER.encode(&hash), "mined block");
            return Ok((hash, nonce));
        }
        if nonce % 100_000 == 0 {
            tracing::debug!(nonce, "mining in progress");
        }
        if nonce == MAX_NONCE {
            return Err(EngineError::MiningExhausted);
        }
        nonce += 1;
    }
}
