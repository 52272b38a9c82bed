//! Inputs, outputs, coinbase construction, canonical hashing, and per-input ECDSA
//! signing/verification under the UTXO model.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::codec::{pubkey_hash, sha256};
use crate::config::SUBSIDY;
use crate::crypto;
use crate::error::{EngineError, Result};
use crate::wallet::validate_address;

/// Sentinel `ref_index` marking a coinbase input.
pub const COINBASE_REF_INDEX: i64 = -1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TXInput {
    pub ref_id: Vec<u8>,
    pub ref_index: i64,
    pub signature: Vec<u8>,
    pub pubkey: Vec<u8>,
}

impl TXInput {
    /// True iff the spender's pubkey hashes to `pkh` — the input's unlock capability.
    pub fn is_unlockable_with(&self, pkh: &[u8]) -> bool {
        pubkey_hash(&self.pubkey) == pkh
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TXOutput {
    pub value: i64,
    pub pubkey_hash: Vec<u8>,
}

impl TXOutput {
    pub fn new(value: i64, to_address: &str) -> Result<TXOutput> {
        let pkh = validate_address(to_address)?;
        Ok(TXOutput {
            value,
            pubkey_hash: pkh,
        })
    }

    /// True iff this output is locked to `pkh` — the output's lock capability.
    pub fn is_locked_with(&self, pkh: &[u8]) -> bool {
        self.pubkey_hash == pkh
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Transaction {
    pub id: Vec<u8>,
    pub inputs: Vec<TXInput>,
    pub outputs: Vec<TXOutput>,
}

impl Transaction {
    /// A transaction is coinbase iff it has exactly one input with an empty
    /// `ref_id` and `ref_index == -1`.
    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1
            && self.inputs[0].ref_id.is_empty()
            && self.inputs[0].ref_index == COINBASE_REF_INDEX
    }

    /// Builds the reward-minting transaction for a newly mined block. `data` is an
    /// arbitrary payload carried in the input's `pubkey` field (e.g. a reward memo).
    pub fn new_coinbase(to_address: &str, data: Vec<u8>) -> Result<Transaction> {
        let input = TXInput {
            ref_id: Vec::new(),
            ref_index: COINBASE_REF_INDEX,
            signature: Vec::new(),
            pubkey: data,
        };
        let output = TXOutput::new(SUBSIDY, to_address)?;
        let mut tx = Transaction {
            id: Vec::new(),
            inputs: vec![input],
            outputs: vec![output],
        };
        tx.id = tx.hash()?;
        Ok(tx)
    }

    /// Builds an unsigned value-transfer transaction spending `chosen` unspent
    /// outputs (keyed by hex-encoded txid → output indices) that sum to at least
    /// `amount`, as already selected by the UTXO index. One output of `amount` pays
    /// `to_address`; a change output pays any surplus back to `from_address`.
    pub fn new_transfer(
        from_address: &str,
        from_pubkey: &[u8],
        to_address: &str,
        amount: i64,
        accumulated: i64,
        chosen: &HashMap<Vec<u8>, Vec<usize>>,
    ) -> Result<Transaction> {
        if accumulated < amount {
            return Err(EngineError::InsufficientFunds {
                needed: amount,
                available: accumulated,
            });
        }

        let mut inputs = Vec::new();
        for (txid, indices) in chosen {
            for &index in indices {
                inputs.push(TXInput {
                    ref_id: txid.clone(),
                    ref_index: index as i64,
                    signature: Vec::new(),
                    pubkey: from_pubkey.to_vec(),
                });
            }
        }

        let mut outputs = vec![TXOutput::new(amount, to_address)?];
        if accumulated > amount {
            outputs.push(TXOutput::new(accumulated - amount, from_address)?);
        }

        let mut tx = Transaction {
            id: Vec::new(),
            inputs,
            outputs,
        };
        tx.id = tx.hash()?;
        Ok(tx)
    }

    /// `SHA256(serialise(self with id cleared))`.
    pub fn hash(&self) -> Result<Vec<u8>> {
        let mut copy = self.clone();
        copy.id = Vec::new();
        Ok(sha256(&copy.serialize()?))
    }

    /// Deep copy with every input's signature and pubkey cleared — the canonical
    /// form signed and verified per input.
    fn trimmed_copy(&self) -> Transaction {
        let inputs = self
            .inputs
            .iter()
            .map(|input| TXInput {
                ref_id: input.ref_id.clone(),
                ref_index: input.ref_index,
                signature: Vec::new(),
                pubkey: Vec::new(),
            })
            .collect();
        Transaction {
            id: self.id.clone(),
            inputs,
            outputs: self.outputs.clone(),
        }
    }

    /// Signs every input against `ref_tx`, a map from referenced txid to the
    /// transaction that produced the consumed output. No-op for coinbase.
    pub fn sign(&mut self, private_key: &[u8], ref_tx: &HashMap<Vec<u8>, Transaction>) -> Result<()> {
        if self.is_coinbase() {
            return Ok(());
        }

        for input in &self.inputs {
            if !ref_tx.contains_key(&input.ref_id) {
                return Err(EngineError::PrevTxMissing(hex_id(&input.ref_id)));
            }
        }

        let mut copy = self.trimmed_copy();
        for i in 0..self.inputs.len() {
            let input = &self.inputs[i];
            let prev = &ref_tx[&input.ref_id];
            let prev_out = prev
                .outputs
                .get(input.ref_index as usize)
                .ok_or_else(|| EngineError::PrevTxMissing(hex_id(&input.ref_id)))?;

            copy.inputs[i].pubkey = prev_out.pubkey_hash.clone();
            copy.id = copy.hash()?;
            copy.inputs[i].pubkey = Vec::new();

            let signature = crypto::sign(private_key, &copy.id)?;
            self.inputs[i].signature = signature;
        }
        Ok(())
    }

    /// Verifies every input against `ref_tx`. Always true for coinbase.
    pub fn verify(&self, ref_tx: &HashMap<Vec<u8>, Transaction>) -> Result<bool> {
        if self.is_coinbase() {
            return Ok(true);
        }

        for input in &self.inputs {
            if !ref_tx.contains_key(&input.ref_id) {
                return Err(EngineError::PrevTxMissing(hex_id(&input.ref_id)));
            }
        }

        let mut copy = self.trimmed_copy();
        for (i, input) in self.inputs.iter().enumerate() {
            let prev = &ref_tx[&input.ref_id];
            let prev_out = prev
                .outputs
                .get(input.ref_index as usize)
                .ok_or_else(|| EngineError::PrevTxMissing(hex_id(&input.ref_id)))?;

            copy.inputs[i].pubkey = prev_out.pubkey_hash.clone();
            copy.id = copy.hash()?;
            copy.inputs[i].pubkey = Vec::new();

            if input.pubkey.is_empty() {
                return Err(EngineError::UnknownPubkey(i));
            }
            if !crypto::verify(&input.pubkey, &input.signature, &copy.id)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Deterministic byte encoding, used both for persistence and as a Merkle leaf.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        bincode::serde::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| EngineError::TransactionCodec(e.to_string()))
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Transaction> {
        let (tx, _) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())
            .map_err(|e| EngineError::TransactionCodec(e.to_string()))?;
        Ok(tx)
    }

    /// Sum of output values. Coinbase transactions sum to the subsidy.
    pub fn output_value(&self) -> i64 {
        self.outputs.iter().map(|o| o.value).sum()
    }
}

fn hex_id(id: &[u8]) -> String {
    data_encoding::HEXLOWER.encode(id)
}
