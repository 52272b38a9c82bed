//! Secondary index mapping each transaction id with unspent outputs to the current
//! set of those outputs, kept coherent with the block store via reindex (full
//! rebuild) and incremental per-block updates.

use data_encoding::HEXLOWER;
use std::collections::{HashMap, HashSet};

use crate::block::Block;
use crate::config::UTXO_TREE;
use crate::error::{EngineError, Result};
use crate::store::Chain;
use crate::transaction::TXOutput;

/// Reads and writes the `"utxo"` sled tree. Holds no state of its own beyond a
/// borrow of the chain, so it is cheap to construct per operation.
pub struct UtxoIndex<'a> {
    chain: &'a Chain,
}

fn encode_outputs(outputs: &[TXOutput]) -> Result<Vec<u8>> {
    bincode::serde::encode_to_vec(outputs, bincode::config::standard())
        .map_err(|e| EngineError::UtxoCodec(e.to_string()))
}

fn decode_outputs(bytes: &[u8]) -> Result<Vec<TXOutput>> {
    let (outputs, _) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())
        .map_err(|e| EngineError::UtxoCodec(e.to_string()))?;
    Ok(outputs)
}

impl<'a> UtxoIndex<'a> {
    pub fn new(chain: &'a Chain) -> UtxoIndex<'a> {
        UtxoIndex { chain }
    }

    /// Drops and rebuilds the UTXO tree from a full walk of the chain, tip to
    /// genesis, tracking which output indices have been spent so far (in reverse
    /// chronological order) and keeping everything else.
    pub fn reindex(&self) -> Result<()> {
        let tree = self.chain.db().open_tree(UTXO_TREE)?;
        tree.clear()?;

        let mut spent: HashMap<Vec<u8>, HashSet<usize>> = HashMap::new();
        let mut live: HashMap<Vec<u8>, Vec<(usize, TXOutput)>> = HashMap::new();

        for block in self.chain.iterator()? {
            let block: Block = block?;
            for tx in &block.transactions {
                let spent_here = spent.entry(tx.id.clone()).or_default();
                for (index, output) in tx.outputs.iter().enumerate() {
                    if !spent_here.contains(&index) {
                        live.entry(tx.id.clone())
                            .or_default()
                            .push((index, output.clone()));
                    }
                }

                if !tx.is_coinbase() {
                    for input in &tx.inputs {
                        spent
                            .entry(input.ref_id.clone())
                            .or_default()
                            .insert(input.ref_index as usize);
                    }
                }
            }
        }

        for (txid, mut indexed_outputs) in live {
            indexed_outputs.sort_by_key(|(index, _)| *index);
            let outputs: Vec<TXOutput> = indexed_outputs.into_iter().map(|(_, out)| out).collect();
            tree.insert(txid.as_slice(), encode_outputs(&outputs)?)?;
        }

        tracing::info!("reindexed utxo set");
        Ok(())
    }

    /// Applies the incremental update for a newly appended block: for each
    /// non-coinbase input, remove the spent output (deleting the entry if it
    /// becomes empty); then record every transaction's own outputs.
    pub fn update(&self, block: &Block) -> Result<()> {
        let tree = self.chain.db().open_tree(UTXO_TREE)?;

        for tx in &block.transactions {
            if !tx.is_coinbase() {
                for input in &tx.inputs {
                    if let Some(bytes) = tree.get(input.ref_id.as_slice())? {
                        let outputs = decode_outputs(&bytes)?;
                        let remaining: Vec<TXOutput> = outputs
                            .into_iter()
                            .enumerate()
                            .filter(|(index, _)| *index != input.ref_index as usize)
                            .map(|(_, out)| out)
                            .collect();
                        if remaining.is_empty() {
                            tree.remove(input.ref_id.as_slice())?;
                        } else {
                            tree.insert(input.ref_id.as_slice(), encode_outputs(&remaining)?)?;
                        }
                    }
                }
            }
            tree.insert(tx.id.as_slice(), encode_outputs(&tx.outputs)?)?;
        }

        Ok(())
    }

    /// Scans the index for outputs locked to `pkh`, accumulating value until it
    /// reaches `amount` (or the index is exhausted). Returns the accumulated value
    /// and a map from txid to the indices chosen.
    pub fn find_spendable_outputs(
        &self,
        pkh: &[u8],
        amount: i64,
    ) -> Result<(i64, HashMap<Vec<u8>, Vec<usize>>)> {
        let tree = self.chain.db().open_tree(UTXO_TREE)?;
        let mut accumulated = 0i64;
        let mut chosen: HashMap<Vec<u8>, Vec<usize>> = HashMap::new();

        for item in tree.iter() {
            let (txid, bytes) = item?;
            if accumulated >= amount {
                break;
            }
            let outputs = decode_outputs(&bytes)?;
            for (index, output) in outputs.iter().enumerate() {
                if accumulated >= amount {
                    break;
                }
                if output.is_locked_with(pkh) {
                    accumulated += output.value;
                    chosen.entry(txid.to_vec()).or_default().push(index);
                }
            }
        }

        Ok((accumulated, chosen))
    }

    /// Sum of every unspent output locked to `pkh`.
    pub fn balance(&self, pkh: &[u8]) -> Result<i64> {
        let tree = self.chain.db().open_tree(UTXO_TREE)?;
        let mut total = 0i64;
        for item in tree.iter() {
            let (_, bytes) = item?;
            let outputs = decode_outputs(&bytes)?;
            total += outputs
                .iter()
                .filter(|o| o.is_locked_with(pkh))
                .map(|o| o.value)
                .sum::<i64>();
        }
        Ok(total)
    }

    /// Snapshot of the whole index as `txid (hex) -> outputs`, for equality checks
    /// between an incrementally updated index and a freshly reindexed one.
    pub fn snapshot(&self) -> Result<HashMap<String, Vec<TXOutput>>> {
        let tree = self.chain.db().open_tree(UTXO_TREE)?;
        let mut snapshot = HashMap::new();
        for item in tree.iter() {
            let (txid, bytes) = item?;
            snapshot.insert(HEXLOWER.encode(&txid), decode_outputs(&bytes)?);
        }
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::pubkey_hash;
    use crate::transaction::Transaction;
    use crate::wallet::Wallet;
    use std::collections::HashMap as StdHashMap;
    use tempfile::TempDir;

    fn temp_chain(dir: &TempDir, address: &str) -> Chain {
        let path = dir.path().join("chain.db").to_string_lossy().to_string();
        Chain::create(&path, address).unwrap()
    }

    #[test]
    fn reindex_after_genesis_finds_coinbase_output() {
        let dir = TempDir::new().unwrap();
        let wallet = Wallet::new().unwrap();
        let chain = temp_chain(&dir, &wallet.address());

        let index = UtxoIndex::new(&chain);
        index.reindex().unwrap();

        let pkh = pubkey_hash(wallet.public_key());
        assert_eq!(index.balance(&pkh).unwrap(), 10);
    }

    #[test]
    fn incremental_update_matches_reindex_after_spend() {
        let dir = TempDir::new().unwrap();
        let from = Wallet::new().unwrap();
        let to = Wallet::new().unwrap();
        let mut chain = temp_chain(&dir, &from.address());

        let index = UtxoIndex::new(&chain);
        index.reindex().unwrap();

        let genesis_tx = chain
            .iterator()
            .unwrap()
            .next()
            .unwrap()
            .unwrap()
            .transactions[0]
            .clone();
        let mut ref_tx = StdHashMap::new();
        ref_tx.insert(genesis_tx.id.clone(), genesis_tx.clone());

        let from_pkh = pubkey_hash(from.public_key());
        let (accumulated, chosen) = index.find_spendable_outputs(&from_pkh, 4).unwrap();

        let mut transfer = Transaction::new_transfer(
            &from.address(),
            from.public_key(),
            &to.address(),
            4,
            accumulated,
            &chosen,
        )
        .unwrap();
        transfer.sign(from.private_key(), &ref_tx).unwrap();
        ref_tx.insert(transfer.id.clone(), transfer.clone());

        let block = chain.add_block(vec![transfer], &ref_tx).unwrap();
        index.update(&block).unwrap();

        let incremental_snapshot = index.snapshot().unwrap();
        index.reindex().unwrap();
        let reindexed_snapshot = index.snapshot().unwrap();

        assert_eq!(incremental_snapshot, reindexed_snapshot);

        let to_pkh = pubkey_hash(to.public_key());
        assert_eq!(index.balance(&to_pkh).unwrap(), 4);
    }
}
