//! The persistent block store: an embedded, ACID key-value database holding blocks
//! keyed by hash plus a tip pointer, with tip-to-genesis iteration.

use sled::Db;
use std::collections::HashMap;
use std::path::Path;

use crate::block::Block;
use crate::config::{BLOCKS_TREE, TIP_KEY};
use crate::error::{EngineError, Result};
use crate::transaction::Transaction;

pub struct Chain {
    db: Db,
    tip: Vec<u8>,
}

impl Chain {
    /// Creates a new chain database at `path`, mining a genesis block whose
    /// coinbase pays `miner_address`. Fails with [`EngineError::AlreadyExists`] if
    /// the database file is already present.
    pub fn create(path: &str, miner_address: &str) -> Result<Chain> {
        if Path::new(path).exists() {
            return Err(EngineError::AlreadyExists(path.to_string()));
        }

        let db = sled::open(path)?;
        let blocks = db.open_tree(BLOCKS_TREE)?;

        let coinbase = Transaction::new_coinbase(miner_address, b"Genesis Coinbase".to_vec())?;
        let genesis = Block::genesis(coinbase)?;

        blocks.transaction(|tx_blocks| {
            tx_blocks.insert(
                genesis.hash.as_slice(),
                genesis
                    .serialize()
                    .map_err(sled::transaction::ConflictableTransactionError::Abort)?,
            )?;
            tx_blocks.insert(TIP_KEY.as_bytes(), genesis.hash.as_slice())?;
            Ok::<(), sled::transaction::ConflictableTransactionError<EngineError>>(())
        })
        .map_err(|e| EngineError::SledTransaction(e.to_string()))?;

        tracing::info!(path, miner_address, "created chain database with genesis block");

        Ok(Chain {
            db,
            tip: genesis.hash,
        })
    }

    /// Opens an existing chain database at `path`. Fails with
    /// [`EngineError::ChainNotFound`] if the file is absent.
    pub fn load(path: &str) -> Result<Chain> {
        if !Path::new(path).exists() {
            return Err(EngineError::ChainNotFound(path.to_string()));
        }

        let db = sled::open(path)?;
        let blocks = db.open_tree(BLOCKS_TREE)?;
        let tip = blocks
            .get(TIP_KEY.as_bytes())?
            .ok_or_else(|| EngineError::ChainNotFound(path.to_string()))?
            .to_vec();

        tracing::info!(path, "loaded chain database");
        Ok(Chain { db, tip })
    }

    pub fn db(&self) -> &Db {
        &self.db
    }

    pub fn tip(&self) -> &[u8] {
        &self.tip
    }

    /// Appends a new block over `transactions` on top of the current tip. Every
    /// non-coinbase transaction must verify against `ref_tx` (the transactions its
    /// inputs reference) or the append fails with `InvalidTransaction`.
    pub fn add_block(
        &mut self,
        transactions: Vec<Transaction>,
        ref_tx: &HashMap<Vec<u8>, Transaction>,
    ) -> Result<Block> {
        for tx in &transactions {
            if !tx.is_coinbase() && !tx.verify(ref_tx)? {
                return Err(EngineError::InvalidTransaction(
                    "signature verification failed".to_string(),
                ));
            }
        }

        let block = Block::new_block(transactions, self.tip.clone())?;

        let blocks = self.db.open_tree(BLOCKS_TREE)?;
        blocks
            .transaction(|tx_blocks| {
                tx_blocks.insert(
                    block.hash.as_slice(),
                    block
                        .serialize()
                        .map_err(sled::transaction::ConflictableTransactionError::Abort)?,
                )?;
                tx_blocks.insert(TIP_KEY.as_bytes(), block.hash.as_slice())?;
                Ok::<(), sled::transaction::ConflictableTransactionError<EngineError>>(())
            })
            .map_err(|e| EngineError::SledTransaction(e.to_string()))?;

        self.tip = block.hash.clone();
        tracing::info!(hash = %data_encoding::HEXLOWER.encode(&block.hash), "appended block");
        Ok(block)
    }

    /// Looks up a block by hash.
    pub fn get_block(&self, hash: &[u8]) -> Result<Option<Block>> {
        let blocks = self.db.open_tree(BLOCKS_TREE)?;
        match blocks.get(hash)? {
            Some(bytes) => Ok(Some(Block::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    /// An iterator walking blocks from the current tip back to genesis.
    pub fn iterator(&self) -> Result<ChainIterator<'_>> {
        Ok(ChainIterator {
            chain: self,
            current_hash: self.tip.clone(),
        })
    }

    /// Linear scan for a transaction by id via [`Chain::iterator`].
    pub fn find_transaction(&self, txid: &[u8]) -> Result<Transaction> {
        for block in self.iterator()? {
            let block = block?;
            for tx in block.transactions {
                if tx.id == txid {
                    return Ok(tx);
                }
            }
        }
        Err(EngineError::TxNotFound(data_encoding::HEXLOWER.encode(txid)))
    }

    /// Height of the chain (number of blocks from genesis to tip, inclusive).
    pub fn height(&self) -> Result<usize> {
        let mut count = 0;
        for block in self.iterator()? {
            block?;
            count += 1;
        }
        Ok(count)
    }

    /// Releases the embedded store handle. Idempotent; safe to call on every exit path.
    pub fn close(self) {
        drop(self.db);
    }
}

pub struct ChainIterator<'a> {
    chain: &'a Chain,
    current_hash: Vec<u8>,
}

impl<'a> Iterator for ChainIterator<'a> {
    type Item = Result<Block>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current_hash.is_empty() {
            return None;
        }
        match self.chain.get_block(&self.current_hash) {
            Ok(Some(block)) => {
                self.current_hash = block.prev_block_hash.clone();
                Some(Ok(block))
            }
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::Wallet;
    use tempfile::TempDir;

    fn temp_db_path(dir: &TempDir) -> String {
        dir.path().join("chain.db").to_string_lossy().to_string()
    }

    #[test]
    fn create_refuses_if_db_already_exists() {
        let dir = TempDir::new().unwrap();
        let path = temp_db_path(&dir);
        let address = Wallet::new().unwrap().address();

        let chain = Chain::create(&path, &address).unwrap();
        chain.close();

        let err = Chain::create(&path, &address).unwrap_err();
        assert!(matches!(err, EngineError::AlreadyExists(_)));
    }

    #[test]
    fn load_fails_if_db_absent() {
        let dir = TempDir::new().unwrap();
        let path = temp_db_path(&dir);
        let err = Chain::load(&path).unwrap_err();
        assert!(matches!(err, EngineError::ChainNotFound(_)));
    }

    #[test]
    fn genesis_chain_has_height_one_and_empty_prev_hash() {
        let dir = TempDir::new().unwrap();
        let path = temp_db_path(&dir);
        let address = Wallet::new().unwrap().address();

        let chain = Chain::create(&path, &address).unwrap();
        assert_eq!(chain.height().unwrap(), 1);

        let mut blocks: Vec<Block> = chain.iterator().unwrap().collect::<Result<_>>().unwrap();
        assert_eq!(blocks.len(), 1);
        let genesis = blocks.remove(0);
        assert!(genesis.prev_block_hash.is_empty());
    }

    #[test]
    fn append_block_updates_tip_and_is_found_by_iterator() {
        let dir = TempDir::new().unwrap();
        let path = temp_db_path(&dir);
        let address = Wallet::new().unwrap().address();

        let mut chain = Chain::create(&path, &address).unwrap();
        let coinbase = Transaction::new_coinbase(&address, b"reward".to_vec()).unwrap();
        let block = chain.add_block(vec![coinbase], &HashMap::new()).unwrap();

        assert_eq!(chain.tip(), block.hash.as_slice());
        assert_eq!(chain.height().unwrap(), 2);
        assert!(chain.find_transaction(&block.transactions[0].id).is_ok());
    }

    #[test]
    fn find_transaction_reports_not_found() {
        let dir = TempDir::new().unwrap();
        let path = temp_db_path(&dir);
        let address = Wallet::new().unwrap().address();
        let chain = Chain::create(&path, &address).unwrap();

        let err = chain.find_transaction(&[9u8; 32]).unwrap_err();
        assert!(matches!(err, EngineError::TxNotFound(_)));
    }
}
