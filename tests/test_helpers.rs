use std::collections::HashMap;

use edgecoin::{Chain, Result, Transaction, UtxoIndex, Wallet};
use tempfile::TempDir;

/// A fresh temp directory plus the chain-database path inside it, so parallel
/// `cargo test` runs never collide on a shared `blockchain.db`.
pub fn temp_chain_path(dir: &TempDir) -> String {
    dir.path().join("chain.db").to_string_lossy().to_string()
}

/// Creates a chain database with a fresh wallet as its genesis miner and
/// reindexes the UTXO set, as the `chain` CLI subcommand would.
pub fn create_chain_with_fresh_wallet(dir: &TempDir) -> (Chain, Wallet) {
    let wallet = Wallet::new().expect("failed to generate wallet");
    let chain = Chain::create(&temp_chain_path(dir), &wallet.address()).expect("failed to create chain");
    (chain, wallet)
}

/// Mints a coinbase of the subsidy to `from` alongside a signed transfer of
/// `amount` from `from` to `to`, mined as a single block — the same semantics
/// as the `trade` CLI subcommand.
pub fn trade(chain: &mut Chain, index: &UtxoIndex, from: &Wallet, to: &Wallet, amount: i64) -> Result<()> {
    let from_pkh = edgecoin::codec::pubkey_hash(from.public_key());
    let (accumulated, chosen) = index.find_spendable_outputs(&from_pkh, amount)?;

    let mut ref_tx = HashMap::new();
    for txid in chosen.keys() {
        let prev = chain.find_transaction(txid)?;
        ref_tx.insert(prev.id.clone(), prev);
    }

    let mut transfer = Transaction::new_transfer(
        &from.address(),
        from.public_key(),
        &to.address(),
        amount,
        accumulated,
        &chosen,
    )?;
    transfer.sign(from.private_key(), &ref_tx)?;

    let coinbase = Transaction::new_coinbase(&from.address(), b"trade reward".to_vec())?;

    let block = chain.add_block(vec![coinbase, transfer], &ref_tx)?;
    index.update(&block)?;
    Ok(())
}
