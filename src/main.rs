use std::collections::HashMap;

use clap::{Parser, Subcommand};
use edgecoin::wallet::validate_address;
use edgecoin::{Chain, Config, EngineError, Result, Transaction, UtxoIndex, Wallets};
use tracing::info;
use tracing_subscriber::{
    filter::{EnvFilter, LevelFilter},
    fmt,
    prelude::*,
};

#[derive(Debug, Parser)]
#[command(name = "edgecoin")]
struct Opt {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(about = "Create a new wallet and print its address")]
    Wallet,
    #[command(about = "Print every address in the local wallet set")]
    List,
    #[command(about = "Create the chain database, mining its genesis coinbase to ADDRESS")]
    Chain {
        #[arg(long)]
        address: String,
    },
    #[command(about = "Print the balance of ADDRESS")]
    Balance {
        #[arg(long)]
        address: String,
    },
    #[command(about = "Mint a coinbase to FROM and transfer AMOUNT from FROM to TO in one block")]
    Trade {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        #[arg(long)]
        amount: i64,
    },
    #[command(about = "Rebuild the UTXO index from a full walk of the chain")]
    Reindex,
    #[command(about = "Print every block from the tip back to genesis")]
    Print,
    #[command(about = "Print this help text")]
    Help,
}

fn initialize_logging(filter: &str) {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .parse_lossy(filter);

    tracing_subscriber::registry()
        .with(fmt::layer().with_filter(filter))
        .init();
}

fn cmd_wallet(cfg: &Config) -> Result<()> {
    let mut wallets = Wallets::load(Some(&cfg.wallet_file))?;
    let address = wallets.create_wallet()?;
    info!(address = %address, "created wallet");
    println!("Your new address: {}", address);
    Ok(())
}

fn cmd_list(cfg: &Config) -> Result<()> {
    let wallets = Wallets::load(Some(&cfg.wallet_file))?;
    for address in wallets.addresses() {
        println!("{}", address);
    }
    Ok(())
}

fn cmd_chain(cfg: &Config, address: &str) -> Result<()> {
    validate_address(address)?;
    let chain = Chain::create(&cfg.db_dir, address)?;
    UtxoIndex::new(&chain).reindex()?;
    info!(address, "chain created");
    println!("Chain created, genesis coinbase paid to {}", address);
    chain.close();
    Ok(())
}

fn cmd_balance(cfg: &Config, address: &str) -> Result<()> {
    let pkh = validate_address(address)?;
    let chain = Chain::load(&cfg.db_dir)?;
    let balance = UtxoIndex::new(&chain).balance(&pkh)?;
    println!("Balance of {}: {}", address, balance);
    chain.close();
    Ok(())
}

/// Mints a coinbase of the subsidy to `from` alongside the signed transfer, per the
/// observed `start_trade` behaviour: a trade is never mempool-pooled, it is mined
/// immediately as its own block with an unconditional reward to the sender.
fn cmd_trade(cfg: &Config, from: &str, to: &str, amount: i64) -> Result<()> {
    let wallets = Wallets::load(Some(&cfg.wallet_file))?;
    let wallet = wallets
        .get(from)
        .ok_or_else(|| EngineError::WalletNotFound(from.to_string()))?;

    let mut chain = Chain::load(&cfg.db_dir)?;
    let index = UtxoIndex::new(&chain);

    let from_pkh = edgecoin::codec::pubkey_hash(wallet.public_key());
    let (accumulated, chosen) = index.find_spendable_outputs(&from_pkh, amount)?;

    let mut ref_tx = HashMap::new();
    for txid in chosen.keys() {
        let prev = chain.find_transaction(txid)?;
        ref_tx.insert(prev.id.clone(), prev);
    }

    let mut transfer =
        Transaction::new_transfer(from, wallet.public_key(), to, amount, accumulated, &chosen)?;
    transfer.sign(wallet.private_key(), &ref_tx)?;

    let coinbase = Transaction::new_coinbase(from, b"trade reward".to_vec())?;

    let block = chain.add_block(vec![coinbase, transfer], &ref_tx)?;
    index.update(&block)?;

    info!(from, to, amount, "trade mined");
    println!("Mined block with trade {} -> {} for {}", from, to, amount);
    chain.close();
    Ok(())
}

fn cmd_reindex(cfg: &Config) -> Result<()> {
    let chain = Chain::load(&cfg.db_dir)?;
    UtxoIndex::new(&chain).reindex()?;
    println!("UTXO index rebuilt");
    chain.close();
    Ok(())
}

fn cmd_print(cfg: &Config) -> Result<()> {
    let chain = Chain::load(&cfg.db_dir)?;
    for block in chain.iterator()? {
        let block = block?;
        println!(
            "Pre block hash: {}",
            data_encoding::HEXLOWER.encode(&block.prev_block_hash)
        );
        println!("Cur block hash: {}", data_encoding::HEXLOWER.encode(&block.hash));
        println!("Timestamp: {}", block.timestamp);
        for tx in &block.transactions {
            println!("- tx {}", data_encoding::HEXLOWER.encode(&tx.id));
            if !tx.is_coinbase() {
                for input in &tx.inputs {
                    println!(
                        "  input ref_id={} ref_index={}",
                        data_encoding::HEXLOWER.encode(&input.ref_id),
                        input.ref_index
                    );
                }
            }
            for output in &tx.outputs {
                println!(
                    "  output value={} to={}",
                    output.value,
                    edgecoin::wallet::address_from_pubkey_hash(&output.pubkey_hash)
                );
            }
        }
        println!();
    }
    chain.close();
    Ok(())
}

fn cmd_help() {
    use clap::CommandFactory;
    Opt::command().print_long_help().expect("stdout is writable");
    println!();
}

fn process_command(cfg: &Config, command: Command) -> Result<()> {
    match command {
        Command::Wallet => cmd_wallet(cfg),
        Command::List => cmd_list(cfg),
        Command::Chain { address } => cmd_chain(cfg, &address),
        Command::Balance { address } => cmd_balance(cfg, &address),
        Command::Trade { from, to, amount } => cmd_trade(cfg, &from, &to, amount),
        Command::Reindex => cmd_reindex(cfg),
        Command::Print => cmd_print(cfg),
        Command::Help => {
            cmd_help();
            Ok(())
        }
    }
}

fn main() {
    let cfg = Config::from_env();
    initialize_logging(&cfg.log_filter);

    let opt = Opt::parse();

    if let Err(e) = process_command(&cfg, opt.command) {
        tracing::error!(error = %e, "command failed");
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
