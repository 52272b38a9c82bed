use once_cell::sync::Lazy;
use std::env;

/// Name of the sled tree holding block records and the chain tip pointer.
pub const BLOCKS_TREE: &str = "blocks";
/// Name of the sled tree holding the UTXO index.
pub const UTXO_TREE: &str = "utxo";
/// Key under which the current tip's block hash is stored in [`BLOCKS_TREE`].
pub const TIP_KEY: &str = "l";

/// Mining reward paid to a coinbase output.
pub const SUBSIDY: i64 = 10;
/// Fixed proof-of-work difficulty (leading zero bits required of the block hash).
pub const DIFFICULTY: u32 = 24;
/// Hard ceiling on the nonce search; reaching it without success is [`crate::error::EngineError::MiningExhausted`].
pub const MAX_NONCE: i64 = i64::MAX;

/// Address version byte.
pub const ADDRESS_VERSION: u8 = 0x00;
/// Length in bytes of the address checksum suffix.
pub const CHECKSUM_LEN: usize = 4;

static DEFAULT_DB_DIR: Lazy<String> =
    Lazy::new(|| env::var("EDGECOIN_DB_DIR").unwrap_or_else(|_| "blockchain.db".to_string()));
static DEFAULT_WALLET_FILE: Lazy<String> =
    Lazy::new(|| env::var("EDGECOIN_WALLET_FILE").unwrap_or_else(|_| "wallets.dat".to_string()));

/// Runtime configuration for a single invocation of the engine.
///
/// Built once at process start and threaded through explicitly; nothing here is read as a
/// hidden global after construction.
#[derive(Debug, Clone)]
pub struct Config {
    pub db_dir: String,
    pub wallet_file: String,
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            db_dir: DEFAULT_DB_DIR.clone(),
            wallet_file: DEFAULT_WALLET_FILE.clone(),
            log_filter: env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        }
    }
}

impl Config {
    /// Build configuration from the process environment, falling back to built-in defaults.
    pub fn from_env() -> Self {
        Config::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_fallbacks() {
        let cfg = Config::from_env();
        assert!(!cfg.db_dir.is_empty());
        assert!(!cfg.wallet_file.is_empty());
        assert!(!cfg.log_filter.is_empty());
    }
}
