//! A single ECDSA identity (`Wallet`) and the persisted address→wallet mapping
//! (`Wallets`) used to derive spending keys for a human-facing address.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use crate::codec::{base58_decode, base58_encode, checksum, pubkey_hash};
use crate::config::{ADDRESS_VERSION, CHECKSUM_LEN};
use crate::crypto::{self, GeneratedKeyPair};
use crate::error::{EngineError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    private_key: Vec<u8>,
    public_key: Vec<u8>,
}

impl Wallet {
    pub fn new() -> Result<Wallet> {
        let GeneratedKeyPair { pkcs8, public_key } = crypto::generate_keypair()?;
        Ok(Wallet {
            private_key: pkcs8,
            public_key,
        })
    }

    pub fn private_key(&self) -> &[u8] {
        &self.private_key
    }

    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }

    /// `base58_encode(version ‖ pubkey_hash ‖ checksum(version ‖ pubkey_hash))`.
    pub fn address(&self) -> String {
        address_from_pubkey_hash(&pubkey_hash(&self.public_key))
    }
}

/// Formats an address directly from a pubkey hash, e.g. to display the recipient of
/// a locked output without reconstructing a full `Wallet`.
pub fn address_from_pubkey_hash(pkh: &[u8]) -> String {
    let mut payload = vec![ADDRESS_VERSION];
    payload.extend_from_slice(pkh);
    let check = checksum(&payload);
    let mut full = payload;
    full.extend_from_slice(&check);
    base58_encode(&full)
}

/// Decodes `address`, verifies its checksum, and returns the embedded pubkey hash.
pub fn validate_address(address: &str) -> Result<Vec<u8>> {
    let decoded = base58_decode(address).map_err(|_| EngineError::InvalidAddress(address.to_string()))?;
    if decoded.len() <= CHECKSUM_LEN + 1 {
        return Err(EngineError::InvalidAddress(address.to_string()));
    }
    let (payload, want_checksum) = decoded.split_at(decoded.len() - CHECKSUM_LEN);
    if checksum(payload) != want_checksum {
        return Err(EngineError::InvalidAddress(address.to_string()));
    }
    Ok(payload[1..].to_vec())
}

const DEFAULT_WALLET_FILE: &str = "wallets.dat";

#[derive(Debug, Default)]
pub struct Wallets {
    wallets: HashMap<String, Wallet>,
    path: String,
}

impl Wallets {
    /// Loads the wallet set from `path` (or the default file name if `None`). A
    /// missing file means an empty set, not an error.
    pub fn load(path: Option<&str>) -> Result<Wallets> {
        let path = path.unwrap_or(DEFAULT_WALLET_FILE).to_string();
        let mut wallets = Wallets {
            wallets: HashMap::new(),
            path,
        };
        wallets.load_from_file()?;
        Ok(wallets)
    }

    pub fn create_wallet(&mut self) -> Result<String> {
        let wallet = Wallet::new()?;
        let address = wallet.address();
        self.wallets.insert(address.clone(), wallet);
        self.save_to_file()?;
        Ok(address)
    }

    pub fn addresses(&self) -> Vec<String> {
        self.wallets.keys().cloned().collect()
    }

    pub fn get(&self, address: &str) -> Option<&Wallet> {
        self.wallets.get(address)
    }

    fn load_from_file(&mut self) -> Result<()> {
        if !Path::new(&self.path).exists() {
            return Ok(());
        }
        let bytes = fs::read(&self.path)?;
        if bytes.is_empty() {
            return Ok(());
        }
        let (wallets, _) = bincode::serde::decode_from_slice::<HashMap<String, Wallet>, _>(
            &bytes,
            bincode::config::standard(),
        )
        .map_err(|e| EngineError::WalletCodec(e.to_string()))?;
        self.wallets = wallets;
        Ok(())
    }

    /// Writes the wallet set to a temporary sibling file, flushes and syncs it, then
    /// renames it over `self.path`. A crash mid-write leaves the original file intact.
    fn save_to_file(&self) -> Result<()> {
        let encoded = bincode::serde::encode_to_vec(&self.wallets, bincode::config::standard())
            .map_err(|e| EngineError::WalletCodec(e.to_string()))?;

        let tmp_path = format!("{}.tmp", self.path);
        {
            let mut file = OpenOptions::new()
                .create(true)
                .truncate(true)
                .write(true)
                .open(&tmp_path)?;
            file.write_all(&encoded)?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn address_roundtrips_through_validation() {
        let wallet = Wallet::new().unwrap();
        let address = wallet.address();
        let pkh = validate_address(&address).unwrap();
        assert_eq!(pkh, pubkey_hash(wallet.public_key()));
    }

    #[test]
    fn tampered_address_fails_validation() {
        let wallet = Wallet::new().unwrap();
        let mut address = wallet.address();
        let last = address.pop().unwrap();
        address.push(if last == 'z' { 'y' } else { 'z' });
        assert!(validate_address(&address).is_err());
    }

    #[test]
    fn missing_wallet_file_loads_as_empty_set() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("wallets.dat");
        let wallets = Wallets::load(Some(path.to_str().unwrap())).unwrap();
        assert!(wallets.addresses().is_empty());
    }

    #[test]
    fn create_wallet_persists_across_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("wallets.dat");
        let path_str = path.to_str().unwrap();

        let address = {
            let mut wallets = Wallets::load(Some(path_str)).unwrap();
            wallets.create_wallet().unwrap()
        };

        let reloaded = Wallets::load(Some(path_str)).unwrap();
        assert_eq!(reloaded.addresses(), vec![address.clone()]);
        assert!(reloaded.get(&address).is_some());
    }
}
