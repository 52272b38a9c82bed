//! Byte-level primitives shared by addresses, transactions, and the PoW preimage:
//! Base58Check encoding, the pubkey-hash and checksum functions, and fixed-width
//! big-endian integer encoding.

use crate::error::{EngineError, Result};
use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

use crate::config::CHECKSUM_LEN;

/// SHA-256 of `data`.
pub fn sha256(data: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().to_vec()
}

/// `RIPEMD160(SHA256(pubkey))`, the 20-byte identity an output is locked to.
pub fn pubkey_hash(pubkey: &[u8]) -> Vec<u8> {
    let sha = sha256(pubkey);
    let mut hasher = Ripemd160::new();
    hasher.update(&sha);
    hasher.finalize().to_vec()
}

/// `SHA256(SHA256(payload))[:CHECKSUM_LEN]`.
pub fn checksum(payload: &[u8]) -> Vec<u8> {
    let once = sha256(payload);
    let twice = sha256(&once);
    twice[..CHECKSUM_LEN].to_vec()
}

/// Base58 over the alphabet `123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz`,
/// preserving one leading `'1'` per leading `0x00` byte of `data`.
pub fn base58_encode(data: &[u8]) -> String {
    bs58::encode(data).into_string()
}

/// Inverse of [`base58_encode`].
pub fn base58_decode(data: &str) -> Result<Vec<u8>> {
    bs58::decode(data)
        .into_vec()
        .map_err(|e| EngineError::InvalidAddress(e.to_string()))
}

/// 8-byte big-endian two's-complement encoding of a signed 64-bit integer.
pub fn int64_to_bytes(n: i64) -> [u8; 8] {
    n.to_be_bytes()
}

/// Inverse of [`int64_to_bytes`].
pub fn int64_from_bytes(bytes: &[u8; 8]) -> i64 {
    i64::from_be_bytes(*bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base58_round_trips() {
        let data = b"hello blockchain world, this is a test".to_vec();
        let encoded = base58_encode(&data);
        let decoded = base58_decode(&encoded).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn base58_preserves_leading_zero_bytes() {
        let data = vec![0x00, 0x00, 1, 2, 3];
        let encoded = base58_encode(&data);
        assert!(encoded.starts_with("11"));
        assert_eq!(base58_decode(&encoded).unwrap(), data);
    }

    #[test]
    fn pubkey_hash_is_20_bytes_and_deterministic() {
        let pubkey = vec![7u8; 64];
        let h1 = pubkey_hash(&pubkey);
        let h2 = pubkey_hash(&pubkey);
        assert_eq!(h1.len(), 20);
        assert_eq!(h1, h2);
    }

    #[test]
    fn checksum_is_four_bytes() {
        let payload = vec![0x00u8; 21];
        assert_eq!(checksum(&payload).len(), CHECKSUM_LEN);
    }

    #[test]
    fn known_bitcoin_address_validates() {
        let addr = "1BoatSLRHtKNngkdXEeobR76b53LETtpyT";
        let decoded = base58_decode(addr).unwrap();
        assert_eq!(decoded.len(), 1 + 20 + CHECKSUM_LEN);
        let (payload, check) = decoded.split_at(decoded.len() - CHECKSUM_LEN);
        assert_eq!(checksum(payload), check);

        let mut tampered = addr.to_string();
        tampered.pop();
        tampered.push(if addr.ends_with('T') { 'z' } else { 'T' });
        let decoded_tampered = base58_decode(&tampered).unwrap();
        let (payload2, check2) = decoded_tampered.split_at(decoded_tampered.len() - CHECKSUM_LEN);
        assert_ne!(checksum(payload2), check2);
    }

    #[test]
    fn int64_round_trips_negative_and_positive() {
        for n in [0i64, 1, -1, i64::MAX, i64::MIN, 123_456_789] {
            assert_eq!(int64_from_bytes(&int64_to_bytes(n)), n);
        }
    }
}
