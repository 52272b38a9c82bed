//! ECDSA over NIST P-256, via `ring`. Public keys and signatures cross this module's
//! boundary in the spec's fixed-width raw form (64-byte X‖Y public keys, r‖s
//! signatures each half zero-padded to 32 bytes) rather than ring's native SEC1/ASN.1
//! encodings, so callers never have to think about curve point encoding.

use ring::rand::SystemRandom;
use ring::signature::{ECDSA_P256_SHA256_FIXED, ECDSA_P256_SHA256_FIXED_SIGNING, EcdsaKeyPair, KeyPair};

use crate::error::{EngineError, Result};

/// Coordinate / scalar width for P-256, in bytes.
const FIELD_LEN: usize = 32;

/// A freshly generated keypair: PKCS#8 document (for re-loading the private key) and
/// the raw 64-byte X‖Y public key.
pub struct GeneratedKeyPair {
    pub pkcs8: Vec<u8>,
    pub public_key: Vec<u8>,
}

/// Generates a new ECDSA P-256 keypair from the system RNG.
pub fn generate_keypair() -> Result<GeneratedKeyPair> {
    let rng = SystemRandom::new();
    let pkcs8 = EcdsaKeyPair::generate_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, &rng)
        .map_err(|e| EngineError::KeyPairGeneration(e.to_string()))?;
    let key_pair = EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, pkcs8.as_ref(), &rng)
        .map_err(|e| EngineError::KeyPairGeneration(e.to_string()))?;
    let public_key = sec1_to_raw(key_pair.public_key().as_ref())?;
    Ok(GeneratedKeyPair {
        pkcs8: pkcs8.as_ref().to_vec(),
        public_key,
    })
}

/// Derives the raw 64-byte public key for a PKCS#8-encoded private key.
pub fn public_key_from_pkcs8(pkcs8: &[u8]) -> Result<Vec<u8>> {
    let rng = SystemRandom::new();
    let key_pair = EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, pkcs8, &rng)
        .map_err(|e| EngineError::KeyPairGeneration(e.to_string()))?;
    sec1_to_raw(key_pair.public_key().as_ref())
}

/// Strips the SEC1 uncompressed tag (`0x04`) ring's `public_key()` returns, yielding
/// the fixed 64-byte X‖Y form this crate stores and transmits.
fn sec1_to_raw(sec1: &[u8]) -> Result<Vec<u8>> {
    if sec1.len() != 1 + 2 * FIELD_LEN || sec1[0] != 0x04 {
        return Err(EngineError::KeyPairGeneration(
            "unexpected public key encoding".to_string(),
        ));
    }
    Ok(sec1[1..].to_vec())
}

/// Re-adds the SEC1 uncompressed tag so `ring` can parse a raw 64-byte public key.
fn raw_to_sec1(raw: &[u8]) -> Result<Vec<u8>> {
    if raw.len() != 2 * FIELD_LEN {
        return Err(EngineError::UnknownPubkey(0));
    }
    let mut sec1 = Vec::with_capacity(1 + raw.len());
    sec1.push(0x04);
    sec1.extend_from_slice(raw);
    Ok(sec1)
}

/// Signs `message` with the private key encoded in `pkcs8`, returning `r‖s` with
/// each component zero-padded to [`FIELD_LEN`] bytes.
pub fn sign(pkcs8: &[u8], message: &[u8]) -> Result<Vec<u8>> {
    let rng = SystemRandom::new();
    let key_pair = EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, pkcs8, &rng)
        .map_err(|e| EngineError::Signing(e.to_string()))?;
    let signature = key_pair
        .sign(&rng, message)
        .map_err(|e| EngineError::Signing(e.to_string()))?;
    // ECDSA_P256_SHA256_FIXED_SIGNING already produces r‖s each fixed at FIELD_LEN bytes.
    Ok(signature.as_ref().to_vec())
}

/// Verifies a `r‖s` signature produced by [`sign`] against `public_key` (raw 64-byte
/// X‖Y form) and `message`.
pub fn verify(public_key: &[u8], signature: &[u8], message: &[u8]) -> Result<bool> {
    let sec1 = raw_to_sec1(public_key)?;
    let unparsed = ring::signature::UnparsedPublicKey::new(&ECDSA_P256_SHA256_FIXED, sec1);
    Ok(unparsed.verify(message, signature).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_public_key_is_64_bytes() {
        let kp = generate_keypair().unwrap();
        assert_eq!(kp.public_key.len(), 2 * FIELD_LEN);
    }

    #[test]
    fn sign_then_verify_round_trips() {
        let kp = generate_keypair().unwrap();
        let message = b"pay alice ten coins";
        let sig = sign(&kp.pkcs8, message).unwrap();
        assert_eq!(sig.len(), 2 * FIELD_LEN);
        assert!(verify(&kp.public_key, &sig, message).unwrap());
    }

    #[test]
    fn tampering_with_signature_invalidates_it() {
        let kp = generate_keypair().unwrap();
        let message = b"pay alice ten coins";
        let mut sig = sign(&kp.pkcs8, message).unwrap();
        sig[0] ^= 0xff;
        assert!(!verify(&kp.public_key, &sig, message).unwrap());
    }

    #[test]
    fn public_key_from_pkcs8_matches_generation() {
        let kp = generate_keypair().unwrap();
        let derived = public_key_from_pkcs8(&kp.pkcs8).unwrap();
        assert_eq!(derived, kp.public_key);
    }
}
