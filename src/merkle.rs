//! Balanced binary Merkle tree over a block's serialised transactions, used as the
//! transaction summary folded into the proof-of-work preimage.

use crate::codec::sha256;

/// Computes the Merkle root of `leaves`. If the number of leaves is odd, the last
/// leaf is duplicated before pairing. Panics on an empty leaf list: a block always
/// carries at least one transaction, so an empty list here is a caller bug, not a
/// runtime condition to recover from.
pub fn merkle_root(leaves: &[Vec<u8>]) -> Vec<u8> {
    assert!(!leaves.is_empty(), "merkle_root requires at least one leaf");

    let mut level: Vec<Vec<u8>> = leaves.iter().map(|leaf| sha256(leaf)).collect();

    while level.len() > 1 {
        if level.len() % 2 != 0 {
            level.push(level.last().unwrap().clone());
        }
        level = level
            .chunks(2)
            .map(|pair| {
                let mut combined = pair[0].clone();
                combined.extend_from_slice(&pair[1]);
                sha256(&combined)
            })
            .collect();
    }

    level.into_iter().next().unwrap()
}
