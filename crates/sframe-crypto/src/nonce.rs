//! Deterministic nonce construction from a per-sender salt and frame counter.

use crate::aead::NONCE_LEN;

/// Build the AEAD nonce for `ctr` under `salt`.
///
/// `nonce = salt XOR (00 00 00 00 ‖ ctr_big_endian_8_bytes)`: the counter is
/// zero-extended on the left to 12 bytes, then `XORed` byte-for-byte with the
/// salt. Distinct `ctr` values under one salt always yield distinct nonces.
#[must_use]
pub fn build_nonce(salt: &[u8; NONCE_LEN], ctr: u64) -> [u8; NONCE_LEN] {
    let mut nonce = *salt;
    let ctr_bytes = ctr.to_be_bytes();
    for (i, byte) in ctr_bytes.iter().enumerate() {
        nonce[NONCE_LEN - ctr_bytes.len() + i] ^= byte;
    }
    nonce
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn nonce_structure() {
        let salt = [0xFFu8; NONCE_LEN];
        let nonce = build_nonce(&salt, 0x0102_0304_0506_0708);

        // Top 4 bytes are untouched (ctr is zero there).
        assert_eq!(&nonce[0..4], &[0xFF; 4]);
        // Bottom 8 bytes are salt XOR ctr big-endian bytes.
        assert_eq!(&nonce[4..12], &[0xFE, 0xFD, 0xFC, 0xFB, 0xFA, 0xF9, 0xF8, 0xF7]);
    }

    #[test]
    fn zero_ctr_leaves_salt_unchanged() {
        let salt = [0x42u8; NONCE_LEN];
        assert_eq!(build_nonce(&salt, 0), salt);
    }

    proptest! {
        #[test]
        fn distinct_counters_yield_distinct_nonces(salt in any::<[u8; NONCE_LEN]>(), a in any::<u64>(), b in any::<u64>()) {
            prop_assume!(a != b);
            prop_assert_ne!(build_nonce(&salt, a), build_nonce(&salt, b));
        }
    }
}
