//! Authenticated-encryption primitive, pluggable by suite.

use aes_gcm::{
    Aes128Gcm, Nonce,
    aead::{Aead, KeyInit, Payload},
};

use crate::errors::{AeadError, Result};

/// Key length in bytes for the default suite.
pub const KEY_LEN: usize = 16;
/// Nonce length in bytes for the default suite.
pub const NONCE_LEN: usize = 12;
/// Authentication tag length in bytes for the default suite.
pub const TAG_LEN: usize = 16;

/// Identifies which AEAD suite a Sender/Receiver context was built with.
///
/// Fixed for the lifetime of a context and never carried on the wire — both
/// ends agree on it out of band, via group configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CipherSuite {
    /// AES-128-GCM with a 12-byte nonce and 16-byte tag.
    Aes128GcmSha256,
}

/// A seal/open primitive over fixed-length key and nonce material.
///
/// Implementations are pure functions of their inputs: no internal state,
/// no key storage. Callers (`SenderContext`/`ReceiverContext`) own the key.
pub trait AeadSuite {
    /// Which suite this implements.
    fn suite(&self) -> CipherSuite;

    /// Encrypt `plaintext`, returning `ciphertext ‖ tag`.
    fn seal(&self, key: &[u8; KEY_LEN], nonce: &[u8; NONCE_LEN], aad: &[u8], plaintext: &[u8]) -> Vec<u8>;

    /// Decrypt `ciphertext_and_tag`, or fail if the tag does not verify.
    ///
    /// # Errors
    ///
    /// Returns [`AeadError::AuthFailed`] if authentication fails for any
    /// reason (wrong key, wrong nonce, tampered AAD/ciphertext/tag).
    fn open(
        &self,
        key: &[u8; KEY_LEN],
        nonce: &[u8; NONCE_LEN],
        aad: &[u8],
        ciphertext_and_tag: &[u8],
    ) -> Result<Vec<u8>>;
}

/// The default suite: AES-128-GCM-SHA256.
#[derive(Debug, Clone, Copy, Default)]
pub struct Aes128GcmSha256;

impl AeadSuite for Aes128GcmSha256 {
    fn suite(&self) -> CipherSuite {
        CipherSuite::Aes128GcmSha256
    }

    fn seal(&self, key: &[u8; KEY_LEN], nonce: &[u8; NONCE_LEN], aad: &[u8], plaintext: &[u8]) -> Vec<u8> {
        let cipher = Aes128Gcm::new(key.into());
        let nonce = Nonce::from_slice(nonce);
        let Ok(sealed) = cipher.encrypt(nonce, Payload { msg: plaintext, aad }) else {
            unreachable!("AES-128-GCM encryption cannot fail for bounded-size media frames");
        };
        sealed
    }

    fn open(
        &self,
        key: &[u8; KEY_LEN],
        nonce: &[u8; NONCE_LEN],
        aad: &[u8],
        ciphertext_and_tag: &[u8],
    ) -> Result<Vec<u8>> {
        let cipher = Aes128Gcm::new(key.into());
        let nonce = Nonce::from_slice(nonce);
        cipher
            .decrypt(nonce, Payload { msg: ciphertext_and_tag, aad })
            .map_err(|_| AeadError::AuthFailed)
    }
}
