//! Error types for AEAD sealing/opening.

use thiserror::Error;

/// Errors produced by an [`crate::aead::AeadSuite`] implementation.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AeadError {
    /// The authentication tag did not verify, or the underlying cipher
    /// otherwise rejected the input. Ciphertext and tag are indistinguishable
    /// failure modes by design; callers must not try to tell them apart.
    #[error("AEAD authentication failed")]
    AuthFailed,
}

/// Result alias for AEAD operations.
pub type Result<T> = std::result::Result<T, AeadError>;
