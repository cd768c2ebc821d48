//! Error types for the `SFrame` header codec.

use thiserror::Error;

/// Errors produced while encoding or decoding an `SFrame` header.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderError {
    /// Buffer was too short to contain a complete header.
    #[error("header truncated: need at least {needed} bytes, have {have}")]
    Truncated {
        /// Minimum number of bytes required once the config byte was read.
        needed: usize,
        /// Bytes actually available.
        have: usize,
    },

    /// The config byte's MSB was not set, so this is not an `SFrame` record.
    ///
    /// This is a detection hint only: legacy cleartext frames are expected
    /// to fail here rather than panic or silently decode garbage.
    #[error("not an SFrame record (config byte MSB unset)")]
    NotAnSframeRecord,

    /// A KID or CTR value does not fit in the base (non-extended) header
    /// form, which encodes field lengths of 1-4 bytes.
    #[error("{field} value {value} does not fit in 4 bytes (base header form)")]
    FieldTooLarge {
        /// Which field overflowed ("kid" or "ctr").
        field: &'static str,
        /// The value that was rejected.
        value: u64,
    },
}

/// Result alias for header codec operations.
pub type Result<T> = std::result::Result<T, HeaderError>;
