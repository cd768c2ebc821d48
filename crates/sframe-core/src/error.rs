//! Error taxonomy for sealing, opening, the MLS bridge, and session-level
//! orchestration.

use thiserror::Error;

/// Errors from [`crate::receiver::ReceiverContext::open`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OpenError {
    /// AEAD tag did not verify. Frame is dropped; replay-window state is
    /// rolled back to what it was before this call; rate-limited log.
    #[error("authentication failed")]
    AuthFailed,

    /// CTR is outside the replay window, or its bit in the window is
    /// already set.
    #[error("replayed or too-old frame counter")]
    Replay,

    /// The record's KID does not match this context's KID.
    #[error("wrong key identifier in record")]
    WrongKey,

    /// The header bytes did not decode.
    #[error("malformed header: {0}")]
    HeaderMalformed(#[from] sframe_proto::HeaderError),

    /// No receiver context exists yet for this KID (expected during
    /// startup, before any epoch is installed).
    #[error("no context installed for this key identifier")]
    NoContext,
}

/// Errors from [`crate::sender::SenderContext::seal`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SealError {
    /// The frame counter would overflow `u64::MAX`. The counter is not
    /// consumed; the sender halts until an epoch rotation.
    #[error("sender frame counter exhausted")]
    CounterExhausted,

    /// Plaintext exceeds the maximum frame size.
    #[error("plaintext of {len} bytes exceeds the {max}-byte limit")]
    PlaintextTooLarge {
        /// Length of the rejected plaintext.
        len: usize,
        /// Maximum accepted length.
        max: usize,
    },

    /// The header failed to encode (KID or CTR too wide for the wire form).
    #[error("header encoding failed: {0}")]
    HeaderEncoding(#[from] sframe_proto::HeaderError),
}

/// Errors from MLS bridge operations (`join`, `fetch_roster`, `resync`).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MlsBridgeError {
    /// The MLS server returned a non-2xx HTTP status.
    #[error("MLS server returned status {status}")]
    HttpStatus {
        /// HTTP status code.
        status: u16,
    },

    /// The request could not be sent, or the response could not be read.
    #[error("MLS bridge transport error: {0}")]
    Transport(String),

    /// The response body did not match the expected shape.
    #[error("MLS bridge response decoding error: {0}")]
    Decode(String),

    /// The operation did not complete before its timeout.
    #[error("MLS bridge operation timed out")]
    Timeout,
}

/// Top-level error surface for [`crate::session::SessionManager`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Wraps an [`OpenError`] that escalated past per-frame handling.
    #[error(transparent)]
    Open(#[from] OpenError),

    /// Wraps a [`SealError`] that escalated past per-frame handling.
    #[error(transparent)]
    Seal(#[from] SealError),

    /// An MLS bridge call failed.
    #[error(transparent)]
    MlsFailure(#[from] MlsBridgeError),

    /// The session was torn down while an operation was in flight.
    #[error("session was cancelled")]
    Cancelled,
}
