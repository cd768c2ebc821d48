//! Session-wide tunables.

use std::time::Duration;

use sframe_crypto::CipherSuite;

use crate::replay::DEFAULT_WIDTH;

/// Configuration for a [`crate::session::SessionManager`].
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Width (in bits) of each receiver context's replay window.
    pub replay_window_width: usize,
    /// How long a rekey may stall outbound frames before the session
    /// falls through `Closed` back to `Joining`.
    pub rekey_deadline: Duration,
    /// Timeout applied to each MLS bridge operation.
    pub mls_timeout: Duration,
    /// AEAD suite used by every Sender/Receiver context in this session.
    pub cipher_suite: CipherSuite,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            replay_window_width: DEFAULT_WIDTH,
            rekey_deadline: Duration::from_secs(2),
            mls_timeout: Duration::from_secs(10),
            cipher_suite: CipherSuite::Aes128GcmSha256,
        }
    }
}
