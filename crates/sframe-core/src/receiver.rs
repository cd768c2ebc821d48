//! Per-remote-sender receive context: one per (remote sender, epoch).
//!
//! A remote sender's audio and video frames share one monotonic counter
//! sequence and so one replay window — only the KID in the header tells
//! them apart. A context therefore accepts either of a sender's two KIDs.

use sframe_crypto::{AeadSuite, Aes128GcmSha256, SenderKeyMaterial, build_nonce};
use sframe_proto::SframeRecord;

use crate::{
    error::OpenError,
    replay::{DEFAULT_WIDTH, ReplayWindow},
};

/// Receive-side decryption state for one remote sender in one epoch.
pub struct ReceiverContext {
    material: SenderKeyMaterial,
    kid_audio: u64,
    kid_video: u64,
    window: ReplayWindow,
    suite: Aes128GcmSha256,
}

impl ReceiverContext {
    /// Build a context with the default replay-window width.
    #[must_use]
    pub fn new(material: SenderKeyMaterial, kid_audio: u64, kid_video: u64) -> Self {
        Self::with_window_width(material, kid_audio, kid_video, DEFAULT_WIDTH)
    }

    /// Build a context with a specific replay-window width (in bits, a
    /// multiple of 64).
    #[must_use]
    pub fn with_window_width(material: SenderKeyMaterial, kid_audio: u64, kid_video: u64, width: usize) -> Self {
        Self { material, kid_audio, kid_video, window: ReplayWindow::new(width), suite: Aes128GcmSha256 }
    }

    /// The two KIDs (audio, video) this context accepts.
    #[must_use]
    pub fn kids(&self) -> (u64, u64) {
        (self.kid_audio, self.kid_video)
    }

    /// Decode, authenticate, and replay-check a wire record, returning its
    /// plaintext.
    ///
    /// # Errors
    ///
    /// - [`OpenError::HeaderMalformed`] if the header does not decode.
    /// - [`OpenError::WrongKey`] if the record's KID matches neither of
    ///   this context's KIDs.
    /// - [`OpenError::Replay`] if the counter is outside the window or
    ///   already seen.
    /// - [`OpenError::AuthFailed`] if the AEAD tag does not verify; the
    ///   provisional replay-window update is rolled back in this case.
    pub fn open(&mut self, record: &[u8]) -> Result<Vec<u8>, OpenError> {
        let parsed = SframeRecord::parse(record, sframe_crypto::TAG_LEN)?;

        if parsed.header.kid != self.kid_audio && parsed.header.kid != self.kid_video {
            return Err(OpenError::WrongKey);
        }

        let snapshot = self.window.check_and_accept(parsed.header.ctr).map_err(|_| OpenError::Replay)?;

        let nonce = build_nonce(&self.material.salt, parsed.header.ctr);
        if let Ok(plaintext) = self.suite.open(&self.material.key, &nonce, &parsed.header_bytes, &parsed.sealed_body) {
            Ok(plaintext)
        } else {
            self.window.restore(snapshot);
            Err(OpenError::AuthFailed)
        }
    }
}
