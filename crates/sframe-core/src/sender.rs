//! Per-participant transmit context: one per local participant per epoch.

use sframe_crypto::{AeadSuite, Aes128GcmSha256, SenderKeyMaterial, build_nonce};
use sframe_proto::{Header, SframeRecord};

use crate::error::SealError;

/// Media stream a sealed frame belongs to. Selects which KID is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    /// `media_bit = 0`.
    Audio,
    /// `media_bit = 1`.
    Video,
}

/// Largest plaintext frame this core will seal, per the media-pipeline
/// contract.
pub const MAX_PLAINTEXT_LEN: usize = 1 << 20;

/// Transmit-side encryption state for one local participant in one epoch.
///
/// Holds a key, a nonce salt, one KID per media kind, and a monotonically
/// increasing frame counter. `seal` takes `&mut self`, so two concurrent
/// seals on one context are impossible at the type level.
pub struct SenderContext {
    material: SenderKeyMaterial,
    kid_audio: u64,
    kid_video: u64,
    ctr: u64,
    suite: Aes128GcmSha256,
}

impl SenderContext {
    /// Build a context from already-derived key material and KIDs.
    #[must_use]
    pub fn new(material: SenderKeyMaterial, kid_audio: u64, kid_video: u64) -> Self {
        Self { material, kid_audio, kid_video, ctr: 0, suite: Aes128GcmSha256 }
    }

    /// The current (next-to-use) frame counter. Exposed for tests and for
    /// the `CounterExhausted` signalling path.
    #[must_use]
    pub fn counter(&self) -> u64 {
        self.ctr
    }

    /// Force the next counter value, used to construct a context at a
    /// specific point in its sequence (tests, or resuming after a crash
    /// within the same epoch, which this design does not otherwise need).
    pub fn set_counter(&mut self, ctr: u64) {
        self.ctr = ctr;
    }

    /// KID this context uses for `kind`.
    #[must_use]
    pub fn kid_for(&self, kind: MediaKind) -> u64 {
        match kind {
            MediaKind::Audio => self.kid_audio,
            MediaKind::Video => self.kid_video,
        }
    }

    /// Seal `plaintext` into a wire-ready [`SframeRecord`].
    ///
    /// Selects the KID for `kind`, encodes the header, builds the nonce,
    /// seals, and increments the counter. Failures never consume the
    /// counter.
    ///
    /// # Errors
    ///
    /// - [`SealError::PlaintextTooLarge`] if `plaintext` exceeds
    ///   [`MAX_PLAINTEXT_LEN`].
    /// - [`SealError::CounterExhausted`] if the counter would overflow.
    /// - [`SealError::HeaderEncoding`] if the KID or counter no longer fit
    ///   the wire header's base form.
    pub fn seal(&mut self, kind: MediaKind, plaintext: &[u8]) -> Result<SframeRecord, SealError> {
        if plaintext.len() > MAX_PLAINTEXT_LEN {
            return Err(SealError::PlaintextTooLarge { len: plaintext.len(), max: MAX_PLAINTEXT_LEN });
        }

        let kid = self.kid_for(kind);
        let ctr = self.ctr;
        let next_ctr = ctr.checked_add(1).ok_or(SealError::CounterExhausted)?;

        let header = Header::new(kid, ctr);
        let header_bytes = header.encode()?;
        let nonce = build_nonce(&self.material.salt, ctr);
        let sealed_body = self.suite.seal(&self.material.key, &nonce, &header_bytes, plaintext);

        self.ctr = next_ctr;
        Ok(SframeRecord::assemble(header, sealed_body)?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn context() -> SenderContext {
        let material = SenderKeyMaterial { key: [1u8; sframe_crypto::KEY_LEN], salt: [2u8; sframe_crypto::NONCE_LEN] };
        SenderContext::new(material, 7_012_340_030, 7_012_340_031)
    }

    #[test]
    fn seal_selects_kid_by_media_kind() {
        let mut ctx = context();
        let audio = ctx.seal(MediaKind::Audio, b"hello").unwrap();
        let video = ctx.seal(MediaKind::Video, b"world").unwrap();
        assert_eq!(audio.header.kid, 7_012_340_030);
        assert_eq!(video.header.kid, 7_012_340_031);
    }

    #[test]
    fn seal_increments_counter_and_never_repeats_it() {
        let mut ctx = context();
        let r0 = ctx.seal(MediaKind::Audio, b"a").unwrap();
        let r1 = ctx.seal(MediaKind::Audio, b"b").unwrap();
        assert_eq!(r0.header.ctr, 0);
        assert_eq!(r1.header.ctr, 1);
    }

    #[test]
    fn seal_rejects_oversized_plaintext() {
        let mut ctx = context();
        let plaintext = vec![0u8; MAX_PLAINTEXT_LEN + 1];
        let err = ctx.seal(MediaKind::Audio, &plaintext).unwrap_err();
        assert!(matches!(err, SealError::PlaintextTooLarge { .. }));
    }

    #[test]
    fn counter_exhaustion_does_not_consume_the_counter() {
        let mut ctx = context();
        ctx.set_counter(u64::MAX);
        let err = ctx.seal(MediaKind::Audio, b"x").unwrap_err();
        assert_eq!(err, SealError::CounterExhausted);
        assert_eq!(ctx.counter(), u64::MAX);
    }
}
