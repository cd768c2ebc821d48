//! `SFrame` record framing: `header ‖ ciphertext ‖ tag`.
//!
//! This module only handles the byte layout. The AEAD seal/open calls
//! themselves live in `sframe-crypto`; `sframe-core` wires the two together.

use crate::{
    errors::{HeaderError, Result},
    header::{self, Header},
};

/// An `SFrame` record split into its header and its AEAD-sealed body
/// (ciphertext immediately followed by the authentication tag).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SframeRecord {
    /// The encoded header bytes; also the AEAD associated data.
    pub header_bytes: Vec<u8>,
    /// Decoded (KID, CTR) pair.
    pub header: Header,
    /// Ciphertext immediately followed by the authentication tag.
    pub sealed_body: Vec<u8>,
}

impl SframeRecord {
    /// Assemble a record from a header and an already-sealed body.
    pub fn assemble(header: Header, sealed_body: Vec<u8>) -> Result<Self> {
        let header_bytes = header.encode()?;
        Ok(Self { header_bytes, header, sealed_body })
    }

    /// The full wire bytes: `header ‖ ciphertext ‖ tag`.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.header_bytes.len() + self.sealed_body.len());
        out.extend_from_slice(&self.header_bytes);
        out.extend_from_slice(&self.sealed_body);
        out
    }

    /// Parse a record from wire bytes, given the AEAD tag length for the
    /// configured suite.
    ///
    /// # Errors
    ///
    /// Propagates header decode errors, and reports
    /// [`HeaderError::Truncated`] if the remaining bytes are shorter than
    /// `tag_len` (i.e. there is no room for even an empty ciphertext plus
    /// tag).
    pub fn parse(bytes: &[u8], tag_len: usize) -> Result<Self> {
        let (header, header_len) = header::decode(bytes)?;
        let body = &bytes[header_len..];
        if body.len() < tag_len {
            return Err(HeaderError::Truncated { needed: header_len + tag_len, have: bytes.len() });
        }
        Ok(Self {
            header_bytes: bytes[..header_len].to_vec(),
            header,
            sealed_body: body.to_vec(),
        })
    }
}
