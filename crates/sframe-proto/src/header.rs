//! Variable-length `SFrame` header: a (KID, CTR) pair encoded as a config
//! byte followed by big-endian field bytes.
//!
//! ```text
//! byte 0:   1 E E R  K K C C
//!           ^ ^ ^ ^  | |  |
//!           | | | |  | |  +-- CTR length in bytes, minus 1 (0..3)
//!           | | | |  | +----- KID length in bytes, minus 1 (0..3)
//!           | | | +---------- reserved, always 0
//!           | | +------------ CTR-extended: add 4 to the CTR length above
//!           | +-------------- KID-extended: add 4 to the KID length above
//!           +---------------- MSB = 1 (SFrame detection hint)
//! ```
//!
//! Following byte 0: `kid_len` KID bytes (big-endian), then `ctr_len` CTR
//! bytes (big-endian), where each length is `1..=4` normally and `5..=8`
//! with its extended bit set. This lets either field span the full `u64`
//! range, needed once a KID derived from large epoch/room numbers no longer
//! fits in 4 bytes.

use crate::errors::{HeaderError, Result};

/// Largest field width (in bytes) the header can encode.
const MAX_FIELD_BYTES: usize = 8;
/// Field width above which the extended-length bit must be set.
const BASE_FIELD_BYTES: usize = 4;

const KID_EXTENDED_BIT: u8 = 0b0100_0000;
const CTR_EXTENDED_BIT: u8 = 0b0010_0000;

/// A decoded `SFrame` header: a Key Identifier and a frame counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Key identifier selecting the sender/receiver context.
    pub kid: u64,
    /// Per-sender monotonic frame counter.
    pub ctr: u64,
}

impl Header {
    /// Build a header value. Does not itself validate field widths; that
    /// happens in [`encode`].
    #[must_use]
    pub fn new(kid: u64, ctr: u64) -> Self {
        Self { kid, ctr }
    }

    /// Encode this header to its wire form.
    pub fn encode(&self) -> Result<Vec<u8>> {
        encode(self.kid, self.ctr)
    }
}

/// Number of bytes needed to hold `value`, minimum 1.
fn min_bytes(value: u64) -> usize {
    let bits = 64 - value.leading_zeros() as usize;
    bits.div_ceil(8).max(1)
}

/// Splits a field's byte length into its base (1..=4) count and whether the
/// extended bit must be set.
fn field_length_bits(len: usize) -> (u8, bool) {
    if len <= BASE_FIELD_BYTES {
        ((len - 1) as u8, false)
    } else {
        ((len - BASE_FIELD_BYTES - 1) as u8, true)
    }
}

/// Encode a (KID, CTR) pair into its wire header byte string.
///
/// # Errors
///
/// Returns [`HeaderError::FieldTooLarge`] if `kid` or `ctr` needs more than
/// 8 bytes to represent (unreachable for any `u64` value, kept for callers
/// that construct a [`Header`] from untrusted arithmetic).
pub fn encode(kid: u64, ctr: u64) -> Result<Vec<u8>> {
    let kid_len = min_bytes(kid);
    if kid_len > MAX_FIELD_BYTES {
        return Err(HeaderError::FieldTooLarge { field: "kid", value: kid });
    }
    let ctr_len = min_bytes(ctr);
    if ctr_len > MAX_FIELD_BYTES {
        return Err(HeaderError::FieldTooLarge { field: "ctr", value: ctr });
    }

    let (kk, kid_extended) = field_length_bits(kid_len);
    let (cc, ctr_extended) = field_length_bits(ctr_len);

    let mut config = 0b1000_0000 | (kk << 2) | cc;
    if kid_extended {
        config |= KID_EXTENDED_BIT;
    }
    if ctr_extended {
        config |= CTR_EXTENDED_BIT;
    }

    let mut out = Vec::with_capacity(1 + kid_len + ctr_len);
    out.push(config);
    out.extend_from_slice(&kid.to_be_bytes()[8 - kid_len..]);
    out.extend_from_slice(&ctr.to_be_bytes()[8 - ctr_len..]);
    Ok(out)
}

/// Decode a wire header from the front of `bytes`.
///
/// Returns the decoded header and the number of bytes it occupied, so the
/// caller can locate where the ciphertext begins.
///
/// # Errors
///
/// - [`HeaderError::Truncated`] if `bytes` is shorter than the declared
///   header length (including the case where it's empty).
/// - [`HeaderError::NotAnSframeRecord`] if the config byte's MSB is unset.
pub fn decode(bytes: &[u8]) -> Result<(Header, usize)> {
    let &config = bytes.first().ok_or(HeaderError::Truncated { needed: 1, have: 0 })?;

    if config & 0b1000_0000 == 0 {
        return Err(HeaderError::NotAnSframeRecord);
    }

    let kid_base = usize::from((config >> 2) & 0b11) + 1;
    let ctr_base = usize::from(config & 0b11) + 1;
    let kid_len = if config & KID_EXTENDED_BIT != 0 { kid_base + BASE_FIELD_BYTES } else { kid_base };
    let ctr_len = if config & CTR_EXTENDED_BIT != 0 { ctr_base + BASE_FIELD_BYTES } else { ctr_base };
    let total = 1 + kid_len + ctr_len;

    if bytes.len() < total {
        return Err(HeaderError::Truncated { needed: total, have: bytes.len() });
    }

    let kid = be_to_u64(&bytes[1..=kid_len]);
    let ctr = be_to_u64(&bytes[1 + kid_len..total]);

    Ok((Header { kid, ctr }, total))
}

fn be_to_u64(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf[8 - bytes.len()..].copy_from_slice(bytes);
    u64::from_be_bytes(buf)
}
