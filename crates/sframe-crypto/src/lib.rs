//! AEAD primitive, HKDF key schedule, and nonce construction for `SFrame`
//! traffic keys derived from an MLS epoch secret.
//!
//! This crate is pure cryptography: no wire framing (see `sframe-proto`),
//! no session orchestration (see `sframe-core`).

#![forbid(unsafe_code)]

pub mod aead;
pub mod errors;
pub mod nonce;
pub mod schedule;

pub use aead::{AeadSuite, Aes128GcmSha256, CipherSuite, KEY_LEN, NONCE_LEN, TAG_LEN};
pub use errors::{AeadError, Result};
pub use nonce::build_nonce;
pub use schedule::{SenderKeyMaterial, derive_sender_key};
