//! Bridge between an external MLS group and `SFrame` traffic keys.
//!
//! The bridge is the only component that ever handles a raw epoch secret.
//! Everything downstream of [`MlsBridge::join`]/[`MlsBridge::resync`] deals
//! only in derived keys and key identifiers.

use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use sframe_crypto::SenderKeyMaterial;

use crate::error::MlsBridgeError;

/// An (epoch, room) scoped leaf-index → identity roster entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    /// MLS tree leaf index of this participant.
    pub index: u32,
    /// Display identity (not the SFU-visible `identity#leaf` form).
    pub identity: String,
}

/// Epoch-scoped state a join/roster-fetch/resync call returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpochInfo {
    /// This participant's own leaf index.
    pub leaf_index: u32,
    /// Current MLS epoch number.
    pub epoch: u64,
    /// Opaque group identifier.
    pub group_id: String,
    /// Room identifier.
    pub room_id: u64,
    /// Current roster.
    pub roster: Vec<RosterEntry>,
    /// The current epoch's 32-byte secret.
    pub epoch_secret: [u8; 32],
}

/// Result of a [`MlsBridge::resync`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResyncResult {
    /// Whether the epoch (or roster) changed relative to the cached info.
    pub changed: bool,
    /// Freshly fetched epoch info.
    pub info: EpochInfo,
}

/// The contract the `SessionManager` requires from an MLS implementation.
///
/// Implementations perform network I/O and may block/suspend; `seal`/`open`
/// never call through this trait directly.
#[async_trait]
pub trait MlsBridge: Send + Sync {
    /// Join `room` under `identity`, obtaining the current epoch's secret,
    /// this participant's leaf index, and the roster.
    async fn join(&self, identity: &str, room: u64) -> Result<EpochInfo, MlsBridgeError>;

    /// Fetch the current roster and epoch for `room` without (re)joining.
    async fn fetch_roster(&self, room: u64) -> Result<EpochInfo, MlsBridgeError>;

    /// Re-run the join and compare against `current`; the caller MUST
    /// rekey if `changed` comes back true.
    async fn resync(&self, identity: &str, room: u64, current: &EpochInfo) -> Result<ResyncResult, MlsBridgeError> {
        let info = self.join(identity, room).await?;
        let changed = info.epoch != current.epoch;
        Ok(ResyncResult { changed, info })
    }

    /// Derive the traffic key and nonce salt for `leaf_index` under
    /// `epoch_secret` at `epoch`.
    ///
    /// The default implementation derives fresh on every call.
    /// Implementations fronting a real MLS service SHOULD cache by
    /// `(epoch, leaf_index)`, since every remote sender's frames are routed
    /// through the same context and so must not re-run HKDF per frame.
    async fn cached_key_for_sender(&self, epoch_secret: &[u8; 32], _epoch: u64, leaf_index: u32) -> SenderKeyMaterial {
        derive_key_for_sender(epoch_secret, leaf_index)
    }
}

/// Derive the traffic key and nonce salt for `leaf_index` under
/// `epoch_secret`. Delegates to `sframe-crypto`'s key schedule.
#[must_use]
pub fn derive_key_for_sender(epoch_secret: &[u8; 32], leaf_index: u32) -> SenderKeyMaterial {
    sframe_crypto::derive_sender_key(epoch_secret, leaf_index)
}

/// `KID = epoch*10^9 + room*10^4 + leaf*10 + media_bit`, `media_bit ∈ {0, 1}`
/// with 0 = audio, 1 = video.
#[must_use]
pub fn compute_kid(epoch: u64, room: u64, leaf_index: u32, media_bit: u8) -> u64 {
    epoch * 1_000_000_000 + room * 10_000 + u64::from(leaf_index) * 10 + u64::from(media_bit)
}

/// A participant identity parsed from its SFU-visible display name
/// (`identity#leaf_index`).
///
/// Parsing happens once, at the boundary where the display name arrives
/// from signalling; nothing downstream handles the raw string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantId {
    /// The identity portion, before the `#`.
    pub identity: String,
    /// The parsed leaf index, or `None` if absent or unparseable. A `None`
    /// here MUST prevent subscription rekey.
    pub leaf_index: Option<u32>,
}

impl ParticipantId {
    /// Parse an SFU display name of the form `identity#leaf_index_decimal`.
    #[must_use]
    pub fn parse(display_name: &str) -> Self {
        match display_name.split_once('#') {
            Some((identity, suffix)) => match suffix.parse::<u32>() {
                Ok(leaf_index) => Self { identity: identity.to_string(), leaf_index: Some(leaf_index) },
                Err(_) => Self { identity: display_name.to_string(), leaf_index: None },
            },
            None => Self { identity: display_name.to_string(), leaf_index: None },
        }
    }
}

#[derive(Debug, Deserialize)]
struct JoinResponse {
    sender_index: u32,
    epoch: u64,
    group_id: String,
    room_id: u64,
    roster: Vec<RosterEntry>,
    master_secret: String,
}

#[derive(Debug, Serialize)]
struct JoinRequest<'a> {
    identity: &'a str,
    room_id: u64,
}

#[derive(Debug, Deserialize)]
struct RosterResponse {
    epoch: u64,
    group_id: String,
    room_id: u64,
    roster: Vec<RosterEntry>,
}

/// `MlsBridge` implementation speaking the minimal REST contract:
/// `POST /mls/join`, `GET /mls/roster`.
pub struct HttpMlsBridge {
    base_url: String,
    client: reqwest::Client,
    timeout: Duration,
    key_cache: tokio::sync::Mutex<HashMap<(u64, u32), SenderKeyMaterial>>,
}

impl HttpMlsBridge {
    /// Build a bridge against `base_url` (e.g. `https://mls.example.com`),
    /// with the given per-request timeout.
    #[must_use]
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
            timeout,
            key_cache: tokio::sync::Mutex::new(HashMap::new()),
        }
    }

    async fn send<T: for<'de> Deserialize<'de>>(&self, request: reqwest::RequestBuilder) -> Result<T, MlsBridgeError> {
        let response = tokio::time::timeout(self.timeout, request.send())
            .await
            .map_err(|_| MlsBridgeError::Timeout)?
            .map_err(|err| MlsBridgeError::Transport(err.to_string()))?;

        if !response.status().is_success() {
            return Err(MlsBridgeError::HttpStatus { status: response.status().as_u16() });
        }

        response.json::<T>().await.map_err(|err| MlsBridgeError::Decode(err.to_string()))
    }
}

#[async_trait]
impl MlsBridge for HttpMlsBridge {
    async fn join(&self, identity: &str, room: u64) -> Result<EpochInfo, MlsBridgeError> {
        let request = self
            .client
            .post(format!("{}/mls/join", self.base_url))
            .json(&JoinRequest { identity, room_id: room });
        let body: JoinResponse = self.send(request).await?;

        let secret_bytes = base64::engine::general_purpose::STANDARD
            .decode(&body.master_secret)
            .map_err(|err| MlsBridgeError::Decode(err.to_string()))?;
        let epoch_secret: [u8; 32] =
            secret_bytes.try_into().map_err(|_| MlsBridgeError::Decode("master_secret is not 32 bytes".to_string()))?;

        Ok(EpochInfo {
            leaf_index: body.sender_index,
            epoch: body.epoch,
            group_id: body.group_id,
            room_id: body.room_id,
            roster: body.roster,
            epoch_secret,
        })
    }

    async fn fetch_roster(&self, room: u64) -> Result<EpochInfo, MlsBridgeError> {
        let request = self.client.get(format!("{}/mls/roster?room_id={room}", self.base_url));
        let body: RosterResponse = self.send(request).await?;

        Ok(EpochInfo {
            leaf_index: 0,
            epoch: body.epoch,
            group_id: body.group_id,
            room_id: body.room_id,
            roster: body.roster,
            epoch_secret: [0u8; 32],
        })
    }

    /// Cached `derive_key_for_sender`, keyed by (epoch, leaf). Avoids
    /// re-running HKDF for every frame from a sender already seen this
    /// epoch.
    async fn cached_key_for_sender(&self, epoch_secret: &[u8; 32], epoch: u64, leaf_index: u32) -> SenderKeyMaterial {
        let mut cache = self.key_cache.lock().await;
        if let Some(existing) = cache.get(&(epoch, leaf_index)) {
            return SenderKeyMaterial { key: existing.key, salt: existing.salt };
        }
        let derived = derive_key_for_sender(epoch_secret, leaf_index);
        cache.insert((epoch, leaf_index), SenderKeyMaterial { key: derived.key, salt: derived.salt });
        derived
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn compute_kid_matches_the_s1_scenario() {
        assert_eq!(compute_kid(7, 1234, 3, 0), 7_012_340_030);
    }

    #[test]
    fn audio_and_video_kids_differ_by_one() {
        let audio = compute_kid(7, 1234, 5, 0);
        let video = compute_kid(7, 1234, 5, 1);
        assert_eq!(video, audio + 1);
    }

    #[test]
    fn parses_identity_with_leaf_suffix() {
        let id = ParticipantId::parse("alice#3");
        assert_eq!(id.identity, "alice");
        assert_eq!(id.leaf_index, Some(3));
    }

    #[test]
    fn missing_suffix_yields_no_leaf_index() {
        let id = ParticipantId::parse("alice");
        assert_eq!(id.leaf_index, None);
    }

    #[test]
    fn unparseable_suffix_yields_no_leaf_index() {
        let id = ParticipantId::parse("alice#not-a-number");
        assert_eq!(id.leaf_index, None);
    }
}
