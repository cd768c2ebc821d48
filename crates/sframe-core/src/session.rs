//! Session layer state machine bridging MLS epochs to Sender/Receiver
//! contexts.
//!
//! Uses the action pattern: state-changing calls return a list of actions
//! for the caller to react to (log, notify UI, etc.), keeping the state
//! machine itself free of any I/O beyond the MLS bridge calls it explicitly
//! awaits.
//!
//! # State machine
//!
//! ```text
//! ┌──────┐  start()   ┌─────────┐  join ok   ┌─────────────┐
//! │ Idle │───────────>│ Joining │───────────>│ Active(E)   │
//! └──────┘            └─────────┘            └─────────────┘
//!                           ^                       │
//!                           │ deadline exceeded      │ new epoch/resync
//!                           │                        ▼
//!                      ┌─────────┐            ┌─────────────────┐
//!                      │ Closed  │<───────────│ Rekeying(E→E')  │
//!                      └─────────┘            └─────────────────┘
//! ```

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
    time::Instant,
};

use tracing::{debug, warn};

use crate::{
    config::SessionConfig,
    env::Environment,
    error::SessionError,
    mls_bridge::{EpochInfo, MlsBridge, ParticipantId, compute_kid},
    receiver::ReceiverContext,
    sender::{MediaKind, SenderContext},
};

/// State of a conference session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No epoch installed.
    Idle,
    /// A join or resync is in flight.
    Joining,
    /// Sender context and zero or more receiver contexts are live.
    Active {
        /// Current epoch number.
        epoch: u64,
    },
    /// A new epoch secret has arrived; contexts are being replaced.
    Rekeying {
        /// Epoch being retired.
        from: u64,
        /// Epoch being installed.
        to: u64,
    },
    /// All key material has been zeroised.
    Closed,
}

/// Actions a caller must react to after a state-changing session call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    /// The session installed a new epoch, optionally retiring an old one.
    Rekeyed {
        /// Previous epoch, if any.
        from: Option<u64>,
        /// Newly installed epoch.
        to: u64,
    },
    /// The session closed for `reason`.
    Closed {
        /// Human-readable reason.
        reason: String,
    },
}

const WRONG_KEY_RESYNC_THRESHOLD: u32 = 8;

/// Token-bucket rate limiter for per-frame warning logs, so a flood of
/// `AuthFailed`/`Replay` drops cannot itself become a denial of service.
struct LogLimiter {
    capacity: u32,
    tokens: u32,
    last_refill: Instant,
}

impl LogLimiter {
    fn new(capacity: u32) -> Self {
        Self { capacity, tokens: capacity, last_refill: Instant::now() }
    }

    fn allow(&mut self) -> bool {
        let elapsed = self.last_refill.elapsed().as_secs();
        if elapsed > 0 {
            self.tokens = self.capacity.min(self.tokens.saturating_add(elapsed as u32));
            self.last_refill = Instant::now();
        }
        if self.tokens == 0 {
            return false;
        }
        self.tokens -= 1;
        true
    }
}

/// Owns the current epoch secret and every Sender/Receiver context for one
/// conference participant, and drives the state machine of §4.8.
pub struct SessionManager<B, E>
where
    B: MlsBridge,
    E: Environment,
{
    state: SessionState,
    config: SessionConfig,
    bridge: Arc<B>,
    env: E,
    identity: Option<String>,
    room: Option<u64>,
    local_leaf: Option<u32>,
    sender: Option<SenderContext>,
    receivers: HashMap<u32, ReceiverContext>,
    wrong_key_streaks: HashMap<u32, u32>,
    log_limiter: LogLimiter,
    needs_epoch_rotation: bool,
    /// When the session entered `Rekeying`, so [`Self::tick`] can enforce
    /// [`SessionConfig::rekey_deadline`]. `None` outside `Rekeying`.
    rekeying_since: Option<E::Instant>,
}

impl<B, E> SessionManager<B, E>
where
    B: MlsBridge,
    E: Environment,
{
    /// Build an idle session manager.
    pub fn new(bridge: Arc<B>, env: E, config: SessionConfig) -> Self {
        Self {
            state: SessionState::Idle,
            config,
            bridge,
            env,
            identity: None,
            room: None,
            local_leaf: None,
            sender: None,
            receivers: HashMap::new(),
            wrong_key_streaks: HashMap::new(),
            log_limiter: LogLimiter::new(32),
            needs_epoch_rotation: false,
            rekeying_since: None,
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether the sender context reported `CounterExhausted` and an epoch
    /// rotation should be requested from MLS.
    #[must_use]
    pub fn needs_epoch_rotation(&self) -> bool {
        self.needs_epoch_rotation
    }

    /// `Idle → Joining → Active(E)`: join `room` under `identity` and
    /// install the local sender context.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::MlsFailure`] if the join fails or times out;
    /// the session remains in `Joining` so the caller may retry.
    pub async fn start(&mut self, identity: String, room: u64) -> Result<Vec<SessionAction>, SessionError> {
        self.identity = Some(identity.clone());
        self.room = Some(room);
        self.state = SessionState::Joining;

        let info = self.join_with_timeout(&identity, room).await?;
        Ok(self.install_epoch(None, &info).await)
    }

    async fn join_with_timeout(&self, identity: &str, room: u64) -> Result<EpochInfo, SessionError> {
        match tokio::time::timeout(self.config.mls_timeout, self.bridge.join(identity, room)).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(SessionError::MlsFailure(crate::error::MlsBridgeError::Timeout)),
        }
    }

    /// Install a freshly obtained epoch: derive the local sender context,
    /// then re-derive receiver contexts for every remote sender the
    /// session was actually subscribed to (filtered to leaves still
    /// present in `info.roster`), before flipping to `Active`. A stale
    /// subscription whose leaf has left the roster is dropped rather than
    /// carried forward.
    async fn install_epoch(&mut self, previous_epoch: Option<u64>, info: &EpochInfo) -> Vec<SessionAction> {
        self.local_leaf = Some(info.leaf_index);
        let material = self.bridge.cached_key_for_sender(&info.epoch_secret, info.epoch, info.leaf_index).await;
        let kid_audio = compute_kid(info.epoch, info.room_id, info.leaf_index, 0);
        let kid_video = compute_kid(info.epoch, info.room_id, info.leaf_index, 1);
        self.sender = Some(SenderContext::new(material, kid_audio, kid_video));

        let previously_subscribed: Vec<u32> = self.receivers.keys().copied().collect();
        self.receivers.clear();
        self.wrong_key_streaks.clear();

        let roster_leaves: HashSet<u32> = info.roster.iter().map(|entry| entry.index).collect();
        for leaf_index in previously_subscribed {
            if !roster_leaves.contains(&leaf_index) {
                continue;
            }
            let material = self.bridge.cached_key_for_sender(&info.epoch_secret, info.epoch, leaf_index).await;
            let kid_audio = compute_kid(info.epoch, info.room_id, leaf_index, 0);
            let kid_video = compute_kid(info.epoch, info.room_id, leaf_index, 1);
            self.receivers.insert(
                leaf_index,
                ReceiverContext::with_window_width(material, kid_audio, kid_video, self.config.replay_window_width),
            );
        }

        self.needs_epoch_rotation = false;
        self.rekeying_since = None;
        self.state = SessionState::Active { epoch: info.epoch };

        vec![SessionAction::Rekeyed { from: previous_epoch, to: info.epoch }]
    }

    /// Install a receiver context for a remote sender, parsed from its
    /// SFU-visible display name.
    ///
    /// A display name with no parseable leaf index cannot be installed and
    /// is silently skipped, per the identity-parsing contract.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Seal`]-adjacent `NoContext`-style failure is
    /// not applicable here; this call only fails if the session is not
    /// `Active`.
    pub async fn on_remote_join(&mut self, display_name: &str, epoch_secret: &[u8; 32]) -> Result<(), SessionError> {
        let SessionState::Active { epoch } = self.state else {
            return Err(SessionError::Cancelled);
        };
        let room = self.room.unwrap_or(0);

        let participant = ParticipantId::parse(display_name);
        let Some(leaf_index) = participant.leaf_index else {
            warn!(display_name, "cannot install receiver context: no parseable leaf index");
            return Ok(());
        };

        let material = self.bridge.cached_key_for_sender(epoch_secret, epoch, leaf_index).await;
        let kid_audio = compute_kid(epoch, room, leaf_index, 0);
        let kid_video = compute_kid(epoch, room, leaf_index, 1);
        self.receivers.insert(
            leaf_index,
            ReceiverContext::with_window_width(material, kid_audio, kid_video, self.config.replay_window_width),
        );
        self.wrong_key_streaks.remove(&leaf_index);
        Ok(())
    }

    /// Drop and zeroise the receiver context for `leaf_index`.
    pub fn on_remote_leave(&mut self, leaf_index: u32) {
        self.receivers.remove(&leaf_index);
        self.wrong_key_streaks.remove(&leaf_index);
    }

    /// `Active(E) → Rekeying(E→E') → Active(E')`: install a freshly
    /// obtained epoch, retiring the old one.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::MlsFailure`] if deriving the new epoch's
    /// material fails for a reason surfaced by the bridge; this
    /// implementation's own install step does not fail once `info` is in
    /// hand.
    pub async fn rekey(&mut self, info: &EpochInfo) -> Result<Vec<SessionAction>, SessionError> {
        let previous_epoch = match self.state {
            SessionState::Active { epoch } => Some(epoch),
            SessionState::Rekeying { from, .. } => Some(from),
            _ => None,
        };
        if let Some(from) = previous_epoch {
            self.state = SessionState::Rekeying { from, to: info.epoch };
            self.rekeying_since = Some(self.env.now());
        }
        Ok(self.install_epoch(previous_epoch, info).await)
    }

    /// Drive time-based transitions: if the session has been `Rekeying`
    /// for longer than [`SessionConfig::rekey_deadline`], zeroise and fall
    /// through `Closed` back to `Joining` so the caller can retry `start`.
    ///
    /// A no-op outside `Rekeying`, or while the deadline has not yet
    /// elapsed. Callers should invoke this periodically (it performs no
    /// I/O of its own).
    pub fn tick(&mut self, now: E::Instant) -> Vec<SessionAction> {
        let SessionState::Rekeying { from, to } = self.state else {
            return Vec::new();
        };
        let Some(since) = self.rekeying_since else {
            return Vec::new();
        };
        if now - since < self.config.rekey_deadline {
            return Vec::new();
        }

        self.sender = None;
        self.receivers.clear();
        self.wrong_key_streaks.clear();
        self.rekeying_since = None;
        self.state = SessionState::Joining;

        vec![SessionAction::Closed { reason: format!("rekey deadline exceeded stalled between epoch {from} and {to}") }]
    }

    /// Seal a plaintext frame for transmission.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NoContext`]-style failure via
    /// [`SessionError::Seal`] if no sender context is installed, or the
    /// underlying seal error otherwise. `CounterExhausted` additionally
    /// marks [`Self::needs_epoch_rotation`].
    pub fn seal_frame(&mut self, kind: MediaKind, plaintext: &[u8]) -> Result<sframe_proto::SframeRecord, SessionError> {
        let Some(sender) = self.sender.as_mut() else {
            return Err(SessionError::Cancelled);
        };
        match sender.seal(kind, plaintext) {
            Ok(record) => Ok(record),
            Err(err) => {
                if matches!(err, crate::error::SealError::CounterExhausted) {
                    self.needs_epoch_rotation = true;
                    warn!("sender counter exhausted, epoch rotation requested");
                }
                Err(SessionError::Seal(err))
            },
        }
    }

    /// Decode, route, and open an inbound record.
    ///
    /// Routes by the remote leaf index encoded in the record's KID; per
    /// the epoch-isolation guarantee, a record from a retired epoch either
    /// finds no context for its leaf (`NoContext`) or finds a context
    /// that's since been rekeyed to a different KID (`WrongKey`).
    ///
    /// # Errors
    ///
    /// Propagates [`crate::error::OpenError`] via [`SessionError::Open`].
    /// A sustained streak of `WrongKey` from one remote leaf is logged as
    /// a resync trigger (the caller decides whether to act on it via
    /// [`Self::wrong_key_streak`]).
    pub fn open_frame(&mut self, record: &[u8]) -> Result<Vec<u8>, SessionError> {
        let (header, _) = sframe_proto::header::decode(record).map_err(crate::error::OpenError::HeaderMalformed)?;
        let leaf_index = route_leaf(header.kid);

        let Some(receiver) = self.receivers.get_mut(&leaf_index) else {
            return Err(SessionError::Open(crate::error::OpenError::NoContext));
        };

        match receiver.open(record) {
            Ok(plaintext) => {
                self.wrong_key_streaks.remove(&leaf_index);
                Ok(plaintext)
            },
            Err(err) => {
                self.note_open_failure(leaf_index, &err);
                Err(SessionError::Open(err))
            },
        }
    }

    fn note_open_failure(&mut self, leaf_index: u32, err: &crate::error::OpenError) {
        use crate::error::OpenError;
        match err {
            OpenError::AuthFailed | OpenError::Replay => {
                if self.log_limiter.allow() {
                    warn!(leaf_index, ?err, "dropping frame");
                } else {
                    debug!(leaf_index, ?err, "dropping frame (log rate-limited)");
                }
            },
            OpenError::WrongKey => {
                let streak = self.wrong_key_streaks.entry(leaf_index).or_insert(0);
                *streak += 1;
                if *streak >= WRONG_KEY_RESYNC_THRESHOLD {
                    warn!(leaf_index, streak = *streak, "sustained WrongKey, resync recommended");
                }
            },
            OpenError::HeaderMalformed(_) | OpenError::NoContext => {},
        }
    }

    /// Whether `leaf_index` has produced enough consecutive `WrongKey`
    /// results to warrant a resync.
    #[must_use]
    pub fn wrong_key_streak(&self, leaf_index: u32) -> u32 {
        self.wrong_key_streaks.get(&leaf_index).copied().unwrap_or(0)
    }

    /// `* → Closed`: zeroise every key and salt and tear the session down.
    pub fn stop(&mut self) -> Vec<SessionAction> {
        self.sender = None;
        self.receivers.clear();
        self.wrong_key_streaks.clear();
        self.rekeying_since = None;
        self.state = SessionState::Closed;
        vec![SessionAction::Closed { reason: "stopped".to_string() }]
    }

    /// Wait out the environment's clock for `duration`, used by callers
    /// implementing the rekey deadline.
    pub async fn sleep(&self, duration: std::time::Duration) {
        self.env.sleep(duration).await;
    }
}

/// Recover the remote leaf index encoded in a KID.
///
/// `KID = epoch*10^9 + room*10^4 + leaf*10 + media_bit`; the leaf occupies
/// the two decimal digits above the media bit, below the room, which this
/// core's KID formula assumes fits in three digits (leaf < 1000).
fn route_leaf(kid: u64) -> u32 {
    ((kid / 10) % 1000) as u32
}
