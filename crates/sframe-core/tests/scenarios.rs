//! End-to-end scenarios over [`SenderContext`]/[`ReceiverContext`] pairs,
//! independent of `SessionManager` state-machine plumbing (covered by
//! `session::tests` inline).
#![allow(clippy::unwrap_used)]

use sframe_core::{MediaKind, ReceiverContext, SenderContext};
use sframe_crypto::{derive_sender_key, SenderKeyMaterial};
use sframe_proto::SframeRecord;

const EPOCH_SECRET_A: [u8; 32] = [0x11; 32];
const EPOCH_SECRET_B: [u8; 32] = [0x22; 32];

fn linked_pair(epoch_secret: &[u8; 32], leaf: u32, kid_audio: u64) -> (SenderContext, ReceiverContext) {
    let sender_material = derive_sender_key(epoch_secret, leaf);
    let receiver_material = derive_sender_key(epoch_secret, leaf);
    let sender = SenderContext::new(sender_material, kid_audio, kid_audio + 1);
    let receiver = ReceiverContext::new(receiver_material, kid_audio, kid_audio + 1);
    (sender, receiver)
}

/// S2. Reordering within window.
#[test]
fn s2_reordering_within_window_opens_each_record_exactly_once() {
    let (mut sender, mut receiver) = linked_pair(&EPOCH_SECRET_A, 3, 7_012_340_030);

    let records: Vec<Vec<u8>> = (0..5)
        .map(|i| sender.seal(MediaKind::Audio, format!("frame-{i}").as_bytes()).unwrap().to_bytes())
        .collect();

    // Deliver out of order: R4, R0, R2, R1, R3.
    for &i in &[4, 0, 2, 1, 3] {
        let plaintext = receiver.open(&records[i]).unwrap();
        assert_eq!(plaintext, format!("frame-{i}").as_bytes());
    }

    // A second delivery of R2 must be rejected as a replay.
    assert_eq!(receiver.open(&records[2]), Err(sframe_core::OpenError::Replay));
}

/// S3. Authenticity.
#[test]
fn s3_tampered_tag_fails_without_moving_the_replay_window() {
    let (mut sender, mut receiver) = linked_pair(&EPOCH_SECRET_A, 3, 7_012_340_030);
    let mut r0 = sender.seal(MediaKind::Audio, b"hello").unwrap().to_bytes();

    let last = r0.len() - 1;
    r0[last] ^= 0xFF;
    assert_eq!(receiver.open(&r0), Err(sframe_core::OpenError::AuthFailed));

    // The largest-seen CTR must be unchanged: CTR 0 is still open-able by a
    // genuine record.
    let (mut sender2, _) = linked_pair(&EPOCH_SECRET_A, 3, 7_012_340_030);
    let good = sender2.seal(MediaKind::Audio, b"hello").unwrap().to_bytes();
    assert_eq!(receiver.open(&good).unwrap(), b"hello");
}

/// S4. Epoch change rekey, at the Sender/Receiver context layer.
#[test]
fn s4_stale_epoch_record_returns_wrong_key_not_auth_failed() {
    let (mut sender_e7, _) = linked_pair(&EPOCH_SECRET_A, 3, 7_012_340_030);
    let r_a = sender_e7.seal(MediaKind::Audio, b"audio-epoch-7").unwrap().to_bytes();

    // Epoch advances to 8: KID changes because epoch is baked into it.
    let kid_e8 = 8 * 1_000_000_000 + 1234 * 10_000 + 3 * 10;
    let (mut sender_e8, mut receiver_e8) = linked_pair(&EPOCH_SECRET_B, 3, kid_e8);
    let r_b = sender_e8.seal(MediaKind::Audio, b"audio-epoch-8").unwrap().to_bytes();

    assert_eq!(receiver_e8.open(&r_b).unwrap(), b"audio-epoch-8");
    assert_eq!(receiver_e8.open(&r_a), Err(sframe_core::OpenError::WrongKey));
}

/// S5. Two remote senders: a receiver keyed for leaf 3's KIDs never
/// confuses a leaf-5 record for its own, and vice versa.
#[test]
fn s5_two_remote_senders_route_by_kid_not_media_kind() {
    let (mut sender3, mut receiver3) = linked_pair(&EPOCH_SECRET_A, 3, 7_012_340_030);
    let (mut sender5, mut receiver5) = linked_pair(&EPOCH_SECRET_A, 5, 7_012_340_050);

    let video5 = sender5.seal(MediaKind::Video, b"video-from-5").unwrap().to_bytes();
    assert_eq!(receiver5.open(&video5).unwrap(), b"video-from-5");
    assert_eq!(receiver3.open(&video5), Err(sframe_core::OpenError::WrongKey));

    let audio3 = sender3.seal(MediaKind::Audio, b"audio-from-3").unwrap().to_bytes();
    assert_eq!(receiver3.open(&audio3).unwrap(), b"audio-from-3");
    assert_eq!(receiver5.open(&audio3), Err(sframe_core::OpenError::WrongKey));
}

/// S6. Counter exhaustion is a boundary condition, not a panic.
#[test]
fn s6_counter_exhaustion_at_the_boundary_emits_no_record() {
    let material = SenderKeyMaterial { key: [1u8; sframe_crypto::KEY_LEN], salt: [2u8; sframe_crypto::NONCE_LEN] };
    let mut sender = SenderContext::new(material, 7_012_340_030, 7_012_340_031);
    sender.set_counter(u64::MAX - 1);

    assert!(sender.seal(MediaKind::Audio, b"last frame").is_ok());
    assert_eq!(sender.seal(MediaKind::Audio, b"overflow").unwrap_err(), sframe_core::SealError::CounterExhausted);
}

/// Invariant 7: epoch isolation holds even with identical leaf and media
/// kind, because the KID itself encodes the epoch.
#[test]
fn invariant_epoch_isolation_holds_for_identical_leaf_and_media_kind() {
    let (mut sender_e7, _) = linked_pair(&EPOCH_SECRET_A, 3, 7_012_340_030);
    let record_e7 = sender_e7.seal(MediaKind::Audio, b"payload").unwrap().to_bytes();

    let kid_e9 = 9 * 1_000_000_000 + 1234 * 10_000 + 3 * 10;
    let (_, mut receiver_e9) = linked_pair(&EPOCH_SECRET_A, 3, kid_e9);

    assert_eq!(receiver_e9.open(&record_e7), Err(sframe_core::OpenError::WrongKey));
}

/// Invariant 6: every permutation of a full window opens exactly once.
#[test]
fn invariant_every_permutation_of_a_window_opens_exactly_once() {
    let (mut sender, mut receiver) = linked_pair(&EPOCH_SECRET_A, 3, 7_012_340_030);

    let records: Vec<Vec<u8>> =
        (0..64).map(|i| sender.seal(MediaKind::Audio, &[i as u8]).unwrap().to_bytes()).collect();

    // A reverse delivery order is already a nontrivial permutation of a
    // full window.
    for record in records.iter().rev() {
        assert!(receiver.open(record).is_ok());
    }
    for record in &records {
        assert_eq!(receiver.open(record), Err(sframe_core::OpenError::Replay));
    }
}

/// Invariant 3: nonces never repeat across successful seals.
#[test]
fn invariant_nonces_never_repeat_across_successful_seals() {
    use std::collections::HashSet;

    let material = SenderKeyMaterial { key: [3u8; sframe_crypto::KEY_LEN], salt: [4u8; sframe_crypto::NONCE_LEN] };
    let mut sender = SenderContext::new(material, 1, 2);

    let mut seen = HashSet::new();
    for i in 0..256u32 {
        let record = sender.seal(MediaKind::Audio, &i.to_be_bytes()).unwrap();
        let nonce = sframe_crypto::build_nonce(&[4u8; sframe_crypto::NONCE_LEN], record.header.ctr);
        assert!(seen.insert(nonce), "nonce repeated at ctr {}", record.header.ctr);
    }
}

/// Invariant 1: `open(seal(plaintext)) == plaintext` whenever the sender
/// and receiver KIDs line up, for a range of plaintext sizes.
#[test]
fn invariant_round_trip_across_plaintext_sizes() {
    let (mut sender, mut receiver) = linked_pair(&EPOCH_SECRET_A, 3, 7_012_340_030);
    for len in [0usize, 1, 16, 255, 4096] {
        let plaintext = vec![0xAB; len];
        let record = sender.seal(MediaKind::Video, &plaintext).unwrap().to_bytes();
        assert_eq!(receiver.open(&record).unwrap(), plaintext);
    }
}

/// Invariant 2: any single-bit flip anywhere in the wire bytes is caught,
/// either as a header decode error or an authentication failure.
#[test]
fn invariant_any_single_bit_flip_is_rejected() {
    let (mut sender, _) = linked_pair(&EPOCH_SECRET_A, 3, 7_012_340_030);
    let good = sender.seal(MediaKind::Audio, b"integrity").unwrap().to_bytes();

    for byte_index in 0..good.len() {
        for bit in 0..8u8 {
            let (_, mut receiver) = linked_pair(&EPOCH_SECRET_A, 3, 7_012_340_030);
            let mut tampered = good.clone();
            tampered[byte_index] ^= 1 << bit;
            let result = receiver.open(&tampered);
            assert!(result.is_err(), "byte {byte_index} bit {bit} should have been rejected");
        }
    }
}

/// `SframeRecord::parse` rejects bytes without the `SFrame` detection bit.
#[test]
fn non_sframe_bytes_are_rejected_before_any_crypto_runs() {
    let not_sframe = [0x00u8, 0x01, 0x02, 0x03];
    assert!(SframeRecord::parse(&not_sframe, sframe_crypto::TAG_LEN).is_err());
}
