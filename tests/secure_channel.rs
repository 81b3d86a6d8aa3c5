//! Property-based tests for the secure channel.
//!
//! - Frames open on the peer, in order, for any sequence of messages
//! - Any single-byte change to a frame fails authentication
//! - Dropped or reordered frames break the chain
//! - Frame sizes follow the padding rule

use hclink::crypto::{ChannelError, MIN_FRAME_SIZE, TAG_SIZE};
use hclink::{ChannelIv, ChannelRole, PreSharedKey, SecureChannel};
use hex_literal::hex;
use proptest::prelude::*;

fn psk() -> PreSharedKey {
    let key = hex!("000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f");
    PreSharedKey::new(key.to_vec()).unwrap()
}

fn iv() -> ChannelIv {
    ChannelIv::new(hex!("101112131415161718191a1b1c1d1e1f"))
}

fn pair() -> (SecureChannel, SecureChannel) {
    (
        SecureChannel::self_encrypted(&psk(), iv(), ChannelRole::Application).unwrap(),
        SecureChannel::self_encrypted(&psk(), iv(), ChannelRole::Device).unwrap(),
    )
}

// Strategy for message sequences, including empty and block-sized messages
fn messages_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(".{0,80}", 1..8)
}

fn expected_frame_len(plaintext_len: usize) -> usize {
    let mut pad_len = 16 - plaintext_len % 16;
    if pad_len == 1 {
        pad_len += 16;
    }
    plaintext_len + pad_len + TAG_SIZE
}

#[test]
fn prop_roundtrip_in_order() {
    proptest!(|(messages in messages_strategy())| {
        let (mut app, mut dev) = pair();
        for msg in &messages {
            let frame = app.encrypt(msg);
            prop_assert_eq!(dev.decrypt(&frame).unwrap(), msg.as_bytes());

            let frame = dev.encrypt(msg);
            prop_assert_eq!(app.decrypt(&frame).unwrap(), msg.as_bytes());
        }
        prop_assert_eq!(app.last_tx_tag(), dev.last_rx_tag());
        prop_assert_eq!(dev.last_tx_tag(), app.last_rx_tag());
    });
}

#[test]
fn prop_frame_size_follows_padding() {
    proptest!(|(msg in ".{0,100}")| {
        let (mut app, _) = pair();
        let frame = app.encrypt(&msg);
        prop_assert_eq!(frame.len(), expected_frame_len(msg.len()));
        prop_assert!(frame.len() >= MIN_FRAME_SIZE);
        prop_assert_eq!(frame.len() % 16, 0);
    });
}

#[test]
fn prop_any_byte_flip_fails_authentication() {
    proptest!(|(msg in ".{0,48}", index in any::<prop::sample::Index>(), bit in 0u8..8)| {
        let (mut app, mut dev) = pair();
        let mut frame = app.encrypt(&msg);
        let at = index.index(frame.len());
        frame[at] ^= 1 << bit;

        let before = *dev.last_rx_tag().unwrap();
        prop_assert_eq!(dev.decrypt(&frame), Err(ChannelError::Authentication));
        prop_assert_eq!(dev.last_rx_tag().unwrap(), &before);
    });
}

#[test]
fn prop_truncated_frame_rejected() {
    proptest!(|(msg in ".{0,48}", cut in 1usize..16)| {
        let (mut app, mut dev) = pair();
        let frame = app.encrypt(&msg);
        let result = dev.decrypt(&frame[..frame.len() - cut]);
        let is_framing = matches!(result, Err(ChannelError::Framing { .. }));
        prop_assert!(is_framing);
    });
}

#[test]
fn test_skipped_frame_breaks_chain() {
    let (mut app, mut dev) = pair();
    let first = app.encrypt("first");
    let second = app.encrypt("second");

    assert_eq!(dev.decrypt(&second), Err(ChannelError::Authentication));
    // the failed attempt left the chain where it was
    assert_eq!(dev.decrypt(&first).unwrap(), b"first");
    assert_eq!(dev.decrypt(&second).unwrap(), b"second");
}

#[test]
fn test_replayed_frame_rejected() {
    let (mut app, mut dev) = pair();
    let frame = app.encrypt("once");
    dev.decrypt(&frame).unwrap();
    assert_eq!(dev.decrypt(&frame), Err(ChannelError::Authentication));
}

#[test]
fn test_own_frames_do_not_verify() {
    // direction bytes differ, so a reflected frame is rejected
    let (mut app, _) = pair();
    let mut other_app =
        SecureChannel::self_encrypted(&psk(), iv(), ChannelRole::Application).unwrap();
    let frame = app.encrypt("reflected");
    assert_eq!(other_app.decrypt(&frame), Err(ChannelError::Authentication));
}

#[test]
fn test_wrong_key_rejected() {
    let (mut app, _) = pair();
    let other = PreSharedKey::new(vec![7u8; 32]).unwrap();
    let mut dev = SecureChannel::self_encrypted(&other, iv(), ChannelRole::Device).unwrap();
    let frame = app.encrypt("secret");
    assert_eq!(dev.decrypt(&frame), Err(ChannelError::Authentication));
}
