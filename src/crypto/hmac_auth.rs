//! Chained HMAC-SHA256 tags for channel frames.
//!
//! Each tag covers the connection IV, the sender's direction byte, the
//! previous tag sent in the same direction and the ciphertext, truncated to
//! [`TAG_SIZE`] bytes.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::keys::{ChannelIv, KeyMaterial};
use super::{ChannelError, Tag, TAG_SIZE};

type HmacSha256 = Hmac<Sha256>;

/// Originator of a frame, mixed into its tag for domain separation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Sender {
    /// Frames written by the controlling application (`'E'`).
    Application = 0x45,
    /// Frames written by the appliance (`'C'`).
    Device = 0x43,
}

impl Sender {
    /// Direction byte as it enters the tag input.
    pub fn byte(self) -> u8 {
        self as u8
    }
}

/// HMAC-SHA256 authenticator for chained frame tags
#[derive(Debug, Clone)]
pub struct ChainedMac {
    key: KeyMaterial,
    iv: ChannelIv,
}

impl ChainedMac {
    /// Create an authenticator from the derived auth key.
    pub fn new(key: KeyMaterial, iv: ChannelIv) -> Self {
        Self { key, iv }
    }

    fn mac_for(&self, sender: Sender, previous: &Tag, ciphertext: &[u8]) -> HmacSha256 {
        let mut mac =
            HmacSha256::new_from_slice(self.key.as_bytes()).expect("HMAC accepts any key size");
        mac.update(self.iv.as_bytes());
        mac.update(&[sender.byte()]);
        mac.update(previous);
        mac.update(ciphertext);
        mac
    }

    /// Compute the truncated tag for `ciphertext`.
    pub fn compute_tag(&self, sender: Sender, previous: &Tag, ciphertext: &[u8]) -> Tag {
        let digest = self.mac_for(sender, previous, ciphertext).finalize().into_bytes();
        let mut tag = [0u8; TAG_SIZE];
        tag.copy_from_slice(&digest[..TAG_SIZE]);
        tag
    }

    /// Verify a received tag in constant time.
    pub fn verify_tag(
        &self,
        sender: Sender,
        previous: &Tag,
        ciphertext: &[u8],
        tag: &[u8],
    ) -> Result<(), ChannelError> {
        if tag.len() != TAG_SIZE {
            return Err(ChannelError::Authentication);
        }
        self.mac_for(sender, previous, ciphertext)
            .verify_truncated_left(tag)
            .map_err(|_| ChannelError::Authentication)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_mac() -> ChainedMac {
        ChainedMac::new(KeyMaterial::new(vec![7u8; 32]), ChannelIv::new([1u8; 16]))
    }

    #[test]
    fn test_tag_verifies() {
        let mac = test_mac();
        let previous = [0u8; TAG_SIZE];
        let tag = mac.compute_tag(Sender::Application, &previous, b"ciphertext");
        assert!(mac
            .verify_tag(Sender::Application, &previous, b"ciphertext", &tag)
            .is_ok());
    }

    #[test]
    fn test_direction_separates_tags() {
        let mac = test_mac();
        let previous = [0u8; TAG_SIZE];
        let app = mac.compute_tag(Sender::Application, &previous, b"same");
        let dev = mac.compute_tag(Sender::Device, &previous, b"same");
        assert_ne!(app, dev);
        assert_eq!(
            mac.verify_tag(Sender::Device, &previous, b"same", &app),
            Err(ChannelError::Authentication)
        );
    }

    #[test]
    fn test_previous_tag_is_chained() {
        let mac = test_mac();
        let first = mac.compute_tag(Sender::Application, &[0u8; TAG_SIZE], b"block");
        let second = mac.compute_tag(Sender::Application, &first, b"block");
        assert_ne!(first, second);
    }

    #[test]
    fn test_wrong_tag_length_rejected() {
        let mac = test_mac();
        let previous = [0u8; TAG_SIZE];
        let tag = mac.compute_tag(Sender::Application, &previous, b"x");
        assert!(mac
            .verify_tag(Sender::Application, &previous, b"x", &tag[..8])
            .is_err());
    }
}
