//! Pre-shared key handling and per-purpose key derivation.
//!
//! Appliance credentials are distributed as unpadded base64url strings, so
//! decoding accepts input with or without `=` padding.

use std::fmt;

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, NO_PAD};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::{ChannelError, BLOCK_SIZE};

type HmacSha256 = Hmac<Sha256>;

/// Base64url engine that tolerates both padded and unpadded input.
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    NO_PAD.with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Decode a base64url string, padded or not.
pub fn decode_base64url(input: &str) -> Result<Vec<u8>, base64::DecodeError> {
    URL_SAFE_LENIENT.decode(input.trim())
}

/// Compute HMAC-SHA256 over the concatenation of `parts`.
pub(crate) fn hmac_sha256(key: &[u8], parts: &[&[u8]]) -> [u8; 32] {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key size");
    for part in parts {
        mac.update(part);
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(&mac.finalize().into_bytes());
    out
}

/// Secret key bytes, zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct KeyMaterial {
    bytes: Vec<u8>,
}

impl KeyMaterial {
    /// Wrap raw key bytes.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Get the key bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Get the key length
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Check if the key is empty
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyMaterial([REDACTED, {} bytes])", self.bytes.len())
    }
}

/// Connection secret shared with the appliance out of band.
#[derive(Clone, Debug)]
pub struct PreSharedKey {
    material: KeyMaterial,
}

impl PreSharedKey {
    /// Create a PSK from raw bytes.
    pub fn new(bytes: Vec<u8>) -> Result<Self, ChannelError> {
        if bytes.is_empty() {
            return Err(ChannelError::InvalidKey("key is empty".to_string()));
        }
        Ok(Self {
            material: KeyMaterial::new(bytes),
        })
    }

    /// Decode a PSK from its base64url form.
    pub fn from_base64url(encoded: &str) -> Result<Self, ChannelError> {
        let bytes =
            decode_base64url(encoded).map_err(|e| ChannelError::InvalidKey(e.to_string()))?;
        Self::new(bytes)
    }

    /// Raw PSK bytes, as needed by a TLS-PSK transport.
    pub fn as_bytes(&self) -> &[u8] {
        self.material.as_bytes()
    }

    /// Derive `HMAC-SHA256(psk, label)`.
    pub fn derive(&self, label: &[u8]) -> KeyMaterial {
        KeyMaterial::new(hmac_sha256(self.material.as_bytes(), &[label]).to_vec())
    }

    /// AES-256 key for the frame cipher.
    pub fn encryption_key(&self) -> KeyMaterial {
        self.derive(b"ENC")
    }

    /// HMAC key for the chained frame tags.
    pub fn auth_key(&self) -> KeyMaterial {
        self.derive(b"MAC")
    }
}

/// Initialization vector of a self-encrypted connection.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ChannelIv([u8; BLOCK_SIZE]);

impl ChannelIv {
    /// Wrap a 16-byte IV.
    pub fn new(bytes: [u8; BLOCK_SIZE]) -> Self {
        Self(bytes)
    }

    /// Create an IV from a slice, which must be exactly one block long.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ChannelError> {
        let block: [u8; BLOCK_SIZE] = bytes.try_into().map_err(|_| {
            ChannelError::InvalidIv(format!(
                "expected {BLOCK_SIZE} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self(block))
    }

    /// Decode an IV from its base64url form.
    pub fn from_base64url(encoded: &str) -> Result<Self, ChannelError> {
        let bytes =
            decode_base64url(encoded).map_err(|e| ChannelError::InvalidIv(e.to_string()))?;
        Self::from_slice(&bytes)
    }

    /// IV bytes.
    pub fn as_bytes(&self) -> &[u8; BLOCK_SIZE] {
        &self.0
    }
}

impl fmt::Debug for ChannelIv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChannelIv([REDACTED])")
    }
}
