//! Secure channel: chained encrypt/decrypt of websocket frames.

use std::fmt;

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::RngCore;

use super::hmac_auth::{ChainedMac, Sender};
use super::keys::{ChannelIv, KeyMaterial, PreSharedKey};
use super::{ChannelError, Tag, BLOCK_SIZE, MIN_FRAME_SIZE, TAG_SIZE};

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// Which end of the connection this channel speaks for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChannelRole {
    /// Controlling application: sends `0x45` frames, verifies `0x43` frames.
    #[default]
    Application,
    /// Appliance side, used by simulators and tests.
    Device,
}

impl ChannelRole {
    /// Direction byte of frames this side writes.
    pub fn sender(self) -> Sender {
        match self {
            Self::Application => Sender::Application,
            Self::Device => Sender::Device,
        }
    }

    /// Direction byte of frames this side reads.
    pub fn peer(self) -> Sender {
        match self {
            Self::Application => Sender::Device,
            Self::Device => Sender::Application,
        }
    }
}

/// Mutable per-connection chaining material.
struct ChainState {
    last_rx_tag: Tag,
    last_tx_tag: Tag,
    encryptor: Aes256CbcEnc,
    decryptor: Aes256CbcDec,
}

impl ChainState {
    fn fresh(enc_key: &KeyMaterial, iv: &ChannelIv) -> Result<Self, ChannelError> {
        let encryptor = Aes256CbcEnc::new_from_slices(enc_key.as_bytes(), iv.as_bytes())
            .map_err(|e| ChannelError::InvalidKey(format!("AES-256 key: {e}")))?;
        let decryptor = Aes256CbcDec::new_from_slices(enc_key.as_bytes(), iv.as_bytes())
            .map_err(|e| ChannelError::InvalidKey(format!("AES-256 key: {e}")))?;
        Ok(Self {
            last_rx_tag: [0u8; TAG_SIZE],
            last_tx_tag: [0u8; TAG_SIZE],
            encryptor,
            decryptor,
        })
    }
}

/// Keys and chain state of a self-encrypted connection.
struct Framing {
    enc_key: KeyMaterial,
    iv: ChannelIv,
    mac: ChainedMac,
    role: ChannelRole,
    state: ChainState,
}

/// Frame protection for one connection.
///
/// In self-encrypted mode every call to [`encrypt`](Self::encrypt) and
/// [`decrypt`](Self::decrypt) advances the chain of its direction, so each
/// direction must be driven sequentially and in wire order. In passthrough
/// mode both operations copy their input.
pub struct SecureChannel {
    framing: Option<Framing>,
}

impl SecureChannel {
    /// Channel for a transport that is already confidential (TLS-PSK).
    pub fn passthrough() -> Self {
        Self { framing: None }
    }

    /// Channel that frames messages itself, keyed from `psk` and `iv`.
    pub fn self_encrypted(
        psk: &PreSharedKey,
        iv: ChannelIv,
        role: ChannelRole,
    ) -> Result<Self, ChannelError> {
        let enc_key = psk.encryption_key();
        let mac = ChainedMac::new(psk.auth_key(), iv);
        let state = ChainState::fresh(&enc_key, &iv)?;
        Ok(Self {
            framing: Some(Framing {
                enc_key,
                iv,
                mac,
                role,
                state,
            }),
        })
    }

    /// Pick the mode from the presence of an IV.
    pub fn new(
        psk: &PreSharedKey,
        iv: Option<ChannelIv>,
        role: ChannelRole,
    ) -> Result<Self, ChannelError> {
        match iv {
            Some(iv) => Self::self_encrypted(psk, iv, role),
            None => Ok(Self::passthrough()),
        }
    }

    /// Whether frames are encrypted by this channel.
    pub fn is_self_encrypted(&self) -> bool {
        self.framing.is_some()
    }

    /// Role of a self-encrypted channel.
    pub fn role(&self) -> Option<ChannelRole> {
        self.framing.as_ref().map(|f| f.role)
    }

    /// Tag of the last frame that verified.
    pub fn last_rx_tag(&self) -> Option<&Tag> {
        self.framing.as_ref().map(|f| &f.state.last_rx_tag)
    }

    /// Tag of the last frame produced.
    pub fn last_tx_tag(&self) -> Option<&Tag> {
        self.framing.as_ref().map(|f| &f.state.last_tx_tag)
    }

    /// Restore the chain to its start-of-connection state.
    pub fn reset(&mut self) -> Result<(), ChannelError> {
        if let Some(framing) = self.framing.as_mut() {
            framing.state = ChainState::fresh(&framing.enc_key, &framing.iv)?;
        }
        Ok(())
    }

    /// Seal one message into a frame.
    pub fn encrypt(&mut self, plaintext: &str) -> Vec<u8> {
        let Some(framing) = self.framing.as_mut() else {
            return plaintext.as_bytes().to_vec();
        };

        let mut buf = pad(plaintext.as_bytes());
        for block in buf.chunks_exact_mut(BLOCK_SIZE) {
            framing
                .state
                .encryptor
                .encrypt_block_mut(GenericArray::from_mut_slice(block));
        }

        let tag = framing
            .mac
            .compute_tag(framing.role.sender(), &framing.state.last_tx_tag, &buf);
        framing.state.last_tx_tag = tag;

        buf.extend_from_slice(&tag);
        buf
    }

    /// Verify and open one frame.
    ///
    /// The receive tag only advances when the frame verifies. After an
    /// [`ChannelError::Authentication`] or [`ChannelError::Padding`] failure
    /// the connection has to be rebuilt.
    pub fn decrypt(&mut self, frame: &[u8]) -> Result<Vec<u8>, ChannelError> {
        let Some(framing) = self.framing.as_mut() else {
            return Ok(frame.to_vec());
        };

        if frame.len() < MIN_FRAME_SIZE || frame.len() % BLOCK_SIZE != 0 {
            return Err(ChannelError::Framing { len: frame.len() });
        }

        let (ciphertext, their_tag) = frame.split_at(frame.len() - TAG_SIZE);
        framing.mac.verify_tag(
            framing.role.peer(),
            &framing.state.last_rx_tag,
            ciphertext,
            their_tag,
        )?;
        framing.state.last_rx_tag.copy_from_slice(their_tag);

        let mut msg = ciphertext.to_vec();
        for block in msg.chunks_exact_mut(BLOCK_SIZE) {
            framing
                .state
                .decryptor
                .decrypt_block_mut(GenericArray::from_mut_slice(block));
        }

        let pad_len = msg.last().copied().map_or(0, usize::from);
        if pad_len > msg.len() {
            return Err(ChannelError::Padding {
                pad_len,
                len: msg.len(),
            });
        }
        msg.truncate(msg.len() - pad_len);
        Ok(msg)
    }
}

impl fmt::Debug for SecureChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecureChannel")
            .field("self_encrypted", &self.is_self_encrypted())
            .field("role", &self.role())
            .finish_non_exhaustive()
    }
}

/// Append `0x00 || random || padLen` so the result is block aligned.
///
/// A one-byte pad is widened by a block so there is always at least one
/// random filler byte.
fn pad(plaintext: &[u8]) -> Vec<u8> {
    let mut pad_len = BLOCK_SIZE - plaintext.len() % BLOCK_SIZE;
    if pad_len == 1 {
        pad_len += BLOCK_SIZE;
    }

    let mut buf = Vec::with_capacity(plaintext.len() + pad_len + TAG_SIZE);
    buf.extend_from_slice(plaintext);
    buf.push(0x00);
    let filler_start = buf.len();
    buf.resize(filler_start + pad_len - 2, 0);
    rand::thread_rng().fill_bytes(&mut buf[filler_start..]);
    buf.push(pad_len as u8);
    buf
}
