//! AES-128-CBC with explicit padding.
//!
//! There is no authentication tag. Decrypting under a wrong key usually
//! "succeeds" with garbage; only an out-of-range padding byte is reported.
//! Callers treat both the same way: nothing useful was recovered.

use aes::cipher::{block_padding::NoPadding, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroizing;

use crate::error::ShardlockError;

pub const BLOCK_SIZE: usize = 16;
pub const KEY_LEN: usize = 16;
pub const IV_LEN: usize = 16;

type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;

/// Ciphertext together with the IV it was produced under.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sealed {
    pub iv: [u8; IV_LEN],
    pub ciphertext: Vec<u8>,
}

/// Symmetric encryption with a fresh random IV per call.
pub trait Cipher: Send + Sync {
    fn encrypt(&self, key: &[u8; KEY_LEN], plaintext: &[u8]) -> Sealed;

    fn decrypt(
        &self,
        key: &[u8; KEY_LEN],
        iv: &[u8; IV_LEN],
        ciphertext: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>, ShardlockError>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Aes128Cbc;

impl Aes128Cbc {
    /// Encrypt under a caller-chosen IV.
    pub fn encrypt_with_iv(key: &[u8; KEY_LEN], iv: [u8; IV_LEN], plaintext: &[u8]) -> Sealed {
        let padded = Zeroizing::new(pad(plaintext, BLOCK_SIZE));
        let ciphertext =
            Aes128CbcEnc::new(key.into(), &iv.into()).encrypt_padded_vec_mut::<NoPadding>(&padded);
        Sealed { iv, ciphertext }
    }
}

impl Cipher for Aes128Cbc {
    fn encrypt(&self, key: &[u8; KEY_LEN], plaintext: &[u8]) -> Sealed {
        let mut iv = [0u8; IV_LEN];
        OsRng.fill_bytes(&mut iv);
        Self::encrypt_with_iv(key, iv, plaintext)
    }

    fn decrypt(
        &self,
        key: &[u8; KEY_LEN],
        iv: &[u8; IV_LEN],
        ciphertext: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>, ShardlockError> {
        if ciphertext.is_empty() || ciphertext.len() % BLOCK_SIZE != 0 {
            return Err(ShardlockError::Decryption("ciphertext is not block aligned"));
        }
        let mut plain = Zeroizing::new(
            Aes128CbcDec::new(key.into(), iv.into())
                .decrypt_padded_vec_mut::<NoPadding>(ciphertext)
                .map_err(|_| ShardlockError::Decryption("ciphertext is not block aligned"))?,
        );
        let len = unpadded_len(&plain)?;
        plain.truncate(len);
        Ok(plain)
    }
}

/// Append `n` bytes of value `n`, with `n` in `1..=block_size`.
pub fn pad(data: &[u8], block_size: usize) -> Vec<u8> {
    let padding = block_size - (data.len() % block_size);
    let mut padded = Vec::with_capacity(data.len() + padding);
    padded.extend_from_slice(data);
    padded.resize(data.len() + padding, padding as u8);
    padded
}

/// Strip the padding announced by the last byte.
///
/// Only the bounds are checked: the count must be non-zero and fit inside the
/// buffer. The padding bytes themselves are not compared, so a wrong key
/// can still yield a truncated, garbled plaintext.
pub fn unpad(data: &[u8]) -> Result<&[u8], ShardlockError> {
    let len = unpadded_len(data)?;
    Ok(&data[..len])
}

fn unpadded_len(data: &[u8]) -> Result<usize, ShardlockError> {
    let padding = match data.last() {
        Some(&n) => n as usize,
        None => return Err(ShardlockError::Decryption("empty plaintext")),
    };
    if padding == 0 || padding > data.len() {
        return Err(ShardlockError::Decryption("padding length out of bounds"));
    }
    Ok(data.len() - padding)
}
