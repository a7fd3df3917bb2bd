//! Stream nonce: generation, per-chunk advance, and on-wire obfuscation
//!
//! Only the first nonce byte changes between chunks (wrapping add), so a
//! stream of more than 256 chunks reuses nonces under one key. The layout is
//! kept for compatibility with existing sealed data.
//!
//! The nonce is written encrypted under single-block AES-256 keyed with the
//! shared secret, zero-padded to whole 16-byte blocks.

use aes_gcm::aes::cipher::generic_array::GenericArray;
use aes_gcm::aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use aes_gcm::aes::Aes256;
use rand::RngCore;
use seal_core::{SealError, SealResult};

use crate::master_key::SharedSecret;

pub const BLOCK_SIZE: usize = 16;

/// Number of distinct nonces before the counter byte wraps.
pub const NONCE_PERIOD: u64 = 256;

pub fn random_nonce(size: usize) -> Vec<u8> {
    let mut nonce = vec![0u8; size];
    rand::thread_rng().fill_bytes(&mut nonce);
    nonce
}

/// Step the nonce to the next chunk.
pub fn advance(nonce: &mut [u8]) {
    if let Some(first) = nonce.first_mut() {
        *first = first.wrapping_add(1);
    }
}

/// Length of the encrypted form of a nonce of `nonce_len` bytes.
pub fn encrypted_len(nonce_len: usize) -> usize {
    nonce_len.div_ceil(BLOCK_SIZE) * BLOCK_SIZE
}

/// Block cipher hiding the nonce value on the wire. Not used for integrity.
pub struct NonceCipher {
    cipher: Aes256,
}

impl NonceCipher {
    pub fn new(secret: &SharedSecret) -> SealResult<Self> {
        let cipher = Aes256::new_from_slice(&secret.as_bytes()[..32])
            .map_err(|e| SealError::Crypto(format!("nonce cipher init failed: {e}")))?;
        Ok(Self { cipher })
    }

    pub fn encrypt(&self, nonce: &[u8]) -> Vec<u8> {
        let mut out = vec![0u8; encrypted_len(nonce.len())];
        out[..nonce.len()].copy_from_slice(nonce);
        for block in out.chunks_exact_mut(BLOCK_SIZE) {
            self.cipher.encrypt_block(GenericArray::from_mut_slice(block));
        }
        out
    }

    /// Decrypt `encrypted` and keep the leading `nonce_len` bytes.
    pub fn decrypt(&self, encrypted: &[u8], nonce_len: usize) -> SealResult<Vec<u8>> {
        if encrypted.len() % BLOCK_SIZE != 0 || encrypted.len() < nonce_len {
            return Err(SealError::Crypto(format!(
                "encrypted nonce of {} bytes cannot hold a {nonce_len}-byte nonce",
                encrypted.len()
            )));
        }
        let mut out = encrypted.to_vec();
        for block in out.chunks_exact_mut(BLOCK_SIZE) {
            self.cipher.decrypt_block(GenericArray::from_mut_slice(block));
        }
        out.truncate(nonce_len);
        Ok(out)
    }
}
