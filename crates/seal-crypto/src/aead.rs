//! AEAD registry: turns raw key material into an authenticated cipher
//!
//! Every algorithm checks the key is long enough and then uses only its
//! leading `key_size()` bytes, so one 32-byte shared secret can feed any of
//! them. All sealing uses empty associated data.

use aes_gcm::aead::consts::U12;
use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::aes::Aes192;
use aes_gcm::{Aes128Gcm, Aes256Gcm, AesGcm};
use chacha20poly1305::{ChaCha20Poly1305, XChaCha20Poly1305};
use seal_core::{Algorithm, SealError, SealResult};

type Aes192Gcm = AesGcm<Aes192, U12>;

/// Capability to build an AEAD instance from key bytes.
pub trait AeadConstructor {
    fn build(&self, key: &[u8]) -> SealResult<AeadCipher>;
}

impl AeadConstructor for Algorithm {
    fn build(&self, key: &[u8]) -> SealResult<AeadCipher> {
        build_aead(*self, key)
    }
}

/// An AEAD bound to one key.
pub enum AeadCipher {
    Aes128Gcm(Aes128Gcm),
    Aes192Gcm(Box<Aes192Gcm>),
    Aes256Gcm(Box<Aes256Gcm>),
    ChaCha20Poly1305(ChaCha20Poly1305),
    XChaCha20Poly1305(XChaCha20Poly1305),
}

/// Build the AEAD for `algorithm` from the leading bytes of `key`.
///
/// Fails with [`SealError::KeyTooShort`] if `key` is shorter than the
/// algorithm's key size; nothing is constructed in that case.
pub fn build_aead(algorithm: Algorithm, key: &[u8]) -> SealResult<AeadCipher> {
    let required = algorithm.key_size();
    if key.len() < required {
        return Err(SealError::KeyTooShort {
            algorithm: algorithm.name(),
            required,
            actual: key.len(),
        });
    }
    let key = &key[..required];

    let cipher = match algorithm {
        Algorithm::Aes128Gcm => AeadCipher::Aes128Gcm(new_cipher(key)?),
        Algorithm::Aes192Gcm => AeadCipher::Aes192Gcm(Box::new(new_cipher(key)?)),
        Algorithm::Aes256Gcm => AeadCipher::Aes256Gcm(Box::new(new_cipher(key)?)),
        Algorithm::ChaCha20Poly1305 => AeadCipher::ChaCha20Poly1305(new_cipher(key)?),
        Algorithm::XChaCha20Poly1305 => AeadCipher::XChaCha20Poly1305(new_cipher(key)?),
    };
    Ok(cipher)
}

fn new_cipher<C: KeyInit>(key: &[u8]) -> SealResult<C> {
    C::new_from_slice(key).map_err(|e| SealError::Crypto(format!("AEAD key init failed: {e}")))
}

impl AeadCipher {
    pub fn algorithm(&self) -> Algorithm {
        match self {
            AeadCipher::Aes128Gcm(_) => Algorithm::Aes128Gcm,
            AeadCipher::Aes192Gcm(_) => Algorithm::Aes192Gcm,
            AeadCipher::Aes256Gcm(_) => Algorithm::Aes256Gcm,
            AeadCipher::ChaCha20Poly1305(_) => Algorithm::ChaCha20Poly1305,
            AeadCipher::XChaCha20Poly1305(_) => Algorithm::XChaCha20Poly1305,
        }
    }

    pub fn nonce_size(&self) -> usize {
        self.algorithm().nonce_size()
    }

    /// Encrypt `plaintext`, returning `ciphertext || tag`.
    pub fn seal(&self, nonce: &[u8], plaintext: &[u8]) -> SealResult<Vec<u8>> {
        self.check_nonce(nonce)?;
        let sealed = match self {
            AeadCipher::Aes128Gcm(c) => encrypt(c, nonce, plaintext),
            AeadCipher::Aes192Gcm(c) => encrypt(c.as_ref(), nonce, plaintext),
            AeadCipher::Aes256Gcm(c) => encrypt(c.as_ref(), nonce, plaintext),
            AeadCipher::ChaCha20Poly1305(c) => encrypt(c, nonce, plaintext),
            AeadCipher::XChaCha20Poly1305(c) => encrypt(c, nonce, plaintext),
        };
        sealed.map_err(|e| SealError::Crypto(format!("{} seal failed: {e}", self.algorithm())))
    }

    /// Decrypt and verify `ciphertext || tag`.
    ///
    /// Returns `None` if the tag does not verify; the reason is not exposed.
    pub fn open(&self, nonce: &[u8], sealed: &[u8]) -> Option<Vec<u8>> {
        if nonce.len() != self.nonce_size() {
            return None;
        }
        let opened = match self {
            AeadCipher::Aes128Gcm(c) => decrypt(c, nonce, sealed),
            AeadCipher::Aes192Gcm(c) => decrypt(c.as_ref(), nonce, sealed),
            AeadCipher::Aes256Gcm(c) => decrypt(c.as_ref(), nonce, sealed),
            AeadCipher::ChaCha20Poly1305(c) => decrypt(c, nonce, sealed),
            AeadCipher::XChaCha20Poly1305(c) => decrypt(c, nonce, sealed),
        };
        opened.ok()
    }

    fn check_nonce(&self, nonce: &[u8]) -> SealResult<()> {
        if nonce.len() != self.nonce_size() {
            return Err(SealError::Crypto(format!(
                "{} nonce must be {} bytes, got {}",
                self.algorithm(),
                self.nonce_size(),
                nonce.len()
            )));
        }
        Ok(())
    }
}

impl std::fmt::Debug for AeadCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AeadCipher")
            .field("algorithm", &self.algorithm())
            .field("key", &"[REDACTED]")
            .finish()
    }
}

fn encrypt<C: Aead>(cipher: &C, nonce: &[u8], plaintext: &[u8]) -> aes_gcm::aead::Result<Vec<u8>> {
    cipher.encrypt(GenericArray::from_slice(nonce), plaintext)
}

fn decrypt<C: Aead>(cipher: &C, nonce: &[u8], sealed: &[u8]) -> aes_gcm::aead::Result<Vec<u8>> {
    cipher.decrypt(GenericArray::from_slice(nonce), sealed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nonce_for(cipher: &AeadCipher) -> Vec<u8> {
        vec![0x24u8; cipher.nonce_size()]
    }

    #[test]
    fn test_seal_open_roundtrip_all_algorithms() {
        let key = [0x42u8; 32];
        for algorithm in Algorithm::ALL {
            let cipher = algorithm.build(&key).unwrap();
            assert_eq!(cipher.algorithm(), algorithm);

            let nonce = nonce_for(&cipher);
            let sealed = cipher.seal(&nonce, b"hello, sealed world!").unwrap();
            assert_eq!(sealed.len(), 20 + algorithm.tag_size());

            let opened = cipher.open(&nonce, &sealed).unwrap();
            assert_eq!(opened, b"hello, sealed world!");
        }
    }

    #[test]
    fn test_key_too_short() {
        for algorithm in Algorithm::ALL {
            let key = vec![0u8; algorithm.key_size() - 1];
            let err = build_aead(algorithm, &key).unwrap_err();
            match err {
                SealError::KeyTooShort {
                    required, actual, ..
                } => {
                    assert_eq!(required, algorithm.key_size());
                    assert_eq!(actual, key.len());
                }
                other => panic!("expected KeyTooShort, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_longer_key_is_truncated() {
        // Only the first 16 bytes matter for AES-128
        let mut long_key = [0x11u8; 32];
        let short_key = [0x11u8; 16];
        long_key[16..].fill(0xEE);

        let a = build_aead(Algorithm::Aes128Gcm, &long_key).unwrap();
        let b = build_aead(Algorithm::Aes128Gcm, &short_key).unwrap();
        let nonce = nonce_for(&a);

        let sealed = a.seal(&nonce, b"truncation").unwrap();
        assert_eq!(b.open(&nonce, &sealed).unwrap(), b"truncation");
    }

    #[test]
    fn test_same_secret_different_algorithms_differ() {
        let key = [0x33u8; 32];
        let gcm128 = build_aead(Algorithm::Aes128Gcm, &key).unwrap();
        let gcm256 = build_aead(Algorithm::Aes256Gcm, &key).unwrap();
        let nonce = nonce_for(&gcm128);

        let sealed = gcm128.seal(&nonce, b"payload").unwrap();
        assert!(gcm256.open(&nonce, &sealed).is_none());
    }

    #[test]
    fn test_open_tampered() {
        let cipher = build_aead(Algorithm::ChaCha20Poly1305, &[7u8; 32]).unwrap();
        let nonce = nonce_for(&cipher);
        let mut sealed = cipher.seal(&nonce, b"secret data").unwrap();
        sealed[0] ^= 0xFF;

        assert!(cipher.open(&nonce, &sealed).is_none(), "tampered ciphertext must fail");
    }

    #[test]
    fn test_wrong_nonce_size() {
        let cipher = build_aead(Algorithm::XChaCha20Poly1305, &[7u8; 32]).unwrap();
        assert!(cipher.seal(&[0u8; 12], b"x").is_err());
        assert!(cipher.open(&[0u8; 12], &[0u8; 17]).is_none());
    }

    #[test]
    fn test_debug_redacts_key() {
        let cipher = build_aead(Algorithm::Aes256Gcm, &[9u8; 32]).unwrap();
        let debug = format!("{cipher:?}");
        assert!(debug.contains("REDACTED"));
        assert!(debug.contains("Aes256Gcm"));
    }
}
