//! Master key: password → deterministic ML-KEM-1024 keypair
//!
//! ```text
//! password ──BLAKE3 XOF (64 bytes)──► seed = d (32) ‖ z (32)
//!                                        │
//!                                        ▼
//!                          ML-KEM-1024 deterministic keygen
//!                                        │
//!                    encapsulate() ◄─────┴─────► decapsulate(ct)
//!                 (fresh secret + ct)         (same secret back)
//! ```
//!
//! On the wire the KEM ciphertext is framed as `KEM_CT_LEN (u64 BE) ‖ KEM_CT`.

use std::io::{Read, Write};

use ml_kem::kem::{Decapsulate, Encapsulate};
use ml_kem::{Ciphertext, KemCore, MlKem1024, B32};
use secrecy::{ExposeSecret, SecretString};
use seal_core::error::{SealError, SealResult, Stage};
use seal_core::wire;
use zeroize::Zeroize;

/// Seed bytes fed to deterministic key generation (512 bits)
pub const SEED_SIZE: usize = 64;

/// ML-KEM-1024 ciphertext size in bytes
pub const CIPHERTEXT_SIZE: usize = 1568;

/// ML-KEM shared secret size in bytes
pub const SHARED_SECRET_SIZE: usize = 32;

type DecapsulationKey = <MlKem1024 as KemCore>::DecapsulationKey;
type EncapsulationKey = <MlKem1024 as KemCore>::EncapsulationKey;

/// Per-operation symmetric key material. Zeroized on drop.
pub struct SharedSecret {
    bytes: [u8; SHARED_SECRET_SIZE],
}

impl SharedSecret {
    pub fn as_bytes(&self) -> &[u8; SHARED_SECRET_SIZE] {
        &self.bytes
    }
}

impl Drop for SharedSecret {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedSecret")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

struct KeyPair {
    decapsulation: DecapsulationKey,
    encapsulation: EncapsulationKey,
}

/// Long-term ML-KEM-1024 keypair derived from a password.
///
/// `MasterKey::default()` holds no key material; every KEM operation on it
/// fails with [`SealError::MasterKeyNotSet`].
#[derive(Default)]
pub struct MasterKey {
    keys: Option<Box<KeyPair>>,
}

impl MasterKey {
    /// Derive the keypair from a password. The same password always yields
    /// the same keypair.
    pub fn derive(password: &SecretString) -> Self {
        let mut seed = [0u8; SEED_SIZE];
        let mut hasher = blake3::Hasher::new();
        hasher.update(password.expose_secret().as_bytes());
        hasher.finalize_xof().fill(&mut seed);

        let key = Self::from_seed(&seed);
        seed.zeroize();
        key
    }

    /// Derive the keypair from raw seed material (`d ‖ z`).
    pub fn from_seed(seed: &[u8; SEED_SIZE]) -> Self {
        let d = B32::from_fn(|i| seed[i]);
        let z = B32::from_fn(|i| seed[32 + i]);
        let (decapsulation, encapsulation) = MlKem1024::generate_deterministic(&d, &z);

        Self {
            keys: Some(Box::new(KeyPair {
                decapsulation,
                encapsulation,
            })),
        }
    }

    pub fn is_set(&self) -> bool {
        self.keys.is_some()
    }

    fn keys(&self) -> SealResult<&KeyPair> {
        self.keys.as_deref().ok_or(SealError::MasterKeyNotSet)
    }

    /// Produce a fresh shared secret and the ciphertext that recovers it.
    pub fn encapsulate(&self) -> SealResult<(SharedSecret, Vec<u8>)> {
        let keys = self.keys()?;
        let (ciphertext, shared) = keys
            .encapsulation
            .encapsulate(&mut rand::thread_rng())
            .map_err(|_| SealError::Crypto("ML-KEM encapsulation failed".into()))?;

        let mut bytes = [0u8; SHARED_SECRET_SIZE];
        bytes.copy_from_slice(shared.as_slice());
        Ok((SharedSecret { bytes }, ciphertext.as_slice().to_vec()))
    }

    /// Recover the shared secret from a ciphertext produced by [`encapsulate`].
    ///
    /// A ciphertext made for a different key decapsulates to an unrelated
    /// secret (implicit rejection); that mismatch surfaces as an
    /// authentication failure once the secret is used.
    ///
    /// [`encapsulate`]: MasterKey::encapsulate
    pub fn decapsulate(&self, ciphertext: &[u8]) -> SealResult<SharedSecret> {
        let keys = self.keys()?;
        if ciphertext.len() != CIPHERTEXT_SIZE {
            return Err(SealError::Decapsulation(format!(
                "ciphertext is {} bytes, expected {CIPHERTEXT_SIZE}",
                ciphertext.len()
            )));
        }

        let ciphertext = Ciphertext::<MlKem1024>::from_fn(|i| ciphertext[i]);
        let shared = keys
            .decapsulation
            .decapsulate(&ciphertext)
            .map_err(|_| SealError::Decapsulation("ML-KEM decapsulation failed".into()))?;

        let mut bytes = [0u8; SHARED_SECRET_SIZE];
        bytes.copy_from_slice(shared.as_slice());
        Ok(SharedSecret { bytes })
    }

    /// Encapsulate and write `KEM_CT_LEN ‖ KEM_CT` to `w`.
    pub fn write_encapsulated<W: Write + ?Sized>(&self, w: &mut W) -> SealResult<SharedSecret> {
        let (secret, ciphertext) = self.encapsulate()?;
        wire::write_prefixed(w, &ciphertext).map_err(|e| SealError::io(Stage::Kem, e))?;
        Ok(secret)
    }

    /// Read `KEM_CT_LEN ‖ KEM_CT` from `r` and decapsulate it.
    pub fn read_encapsulated<R: Read + ?Sized>(&self, r: &mut R) -> SealResult<SharedSecret> {
        self.keys()?;

        let len = wire::read_len(r)
            .map_err(|e| SealError::read(Stage::Kem, e))?
            .ok_or_else(|| SealError::format(Stage::Kem, "missing KEM ciphertext"))?;
        if len != CIPHERTEXT_SIZE as u64 {
            return Err(SealError::format(
                Stage::Kem,
                format!("KEM ciphertext length {len}, expected {CIPHERTEXT_SIZE}"),
            ));
        }

        let mut ciphertext = vec![0u8; CIPHERTEXT_SIZE];
        r.read_exact(&mut ciphertext)
            .map_err(|e| SealError::read(Stage::Kem, e))?;
        self.decapsulate(&ciphertext)
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterKey")
            .field("set", &self.is_set())
            .field("keys", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn key(password: &str) -> MasterKey {
        MasterKey::derive(&SecretString::from(password))
    }

    #[test]
    fn test_encapsulate_decapsulate_roundtrip() {
        let mk = key("nzsNs2zqxM4SlsfI3MlaQ3QTYM1sEgbpPUv4");
        let (sent, ciphertext) = mk.encapsulate().unwrap();
        assert_eq!(ciphertext.len(), CIPHERTEXT_SIZE);

        let received = mk.decapsulate(&ciphertext).unwrap();
        assert_eq!(sent.as_bytes(), received.as_bytes());
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let a = key("same-password");
        let b = key("same-password");

        let (from_a, ct_a) = a.encapsulate().unwrap();
        let (from_b, ct_b) = b.encapsulate().unwrap();

        assert_eq!(b.decapsulate(&ct_a).unwrap().as_bytes(), from_a.as_bytes());
        assert_eq!(a.decapsulate(&ct_b).unwrap().as_bytes(), from_b.as_bytes());
    }

    #[test]
    fn test_different_passwords_do_not_interoperate() {
        let a = key("password-a");
        let b = key("password-b");

        let (secret, ciphertext) = a.encapsulate().unwrap();
        let other = b.decapsulate(&ciphertext).unwrap();
        assert_ne!(secret.as_bytes(), other.as_bytes());
    }

    #[test]
    fn test_encapsulation_is_randomized() {
        let mk = key("fresh-randomness");
        let (s1, c1) = mk.encapsulate().unwrap();
        let (s2, c2) = mk.encapsulate().unwrap();
        assert_ne!(c1, c2);
        assert_ne!(s1.as_bytes(), s2.as_bytes());
    }

    #[test]
    fn test_unset_key_fails_fast() {
        let mk = MasterKey::default();
        assert!(!mk.is_set());
        assert!(mk.encapsulate().unwrap_err().is_master_key_not_set());
        assert!(mk
            .decapsulate(&[0u8; CIPHERTEXT_SIZE])
            .unwrap_err()
            .is_master_key_not_set());

        // Nothing is consumed from the stream before failing
        let mut cursor = Cursor::new(vec![0u8; 16]);
        assert!(mk
            .read_encapsulated(&mut cursor)
            .unwrap_err()
            .is_master_key_not_set());
        assert_eq!(cursor.position(), 0);
    }

    #[test]
    fn test_malformed_ciphertext() {
        let mk = key("malformed");
        let err = mk.decapsulate(&[1u8; 100]).unwrap_err();
        assert!(matches!(err, SealError::Decapsulation(_)));
    }

    #[test]
    fn test_wire_framing_roundtrip() {
        let mk = key("wire");
        let mut out = Vec::new();
        let sent = mk.write_encapsulated(&mut out).unwrap();

        assert_eq!(out.len(), 8 + CIPHERTEXT_SIZE);
        assert_eq!(&out[..8], &(CIPHERTEXT_SIZE as u64).to_be_bytes());

        let received = mk.read_encapsulated(&mut Cursor::new(out)).unwrap();
        assert_eq!(sent.as_bytes(), received.as_bytes());
    }

    #[test]
    fn test_wire_rejects_bad_length() {
        let mk = key("wire");
        let mut out = Vec::new();
        wire::write_prefixed(&mut out, &[0u8; 10]).unwrap();

        let err = mk.read_encapsulated(&mut Cursor::new(out)).unwrap_err();
        assert!(err.is_format());
        assert_eq!(err.stage(), Some(Stage::Kem));
    }

    #[test]
    fn test_wire_truncated_ciphertext() {
        let mk = key("wire");
        let mut out = Vec::new();
        mk.write_encapsulated(&mut out).unwrap();
        out.truncate(500);

        let err = mk.read_encapsulated(&mut Cursor::new(out)).unwrap_err();
        assert!(err.is_format());
    }

    #[test]
    fn test_debug_redacts_key() {
        let debug = format!("{:?}", key("debug"));
        assert!(debug.contains("REDACTED"));
        let (secret, _) = key("debug").encapsulate().unwrap();
        assert!(format!("{secret:?}").contains("REDACTED"));
    }

    #[test]
    fn test_master_key_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<MasterKey>();
    }
}
