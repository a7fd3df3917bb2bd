//! seal-crypto: post-quantum envelope encryption for byte streams
//!
//! Key hierarchy:
//! ```text
//! Password
//!   └── Master Key (ML-KEM-1024 keypair, seed = BLAKE3-XOF-512(password))
//!         └── Shared Secret (per operation, via encapsulate/decapsulate)
//!               ├── Nonce cipher: AES-256 single block (hides the stream nonce)
//!               └── Chunk AEAD: AES-GCM / (X)ChaCha20-Poly1305, key = leading bytes
//! ```
//!
//! Streams are sealed in 4 KiB chunks, each framed as `len (u64 BE) ‖ ciphertext ‖ tag`.
//! See [`sealing`] for the byte layout.

pub mod aead;
pub mod master_key;
pub mod nonce;
pub mod sealing;

pub use aead::{build_aead, AeadCipher, AeadConstructor};
pub use master_key::{MasterKey, SharedSecret};
pub use sealing::{seal, unseal, Sealer, MAGIC};
pub use seal_core::{Algorithm, SealError, SealResult, SealSummary, Stage};
