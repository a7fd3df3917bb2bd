//! Chunked sealing engine
//!
//! Framed format (`seal` / `unseal`):
//! ```text
//! "SEAL" | KEM_CT_LEN(8) | KEM_CT | NONCE_LEN(8) | ENC_NONCE | { CHUNK_LEN(8) | CHUNK }*
//! ```
//! `ENC_NONCE` is the nonce zero-padded to whole AES blocks and encrypted
//! with the shared secret. The magic marker lets `unseal` find the sealed
//! region anywhere inside a larger seekable stream.
//!
//! Compact format (`seal_compact` / `unseal_compact`):
//! ```text
//! KEM_CT_LEN(8) | KEM_CT | NONCE_LEN(8) | NONCE | { CHUNK_LEN(8) | CHUNK }*
//! ```
//! No marker and a clear nonce, so it can be read from any `Read`.
//!
//! In both, each chunk is `AEAD(nonce, plaintext[..chunk_size], aad = "")`
//! and the stream ends where the input ends; there is no trailer.
//!
//! Tampering with chunk ciphertext fails authentication. A damaged
//! `CHUNK_LEN` prefix usually surfaces as a format error instead (oversized
//! or truncated frame); either way no altered plaintext is accepted.

use std::io::{Read, Seek, Write};

use seal_core::config::SealingConfig;
use seal_core::error::{SealError, SealResult, Stage};
use seal_core::scan::MarkerScanner;
use seal_core::types::{Algorithm, SealSummary};
use seal_core::wire::{self, Marker};
use tracing::{debug, trace, warn};

use crate::aead::{AeadCipher, AeadConstructor};
use crate::master_key::{MasterKey, SharedSecret};
use crate::nonce::{self, NonceCipher, NONCE_PERIOD};

/// Marker opening every framed sealed region
pub const MAGIC: Marker = [0x53, 0x45, 0x41, 0x4c];

/// Seals and unseals streams with one master key.
#[derive(Debug)]
pub struct Sealer<'k> {
    key: &'k MasterKey,
    config: SealingConfig,
}

impl<'k> Sealer<'k> {
    /// Sealer using the default chunking for `algorithm`.
    pub fn new(key: &'k MasterKey, algorithm: Algorithm) -> Self {
        Self {
            key,
            config: SealingConfig {
                algorithm,
                ..SealingConfig::default()
            },
        }
    }

    pub fn with_config(key: &'k MasterKey, config: &SealingConfig) -> SealResult<Self> {
        config.validate()?;
        Ok(Self {
            key,
            config: config.clone(),
        })
    }

    pub fn algorithm(&self) -> Algorithm {
        self.config.algorithm
    }

    /// Seal `input` into `out` using the framed format.
    pub fn seal<W, R>(&self, out: &mut W, input: &mut R) -> SealResult<SealSummary>
    where
        W: Write + ?Sized,
        R: Read + ?Sized,
    {
        if !self.key.is_set() {
            return Err(SealError::MasterKeyNotSet);
        }
        debug!(algorithm = %self.config.algorithm, "sealing stream");

        out.write_all(&MAGIC)
            .map_err(|e| SealError::io(Stage::Magic, e))?;
        let secret = self.key.write_encapsulated(out)?;
        let (aead, nonce_cipher) = self.ciphers(&secret)?;

        let nonce = nonce::random_nonce(aead.nonce_size());
        wire::write_len(out, nonce.len() as u64)
            .and_then(|_| out.write_all(&nonce_cipher.encrypt(&nonce)))
            .map_err(|e| SealError::io(Stage::Nonce, e))?;

        let summary = self.write_chunks(&aead, nonce, out, input)?;
        debug!(chunks = summary.chunks, bytes = summary.bytes, "sealed stream");
        Ok(summary)
    }

    /// Locate a framed sealed region in `input` and write its plaintext to `out`.
    ///
    /// Bytes before the magic marker are skipped. Plaintext of chunks that
    /// authenticated before a failure has already been written to `out`.
    pub fn unseal<W, R>(&self, out: &mut W, input: &mut R) -> SealResult<SealSummary>
    where
        W: Write + ?Sized,
        R: Read + Seek + ?Sized,
    {
        if !self.key.is_set() {
            return Err(SealError::MasterKeyNotSet);
        }
        debug!(algorithm = %self.config.algorithm, "unsealing stream");

        let found = MarkerScanner::new(MAGIC, self.config.scan_window)
            .skip_to(input)
            .map_err(|e| SealError::io(Stage::Magic, e))?;
        if !found {
            return Err(SealError::format(Stage::Magic, "no sealed region found"));
        }

        let secret = self.key.read_encapsulated(input)?;
        let (aead, nonce_cipher) = self.ciphers(&secret)?;

        let nonce_len = read_nonce_len(input, &aead)?;
        let mut encrypted = vec![0u8; nonce::encrypted_len(nonce_len)];
        input
            .read_exact(&mut encrypted)
            .map_err(|e| SealError::read(Stage::Nonce, e))?;
        let nonce = nonce_cipher.decrypt(&encrypted, nonce_len)?;

        let summary = self.read_chunks(&aead, nonce, out, input)?;
        debug!(chunks = summary.chunks, bytes = summary.bytes, "unsealed stream");
        Ok(summary)
    }

    /// Seal `input` into `out` using the compact format.
    pub fn seal_compact<W, R>(&self, out: &mut W, input: &mut R) -> SealResult<SealSummary>
    where
        W: Write + ?Sized,
        R: Read + ?Sized,
    {
        debug!(algorithm = %self.config.algorithm, "sealing compact stream");
        let secret = self.key.write_encapsulated(out)?;
        let aead = self.config.algorithm.build(secret.as_bytes())?;

        let nonce = nonce::random_nonce(aead.nonce_size());
        wire::write_prefixed(out, &nonce).map_err(|e| SealError::io(Stage::Nonce, e))?;

        self.write_chunks(&aead, nonce, out, input)
    }

    /// Read a compact sealed stream from the current position of `input`.
    pub fn unseal_compact<W, R>(&self, out: &mut W, input: &mut R) -> SealResult<SealSummary>
    where
        W: Write + ?Sized,
        R: Read + ?Sized,
    {
        debug!(algorithm = %self.config.algorithm, "unsealing compact stream");
        let secret = self.key.read_encapsulated(input)?;
        let aead = self.config.algorithm.build(secret.as_bytes())?;

        let nonce_len = read_nonce_len(input, &aead)?;
        let mut nonce = vec![0u8; nonce_len];
        input
            .read_exact(&mut nonce)
            .map_err(|e| SealError::read(Stage::Nonce, e))?;

        self.read_chunks(&aead, nonce, out, input)
    }

    fn ciphers(&self, secret: &SharedSecret) -> SealResult<(AeadCipher, NonceCipher)> {
        let aead = self.config.algorithm.build(secret.as_bytes())?;
        let nonce_cipher = NonceCipher::new(secret)?;
        Ok((aead, nonce_cipher))
    }

    fn write_chunks<W, R>(
        &self,
        aead: &AeadCipher,
        mut nonce: Vec<u8>,
        out: &mut W,
        input: &mut R,
    ) -> SealResult<SealSummary>
    where
        W: Write + ?Sized,
        R: Read + ?Sized,
    {
        let mut summary = SealSummary::default();
        let mut buf = vec![0u8; self.config.chunk_size];

        loop {
            let stage = Stage::Chunk(summary.chunks);
            let n = wire::fill(input, &mut buf).map_err(|e| SealError::io(stage, e))?;
            if n == 0 {
                break;
            }
            warn_on_nonce_wrap(summary.chunks, "seal");

            let sealed = aead.seal(&nonce, &buf[..n])?;
            wire::write_prefixed(out, &sealed).map_err(|e| SealError::io(stage, e))?;
            trace!(chunk = summary.chunks, len = sealed.len(), "sealed chunk");

            nonce::advance(&mut nonce);
            summary.chunks += 1;
            summary.bytes += n as u64;
            if n < buf.len() {
                break;
            }
        }

        Ok(summary)
    }

    fn read_chunks<W, R>(
        &self,
        aead: &AeadCipher,
        mut nonce: Vec<u8>,
        out: &mut W,
        input: &mut R,
    ) -> SealResult<SealSummary>
    where
        W: Write + ?Sized,
        R: Read + ?Sized,
    {
        let mut summary = SealSummary::default();
        let mut buf = Vec::new();

        loop {
            let stage = Stage::Chunk(summary.chunks);
            let len = match wire::read_len(input).map_err(|e| SealError::read(stage, e))? {
                Some(len) => len,
                None => break,
            };
            if len > self.config.max_frame_len {
                return Err(SealError::format(
                    stage,
                    format!(
                        "chunk length {len} exceeds limit {}",
                        self.config.max_frame_len
                    ),
                ));
            }

            buf.resize(len as usize, 0);
            input
                .read_exact(&mut buf)
                .map_err(|e| SealError::read(stage, e))?;

            warn_on_nonce_wrap(summary.chunks, "unseal");

            let plaintext = aead
                .open(&nonce, &buf)
                .ok_or(SealError::Authentication { stage })?;
            out.write_all(&plaintext)
                .map_err(|e| SealError::io(stage, e))?;
            trace!(chunk = summary.chunks, len = plaintext.len(), "opened chunk");

            nonce::advance(&mut nonce);
            summary.chunks += 1;
            summary.bytes += plaintext.len() as u64;
        }

        Ok(summary)
    }
}

/// Logs once per stream, at the first chunk whose nonce repeats an earlier one.
fn warn_on_nonce_wrap(chunk: u64, operation: &'static str) -> bool {
    if chunk != NONCE_PERIOD {
        return false;
    }
    warn!(
        operation,
        chunks = chunk,
        "nonce counter wrapped: later chunks reuse nonces under the same key"
    );
    true
}

fn read_nonce_len<R: Read + ?Sized>(input: &mut R, aead: &AeadCipher) -> SealResult<usize> {
    let len = wire::read_len(input)
        .map_err(|e| SealError::read(Stage::Nonce, e))?
        .ok_or_else(|| SealError::format(Stage::Nonce, "missing nonce"))?;
    if len != aead.nonce_size() as u64 {
        return Err(SealError::format(
            Stage::Nonce,
            format!(
                "nonce length {len} does not match {} ({} bytes)",
                aead.algorithm(),
                aead.nonce_size()
            ),
        ));
    }
    Ok(aead.nonce_size())
}

/// Seal `input` into `out` with default chunking.
pub fn seal<W, R>(key: &MasterKey, algorithm: Algorithm, out: &mut W, input: &mut R) -> SealResult<SealSummary>
where
    W: Write + ?Sized,
    R: Read + ?Sized,
{
    Sealer::new(key, algorithm).seal(out, input)
}

/// Unseal the first framed sealed region of `input` into `out`.
pub fn unseal<W, R>(key: &MasterKey, algorithm: Algorithm, out: &mut W, input: &mut R) -> SealResult<SealSummary>
where
    W: Write + ?Sized,
    R: Read + Seek + ?Sized,
{
    Sealer::new(key, algorithm).unseal(out, input)
}
