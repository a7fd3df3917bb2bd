use std::fmt;
use std::io;

use thiserror::Error;

pub type SealResult<T> = Result<T, SealError>;

/// Where in a stream operation a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Locating the sealed-region magic marker
    Magic,
    /// Writing or reading the KEM ciphertext
    Kem,
    /// Writing or reading the encrypted nonce
    Nonce,
    /// Processing the chunk with this zero-based index
    Chunk(u64),
    ArchiveStart,
    EntryName,
    EntryData,
    ArchiveEnd,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Magic => f.write_str("magic scan"),
            Stage::Kem => f.write_str("kem"),
            Stage::Nonce => f.write_str("nonce"),
            Stage::Chunk(index) => write!(f, "chunk {index}"),
            Stage::ArchiveStart => f.write_str("archive start"),
            Stage::EntryName => f.write_str("entry name"),
            Stage::EntryData => f.write_str("entry data"),
            Stage::ArchiveEnd => f.write_str("archive end"),
        }
    }
}

#[derive(Debug, Error)]
pub enum SealError {
    #[error("master key is not set")]
    MasterKeyNotSet,

    #[error("key too short for {algorithm}: {actual} bytes (need at least {required})")]
    KeyTooShort {
        algorithm: &'static str,
        required: usize,
        actual: usize,
    },

    #[error("format error in {stage}: {reason}")]
    Format { stage: Stage, reason: String },

    #[error("decapsulation failed: {0}")]
    Decapsulation(String),

    #[error("authentication failed in {stage}")]
    Authentication { stage: Stage },

    #[error("crypto error: {0}")]
    Crypto(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error in {stage}: {source}")]
    Io {
        stage: Stage,
        #[source]
        source: io::Error,
    },
}

impl SealError {
    pub fn format(stage: Stage, reason: impl Into<String>) -> Self {
        SealError::Format {
            stage,
            reason: reason.into(),
        }
    }

    /// Wrap a sink/source failure with the stage it interrupted.
    pub fn io(stage: Stage, source: io::Error) -> Self {
        SealError::Io { stage, source }
    }

    /// Like [`SealError::io`], but a short read is reported as truncated input.
    pub fn read(stage: Stage, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::UnexpectedEof {
            SealError::format(stage, "truncated input")
        } else {
            SealError::Io { stage, source }
        }
    }

    pub fn stage(&self) -> Option<Stage> {
        match self {
            SealError::Format { stage, .. }
            | SealError::Authentication { stage }
            | SealError::Io { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    pub fn is_master_key_not_set(&self) -> bool {
        matches!(self, SealError::MasterKeyNotSet)
    }

    pub fn is_authentication(&self) -> bool {
        matches!(self, SealError::Authentication { .. })
    }

    pub fn is_format(&self) -> bool {
        matches!(self, SealError::Format { .. })
    }
}
