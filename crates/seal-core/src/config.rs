use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{SealError, SealResult};
use crate::types::Algorithm;

/// Default plaintext bytes per sealed chunk
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// Default read window for marker scans
pub const DEFAULT_SCAN_WINDOW: usize = 4096;

/// Top-level configuration (loaded from seal.toml)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SealConfig {
    pub sealing: SealingConfig,
    pub packing: PackingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SealingConfig {
    /// AEAD for the chunk stream (default: aes-256-gcm)
    pub algorithm: Algorithm,
    /// Plaintext bytes per chunk (default: 4096)
    pub chunk_size: usize,
    /// Bytes read per step while scanning for the magic marker (default: 4096)
    pub scan_window: usize,
    /// Largest chunk length prefix accepted when unsealing (default: 16 MiB)
    pub max_frame_len: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackingConfig {
    /// Bytes read per step while scanning for the entry terminator (default: 4096)
    pub scan_window: usize,
    /// Largest entry name accepted when unpacking (default: 64 KiB)
    pub max_name_len: u64,
}

impl Default for SealingConfig {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            scan_window: DEFAULT_SCAN_WINDOW,
            max_frame_len: 16 * 1024 * 1024,
        }
    }
}

impl Default for PackingConfig {
    fn default() -> Self {
        Self {
            scan_window: DEFAULT_SCAN_WINDOW,
            max_name_len: 64 * 1024,
        }
    }
}

impl SealConfig {
    /// Parse and validate a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(s: &str) -> SealResult<Self> {
        let config: SealConfig =
            toml::from_str(s).map_err(|e| SealError::Config(format!("invalid TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> SealResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            SealError::Config(format!("reading config {}: {e}", path.display()))
        })?;
        tracing::debug!(path = %path.display(), "loaded seal config");
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> SealResult<()> {
        self.sealing.validate()?;
        self.packing.validate()
    }
}

impl SealingConfig {
    pub fn validate(&self) -> SealResult<()> {
        if self.chunk_size == 0 {
            return Err(SealError::Config("sealing.chunk_size must be at least 1".into()));
        }
        if self.scan_window < 4 {
            return Err(SealError::Config("sealing.scan_window must be at least 4".into()));
        }
        let min_frame = self.chunk_size as u64 + self.algorithm.tag_size() as u64;
        if self.max_frame_len < min_frame {
            return Err(SealError::Config(format!(
                "sealing.max_frame_len {} is below one sealed chunk ({min_frame})",
                self.max_frame_len
            )));
        }
        Ok(())
    }
}

impl PackingConfig {
    pub fn validate(&self) -> SealResult<()> {
        if self.scan_window < 4 {
            return Err(SealError::Config("packing.scan_window must be at least 4".into()));
        }
        Ok(())
    }
}
