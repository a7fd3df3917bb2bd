//! seal-core: types, errors, configuration and stream framing shared by the
//! sealing engine (`seal-crypto`) and the archive format (`seal-pack`)

pub mod config;
pub mod error;
pub mod scan;
pub mod types;
pub mod wire;

pub use config::{PackingConfig, SealConfig, SealingConfig};
pub use error::{SealError, SealResult, Stage};
pub use scan::MarkerScanner;
pub use types::{Algorithm, SealSummary};
