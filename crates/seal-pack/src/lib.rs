//! seal-pack: a minimal marker-delimited archive of named entries
//!
//! Layout:
//! ```text
//! "PACK"
//!   ( "NAME" ‖ name_len (u64 BE) ‖ name ‖ "DATA" ‖ data ‖ "HOLE" )*
//! "ACKE"
//! ```
//!
//! Entry data is not length-prefixed: the reader finds its end by scanning
//! for `HOLE`. Data that itself contains `HOLE` cannot be recovered intact.
//! The format is usually written into the plaintext side of a sealed stream
//! (see `seal-crypto`) so that several files travel in one envelope.

pub mod packager;
pub mod unpackager;

use seal_core::wire::Marker;

pub use packager::Packager;
pub use seal_core::{PackingConfig, SealError, SealResult, Stage};
pub use unpackager::{Entries, Entry, Unpackager};

pub const START: Marker = *b"PACK";
pub const NAME: Marker = *b"NAME";
pub const DATA: Marker = *b"DATA";
/// Ends the data of one entry
pub const TERMINATOR: Marker = *b"HOLE";
pub const END: Marker = *b"ACKE";
