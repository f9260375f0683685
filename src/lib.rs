//! vcdelta: VCDIFF (RFC 3284) delta encoding and decoding for revision storage.
//!
//! A target byte stream is encoded as a compact delta against a source
//! stream, one window at a time, and decoded back the same way. The source
//! is read at window offsets through [`SourceReader`], so neither side
//! needs the whole source in memory.
//!
//! The crate provides:
//! - The wire format, encoder and decoder (`vcdiff`)
//! - Session drivers over streams and buffers (`engine`)
//! - File-oriented helpers with statistics (`io`)
//! - An optional CLI (`cli` feature)
//!
//! # Quick Start
//!
//! ```
//! use vcdelta::{DeltaOptions, deltify_buffers, undeltify_buffers};
//!
//! # fn main() -> vcdelta::Result<()> {
//! let source = b"hello old world, hello old friends";
//! let target = b"hello new world, hello old friends!";
//!
//! let opts = DeltaOptions::default();
//! let delta = deltify_buffers(source, target, &opts)?;
//! let decoded = undeltify_buffers(source, &delta, &opts)?;
//! assert_eq!(decoded, target);
//! # Ok(())
//! # }
//! ```

pub mod engine;
pub mod error;
pub mod hash;
pub mod io;
pub mod source;
pub mod vcdiff;

#[cfg(feature = "cli")]
pub mod cli;

pub use engine::{
    DEFAULT_WINDOW_SIZE, DeltaOptions, Totals, Undeltifier, deltify, deltify_buffers, undeltify,
    undeltify_buffers,
};
pub use error::{DeltaError, Result};
pub use io::{DeltifyStats, UndeltifyStats, deltify_file, undeltify_file};
pub use source::{SeekSource, SourceReader};
