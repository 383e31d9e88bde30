//! Capture input.
//!
//! This module supplies raw capture bytes to the record reader.
//!
//! ## Strategies
//!
//! - Mapped: a regular file is mapped one bounded window at a time
//! - Streamed: fixed-size reads into owned buffers (stdin, pipes, and any
//!   file that could not be mapped)
//!
//! The first mapping attempt is a probe. If it fails, the source switches
//! to streamed reads without reporting an error.
//!
//! ## Compression Support
//!
//! Gzip and bzip2 captures are detected from their leading bytes and read
//! through `zcat` / `bzcat` child processes.

mod decompress;
mod mmap;
mod source;

pub use decompress::{Compression, DecompressPipe};
pub use mmap::{MapOutcome, Mapper, MMAP_UNIT};
pub use source::{BufferSource, Input, BUFFER_SIZE};
