//! pcapreplay - Replay classic pcap captures into a packet pipeline.
//!
//! This library reads capture files record by record and emits the
//! packets either as fast as possible or paced to their original
//! inter-arrival times. Captures may be memory-mapped, read from stdin, or
//! decompressed on the fly.
//!
//! # Example
//!
//! ```no_run
//! use pcapreplay::replay::{CaptureReplay, Mode, ReplayConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = ReplayConfig::new("capture.pcap").with_sample(0.1);
//!     let mut replay = CaptureReplay::open(config, Mode::Pull)?;
//!     while let Some(packet) = replay.pull() {
//!         println!("{:?} {} bytes", packet.timestamp(), packet.len());
//!     }
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod error;
pub mod io;
pub mod pcap;
pub mod replay;

pub use error::{Error, Result};
