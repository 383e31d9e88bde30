//! Command-line interface module.
//!
//! This module handles:
//! - Argument parsing via clap
//! - Packet line output (text, CSV)

mod args;
mod output;

pub use args::Args;
pub use output::{OutputFormat, PacketPrinter};
