//! Compression detection and decompression pipes.
//!
//! Compressed captures are not decoded in-process. Instead the file is
//! handed to the system decompressor and the capture is read from the
//! child's standard output, so the rest of the engine sees a plain pipe.

use std::io;
use std::path::Path;
use std::process::{Child, ChildStdout, Command, Stdio};

use crate::error::PcapError;

/// Detected compression format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    /// No compression
    None,
    /// Gzip (.gz)
    Gzip,
    /// Bzip2 (.bz2)
    Bzip2,
}

impl Compression {
    /// Detect compression format from magic bytes.
    pub fn detect(data: &[u8]) -> Self {
        match data {
            // Gzip: 1f 8b
            [0x1f, 0x8b, _, ..] => Compression::Gzip,
            // Bzip2: "BZh"
            [b'B', b'Z', b'h', ..] => Compression::Bzip2,
            _ => Compression::None,
        }
    }

    /// Program that writes the decompressed stream to stdout.
    pub fn program(&self) -> Option<&'static str> {
        match self {
            Compression::None => None,
            Compression::Gzip => Some("zcat"),
            Compression::Bzip2 => Some("bzcat"),
        }
    }

    /// Check if this represents compressed data.
    pub fn is_compressed(&self) -> bool {
        !matches!(self, Compression::None)
    }
}

impl std::fmt::Display for Compression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Compression::None => write!(f, "none"),
            Compression::Gzip => write!(f, "gzip"),
            Compression::Bzip2 => write!(f, "bzip2"),
        }
    }
}

/// A running decompressor whose stdout carries the capture.
pub struct DecompressPipe {
    child: Child,
    stdout: Option<ChildStdout>,
    command: String,
}

impl DecompressPipe {
    /// Spawn the decompressor for `path`.
    pub fn spawn(path: &Path, compression: Compression) -> Result<Self, PcapError> {
        let program = compression.program().ok_or_else(|| PcapError::Decompress {
            command: path.display().to_string(),
            source: io::Error::new(io::ErrorKind::InvalidInput, "input is not compressed"),
        })?;
        let command = format!("{} {}", program, path.display());

        let mut child = Command::new(program)
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .spawn()
            .map_err(|source| PcapError::Decompress {
                command: command.clone(),
                source,
            })?;

        let stdout = child.stdout.take();
        tracing::debug!(%command, pid = child.id(), "started decompression pipe");

        Ok(Self {
            child,
            stdout,
            command,
        })
    }

    /// The command line that was executed.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Close the read end and reap the child.
    ///
    /// Closing stdout first lets a child that is still writing exit on
    /// `SIGPIPE` instead of blocking forever. Safe to call more than once.
    pub fn close(&mut self) {
        if self.stdout.take().is_none() {
            return;
        }
        match self.child.wait() {
            Ok(status) if !status.success() => {
                tracing::debug!(command = %self.command, %status, "decompression pipe exited")
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(command = %self.command, "waiting for pipe: {}", e),
        }
    }
}

impl io::Read for DecompressPipe {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.stdout.as_mut() {
            Some(stdout) => stdout.read(buf),
            None => Ok(0),
        }
    }
}

impl Drop for DecompressPipe {
    fn drop(&mut self) {
        self.close();
    }
}
