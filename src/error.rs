//! Error types for pcapreplay.

use thiserror::Error;

/// Main error type for pcapreplay operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Capture file could not be opened
    #[error("{path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Capture file opened but is not usable
    #[error("{path}: {source}")]
    Capture {
        path: String,
        #[source]
        source: PcapError,
    },

    /// Error reading or decoding capture data
    #[error("PCAP error: {0}")]
    Pcap(#[from] PcapError),

    /// Invalid replay configuration
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Rejected control-surface access
    #[error("Control error: {0}")]
    Control(#[from] ControlError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors related to the capture file format.
#[derive(Error, Debug)]
pub enum PcapError {
    /// Input contained no bytes at all
    #[error("empty file")]
    Empty,

    /// Input ended before a full file header
    #[error("not a tcpdump file (too short)")]
    TooShort,

    /// Magic number matched neither accepted value in either byte order
    #[error("not a tcpdump file (bad magic number 0x{magic:08x})")]
    BadMagic { magic: u32 },

    /// Major version other than 2
    #[error("unknown major version {major}")]
    UnsupportedVersion { major: u16 },

    /// Link type whose framing the IP filter does not understand
    #[error("unknown linktype {link_type}; can't force IP packets")]
    UnsupportedLinkType { link_type: u32 },

    /// Record header lengths are inconsistent; the stream is desynchronized
    #[error("bad packet header at offset {offset}: caplen {caplen}, len {len}; giving up")]
    BadRecordHeader { offset: u64, caplen: u32, len: u32 },

    /// Decompression child process could not be started
    #[error("{source} while executing `{command}'")]
    Decompress {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// Packet buffer could not be allocated
    #[error("out of memory allocating {size} bytes")]
    OutOfMemory { size: usize },
}

/// Errors related to replay configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Two or more options that select the same bound were given
    #[error("{0} are mutually exclusive")]
    MutuallyExclusive(&'static str),

    /// Options that cannot be combined
    #[error("{0} and {1} options are incompatible")]
    Incompatible(&'static str, &'static str),

    /// Malformed time value
    #[error("invalid time value `{0}'")]
    InvalidTime(String),

    /// Sampling probability that is negative or not a number
    #[error("SAMPLE probability must be a number between 0 and 1, not {0}")]
    InvalidProbability(f64),

    /// Malformed end-of-window handler call
    #[error("bad END_CALL `{call}': {reason}")]
    BadEndCall { call: String, reason: String },
}

/// Errors from the key/value control surface.
#[derive(Error, Debug)]
pub enum ControlError {
    /// No control with this name
    #[error("no control named `{0}'")]
    Unknown(String),

    /// Control exists but cannot be read
    #[error("`{0}' is write-only")]
    NotReadable(String),

    /// Control exists but cannot be written
    #[error("`{0}' is read-only")]
    NotWritable(String),

    /// Value could not be parsed for this control
    #[error("`{key}' {expected}")]
    InvalidValue { key: String, expected: &'static str },
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_error_names_file() {
        let err = Error::Capture {
            path: "trace.pcap".into(),
            source: PcapError::BadMagic { magic: 0xdeadbeef },
        };
        let msg = err.to_string();
        assert!(msg.starts_with("trace.pcap: "));
        assert!(msg.contains("0xdeadbeef"));
    }

    #[test]
    fn test_open_error_keeps_os_error() {
        let err = Error::Open {
            path: "missing.pcap".into(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().contains("missing.pcap"));
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::Incompatible("FORCE_IP", "TIMING");
        assert_eq!(err.to_string(), "FORCE_IP and TIMING options are incompatible");
    }
}
