//! Classic pcap file and record headers.
//!
//! Headers are decoded in host byte order and swapped when the magic number
//! only matches after swapping. This mirrors how the format was historically
//! written: by whatever host produced the capture, in its native order.

use std::time::Duration;

use crate::error::PcapError;

/// Standard pcap magic number.
pub const PCAP_MAGIC: u32 = 0xa1b2_c3d4;

/// Magic number of the "modified" pcap variant, whose record headers carry
/// 8 extra bytes (interface index, protocol, packet type, padding).
pub const MODIFIED_PCAP_MAGIC: u32 = 0xa1b2_cd34;

/// Only major version understood.
pub const PCAP_VERSION_MAJOR: u16 = 2;

/// Size of the file header in bytes.
pub const FILE_HEADER_LEN: usize = 24;

/// Size of a standard record header in bytes.
pub const RECORD_HEADER_LEN: usize = 16;

/// Size of a modified-variant record header in bytes.
pub const MODIFIED_RECORD_HEADER_LEN: usize = 24;

/// Largest captured length accepted before a record is treated as corrupt.
pub const MAX_CAPLEN: u32 = 65535;

/// Byte order of a capture relative to the host.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ByteOrder {
    swapped: bool,
}

impl ByteOrder {
    /// Byte order matching the host.
    pub const NATIVE: Self = Self { swapped: false };

    /// Byte order opposite to the host.
    pub const SWAPPED: Self = Self { swapped: true };

    /// Whether fields must be byte-swapped after a native read.
    pub fn is_swapped(&self) -> bool {
        self.swapped
    }

    #[inline]
    fn u32(&self, bytes: &[u8], offset: usize) -> u32 {
        let v = u32::from_ne_bytes([
            bytes[offset],
            bytes[offset + 1],
            bytes[offset + 2],
            bytes[offset + 3],
        ]);
        if self.swapped {
            v.swap_bytes()
        } else {
            v
        }
    }

    #[inline]
    fn u16(&self, bytes: &[u8], offset: usize) -> u16 {
        let v = u16::from_ne_bytes([bytes[offset], bytes[offset + 1]]);
        if self.swapped {
            v.swap_bytes()
        } else {
            v
        }
    }
}

/// Decoded file header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileHeader {
    /// Byte order the rest of the file is written in
    pub byte_order: ByteOrder,
    /// Whether this is the modified variant with padded record headers
    pub modified: bool,
    /// Major version (always 2 once parsed)
    pub version_major: u16,
    /// Minor version, which decides how record length fields are ordered
    pub version_minor: u16,
    /// GMT to local correction
    pub thiszone: i32,
    /// Timestamp accuracy
    pub sigfigs: u32,
    /// Snapshot length
    pub snaplen: u32,
    /// Link-layer type of every record
    pub link_type: u32,
}

impl FileHeader {
    /// Parse and validate a file header.
    pub fn parse(bytes: &[u8; FILE_HEADER_LEN]) -> Result<Self, PcapError> {
        let native = u32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);

        let byte_order = if native == PCAP_MAGIC || native == MODIFIED_PCAP_MAGIC {
            ByteOrder::NATIVE
        } else {
            ByteOrder::SWAPPED
        };

        let magic = byte_order.u32(bytes, 0);
        if magic != PCAP_MAGIC && magic != MODIFIED_PCAP_MAGIC {
            return Err(PcapError::BadMagic { magic: native });
        }

        let version_major = byte_order.u16(bytes, 4);
        if version_major != PCAP_VERSION_MAJOR {
            return Err(PcapError::UnsupportedVersion {
                major: version_major,
            });
        }

        Ok(Self {
            byte_order,
            modified: magic == MODIFIED_PCAP_MAGIC,
            version_major,
            version_minor: byte_order.u16(bytes, 6),
            thiszone: byte_order.u32(bytes, 8) as i32,
            sigfigs: byte_order.u32(bytes, 12),
            snaplen: byte_order.u32(bytes, 16),
            link_type: byte_order.u32(bytes, 20),
        })
    }

    /// Bytes following each standard record header that must be skipped.
    pub fn extra_header_bytes(&self) -> usize {
        if self.modified {
            MODIFIED_RECORD_HEADER_LEN - RECORD_HEADER_LEN
        } else {
            0
        }
    }
}

/// Decoded record header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecordHeader {
    /// Capture timestamp since the Unix epoch
    pub timestamp: Duration,
    /// Bytes stored in the file for this record
    pub captured_length: u32,
    /// Bytes seen on the wire
    pub original_length: u32,
}

impl RecordHeader {
    /// Decode a record header.
    ///
    /// Files at or before version 2.3 may have the two length fields in the
    /// opposite order; `minor_version` picks the interpretation. `offset` is
    /// only used for error reporting.
    pub fn decode(
        bytes: &[u8; RECORD_HEADER_LEN],
        byte_order: ByteOrder,
        minor_version: u16,
        offset: u64,
    ) -> Result<Self, PcapError> {
        let ts_sec = byte_order.u32(bytes, 0);
        let ts_usec = byte_order.u32(bytes, 4);
        let first = byte_order.u32(bytes, 8);
        let second = byte_order.u32(bytes, 12);

        let (captured_length, original_length) =
            if minor_version > 3 || (minor_version == 3 && first <= second) {
                (first, second)
            } else {
                (second, first)
            };

        if captured_length > original_length || captured_length > MAX_CAPLEN {
            return Err(PcapError::BadRecordHeader {
                offset,
                caplen: captured_length,
                len: original_length,
            });
        }

        Ok(Self {
            timestamp: timeval(ts_sec, ts_usec),
            captured_length,
            original_length,
        })
    }

    /// Bytes seen on the wire but not stored in the capture.
    pub fn extra_length(&self) -> u32 {
        self.original_length - self.captured_length
    }
}

/// Convert a seconds/microseconds pair into a `Duration` since the epoch.
pub fn timeval(sec: u32, usec: u32) -> Duration {
    Duration::from_secs(sec as u64) + Duration::from_micros(usec as u64)
}
