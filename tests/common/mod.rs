//! Capture fixtures for integration tests.

#![allow(dead_code)]

use std::io::Write;

use tempfile::NamedTempFile;

pub const PCAP_MAGIC: u32 = 0xa1b2_c3d4;
pub const MODIFIED_PCAP_MAGIC: u32 = 0xa1b2_cd34;

pub const LINKTYPE_ETHERNET: u32 = 1;
pub const LINKTYPE_RAW: u32 = 12;
pub const LINKTYPE_IEEE802_11: u32 = 105;

/// Builds classic pcap files byte by byte.
pub struct CaptureBuilder {
    magic: u32,
    swapped: bool,
    major: u16,
    minor: u16,
    link_type: u32,
    body: Vec<u8>,
}

impl CaptureBuilder {
    pub fn new() -> Self {
        Self {
            magic: PCAP_MAGIC,
            swapped: false,
            major: 2,
            minor: 4,
            link_type: LINKTYPE_ETHERNET,
            body: Vec::new(),
        }
    }

    /// Write every field in the byte order opposite to the host.
    pub fn swapped(mut self) -> Self {
        self.swapped = true;
        self
    }

    /// Use the modified format with 8 extra bytes per record header.
    pub fn modified(mut self) -> Self {
        self.magic = MODIFIED_PCAP_MAGIC;
        self
    }

    pub fn magic(mut self, magic: u32) -> Self {
        self.magic = magic;
        self
    }

    pub fn version(mut self, major: u16, minor: u16) -> Self {
        self.major = major;
        self.minor = minor;
        self
    }

    pub fn link_type(mut self, link_type: u32) -> Self {
        self.link_type = link_type;
        self
    }

    fn u32(&self, v: u32) -> [u8; 4] {
        if self.swapped {
            v.swap_bytes().to_ne_bytes()
        } else {
            v.to_ne_bytes()
        }
    }

    fn u16(&self, v: u16) -> [u8; 2] {
        if self.swapped {
            v.swap_bytes().to_ne_bytes()
        } else {
            v.to_ne_bytes()
        }
    }

    /// Append a record with the two length fields written verbatim.
    pub fn raw_record(mut self, sec: u32, usec: u32, first: u32, second: u32, data: &[u8]) -> Self {
        let mut header = Vec::with_capacity(24);
        header.extend_from_slice(&self.u32(sec));
        header.extend_from_slice(&self.u32(usec));
        header.extend_from_slice(&self.u32(first));
        header.extend_from_slice(&self.u32(second));
        if self.magic == MODIFIED_PCAP_MAGIC {
            header.extend_from_slice(&[0xee; 8]);
        }
        self.body.extend_from_slice(&header);
        self.body.extend_from_slice(data);
        self
    }

    /// Append a record whose wire length is `orig_len`.
    pub fn record_with_len(self, sec: u32, usec: u32, data: &[u8], orig_len: u32) -> Self {
        let caplen = data.len() as u32;
        self.raw_record(sec, usec, caplen, orig_len, data)
    }

    /// Append a fully captured record.
    pub fn record(self, sec: u32, usec: u32, data: &[u8]) -> Self {
        let len = data.len() as u32;
        self.record_with_len(sec, usec, data, len)
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(24 + self.body.len());
        out.extend_from_slice(&self.u32(self.magic));
        out.extend_from_slice(&self.u16(self.major));
        out.extend_from_slice(&self.u16(self.minor));
        out.extend_from_slice(&self.u32(0)); // thiszone
        out.extend_from_slice(&self.u32(0)); // sigfigs
        out.extend_from_slice(&self.u32(65535));
        out.extend_from_slice(&self.u32(self.link_type));
        out.extend_from_slice(&self.body);
        out
    }

    pub fn write_temp(&self) -> NamedTempFile {
        write_temp(&self.build())
    }
}

impl Default for CaptureBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub fn write_temp(bytes: &[u8]) -> NamedTempFile {
    let mut temp = NamedTempFile::new().unwrap();
    temp.write_all(bytes).unwrap();
    temp.flush().unwrap();
    temp
}

/// A minimal IPv4/UDP header with no payload.
pub fn ipv4_header() -> Vec<u8> {
    vec![
        0x45, 0x00, 0x00, 0x14, 0x00, 0x00, 0x00, 0x00, 0x40, 0x11, 0x00, 0x00, 10, 0, 0, 1, 10,
        0, 0, 2,
    ]
}

/// An Ethernet frame carrying `ethertype` and `payload`.
pub fn ethernet(ethertype: u16, payload: &[u8]) -> Vec<u8> {
    let mut frame = vec![0xff; 6];
    frame.extend_from_slice(&[0x02, 0x00, 0x00, 0x00, 0x00, 0x01]);
    frame.extend_from_slice(&ethertype.to_be_bytes());
    frame.extend_from_slice(payload);
    frame
}

/// Whether `program` can be run from `PATH`.
pub fn have_program(program: &str) -> bool {
    std::process::Command::new(program)
        .arg("--version")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .is_ok()
}
