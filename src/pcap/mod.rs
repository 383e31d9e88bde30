//! Capture file format model.
//!
//! This module describes the classic pcap container: the file header, the
//! per-record header, and the link-layer types that records carry.

mod format;
mod linktype;

pub use format::{
    timeval, ByteOrder, FileHeader, RecordHeader, FILE_HEADER_LEN, MAX_CAPLEN,
    MODIFIED_PCAP_MAGIC, MODIFIED_RECORD_HEADER_LEN, PCAP_MAGIC, PCAP_VERSION_MAJOR,
    RECORD_HEADER_LEN,
};
pub use linktype::{ethertype, ip_header_offset, LinkType};
