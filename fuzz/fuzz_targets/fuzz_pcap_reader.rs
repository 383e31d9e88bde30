//! Fuzz target for capture header and record decoding.
//!
//! Tests handling of malformed captures including:
//! - Magic number and byte order detection
//! - File header validation
//! - Record headers (length ordering, caplen limits, timestamps)
//! - Locating IPv4 headers inside each supported encapsulation

#![no_main]

use libfuzzer_sys::fuzz_target;
use pcapreplay::pcap::{ip_header_offset, FileHeader, LinkType, RecordHeader, FILE_HEADER_LEN, RECORD_HEADER_LEN};

fuzz_target!(|data: &[u8]| {
    let Some(header) = data.get(..FILE_HEADER_LEN) else {
        return;
    };
    let Ok(file) = FileHeader::parse(header.try_into().unwrap()) else {
        return;
    };
    let link_type = LinkType(file.link_type);

    let mut offset = FILE_HEADER_LEN;
    while let Some(raw) = data.get(offset..offset + RECORD_HEADER_LEN) {
        let Ok(record) = RecordHeader::decode(
            raw.try_into().unwrap(),
            file.byte_order,
            file.version_minor,
            offset as u64,
        ) else {
            return;
        };
        offset += RECORD_HEADER_LEN + file.extra_header_bytes();

        let end = offset + record.captured_length as usize;
        let Some(body) = data.get(offset..end) else {
            return;
        };
        if let Some(ip) = ip_header_offset(body, link_type) {
            assert!(ip < body.len());
        }
        assert!(record.captured_length <= record.original_length);
        offset = end;
    }
});
