//! Replayed packet.

use std::time::Duration;

use bytes::Bytes;

/// One captured packet, ready to hand downstream.
///
/// `data` is usually a zero-copy slice of the window it was read from. The
/// window stays alive for as long as any packet still refers to it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Packet {
    data: Bytes,
    timestamp: Duration,
    extra_length: u32,
    network_header: Option<usize>,
}

impl Packet {
    /// Create a packet from captured bytes.
    pub fn new(data: Bytes, timestamp: Duration, extra_length: u32) -> Self {
        Self {
            data,
            timestamp,
            extra_length,
            network_header: None,
        }
    }

    /// Captured bytes.
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Captured length.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Capture timestamp since the Unix epoch.
    pub fn timestamp(&self) -> Duration {
        self.timestamp
    }

    /// Bytes seen on the wire but not captured.
    pub fn extra_length(&self) -> u32 {
        self.extra_length
    }

    /// Length on the wire.
    pub fn original_length(&self) -> u64 {
        self.data.len() as u64 + self.extra_length as u64
    }

    /// Offset of the IPv4 header, when the IP filter located one.
    pub fn network_header(&self) -> Option<usize> {
        self.network_header
    }

    pub(crate) fn set_network_header(&mut self, offset: usize) {
        self.network_header = Some(offset);
    }

    /// Bytes from the IPv4 header onwards.
    pub fn ip_data(&self) -> Option<&[u8]> {
        self.network_header.and_then(|off| self.data.get(off..))
    }

    /// Consume the packet, returning its bytes.
    pub fn into_data(self) -> Bytes {
        self.data
    }
}
