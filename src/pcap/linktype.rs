//! Link-layer types and IP header location.
//!
//! The IP filter only understands a handful of encapsulations. For each of
//! them [`ip_header_offset`] finds where the IPv4 header starts and checks
//! that a well-formed header is really there.

use std::fmt;

use etherparse::Ipv4HeaderSlice;

/// Well-known EtherType values.
pub mod ethertype {
    pub const IPV4: u16 = 0x0800;
    pub const VLAN: u16 = 0x8100;
}

/// Link-layer type from the capture file header.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LinkType(pub u32);

impl LinkType {
    /// BSD loopback encapsulation
    pub const NULL: Self = Self(0);
    /// Ethernet (10Mb and up)
    pub const ETHERNET: Self = Self(1);
    /// Point-to-point protocol
    pub const PPP: Self = Self(9);
    /// FDDI
    pub const FDDI: Self = Self(10);
    /// LLC/SNAP-encapsulated ATM
    pub const ATM_RFC1483: Self = Self(11);
    /// Raw IP, historical value
    pub const RAW: Self = Self(12);
    /// Raw IP on some BSDs
    pub const RAW_BSD: Self = Self(14);
    /// PPP in HDLC-like framing
    pub const PPP_HDLC: Self = Self(50);
    /// Raw IP, the value libpcap writes today
    pub const RAW_IP: Self = Self(101);
    /// Cisco HDLC
    pub const C_HDLC: Self = Self(104);
    /// IEEE 802.11 wireless
    pub const IEEE802_11: Self = Self(105);
    /// Linux cooked capture
    pub const LINUX_SLL: Self = Self(113);

    /// Whether records are bare IP datagrams.
    pub fn is_raw_ip(&self) -> bool {
        matches!(*self, Self::RAW | Self::RAW_BSD | Self::RAW_IP)
    }

    /// Whether the IP filter knows how to find IP inside this framing.
    pub fn is_force_ipable(&self) -> bool {
        self.is_raw_ip()
            || matches!(
                *self,
                Self::NULL
                    | Self::ETHERNET
                    | Self::PPP
                    | Self::FDDI
                    | Self::ATM_RFC1483
                    | Self::PPP_HDLC
                    | Self::C_HDLC
                    | Self::LINUX_SLL
            )
    }

    /// Short encapsulation name, if this link type is known.
    pub fn name(&self) -> Option<&'static str> {
        let name = match *self {
            Self::NULL => "NULL",
            Self::ETHERNET => "ETHER",
            Self::PPP => "PPP",
            Self::FDDI => "FDDI",
            Self::ATM_RFC1483 => "ATM",
            Self::RAW | Self::RAW_BSD | Self::RAW_IP => "IP",
            Self::PPP_HDLC => "PPP_HDLC",
            Self::C_HDLC => "HDLC",
            Self::IEEE802_11 => "802_11",
            Self::LINUX_SLL => "LINUX_SLL",
            _ => return None,
        };
        Some(name)
    }
}

impl fmt::Display for LinkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "<unknown encapsulation {}>", self.0),
        }
    }
}

/// LLC/SNAP header announcing an IPv4 payload.
const LLC_SNAP_IP: [u8; 8] = [0xaa, 0xaa, 0x03, 0x00, 0x00, 0x00, 0x08, 0x00];

/// PPP-in-HDLC address/control followed by the IPv4 protocol number.
const PPP_HDLC_IP: [u8; 4] = [0xff, 0x03, 0x00, 0x21];

/// BSD address family for IPv4.
const AF_INET: u32 = 2;

#[inline]
fn be16(data: &[u8], offset: usize) -> Option<u16> {
    data.get(offset..offset + 2)
        .map(|b| u16::from_be_bytes([b[0], b[1]]))
}

/// Offset at which the link layer says an IPv4 header begins.
fn ip_offset_candidate(data: &[u8], link_type: LinkType) -> Option<usize> {
    if link_type.is_raw_ip() {
        return Some(0);
    }

    match link_type {
        LinkType::ETHERNET => match be16(data, 12)? {
            ethertype::IPV4 => Some(14),
            ethertype::VLAN if be16(data, 16)? == ethertype::IPV4 => Some(18),
            _ => None,
        },
        LinkType::NULL => {
            let family = data.get(0..4)?;
            let family = u32::from_ne_bytes([family[0], family[1], family[2], family[3]]);
            (family == AF_INET || family.swap_bytes() == AF_INET).then_some(4)
        }
        LinkType::FDDI => (data.get(13..21)? == LLC_SNAP_IP).then_some(21),
        LinkType::ATM_RFC1483 => (data.get(0..8)? == LLC_SNAP_IP).then_some(8),
        LinkType::LINUX_SLL => (be16(data, 14)? == ethertype::IPV4).then_some(16),
        LinkType::C_HDLC => (be16(data, 2)? == ethertype::IPV4).then_some(4),
        LinkType::PPP | LinkType::PPP_HDLC => {
            if data.get(0..4)? == PPP_HDLC_IP {
                Some(4)
            } else if be16(data, 0)? == 0x0021 {
                Some(2)
            } else {
                None
            }
        }
        _ => None,
    }
}

/// Locate a valid IPv4 header inside a captured frame.
///
/// Returns the byte offset of the IP header, or `None` when the frame is
/// not IPv4 or its header is malformed or truncated.
pub fn ip_header_offset(data: &[u8], link_type: LinkType) -> Option<usize> {
    let offset = ip_offset_candidate(data, link_type)?;
    let ip = data.get(offset..)?;
    Ipv4HeaderSlice::from_slice(ip).ok()?;
    Some(offset)
}
