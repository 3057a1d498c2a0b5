use std::io;

use thiserror::Error;

use crate::icmp::IcmpType;

/// Reasons an ICMP buffer (or a requested type/code pairing) is rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("truncated ICMP message: {len} bytes, need at least 8")]
    Truncated { len: usize },
    #[error("unsupported ICMP type {0}")]
    UnsupportedType(u8),
    #[error("unsupported ICMP code {code} for {icmp_type:?}")]
    UnsupportedCode { icmp_type: IcmpType, code: u8 },
    #[error("ICMP checksum mismatch: stored {stored:#06x}, computed {computed:#06x}")]
    ChecksumMismatch { stored: u16, computed: u16 },
}

/// Errors surfaced by the ICMP socket layer
#[derive(Debug, Error)]
pub enum IcmpError {
    /// Neither a raw nor a datagram ICMP socket could be opened
    #[error(
        "insufficient permissions for ICMP sockets: {0}\n\n\
         Fix options:\n\
         \u{2022} Run with sudo\n\
         \u{2022} Add capability: sudo setcap cap_net_raw+ep <binary>\n\
         \u{2022} Enable unprivileged ICMP: sudo sysctl -w net.ipv4.ping_group_range='0 65534'"
    )]
    PermissionDenied(#[source] io::Error),
    /// Datagram sockets only carry Echo Requests
    #[error("{0:?} cannot be sent on an unprivileged datagram ICMP socket")]
    CapabilityRestricted(IcmpType),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T, E = IcmpError> = std::result::Result<T, E>;
