use crate::icmp::EchoMessage;

/// Default payload size (standard ping)
pub const DEFAULT_PAYLOAD_SIZE: usize = 56;
/// Minimum payload size (2 bytes identifier + 2 bytes sequence)
pub const MIN_PAYLOAD_SIZE: usize = 4;
/// Largest payload that still fits an IPv4 datagram with its headers
pub const MAX_PAYLOAD_SIZE: usize = 65_507;

const FILL: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ1234567890";

/// Get process identifier for ICMP identification field
pub fn get_identifier() -> u16 {
    std::process::id() as u16
}

/// Build the payload carried by a probe.
///
/// Payload layout:
/// - Bytes 0-1: identifier (backup for kernel override on DGRAM sockets)
/// - Bytes 2-3: sequence
/// - Bytes 4+: alphanumeric fill
pub fn build_probe_payload(identifier: u16, sequence: u16, payload_size: usize) -> Vec<u8> {
    let payload_size = payload_size.clamp(MIN_PAYLOAD_SIZE, MAX_PAYLOAD_SIZE);
    let mut payload = Vec::with_capacity(payload_size);

    // Datagram sockets rewrite the header identifier with the socket's port
    payload.extend_from_slice(&identifier.to_be_bytes());
    payload.extend_from_slice(&sequence.to_be_bytes());
    payload.extend(FILL.iter().cycle().take(payload_size - MIN_PAYLOAD_SIZE));

    payload
}

/// Build an ICMP Echo Request probe with configurable payload size
pub fn build_echo_request(identifier: u16, sequence: u16, payload_size: usize) -> EchoMessage {
    EchoMessage::request(
        identifier,
        sequence,
        build_probe_payload(identifier, sequence, payload_size),
    )
}

/// Recover (identifier, sequence) from a probe payload
pub fn extract_probe_from_payload(payload: &[u8]) -> Option<(u16, u16)> {
    match payload {
        [i0, i1, s0, s1, ..] => Some((
            u16::from_be_bytes([*i0, *i1]),
            u16::from_be_bytes([*s0, *s1]),
        )),
        _ => None,
    }
}
