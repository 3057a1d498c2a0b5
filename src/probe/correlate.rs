use pnet::packet::ip::IpNextHeaderProtocols;
use pnet::packet::ipv4::Ipv4Packet;

use crate::icmp::{EchoMessage, ErrorMessage, ICMP_HEADER_SIZE, IcmpMessage, IcmpType};
use crate::probe::{SocketMode, extract_probe_from_payload};

/// Identifies one outstanding probe: identifier plus sequence
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub struct ProbeKey {
    pub identifier: u16,
    pub sequence: u16,
}

impl ProbeKey {
    pub fn new(identifier: u16, sequence: u16) -> Self {
        Self {
            identifier,
            sequence,
        }
    }

    fn matches(&self, identifier: u16, sequence: u16) -> bool {
        self.identifier == identifier && self.sequence == sequence
    }
}

/// Skip the IPv4 header a raw socket prepends to received packets.
///
/// Returns None if the buffer is not a plausible IPv4 packet or the header
/// length runs past the end of the buffer.
pub fn strip_ipv4_header(data: &[u8]) -> Option<&[u8]> {
    let ip_packet = Ipv4Packet::new(data)?;
    if ip_packet.get_version() != 4 {
        return None;
    }
    let ip_header_len = (ip_packet.get_header_length() as usize) * 4;
    if ip_header_len < 20 || data.len() < ip_header_len {
        return None;
    }
    Some(&data[ip_header_len..])
}

/// Extract the probe key(s) from the datagram quoted in an ICMP error.
///
/// The quote must be an IPv4 header carrying ICMP followed by at least the
/// 8-byte header of one of our Echo Requests. Returns the header key and,
/// when the router quoted enough of the payload, the payload backup key.
pub fn quoted_probe(error: &ErrorMessage) -> Option<(ProbeKey, Option<ProbeKey>)> {
    let quoted = error.original_datagram();
    let ip_packet = Ipv4Packet::new(quoted)?;
    if ip_packet.get_next_level_protocol() != IpNextHeaderProtocols::Icmp {
        return None;
    }
    let icmp = strip_ipv4_header(quoted)?;
    if icmp.len() < ICMP_HEADER_SIZE || icmp[0] != IcmpType::EchoRequest.value() {
        return None;
    }

    let header_key = ProbeKey::new(
        u16::from_be_bytes([icmp[4], icmp[5]]),
        u16::from_be_bytes([icmp[6], icmp[7]]),
    );
    let payload_key = extract_probe_from_payload(&icmp[ICMP_HEADER_SIZE..])
        .map(|(identifier, sequence)| ProbeKey::new(identifier, sequence));

    Some((header_key, payload_key))
}

/// True if `echo` is an Echo Reply to the probe identified by `key`.
///
/// DGRAM sockets replace the header identifier, so in that mode the copy
/// of identifier/sequence in the payload is accepted too. Raw sockets see
/// the identifier as sent and must match the header exactly.
pub fn is_echo_reply_to(echo: &EchoMessage, key: ProbeKey, mode: SocketMode) -> bool {
    if echo.icmp_type() != IcmpType::EchoReply {
        return false;
    }
    if key.matches(echo.identifier(), echo.sequence()) {
        return true;
    }
    mode == SocketMode::Datagram
        && extract_probe_from_payload(echo.payload())
            .is_some_and(|(identifier, sequence)| key.matches(identifier, sequence))
}

/// True if `error` quotes the probe identified by `key`
pub fn is_error_for(error: &ErrorMessage, key: ProbeKey, mode: SocketMode) -> bool {
    match quoted_probe(error) {
        Some((header_key, payload_key)) => {
            header_key == key || (mode == SocketMode::Datagram && payload_key == Some(key))
        }
        None => false,
    }
}

/// True if `message` answers the probe identified by `key` on a socket in `mode`
pub fn is_response_to(message: &IcmpMessage, key: ProbeKey, mode: SocketMode) -> bool {
    match message {
        IcmpMessage::Echo(echo) => is_echo_reply_to(echo, key, mode),
        IcmpMessage::Error(error) => is_error_for(error, key, mode),
    }
}

/// Wrap an encoded probe in a minimal IPv4 header, as a router would quote it
pub fn quote_probe(probe: &EchoMessage, ttl: u8) -> Vec<u8> {
    let icmp = probe.to_bytes();
    let total_len = (20 + icmp.len()) as u16;

    let mut quoted = vec![0u8; 20];
    quoted[0] = 0x45; // Version 4, IHL 5
    quoted[2..4].copy_from_slice(&total_len.to_be_bytes());
    quoted[8] = ttl;
    quoted[9] = 1; // Protocol: ICMP
    quoted.extend_from_slice(&icmp);
    quoted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::icmp::IcmpCode;
    use crate::probe::{build_echo_request, build_probe_payload};

    const RAW: SocketMode = SocketMode::Raw;
    const DGRAM: SocketMode = SocketMode::Datagram;

    #[test]
    fn test_strip_ipv4_header() {
        let probe = build_echo_request(1, 2, 8);
        let packet = quote_probe(&probe, 64);
        assert_eq!(strip_ipv4_header(&packet), Some(probe.to_bytes().as_slice()));
    }

    #[test]
    fn test_variable_ihl() {
        let probe = build_echo_request(1, 2, 8);
        let mut packet = vec![0u8; 24];
        packet[0] = 0x46; // IHL 6 (24 bytes, with options)
        packet[9] = 1;
        packet.extend_from_slice(&probe.to_bytes());

        assert_eq!(strip_ipv4_header(&packet), Some(probe.to_bytes().as_slice()));
    }

    #[test]
    fn test_truncated_packet_returns_none() {
        // Just an IP version nibble, nothing else
        assert!(strip_ipv4_header(&[0x45]).is_none());
        assert!(strip_ipv4_header(&[]).is_none());
    }

    #[test]
    fn test_invalid_ip_version_returns_none() {
        let mut packet = vec![0u8; 28];
        packet[0] = 0x65;
        assert!(strip_ipv4_header(&packet).is_none());
    }

    #[test]
    fn test_echo_reply_matching() {
        let key = ProbeKey::new(0x1234, 5);
        let request = build_echo_request(0x1234, 5, 16);

        for mode in [RAW, DGRAM] {
            assert!(is_echo_reply_to(&request.to_reply(), key, mode));
            // Our own request looped back is not a reply
            assert!(!is_echo_reply_to(&request, key, mode));
            // Sequence mismatch
            assert!(!is_echo_reply_to(&request.to_reply(), ProbeKey::new(0x1234, 6), mode));
        }
    }

    #[test]
    fn test_identifier_mismatch_rejected() {
        let key = ProbeKey::new(0x1234, 1);
        let foreign = EchoMessage::reply(0x5678, 1, b"not ours".to_vec());
        assert!(!is_echo_reply_to(&foreign, key, RAW));
        assert!(!is_echo_reply_to(&foreign, key, DGRAM));
    }

    #[test]
    fn test_raw_mode_ignores_payload_copy() {
        let key = ProbeKey::new(0x1234, 3);
        // Header identifier differs; only the payload carries our id/seq
        let reply = EchoMessage::reply(0x9999, 3, build_probe_payload(0x1234, 3, 16));
        assert!(!is_echo_reply_to(&reply, key, RAW));
        assert!(!is_response_to(&IcmpMessage::Echo(reply), key, RAW));
    }

    #[test]
    fn test_dgram_identifier_rewrite_uses_payload() {
        let key = ProbeKey::new(0x1234, 9);
        let request = build_echo_request(0x1234, 9, 16);
        // Kernel replaced the header identifier with the socket port
        let reply = EchoMessage::reply(40000, 9, request.payload().to_vec());
        assert!(is_echo_reply_to(&reply, key, DGRAM));
    }

    #[test]
    fn test_time_exceeded_quotes_probe() {
        let key = ProbeKey::new(0xABCD, 3);
        let request = build_echo_request(0xABCD, 3, 32);
        let error = ErrorMessage::time_exceeded(IcmpCode::Code0, quote_probe(&request, 1)).unwrap();

        assert!(is_error_for(&error, key, RAW));
        assert!(!is_error_for(&error, ProbeKey::new(0xABCD, 4), RAW));
        assert!(is_response_to(&IcmpMessage::Error(error), key, RAW));
    }

    #[test]
    fn test_raw_mode_error_needs_quoted_header_match() {
        let key = ProbeKey::new(0x1234, 3);
        // Quoted header belongs to someone else, quoted payload mimics ours
        let foreign = EchoMessage::request(0x9999, 3, build_probe_payload(0x1234, 3, 16));
        let error = ErrorMessage::time_exceeded(IcmpCode::Code0, quote_probe(&foreign, 1)).unwrap();

        assert!(!is_error_for(&error, key, RAW));
        assert!(is_error_for(&error, key, DGRAM));
    }

    #[test]
    fn test_minimal_quote_without_payload() {
        let key = ProbeKey::new(0xABCD, 3);
        let request = build_echo_request(0xABCD, 3, 32);
        // RFC 792 routers quote IP header + 64 bits only
        let quoted = quote_probe(&request, 1)[..28].to_vec();
        let error = ErrorMessage::time_exceeded(IcmpCode::Code0, quoted).unwrap();

        assert_eq!(quoted_probe(&error), Some((key, None)));
        assert!(is_error_for(&error, key, RAW));
    }

    #[test]
    fn test_quote_of_non_icmp_rejected() {
        let request = build_echo_request(1, 1, 8);
        let mut quoted = quote_probe(&request, 1);
        quoted[9] = 17; // UDP
        let error = ErrorMessage::destination_unreachable(IcmpCode::Code3, quoted).unwrap();
        assert!(quoted_probe(&error).is_none());
    }

    // ========================================================================
    // Property-based tests (proptest)
    // ========================================================================

    use proptest::prelude::*;

    proptest! {
        /// Random bytes should not panic when stripped as IPv4
        #[test]
        fn proptest_strip_no_panic(data in prop::collection::vec(0u8..=255, 0..1500)) {
            let _ = strip_ipv4_header(&data);
        }

        /// Random quotes should not panic when correlated
        #[test]
        fn proptest_quoted_probe_no_panic(data in prop::collection::vec(0u8..=255, 0..200)) {
            let error = ErrorMessage::time_exceeded(IcmpCode::Code0, data).unwrap();
            let _ = quoted_probe(&error);
        }

        /// Packets too short for valid IP headers should return None
        #[test]
        fn proptest_short_packets_return_none(size in 0usize..20) {
            let data = vec![0x45u8; size];
            prop_assert!(strip_ipv4_header(&data).is_none());
        }
    }
}
