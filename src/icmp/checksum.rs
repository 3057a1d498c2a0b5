use pnet::util::checksum;

/// Byte offset of the checksum field in the ICMP header
pub const CHECKSUM_OFFSET: usize = 2;

/// 16-bit word index of the checksum field, skipped while summing
const CHECKSUM_WORD: usize = CHECKSUM_OFFSET / 2;

/// Compute the Internet checksum (RFC 1071) of `data`.
///
/// An odd trailing byte is padded with zero. Every word is summed, so a
/// message carrying a valid checksum yields zero.
pub fn internet_checksum(data: &[u8]) -> u16 {
    checksum(data, usize::MAX)
}

/// Checksum of a full ICMP message, treating the checksum field as zero
pub fn icmp_checksum(message: &[u8]) -> u16 {
    checksum(message, CHECKSUM_WORD)
}

/// Compute and write the checksum of an assembled ICMP message in place
pub fn write_checksum(message: &mut [u8]) -> u16 {
    let sum = icmp_checksum(message);
    message[CHECKSUM_OFFSET..CHECKSUM_OFFSET + 2].copy_from_slice(&sum.to_be_bytes());
    sum
}
