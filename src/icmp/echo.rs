//! Echo Request / Echo Reply
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |     Type      |     Code      |          Checksum             |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |           Identifier          |        Sequence Number        |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |     Data ...
//! +-+-+-+-+-
//! ```

use crate::error::DecodeError;
use crate::icmp::{ICMP_HEADER_SIZE, IcmpCode, IcmpType, write_checksum};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EchoMessage {
    icmp_type: IcmpType,
    checksum: u16,
    identifier: u16,
    sequence: u16,
    payload: Vec<u8>,
}

impl EchoMessage {
    /// Build an echo message of the given type.
    ///
    /// Fails with `UnsupportedType` if `icmp_type` is not an echo type.
    pub fn new(
        icmp_type: IcmpType,
        identifier: u16,
        sequence: u16,
        payload: Vec<u8>,
    ) -> Result<Self, DecodeError> {
        if !icmp_type.is_echo() {
            return Err(DecodeError::UnsupportedType(icmp_type.value()));
        }
        Ok(Self::with_type(icmp_type, identifier, sequence, payload))
    }

    pub fn request(identifier: u16, sequence: u16, payload: Vec<u8>) -> Self {
        Self::with_type(IcmpType::EchoRequest, identifier, sequence, payload)
    }

    pub fn reply(identifier: u16, sequence: u16, payload: Vec<u8>) -> Self {
        Self::with_type(IcmpType::EchoReply, identifier, sequence, payload)
    }

    fn with_type(icmp_type: IcmpType, identifier: u16, sequence: u16, payload: Vec<u8>) -> Self {
        let mut message = Self {
            icmp_type,
            checksum: 0,
            identifier,
            sequence,
            payload,
        };
        message.checksum = write_checksum(&mut message.encode_unchecked());
        message
    }

    /// The reply an echo responder would send for this message
    pub fn to_reply(&self) -> Self {
        Self::reply(self.identifier, self.sequence, self.payload.clone())
    }

    pub fn icmp_type(&self) -> IcmpType {
        self.icmp_type
    }

    /// Echo messages always carry code 0
    pub fn icmp_code(&self) -> IcmpCode {
        IcmpCode::Code0
    }

    pub fn checksum(&self) -> u16 {
        self.checksum
    }

    pub fn identifier(&self) -> u16 {
        self.identifier
    }

    pub fn sequence(&self) -> u16 {
        self.sequence
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Serialize with the stored checksum
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buffer = self.encode_unchecked();
        buffer[2..4].copy_from_slice(&self.checksum.to_be_bytes());
        buffer
    }

    /// Header fields with a zero checksum, followed by the payload
    fn encode_unchecked(&self) -> Vec<u8> {
        let mut buffer = Vec::with_capacity(ICMP_HEADER_SIZE + self.payload.len());
        buffer.push(self.icmp_type.value());
        buffer.push(IcmpCode::Code0.value());
        buffer.extend_from_slice(&[0, 0]);
        buffer.extend_from_slice(&self.identifier.to_be_bytes());
        buffer.extend_from_slice(&self.sequence.to_be_bytes());
        buffer.extend_from_slice(&self.payload);
        buffer
    }

    /// Parse the echo layout from an already validated buffer
    pub(crate) fn parse(icmp_type: IcmpType, checksum: u16, buffer: &[u8]) -> Self {
        Self {
            icmp_type,
            checksum,
            identifier: u16::from_be_bytes([buffer[4], buffer[5]]),
            sequence: u16::from_be_bytes([buffer[6], buffer[7]]),
            payload: buffer[ICMP_HEADER_SIZE..].to_vec(),
        }
    }
}
