//! Destination Unreachable, Time Exceeded and Parameter Problem.
//!
//! All three share one layout. Parameter Problem carries a pointer in the
//! top byte of the rest-of-header word; the others leave it unused (zero).
//!
//! ```text
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |     Type      |     Code      |          Checksum             |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |    Pointer    |                   unused                      |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |      Internet Header + 64 bits of Original Data Datagram      |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```

use crate::error::DecodeError;
use crate::icmp::{ICMP_HEADER_SIZE, IcmpCode, IcmpType, write_checksum};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorMessage {
    icmp_type: IcmpType,
    icmp_code: IcmpCode,
    checksum: u16,
    rest_of_header: u32,
    original_datagram: Vec<u8>,
}

impl ErrorMessage {
    /// Build an error message, validating the type/code pairing
    pub fn new(
        icmp_type: IcmpType,
        icmp_code: IcmpCode,
        rest_of_header: u32,
        original_datagram: Vec<u8>,
    ) -> Result<Self, DecodeError> {
        if !icmp_type.is_error() {
            return Err(DecodeError::UnsupportedType(icmp_type.value()));
        }
        icmp_code.validate(icmp_type)?;

        let mut message = Self {
            icmp_type,
            icmp_code,
            checksum: 0,
            rest_of_header,
            original_datagram,
        };
        message.checksum = write_checksum(&mut message.encode_unchecked());
        Ok(message)
    }

    pub fn time_exceeded(icmp_code: IcmpCode, original_datagram: Vec<u8>) -> Result<Self, DecodeError> {
        Self::new(IcmpType::TimeExceeded, icmp_code, 0, original_datagram)
    }

    pub fn destination_unreachable(
        icmp_code: IcmpCode,
        original_datagram: Vec<u8>,
    ) -> Result<Self, DecodeError> {
        Self::new(IcmpType::DestinationUnreachable, icmp_code, 0, original_datagram)
    }

    pub fn parameter_problem(pointer: u8, original_datagram: Vec<u8>) -> Self {
        let mut message = Self {
            icmp_type: IcmpType::ParameterProblem,
            icmp_code: IcmpCode::Code0,
            checksum: 0,
            rest_of_header: (pointer as u32) << 24,
            original_datagram,
        };
        message.checksum = write_checksum(&mut message.encode_unchecked());
        message
    }

    pub fn icmp_type(&self) -> IcmpType {
        self.icmp_type
    }

    pub fn icmp_code(&self) -> IcmpCode {
        self.icmp_code
    }

    pub fn checksum(&self) -> u16 {
        self.checksum
    }

    /// Raw bytes 4-7 of the header
    pub fn rest_of_header(&self) -> u32 {
        self.rest_of_header
    }

    /// Octet offset of the offending field (Parameter Problem only)
    pub fn pointer(&self) -> Option<u8> {
        (self.icmp_type == IcmpType::ParameterProblem).then(|| (self.rest_of_header >> 24) as u8)
    }

    /// Leading bytes of the datagram that triggered this error
    pub fn original_datagram(&self) -> &[u8] {
        &self.original_datagram
    }

    /// Human-readable meaning of the code
    pub fn description(&self) -> Option<&'static str> {
        self.icmp_code.description(self.icmp_type)
    }

    /// Serialize with the stored checksum
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buffer = self.encode_unchecked();
        buffer[2..4].copy_from_slice(&self.checksum.to_be_bytes());
        buffer
    }

    fn encode_unchecked(&self) -> Vec<u8> {
        let mut buffer = Vec::with_capacity(ICMP_HEADER_SIZE + self.original_datagram.len());
        buffer.push(self.icmp_type.value());
        buffer.push(self.icmp_code.value());
        buffer.extend_from_slice(&[0, 0]);
        buffer.extend_from_slice(&self.rest_of_header.to_be_bytes());
        buffer.extend_from_slice(&self.original_datagram);
        buffer
    }

    /// Parse the error layout from an already validated buffer
    pub(crate) fn parse(
        icmp_type: IcmpType,
        icmp_code: IcmpCode,
        checksum: u16,
        buffer: &[u8],
    ) -> Self {
        Self {
            icmp_type,
            icmp_code,
            checksum,
            rest_of_header: u32::from_be_bytes([buffer[4], buffer[5], buffer[6], buffer[7]]),
            original_datagram: buffer[ICMP_HEADER_SIZE..].to_vec(),
        }
    }
}
