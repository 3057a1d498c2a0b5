use crate::error::DecodeError;
use crate::icmp::{
    CHECKSUM_OFFSET, EchoMessage, ErrorMessage, ICMP_HEADER_SIZE, IcmpCode, IcmpType, icmp_checksum,
};

/// A decoded ICMP message, keyed by its type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IcmpMessage {
    Echo(EchoMessage),
    Error(ErrorMessage),
}

impl IcmpMessage {
    pub fn icmp_type(&self) -> IcmpType {
        match self {
            IcmpMessage::Echo(echo) => echo.icmp_type(),
            IcmpMessage::Error(error) => error.icmp_type(),
        }
    }

    pub fn icmp_code(&self) -> IcmpCode {
        match self {
            IcmpMessage::Echo(echo) => echo.icmp_code(),
            IcmpMessage::Error(error) => error.icmp_code(),
        }
    }

    pub fn checksum(&self) -> u16 {
        match self {
            IcmpMessage::Echo(echo) => echo.checksum(),
            IcmpMessage::Error(error) => error.checksum(),
        }
    }

    pub fn as_echo(&self) -> Option<&EchoMessage> {
        match self {
            IcmpMessage::Echo(echo) => Some(echo),
            IcmpMessage::Error(_) => None,
        }
    }

    pub fn as_error(&self) -> Option<&ErrorMessage> {
        match self {
            IcmpMessage::Error(error) => Some(error),
            IcmpMessage::Echo(_) => None,
        }
    }

    /// Serialize in network byte order with a valid checksum
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            IcmpMessage::Echo(echo) => echo.to_bytes(),
            IcmpMessage::Error(error) => error.to_bytes(),
        }
    }

    /// Parse an ICMP message starting at the ICMP header.
    ///
    /// Checks run in wire order: length, type, code, then checksum.
    pub fn from_bytes(buffer: &[u8]) -> Result<Self, DecodeError> {
        if buffer.len() < ICMP_HEADER_SIZE {
            return Err(DecodeError::Truncated { len: buffer.len() });
        }

        let icmp_type = IcmpType::try_from(buffer[0])?;
        let icmp_code = IcmpCode::for_type(icmp_type, buffer[1])?;

        let stored = u16::from_be_bytes([buffer[CHECKSUM_OFFSET], buffer[CHECKSUM_OFFSET + 1]]);
        let computed = icmp_checksum(buffer);
        if stored != computed {
            return Err(DecodeError::ChecksumMismatch { stored, computed });
        }

        if icmp_type.is_echo() {
            Ok(IcmpMessage::Echo(EchoMessage::parse(icmp_type, stored, buffer)))
        } else {
            Ok(IcmpMessage::Error(ErrorMessage::parse(
                icmp_type, icmp_code, stored, buffer,
            )))
        }
    }
}

impl From<EchoMessage> for IcmpMessage {
    fn from(value: EchoMessage) -> Self {
        IcmpMessage::Echo(value)
    }
}

impl From<ErrorMessage> for IcmpMessage {
    fn from(value: ErrorMessage) -> Self {
        IcmpMessage::Error(value)
    }
}

/// Serialize a message to wire bytes
pub fn encode(message: &IcmpMessage) -> Vec<u8> {
    message.to_bytes()
}

/// Parse wire bytes (starting at the ICMP header) into a message
pub fn decode(buffer: &[u8]) -> Result<IcmpMessage, DecodeError> {
    IcmpMessage::from_bytes(buffer)
}
