use serde::{Deserialize, Serialize};

use crate::error::DecodeError;

/// Supported ICMP message types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum IcmpType {
    EchoReply = 0,
    DestinationUnreachable = 3,
    EchoRequest = 8,
    TimeExceeded = 11,
    ParameterProblem = 12,
}

/// Valid codes per type. Checked explicitly at decode time.
const VALID_CODES: &[(IcmpType, &[u8])] = &[
    (IcmpType::EchoReply, &[0]),
    (IcmpType::DestinationUnreachable, &[0, 1, 2, 3, 4, 5]),
    (IcmpType::EchoRequest, &[0]),
    (IcmpType::TimeExceeded, &[0, 1]),
    (IcmpType::ParameterProblem, &[0]),
];

impl IcmpType {
    pub const ALL: [IcmpType; 5] = [
        IcmpType::EchoReply,
        IcmpType::DestinationUnreachable,
        IcmpType::EchoRequest,
        IcmpType::TimeExceeded,
        IcmpType::ParameterProblem,
    ];

    /// Wire value
    pub fn value(self) -> u8 {
        self as u8
    }

    /// Echo Request and Echo Reply share the echo layout
    pub fn is_echo(self) -> bool {
        matches!(self, IcmpType::EchoRequest | IcmpType::EchoReply)
    }

    /// Error messages quote the datagram that triggered them
    pub fn is_error(self) -> bool {
        !self.is_echo()
    }

    /// Code values accepted for this type
    pub fn valid_codes(self) -> &'static [u8] {
        VALID_CODES
            .iter()
            .find(|(t, _)| *t == self)
            .map(|(_, codes)| *codes)
            .unwrap_or(&[])
    }

    pub fn label(self) -> &'static str {
        match self {
            IcmpType::EchoReply => "Echo Reply",
            IcmpType::DestinationUnreachable => "Destination Unreachable",
            IcmpType::EchoRequest => "Echo Request",
            IcmpType::TimeExceeded => "Time Exceeded",
            IcmpType::ParameterProblem => "Parameter Problem",
        }
    }
}

impl TryFrom<u8> for IcmpType {
    type Error = DecodeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(IcmpType::EchoReply),
            3 => Ok(IcmpType::DestinationUnreachable),
            8 => Ok(IcmpType::EchoRequest),
            11 => Ok(IcmpType::TimeExceeded),
            12 => Ok(IcmpType::ParameterProblem),
            other => Err(DecodeError::UnsupportedType(other)),
        }
    }
}

impl From<IcmpType> for u8 {
    fn from(value: IcmpType) -> Self {
        value.value()
    }
}

/// ICMP sub-code. Only meaningful together with an [`IcmpType`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum IcmpCode {
    #[default]
    Code0 = 0,
    Code1 = 1,
    Code2 = 2,
    Code3 = 3,
    Code4 = 4,
    Code5 = 5,
}

impl IcmpCode {
    /// Wire value
    pub fn value(self) -> u8 {
        self as u8
    }

    /// Map a raw code byte within the code space of `icmp_type`
    pub fn for_type(icmp_type: IcmpType, code: u8) -> Result<Self, DecodeError> {
        if !icmp_type.valid_codes().contains(&code) {
            return Err(DecodeError::UnsupportedCode { icmp_type, code });
        }
        match code {
            0 => Ok(IcmpCode::Code0),
            1 => Ok(IcmpCode::Code1),
            2 => Ok(IcmpCode::Code2),
            3 => Ok(IcmpCode::Code3),
            4 => Ok(IcmpCode::Code4),
            5 => Ok(IcmpCode::Code5),
            _ => Err(DecodeError::UnsupportedCode { icmp_type, code }),
        }
    }

    /// Check this code against the code space of `icmp_type`
    pub fn validate(self, icmp_type: IcmpType) -> Result<Self, DecodeError> {
        Self::for_type(icmp_type, self.value())
    }

    /// Human-readable meaning of this code for the given type
    pub fn description(self, icmp_type: IcmpType) -> Option<&'static str> {
        use IcmpCode::*;
        match (icmp_type, self) {
            (IcmpType::DestinationUnreachable, Code0) => Some("Net unreachable"),
            (IcmpType::DestinationUnreachable, Code1) => Some("Host unreachable"),
            (IcmpType::DestinationUnreachable, Code2) => Some("Protocol unreachable"),
            (IcmpType::DestinationUnreachable, Code3) => Some("Port unreachable"),
            (IcmpType::DestinationUnreachable, Code4) => Some("Fragmentation needed"),
            (IcmpType::DestinationUnreachable, Code5) => Some("Source route failed"),
            (IcmpType::TimeExceeded, Code0) => Some("Time to live exceeded in transit"),
            (IcmpType::TimeExceeded, Code1) => Some("Fragment reassembly time exceeded"),
            (IcmpType::ParameterProblem, Code0) => Some("Pointer indicates the error"),
            _ => None,
        }
    }
}

impl From<IcmpCode> for u8 {
    fn from(value: IcmpCode) -> Self {
        value.value()
    }
}
