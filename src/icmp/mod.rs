//! ICMPv4 message model and wire codec.
//!
//! Only the message shapes needed for ping and traceroute are modelled:
//! Echo Request/Reply and the three error messages that quote the
//! offending datagram.

pub mod checksum;
pub mod echo;
pub mod error_message;
pub mod message;
pub mod types;

pub use checksum::*;
pub use echo::*;
pub use error_message::*;
pub use message::*;
pub use types::*;

/// ICMP header size (fixed)
pub const ICMP_HEADER_SIZE: usize = 8;
