//! ICMPv4 echo/error codec with ping and traceroute engines.
//!
//! The engines run over a raw ICMP socket when privileges allow and fall
//! back to an unprivileged datagram socket otherwise.

// Public API - codec, engines, data types and export functions
pub mod config;
pub mod engine;
pub mod error;
pub mod export;
pub mod icmp;
pub mod probe;
pub mod state;

// Command-line surface shared with the binary
pub mod cli;

pub use engine::{Pinger, Tracer, ping, traceroute};
pub use error::{DecodeError, IcmpError, Result};
pub use icmp::{IcmpMessage, decode, encode};
pub use probe::{IcmpSocket, Reception, SocketMode, Transport};
pub use state::{PingResult, TracerouteResult};
