use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use std::fmt;
use std::io;
use std::mem::MaybeUninit;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

use crate::error::{IcmpError, Result};
use crate::icmp::{IcmpMessage, IcmpType};
use crate::probe::strip_ipv4_header;

/// Receive buffer size: the largest IPv4 datagram, so no reply is cut short
const RECV_BUFFER_SIZE: usize = 65_535;

/// Socket capability level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketMode {
    /// Full raw socket access - any ICMP type, IP header on receive
    Raw,
    /// Unprivileged ICMP socket (Echo only, no IP header on receive)
    Datagram,
}

/// Outcome of one bounded receive
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reception {
    Message {
        message: IcmpMessage,
        source: Ipv4Addr,
    },
    /// Nothing usable arrived before the timeout
    Timeout,
}

/// Send/receive contract the probing engines are written against
#[cfg_attr(test, mockall::automock)]
pub trait Transport {
    /// Which socket mode is active
    fn mode(&self) -> SocketMode;

    /// Send `message` to `dest`, applying `ttl` to the socket first if given
    fn send(&mut self, message: &IcmpMessage, dest: Ipv4Addr, ttl: Option<u8>) -> Result<()>;

    /// Wait up to `timeout` for the next decodable inbound message
    fn receive(&mut self, timeout: Duration) -> Result<Reception>;
}

/// Create a raw ICMP socket
pub fn create_raw_icmp_socket() -> io::Result<Socket> {
    let socket = Socket::new(Domain::IPV4, Type::RAW, Some(Protocol::ICMPV4))?;
    socket.set_nonblocking(false)?;
    Ok(socket)
}

/// Create an unprivileged IPv4 ICMP socket (SOCK_DGRAM)
pub fn create_dgram_icmp_socket() -> io::Result<Socket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::ICMPV4))?;
    socket.set_nonblocking(false)?;
    Ok(socket)
}

/// An ICMP socket that owns its OS handle; closed on drop.
pub struct IcmpSocket {
    socket: Socket,
    mode: SocketMode,
    /// Last TTL applied to the socket
    ttl: Option<u8>,
    buffer: Box<[MaybeUninit<u8>]>,
}

impl fmt::Debug for IcmpSocket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IcmpSocket")
            .field("socket", &self.socket)
            .field("mode", &self.mode)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

/// Classify a socket creation failure.
///
/// Only EACCES/EPERM mean the process lacks privileges; anything else
/// (EMFILE, ENOBUFS, ...) is an ordinary I/O error. `raw_err` is the
/// earlier raw-socket failure when this was the datagram fallback.
fn socket_error(raw_err: Option<&io::Error>, err: io::Error) -> IcmpError {
    if err.kind() != io::ErrorKind::PermissionDenied {
        return IcmpError::Io(err);
    }
    match raw_err {
        Some(raw_err) => IcmpError::PermissionDenied(io::Error::new(
            err.kind(),
            format!("raw socket: {}; datagram socket: {}", raw_err, err),
        )),
        None => IcmpError::PermissionDenied(err),
    }
}

impl IcmpSocket {
    /// Open a raw socket, falling back to an unprivileged datagram socket.
    ///
    /// Fails with `PermissionDenied` only if neither can be opened for lack
    /// of privileges.
    pub fn open() -> Result<Self> {
        match create_raw_icmp_socket() {
            Ok(socket) => Ok(Self::from_socket(socket, SocketMode::Raw)),
            Err(raw_err) => {
                debug!(error = %raw_err, "raw ICMP socket unavailable");
                let socket = create_dgram_icmp_socket()
                    .map_err(|err| socket_error(Some(&raw_err), err))?;
                warn!("Using unprivileged ICMP datagram socket; only Echo messages are supported");
                Ok(Self::from_socket(socket, SocketMode::Datagram))
            }
        }
    }

    /// Open a socket in exactly the requested mode, without fallback
    pub fn with_mode(mode: SocketMode) -> Result<Self> {
        let socket = match mode {
            SocketMode::Raw => create_raw_icmp_socket(),
            SocketMode::Datagram => create_dgram_icmp_socket(),
        }
        .map_err(|err| socket_error(None, err))?;
        Ok(Self::from_socket(socket, mode))
    }

    fn from_socket(socket: Socket, mode: SocketMode) -> Self {
        Self {
            socket,
            mode,
            ttl: None,
            buffer: vec![MaybeUninit::uninit(); RECV_BUFFER_SIZE].into_boxed_slice(),
        }
    }

    /// Set TTL on the socket, skipping the syscall if unchanged
    pub fn set_ttl(&mut self, ttl: u8) -> Result<()> {
        if self.ttl != Some(ttl) {
            self.socket.set_ttl(ttl as u32)?;
            self.ttl = Some(ttl);
        }
        Ok(())
    }

    /// Read one datagram, waiting at most `timeout`.
    ///
    /// Returns None when the read times out.
    fn recv_datagram(&mut self, timeout: Duration) -> Result<Option<(Vec<u8>, Ipv4Addr)>> {
        // A zero timeval means "block forever"
        self.socket
            .set_read_timeout(Some(timeout.max(Duration::from_millis(1))))?;

        let (len, addr) = match self.socket.recv_from(&mut self.buffer) {
            Ok(received) => received,
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        // SAFETY: recv_from initialized the first `len` bytes
        let data = self.buffer[..len]
            .iter()
            .map(|byte| unsafe { byte.assume_init() })
            .collect();
        let source = addr
            .as_socket_ipv4()
            .map(|a| *a.ip())
            .unwrap_or(Ipv4Addr::UNSPECIFIED);

        Ok(Some((data, source)))
    }
}

impl Transport for IcmpSocket {
    fn mode(&self) -> SocketMode {
        self.mode
    }

    fn send(&mut self, message: &IcmpMessage, dest: Ipv4Addr, ttl: Option<u8>) -> Result<()> {
        let icmp_type = message.icmp_type();
        if self.mode == SocketMode::Datagram && icmp_type != IcmpType::EchoRequest {
            warn!(?icmp_type, "refusing to send non-echo message on datagram socket");
            return Err(IcmpError::CapabilityRestricted(icmp_type));
        }

        if let Some(ttl) = ttl {
            self.set_ttl(ttl)?;
        }

        let packet = message.to_bytes();
        let addr = SockAddr::from(SocketAddr::new(dest.into(), 0));
        self.socket.send_to(&packet, &addr)?;
        trace!(%dest, ?icmp_type, len = packet.len(), "sent");
        Ok(())
    }

    fn receive(&mut self, timeout: Duration) -> Result<Reception> {
        let deadline = Instant::now() + timeout;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(Reception::Timeout);
            }

            let Some((data, source)) = self.recv_datagram(remaining)? else {
                return Ok(Reception::Timeout);
            };

            // Raw sockets deliver the IP header; datagram sockets start at ICMP
            let icmp = match self.mode {
                SocketMode::Raw => match strip_ipv4_header(&data) {
                    Some(icmp) => icmp,
                    None => {
                        trace!(%source, len = data.len(), "dropping packet without IPv4 header");
                        continue;
                    }
                },
                SocketMode::Datagram => data.as_slice(),
            };

            let message = IcmpMessage::from_bytes(icmp)?;

            if self.mode == SocketMode::Datagram && !message.icmp_type().is_echo() {
                trace!(%source, icmp_type = ?message.icmp_type(), "discarding non-echo message");
                continue;
            }

            return Ok(Reception::Message { message, source });
        }
    }
}
