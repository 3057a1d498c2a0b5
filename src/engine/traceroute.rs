use std::net::Ipv4Addr;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::config::TraceConfig;
use crate::engine::pending::{PendingProbe, ProbeOutcome};
use crate::error::Result;
use crate::icmp::IcmpType;
use crate::probe::{IcmpSocket, SocketMode, Transport, build_echo_request, get_identifier};
use crate::state::{HopProbe, TracerouteHop, TracerouteResult};

/// Walks the path to a destination by raising the TTL one hop at a time
pub struct Tracer<T: Transport> {
    config: TraceConfig,
    transport: T,
    identifier: u16,
    /// Sequence of the last probe sent; unique across the whole run
    sequence: u16,
}

impl Tracer<IcmpSocket> {
    /// Open a socket (raw, falling back to datagram) and build a tracer on it
    pub fn open(config: TraceConfig) -> Result<Self> {
        Ok(Self::new(config, IcmpSocket::open()?))
    }

    /// Open a socket in exactly `mode`
    pub fn open_with_mode(config: TraceConfig, mode: SocketMode) -> Result<Self> {
        Ok(Self::new(config, IcmpSocket::with_mode(mode)?))
    }
}

impl<T: Transport> Tracer<T> {
    pub fn new(config: TraceConfig, transport: T) -> Self {
        Self {
            config,
            transport,
            identifier: get_identifier(),
            sequence: 0,
        }
    }

    /// Override the echo identifier (defaults to the process id)
    pub fn with_identifier(mut self, identifier: u16) -> Self {
        self.identifier = identifier;
        self
    }

    pub fn identifier(&self) -> u16 {
        self.identifier
    }

    pub fn mode(&self) -> SocketMode {
        self.transport.mode()
    }

    pub fn config(&self) -> &TraceConfig {
        &self.config
    }

    /// Trace the route to `dest`.
    ///
    /// Every TTL from `first_ttl` up to the hop where the destination
    /// answers (or `max_ttl`) gets a hop entry, even if all of its probes
    /// timed out.
    #[instrument(skip(self), fields(max_ttl = self.config.max_ttl, id = self.identifier))]
    pub fn run(&mut self, dest: Ipv4Addr) -> TracerouteResult {
        let mut result = TracerouteResult::new(dest);

        if self.mode() == SocketMode::Datagram {
            warn!("datagram sockets do not receive Time Exceeded; intermediate hops will time out");
        }

        let mut first_probe = true;
        for ttl in self.config.first_ttl..=self.config.max_ttl {
            let mut hop = TracerouteHop::new(ttl);
            let mut reached = false;

            for _ in 0..self.config.probes_per_hop {
                if !first_probe && !self.config.interval.is_zero() {
                    thread::sleep(self.config.interval);
                }
                first_probe = false;

                let probe = self.probe(dest, ttl);
                // Only the destination itself answers with an Echo Reply
                if probe.icmp_type == Some(IcmpType::EchoReply) && probe.address == Some(dest) {
                    reached = true;
                }
                hop.record(probe);
            }

            debug!(ttl, address = ?hop.address, "hop complete");
            result.hops.push(hop);

            if reached {
                result.reached = true;
                break;
            }
        }

        info!(hops = result.hops.len(), reached = result.reached, "traceroute finished");
        result
    }

    fn next_sequence(&mut self) -> u16 {
        self.sequence = self.sequence.wrapping_add(1);
        self.sequence
    }

    fn probe(&mut self, dest: Ipv4Addr, ttl: u8) -> HopProbe {
        let seq = self.next_sequence();
        let request = build_echo_request(self.identifier, seq, self.config.payload_size);

        let pending = match PendingProbe::send(&mut self.transport, &request, dest, Some(ttl)) {
            Ok(pending) => pending,
            Err(e) => {
                warn!(ttl, seq, error = %e, "failed to send probe");
                return HopProbe::timeout(seq);
            }
        };

        match pending.await_response(&mut self.transport, self.config.timeout) {
            ProbeOutcome::Response(response) => HopProbe::response(
                seq,
                response.source,
                response.rtt,
                response.icmp_type,
                response.icmp_code,
            ),
            ProbeOutcome::Timeout | ProbeOutcome::Failed => HopProbe::timeout(seq),
        }
    }

    /// Release the transport
    pub fn into_inner(self) -> T {
        self.transport
    }
}

/// Trace the route to `dest`, sending `probes_per_hop` probes at each TTL.
///
/// Opens its own socket; fails only if no ICMP socket can be opened.
pub fn traceroute(
    dest: Ipv4Addr,
    max_ttl: u8,
    probes_per_hop: u8,
    timeout: Duration,
) -> Result<TracerouteResult> {
    let config = TraceConfig {
        max_ttl,
        probes_per_hop,
        timeout,
        ..TraceConfig::default()
    };
    Ok(Tracer::open(config)?.run(dest))
}
