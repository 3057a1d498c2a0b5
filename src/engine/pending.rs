//! The single outstanding probe shared by the ping and traceroute engines.
//!
//! Only one probe is ever in flight: the engine sends it, then waits on the
//! transport until a correlated answer arrives or the deadline passes.
//! Everything else read in the meantime is discarded.

use std::net::Ipv4Addr;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

use crate::error::{IcmpError, Result};
use crate::icmp::{EchoMessage, IcmpCode, IcmpMessage, IcmpType};
use crate::probe::{ProbeKey, Reception, SocketMode, Transport, is_response_to};

/// A probe that has been sent and is awaiting a response
#[derive(Debug, Clone)]
pub struct PendingProbe {
    pub key: ProbeKey,
    pub target: Ipv4Addr,
    pub sent_at: Instant,
}

/// A correlated answer to a probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResponse {
    pub source: Ipv4Addr,
    pub icmp_type: IcmpType,
    pub icmp_code: IcmpCode,
    pub rtt: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Response(ProbeResponse),
    /// Nothing correlated arrived within the timeout
    Timeout,
    /// The transport failed while waiting
    Failed,
}

impl PendingProbe {
    /// Send `probe` and start its clock
    pub fn send<T: Transport>(
        transport: &mut T,
        probe: &EchoMessage,
        target: Ipv4Addr,
        ttl: Option<u8>,
    ) -> Result<Self> {
        let key = ProbeKey::new(probe.identifier(), probe.sequence());
        let sent_at = Instant::now();
        transport.send(&IcmpMessage::Echo(probe.clone()), target, ttl)?;
        Ok(Self {
            key,
            target,
            sent_at,
        })
    }

    /// Wait until a response to this probe arrives or `timeout` elapses.
    ///
    /// The deadline is fixed at `sent_at + timeout`; each discarded packet
    /// shrinks the budget left for the next receive.
    pub fn await_response<T: Transport>(&self, transport: &mut T, timeout: Duration) -> ProbeOutcome {
        let deadline = self.sent_at + timeout;
        let mode = transport.mode();

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return ProbeOutcome::Timeout;
            }

            match transport.receive(remaining) {
                Ok(Reception::Timeout) => return ProbeOutcome::Timeout,
                Ok(Reception::Message { message, source }) => {
                    if is_response_to(&message, self.key, mode) {
                        return ProbeOutcome::Response(ProbeResponse {
                            source,
                            icmp_type: message.icmp_type(),
                            icmp_code: message.icmp_code(),
                            rtt: self.sent_at.elapsed(),
                        });
                    }
                    trace!(
                        %source,
                        dest = %self.target,
                        icmp_type = ?message.icmp_type(),
                        seq = self.key.sequence,
                        "discarding unrelated ICMP message"
                    );
                }
                Err(IcmpError::Decode(error)) => {
                    debug!(
                        %error,
                        dest = %self.target,
                        seq = self.key.sequence,
                        "discarding undecodable packet"
                    );
                }
                Err(error) => {
                    warn!(%error, dest = %self.target, seq = self.key.sequence, "receive failed");
                    return ProbeOutcome::Failed;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DecodeError;
    use crate::probe::{MockTransport, build_echo_request, build_probe_payload};
    use std::io;

    const TARGET: Ipv4Addr = Ipv4Addr::new(192, 0, 2, 7);

    fn mock(mode: SocketMode) -> MockTransport {
        let mut mock = MockTransport::new();
        mock.expect_mode().return_const(mode);
        mock
    }

    fn pending(sequence: u16) -> PendingProbe {
        PendingProbe {
            key: ProbeKey::new(0x1234, sequence),
            target: TARGET,
            sent_at: Instant::now(),
        }
    }

    #[test]
    fn test_send_records_key() {
        let mut mock = MockTransport::new();
        mock.expect_send()
            .withf(|message, dest, ttl| {
                message.icmp_type() == IcmpType::EchoRequest && *dest == TARGET && *ttl == Some(5)
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let probe = build_echo_request(0x1234, 77, 8);
        let pending = PendingProbe::send(&mut mock, &probe, TARGET, Some(5)).unwrap();
        assert_eq!(pending.key, ProbeKey::new(0x1234, 77));
        assert_eq!(pending.target, TARGET);
    }

    #[test]
    fn test_send_error_propagates() {
        let mut mock = MockTransport::new();
        mock.expect_send()
            .returning(|_, _, _| Err(IcmpError::CapabilityRestricted(IcmpType::TimeExceeded)));

        let probe = build_echo_request(1, 1, 8);
        assert!(PendingProbe::send(&mut mock, &probe, TARGET, None).is_err());
    }

    #[test]
    fn test_discards_until_match() {
        let mut mock = mock(SocketMode::Raw);
        let mut script = vec![
            // Matching reply, delivered last
            Ok(Reception::Message {
                message: build_echo_request(0x1234, 3, 8).to_reply().into(),
                source: TARGET,
            }),
            // Corrupt packet
            Err(IcmpError::Decode(DecodeError::ChecksumMismatch {
                stored: 1,
                computed: 2,
            })),
            // Another process's reply
            Ok(Reception::Message {
                message: build_echo_request(0x9999, 3, 8).to_reply().into(),
                source: TARGET,
            }),
        ];
        mock.expect_receive()
            .times(3)
            .returning(move |_| script.pop().unwrap());

        let outcome = pending(3).await_response(&mut mock, Duration::from_secs(1));
        let ProbeOutcome::Response(response) = outcome else {
            panic!("expected response, got {:?}", outcome);
        };
        assert_eq!(response.source, TARGET);
        assert_eq!(response.icmp_type, IcmpType::EchoReply);
        assert!(response.rtt < Duration::from_secs(1));
    }

    #[test]
    fn test_timeout_is_outcome() {
        let mut mock = mock(SocketMode::Raw);
        mock.expect_receive()
            .times(1)
            .returning(|_| Ok(Reception::Timeout));

        let outcome = pending(1).await_response(&mut mock, Duration::from_millis(100));
        assert_eq!(outcome, ProbeOutcome::Timeout);
    }

    #[test]
    fn test_budget_shrinks_and_expires() {
        let mut mock = mock(SocketMode::Raw);
        // Foreign traffic forever: the deadline must still end the wait
        mock.expect_receive().returning(|timeout| {
            assert!(timeout <= Duration::from_millis(30));
            std::thread::sleep(Duration::from_millis(5));
            Ok(Reception::Message {
                message: build_echo_request(0x9999, 1, 8).to_reply().into(),
                source: TARGET,
            })
        });

        let started = Instant::now();
        let outcome = pending(1).await_response(&mut mock, Duration::from_millis(30));
        assert_eq!(outcome, ProbeOutcome::Timeout);
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_payload_copy_matches_only_on_datagram_socket() {
        // Reply with a rewritten header identifier but our id/seq in the payload
        let reply = || -> Result<Reception> {
            Ok(Reception::Message {
                message: EchoMessage::reply(0x9999, 3, build_probe_payload(0x1234, 3, 16)).into(),
                source: TARGET,
            })
        };

        let mut raw = mock(SocketMode::Raw);
        let mut replies = vec![Ok(Reception::Timeout), reply()];
        raw.expect_receive()
            .times(2)
            .returning(move |_| replies.pop().unwrap());
        assert_eq!(
            pending(3).await_response(&mut raw, Duration::from_secs(1)),
            ProbeOutcome::Timeout
        );

        let mut dgram = mock(SocketMode::Datagram);
        dgram.expect_receive().times(1).returning(move |_| reply());
        assert!(matches!(
            pending(3).await_response(&mut dgram, Duration::from_secs(1)),
            ProbeOutcome::Response(_)
        ));
    }

    #[test]
    fn test_io_error_fails_probe() {
        let mut mock = mock(SocketMode::Raw);
        mock.expect_receive()
            .times(1)
            .returning(|_| Err(IcmpError::Io(io::Error::other("network down"))));

        let outcome = pending(1).await_response(&mut mock, Duration::from_secs(1));
        assert_eq!(outcome, ProbeOutcome::Failed);
    }
}
