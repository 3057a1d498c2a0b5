use std::net::Ipv4Addr;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::config::PingConfig;
use crate::engine::pending::{PendingProbe, ProbeOutcome};
use crate::error::Result;
use crate::icmp::IcmpType;
use crate::probe::{IcmpSocket, SocketMode, Transport, build_echo_request, get_identifier};
use crate::state::{PingPacket, PingResult};

/// Sends a fixed number of echo requests to one destination, one at a time
pub struct Pinger<T: Transport> {
    config: PingConfig,
    transport: T,
    identifier: u16,
}

impl Pinger<IcmpSocket> {
    /// Open a socket (raw, falling back to datagram) and build a pinger on it
    pub fn open(config: PingConfig) -> Result<Self> {
        Ok(Self::new(config, IcmpSocket::open()?))
    }

    /// Open a socket in exactly `mode`
    pub fn open_with_mode(config: PingConfig, mode: SocketMode) -> Result<Self> {
        Ok(Self::new(config, IcmpSocket::with_mode(mode)?))
    }
}

impl<T: Transport> Pinger<T> {
    pub fn new(config: PingConfig, transport: T) -> Self {
        Self {
            config,
            transport,
            identifier: get_identifier(),
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

    pub fn config(&self) -> &PingConfig {
        &self.config
    }

    /// Ping `dest` `config.count` times.
    ///
    /// Never fails: a probe that cannot be sent or answered is recorded as
    /// lost, so `sent` always equals the configured count.
    #[instrument(skip(self), fields(count = self.config.count, id = self.identifier))]
    pub fn run(&mut self, dest: Ipv4Addr) -> PingResult {
        let mut result = PingResult::new(dest);

        for seq in 0..self.config.count {
            if seq > 0 && !self.config.interval.is_zero() {
                thread::sleep(self.config.interval);
            }
            let packet = self.probe(dest, seq);
            debug!(seq, success = packet.success, rtt = ?packet.rtt, "probe complete");
            result.record(packet);
        }

        info!(
            sent = result.sent,
            recvd = result.recvd,
            loss = result.loss_pct(),
            "ping finished"
        );
        result
    }

    fn probe(&mut self, dest: Ipv4Addr, seq: u16) -> PingPacket {
        let request = build_echo_request(self.identifier, seq, self.config.payload_size);

        let pending = match PendingProbe::send(&mut self.transport, &request, dest, self.config.ttl) {
            Ok(pending) => pending,
            Err(e) => {
                warn!(seq, error = %e, "failed to send echo request");
                return PingPacket::lost(seq);
            }
        };

        match pending.await_response(&mut self.transport, self.config.timeout) {
            ProbeOutcome::Response(response) if response.icmp_type == IcmpType::EchoReply => {
                PingPacket::reply(seq, response.source, response.rtt)
            }
            ProbeOutcome::Response(response) => {
                debug!(
                    seq,
                    from = %response.source,
                    icmp_type = ?response.icmp_type,
                    code = response.icmp_code.value(),
                    "probe answered with error"
                );
                PingPacket::error(seq, response.source, response.icmp_type, response.icmp_code)
            }
            ProbeOutcome::Timeout | ProbeOutcome::Failed => PingPacket::lost(seq),
        }
    }

    /// Release the transport
    pub fn into_inner(self) -> T {
        self.transport
    }
}

/// Ping `dest` `count` times, waiting up to `timeout` for each reply.
///
/// Opens its own socket; fails only if no ICMP socket can be opened.
pub fn ping(dest: Ipv4Addr, count: u16, timeout: Duration, payload_size: usize) -> Result<PingResult> {
    let config = PingConfig {
        count,
        timeout,
        payload_size,
        ..PingConfig::default()
    };
    Ok(Pinger::open(config)?.run(dest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IcmpError;
    use crate::icmp::{ErrorMessage, IcmpCode, IcmpMessage};
    use crate::probe::{MockTransport, Reception, quote_probe};
    use std::io;
    use std::sync::{Arc, Mutex};

    const DEST: Ipv4Addr = Ipv4Addr::new(192, 0, 2, 10);
    const ROUTER: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 1);
    const ID: u16 = 0x4242;

    fn config(count: u16) -> PingConfig {
        PingConfig {
            count,
            interval: Duration::ZERO,
            timeout: Duration::from_millis(200),
            payload_size: 16,
            ttl: Some(64),
        }
    }

    /// Mock that remembers the last echo request sent
    fn recording_mock() -> (MockTransport, Arc<Mutex<Option<IcmpMessage>>>) {
        let last = Arc::new(Mutex::new(None));
        let mut mock = MockTransport::new();
        mock.expect_mode().return_const(SocketMode::Raw);
        let sent = Arc::clone(&last);
        mock.expect_send().returning(move |message, _, _| {
            *sent.lock().unwrap() = Some(message.clone());
            Ok(())
        });
        (mock, last)
    }

    fn last_request(last: &Arc<Mutex<Option<IcmpMessage>>>) -> crate::icmp::EchoMessage {
        last.lock()
            .unwrap()
            .as_ref()
            .and_then(|m| m.as_echo().cloned())
            .unwrap()
    }

    #[test]
    fn test_all_replies() {
        let (mut mock, last) = recording_mock();
        let sent = Arc::clone(&last);
        mock.expect_receive().returning(move |_| {
            Ok(Reception::Message {
                message: last_request(&sent).to_reply().into(),
                source: DEST,
            })
        });

        let mut pinger = Pinger::new(config(3), mock).with_identifier(ID);
        let result = pinger.run(DEST);

        assert_eq!(result.dest, DEST);
        assert_eq!((result.sent, result.recvd, result.lost), (3, 3, 0));
        let seqs: Vec<u16> = result.packets.iter().map(|p| p.seq).collect();
        assert_eq!(seqs, vec![0, 1, 2]);
        for packet in &result.packets {
            assert!(packet.success);
            assert!(packet.rtt.is_some());
            assert_eq!(packet.from, Some(DEST));
            assert_eq!(packet.icmp_type, Some(IcmpType::EchoReply));
        }
    }

    #[test]
    fn test_request_carries_identifier_and_ttl() {
        let mut mock = MockTransport::new();
        mock.expect_mode().return_const(SocketMode::Raw);
        mock.expect_send()
            .withf(|message, dest, ttl| {
                let echo = message.as_echo().unwrap();
                echo.icmp_type() == IcmpType::EchoRequest
                    && echo.identifier() == ID
                    && echo.payload().len() == 16
                    && *dest == DEST
                    && *ttl == Some(64)
            })
            .times(2)
            .returning(|_, _, _| Ok(()));
        mock.expect_receive().returning(|_| Ok(Reception::Timeout));

        let result = Pinger::new(config(2), mock).with_identifier(ID).run(DEST);
        assert_eq!(result.lost, 2);
    }

    #[test]
    fn test_silence_is_loss() {
        let (mut mock, _) = recording_mock();
        mock.expect_receive().returning(|_| Ok(Reception::Timeout));

        let result = Pinger::new(config(4), mock).with_identifier(ID).run(DEST);
        assert_eq!((result.sent, result.recvd, result.lost), (4, 0, 4));
        assert_eq!(result.loss_pct(), 100.0);
        assert!(result.packets.iter().all(|p| p.rtt.is_none() && p.from.is_none()));
    }

    #[test]
    fn test_foreign_reply_not_counted() {
        let (mut mock, _) = recording_mock();
        let mut script = vec![
            Ok(Reception::Timeout),
            Ok(Reception::Message {
                message: build_echo_request(ID.wrapping_add(1), 0, 16).to_reply().into(),
                source: DEST,
            }),
        ];
        mock.expect_receive()
            .times(2)
            .returning(move |_| script.pop().unwrap());

        let result = Pinger::new(config(1), mock).with_identifier(ID).run(DEST);
        assert_eq!(result.recvd, 0);
        assert_eq!(result.lost, 1);
    }

    #[test]
    fn test_unreachable_recorded_as_failure() {
        let (mut mock, last) = recording_mock();
        let sent = Arc::clone(&last);
        mock.expect_receive().returning(move |_| {
            let quoted = quote_probe(&last_request(&sent), 1);
            let error =
                ErrorMessage::destination_unreachable(IcmpCode::Code1, quoted).unwrap();
            Ok(Reception::Message {
                message: error.into(),
                source: ROUTER,
            })
        });

        let result = Pinger::new(config(1), mock).with_identifier(ID).run(DEST);
        let packet = &result.packets[0];

        assert_eq!(result.lost, 1);
        assert!(!packet.success);
        assert_eq!(packet.rtt, None);
        assert_eq!(packet.from, Some(ROUTER));
        assert_eq!(packet.icmp_type, Some(IcmpType::DestinationUnreachable));
        assert_eq!(packet.icmp_code, Some(IcmpCode::Code1));
    }

    #[test]
    fn test_send_failure_counts_as_sent_and_lost() {
        let mut mock = MockTransport::new();
        mock.expect_send()
            .returning(|_, _, _| Err(IcmpError::Io(io::Error::other("no route to host"))));
        mock.expect_receive().never();

        let result = Pinger::new(config(2), mock).with_identifier(ID).run(DEST);
        assert_eq!((result.sent, result.recvd, result.lost), (2, 0, 2));
    }

    #[test]
    fn test_interval_between_probes() {
        let (mut mock, _) = recording_mock();
        mock.expect_receive().returning(|_| Ok(Reception::Timeout));

        let config = PingConfig {
            interval: Duration::from_millis(20),
            timeout: Duration::from_millis(1),
            ..config(3)
        };
        let started = std::time::Instant::now();
        Pinger::new(config, mock).with_identifier(ID).run(DEST);
        assert!(started.elapsed() >= Duration::from_millis(40));
    }
}
