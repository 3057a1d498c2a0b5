use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::time::Duration;

use crate::icmp::{IcmpCode, IcmpType};

/// Outcome of a single echo probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PingPacket {
    /// Type of the answer, None if nothing answered
    pub icmp_type: Option<IcmpType>,
    pub icmp_code: Option<IcmpCode>,
    pub seq: u16,
    /// Round-trip time; present iff `success`
    #[serde(with = "super::option_duration_serde")]
    pub rtt: Option<Duration>,
    pub success: bool,
    /// Who answered (the target for replies, a router for errors)
    pub from: Option<Ipv4Addr>,
}

impl PingPacket {
    /// Matching Echo Reply
    pub fn reply(seq: u16, from: Ipv4Addr, rtt: Duration) -> Self {
        Self {
            icmp_type: Some(IcmpType::EchoReply),
            icmp_code: Some(IcmpCode::Code0),
            seq,
            rtt: Some(rtt),
            success: true,
            from: Some(from),
        }
    }

    /// An ICMP error quoting the probe (e.g. host unreachable)
    pub fn error(seq: u16, from: Ipv4Addr, icmp_type: IcmpType, icmp_code: IcmpCode) -> Self {
        Self {
            icmp_type: Some(icmp_type),
            icmp_code: Some(icmp_code),
            seq,
            rtt: None,
            success: false,
            from: Some(from),
        }
    }

    /// No answer within the timeout
    pub fn lost(seq: u16) -> Self {
        Self {
            icmp_type: None,
            icmp_code: None,
            seq,
            rtt: None,
            success: false,
            from: None,
        }
    }

    /// Human-readable reason for an error answer
    pub fn description(&self) -> Option<&'static str> {
        match (self.icmp_type, self.icmp_code) {
            (Some(icmp_type), Some(icmp_code)) => icmp_code.description(icmp_type),
            _ => None,
        }
    }
}

/// Summary of a ping run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PingResult {
    pub dest: Ipv4Addr,
    pub started_at: DateTime<Utc>,
    pub sent: u64,
    pub recvd: u64,
    pub lost: u64,
    pub packets: Vec<PingPacket>,
}

impl PingResult {
    pub fn new(dest: Ipv4Addr) -> Self {
        Self {
            dest,
            started_at: Utc::now(),
            sent: 0,
            recvd: 0,
            lost: 0,
            packets: Vec::new(),
        }
    }

    /// Append one probe outcome, keeping the counters consistent
    pub fn record(&mut self, packet: PingPacket) {
        self.sent += 1;
        if packet.success {
            self.recvd += 1;
        } else {
            self.lost += 1;
        }
        self.packets.push(packet);
    }

    /// Round-trip times of successful probes, in sequence order
    pub fn rtts(&self) -> impl Iterator<Item = Duration> + '_ {
        self.packets.iter().filter_map(|p| p.rtt)
    }

    /// Loss percentage
    pub fn loss_pct(&self) -> f64 {
        if self.sent == 0 {
            0.0
        } else {
            (self.lost as f64 / self.sent as f64) * 100.0
        }
    }

    pub fn min_rtt(&self) -> Option<Duration> {
        self.rtts().min()
    }

    pub fn max_rtt(&self) -> Option<Duration> {
        self.rtts().max()
    }

    /// Average RTT
    pub fn avg_rtt(&self) -> Option<Duration> {
        if self.recvd == 0 {
            return None;
        }
        let total: Duration = self.rtts().sum();
        Some(total / self.recvd as u32)
    }

    /// Mean deviation as reported by ping(8) (population standard deviation)
    pub fn mdev(&self) -> Option<Duration> {
        let avg = self.avg_rtt()?.as_secs_f64();
        let variance = self
            .rtts()
            .map(|rtt| {
                let delta = rtt.as_secs_f64() - avg;
                delta * delta
            })
            .sum::<f64>()
            / self.recvd as f64;
        Some(Duration::from_secs_f64(variance.sqrt()))
    }
}
