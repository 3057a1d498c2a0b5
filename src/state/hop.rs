use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::time::Duration;

use crate::icmp::{IcmpCode, IcmpType};

/// One attempt at a given TTL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HopProbe {
    pub seq: u16,
    pub address: Option<Ipv4Addr>,
    #[serde(with = "super::option_duration_serde")]
    pub rtt: Option<Duration>,
    pub icmp_type: Option<IcmpType>,
    pub icmp_code: Option<IcmpCode>,
}

impl HopProbe {
    pub fn response(
        seq: u16,
        address: Ipv4Addr,
        rtt: Duration,
        icmp_type: IcmpType,
        icmp_code: IcmpCode,
    ) -> Self {
        Self {
            seq,
            address: Some(address),
            rtt: Some(rtt),
            icmp_type: Some(icmp_type),
            icmp_code: Some(icmp_code),
        }
    }

    pub fn timeout(seq: u16) -> Self {
        Self {
            seq,
            address: None,
            rtt: None,
            icmp_type: None,
            icmp_code: None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.address.is_none()
    }
}

/// A single hop (TTL level) in the path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TracerouteHop {
    pub ttl: u8,
    /// First responder seen at this TTL; None if every probe timed out
    pub address: Option<Ipv4Addr>,
    pub probes: Vec<HopProbe>,
}

impl TracerouteHop {
    pub fn new(ttl: u8) -> Self {
        Self {
            ttl,
            address: None,
            probes: Vec::new(),
        }
    }

    /// Record one attempt. First responder wins the hop address.
    pub fn record(&mut self, probe: HopProbe) {
        if self.address.is_none() {
            self.address = probe.address;
        }
        self.probes.push(probe);
    }

    /// Per-attempt RTTs, None for timeouts
    pub fn rtts(&self) -> Vec<Option<Duration>> {
        self.probes.iter().map(|p| p.rtt).collect()
    }

    /// RTTs grouped by responder, in first-seen order
    pub fn address_rtts(&self) -> Vec<(Ipv4Addr, Vec<Duration>)> {
        let mut grouped: Vec<(Ipv4Addr, Vec<Duration>)> = Vec::new();
        for probe in &self.probes {
            let (Some(address), Some(rtt)) = (probe.address, probe.rtt) else {
                continue;
            };
            match grouped.iter_mut().find(|(a, _)| *a == address) {
                Some((_, rtts)) => rtts.push(rtt),
                None => grouped.push((address, vec![rtt])),
            }
        }
        grouped
    }

    /// True if at least one probe got an answer
    pub fn responded(&self) -> bool {
        self.address.is_some()
    }
}

/// Result of a traceroute run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TracerouteResult {
    pub dest: Ipv4Addr,
    pub started_at: DateTime<Utc>,
    pub hops: Vec<TracerouteHop>,
    /// Destination answered with an Echo Reply
    pub reached: bool,
}

impl TracerouteResult {
    pub fn new(dest: Ipv4Addr) -> Self {
        Self {
            dest,
            started_at: Utc::now(),
            hops: Vec::new(),
            reached: false,
        }
    }

    /// Get hop by TTL
    pub fn hop(&self, ttl: u8) -> Option<&TracerouteHop> {
        self.hops.iter().find(|h| h.ttl == ttl)
    }

    /// TTL at which the destination answered
    pub fn dest_ttl(&self) -> Option<u8> {
        if !self.reached {
            return None;
        }
        self.hops.last().map(|h| h.ttl)
    }
}
