use clap::{Parser, Subcommand};
use std::time::Duration;

use crate::probe::MAX_PAYLOAD_SIZE;

/// ICMP ping and traceroute over raw or unprivileged sockets
#[derive(Parser, Debug, Clone)]
#[command(name = "icmpkit")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Output JSON instead of a text report
    #[arg(long = "json", global = true)]
    pub json: bool,

    /// Use an unprivileged datagram socket even when raw sockets are available
    #[arg(long = "dgram", global = true)]
    pub dgram: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Send echo requests and report round-trip times and loss
    Ping(PingArgs),
    /// Discover the hops towards a host by TTL expiry
    #[command(alias = "trace")]
    Traceroute(TraceArgs),
}

#[derive(clap::Args, Debug, Clone)]
pub struct PingArgs {
    /// Target host (IPv4 address or hostname)
    pub target: String,

    /// Number of echo requests to send
    #[arg(short = 'c', long = "count", default_value = "4")]
    pub count: u16,

    /// Seconds between probes
    #[arg(short = 'i', long = "interval", default_value = "1.0")]
    pub interval: f64,

    /// Seconds to wait for each reply
    #[arg(short = 'W', long = "timeout", default_value = "1.0")]
    pub timeout: f64,

    /// Payload size in bytes
    #[arg(short = 's', long = "size", default_value = "56")]
    pub size: usize,

    /// Outbound TTL
    #[arg(short = 't', long = "ttl", default_value = "64")]
    pub ttl: u8,
}

#[derive(clap::Args, Debug, Clone)]
pub struct TraceArgs {
    /// Target host (IPv4 address or hostname)
    pub target: String,

    /// Maximum TTL (hops)
    #[arg(short = 'm', long = "max-ttl", default_value = "30")]
    pub max_ttl: u8,

    /// Probes per hop
    #[arg(short = 'q', long = "queries", default_value = "3")]
    pub queries: u8,

    /// First TTL to probe
    #[arg(short = 'f', long = "first-ttl", default_value = "1")]
    pub first_ttl: u8,

    /// Seconds to wait for each probe
    #[arg(short = 'W', long = "timeout", default_value = "1.0")]
    pub timeout: f64,

    /// Seconds between probes
    #[arg(short = 'z', long = "interval", default_value = "0")]
    pub interval: f64,

    /// Payload size in bytes
    #[arg(short = 's', long = "size", default_value = "56")]
    pub size: usize,
}

fn validate_seconds(name: &str, value: f64, allow_zero: bool) -> Result<(), String> {
    if !value.is_finite() || value < 0.0 || (!allow_zero && value == 0.0) {
        let bound = if allow_zero { "non-negative" } else { "positive" };
        return Err(format!("{} must be {}", name, bound));
    }
    Ok(())
}

impl PingArgs {
    /// Get probe interval as Duration
    pub fn interval_duration(&self) -> Duration {
        Duration::from_secs_f64(self.interval)
    }

    /// Get timeout as Duration
    pub fn timeout_duration(&self) -> Duration {
        Duration::from_secs_f64(self.timeout)
    }

    /// Validate arguments
    pub fn validate(&self) -> Result<(), String> {
        if self.count == 0 {
            return Err("Count must be at least 1".into());
        }
        validate_seconds("Interval", self.interval, true)?;
        validate_seconds("Timeout", self.timeout, false)?;
        if self.ttl == 0 {
            return Err("TTL must be at least 1".into());
        }
        if self.size > MAX_PAYLOAD_SIZE {
            return Err(format!("Payload size cannot exceed {}", MAX_PAYLOAD_SIZE));
        }
        Ok(())
    }
}

impl TraceArgs {
    /// Get probe interval as Duration
    pub fn interval_duration(&self) -> Duration {
        Duration::from_secs_f64(self.interval)
    }

    /// Get timeout as Duration
    pub fn timeout_duration(&self) -> Duration {
        Duration::from_secs_f64(self.timeout)
    }

    /// Validate arguments
    pub fn validate(&self) -> Result<(), String> {
        if self.max_ttl == 0 {
            return Err("Max TTL must be at least 1".into());
        }
        if self.first_ttl == 0 || self.first_ttl > self.max_ttl {
            return Err(format!("First TTL must be between 1 and {}", self.max_ttl));
        }
        if self.queries == 0 {
            return Err("Queries per hop must be at least 1".into());
        }
        const MAX_QUERIES: u8 = 10;
        if self.queries > MAX_QUERIES {
            return Err(format!("Queries per hop cannot exceed {}", MAX_QUERIES));
        }
        validate_seconds("Timeout", self.timeout, false)?;
        validate_seconds("Interval", self.interval, true)?;
        if self.size > MAX_PAYLOAD_SIZE {
            return Err(format!("Payload size cannot exceed {}", MAX_PAYLOAD_SIZE));
        }
        Ok(())
    }
}

impl Args {
    /// Validate the selected subcommand
    pub fn validate(&self) -> Result<(), String> {
        match &self.command {
            Command::Ping(args) => args.validate(),
            Command::Traceroute(args) => args.validate(),
        }
    }

    pub fn target(&self) -> &str {
        match &self.command {
            Command::Ping(args) => &args.target,
            Command::Traceroute(args) => &args.target,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let args = Args::parse_from(["icmpkit", "ping", "127.0.0.1"]);
        assert!(args.validate().is_ok());
        assert_eq!(args.target(), "127.0.0.1");
        assert!(!args.json);

        let args = Args::parse_from(["icmpkit", "trace", "--json", "127.0.0.1"]);
        assert!(args.validate().is_ok());
        assert!(args.json);
    }

    #[test]
    fn test_rejects_bad_values() {
        let args = Args::parse_from(["icmpkit", "ping", "-c", "0", "127.0.0.1"]);
        assert!(args.validate().is_err());

        let args = Args::parse_from(["icmpkit", "ping", "-W", "0", "127.0.0.1"]);
        assert!(args.validate().is_err());

        let args = Args::parse_from(["icmpkit", "traceroute", "-f", "5", "-m", "4", "127.0.0.1"]);
        assert!(args.validate().is_err());

        let args = Args::parse_from(["icmpkit", "traceroute", "-q", "0", "127.0.0.1"]);
        assert!(args.validate().is_err());
    }
}
