use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::cli::{PingArgs, TraceArgs};
use crate::probe::DEFAULT_PAYLOAD_SIZE;

/// Ping run configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PingConfig {
    /// Number of echo requests to send
    pub count: u16,
    /// Pause between consecutive probes
    #[serde(with = "duration_serde")]
    pub interval: Duration,
    /// How long to wait for each reply
    #[serde(with = "duration_serde")]
    pub timeout: Duration,
    /// Echo payload size in bytes
    pub payload_size: usize,
    /// Outbound TTL (None = OS default)
    pub ttl: Option<u8>,
}

impl Default for PingConfig {
    fn default() -> Self {
        Self {
            count: 4,
            interval: Duration::from_secs(1),
            timeout: Duration::from_secs(1),
            payload_size: DEFAULT_PAYLOAD_SIZE,
            ttl: Some(64),
        }
    }
}

impl From<&PingArgs> for PingConfig {
    fn from(args: &PingArgs) -> Self {
        Self {
            count: args.count,
            interval: args.interval_duration(),
            timeout: args.timeout_duration(),
            payload_size: args.size,
            ttl: Some(args.ttl),
        }
    }
}

/// Traceroute run configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceConfig {
    /// First TTL probed
    pub first_ttl: u8,
    /// Maximum TTL
    pub max_ttl: u8,
    /// Echo requests sent per TTL
    pub probes_per_hop: u8,
    /// Probe timeout
    #[serde(with = "duration_serde")]
    pub timeout: Duration,
    /// Pause between consecutive probes
    #[serde(with = "duration_serde")]
    pub interval: Duration,
    /// Echo payload size in bytes
    pub payload_size: usize,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            first_ttl: 1,
            max_ttl: 30,
            probes_per_hop: 3,
            timeout: Duration::from_secs(1),
            interval: Duration::ZERO,
            payload_size: DEFAULT_PAYLOAD_SIZE,
        }
    }
}

impl From<&TraceArgs> for TraceConfig {
    fn from(args: &TraceArgs) -> Self {
        Self {
            first_ttl: args.first_ttl,
            max_ttl: args.max_ttl,
            probes_per_hop: args.queries,
            timeout: args.timeout_duration(),
            interval: args.interval_duration(),
            payload_size: args.size,
        }
    }
}

/// Serde helper for Duration
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs_f64().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
