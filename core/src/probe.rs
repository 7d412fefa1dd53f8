use crate::ConfigError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

/// Latency stored for an attempt that timed out.
pub const TIMEOUT_MS: f64 = 9_999_999.0;
/// Latency stored for an attempt that was actively refused.
pub const REFUSED_MS: f64 = -1.0;
/// Latency stored for any other failed attempt.
pub const ERROR_MS: f64 = 0.0;

/// Pause between two attempts against the same address.
pub const ATTEMPT_PAUSE: Duration = Duration::from_millis(100);

/// Network-layer probe protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Icmp,
    Tcp,
    Udp,
}

impl Protocol {
    pub fn as_str(self) -> &'static str {
        match self {
            Protocol::Icmp => "icmp",
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
        }
    }

    /// An open UDP port usually stays silent, so for UDP a timeout counts as a pass.
    pub fn timeout_is_success(self) -> bool {
        matches!(self, Protocol::Udp)
    }

    pub fn uses_port(self) -> bool {
        !matches!(self, Protocol::Icmp)
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "icmp" => Ok(Protocol::Icmp),
            "tcp" => Ok(Protocol::Tcp),
            "udp" => Ok(Protocol::Udp),
            other => Err(ConfigError::InvalidProtocol(other.to_string())),
        }
    }
}

/// What happened on a single probe attempt. Exactly one variant applies per attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Reply(Duration),
    Timeout,
    Refused,
    Failed(String),
}

impl Outcome {
    /// Measured milliseconds for a reply, otherwise the matching sentinel.
    pub fn latency_ms(&self) -> f64 {
        match self {
            Outcome::Reply(rtt) => rtt.as_secs_f64() * 1000.0,
            Outcome::Timeout => TIMEOUT_MS,
            Outcome::Refused => REFUSED_MS,
            Outcome::Failed(_) => ERROR_MS,
        }
    }

    pub fn is_success(&self, timeout_is_success: bool) -> bool {
        match self {
            Outcome::Reply(_) => true,
            Outcome::Timeout => timeout_is_success,
            Outcome::Refused | Outcome::Failed(_) => false,
        }
    }
}

/// One probe attempt against one address. Implementations time themselves and never error:
/// every failure is folded into an [`Outcome`].
#[async_trait]
pub trait Attempt: Send + Sync {
    async fn attempt(&self, addr: IpAddr, seq: u16) -> Outcome;
}

/// How per-attempt latencies collapse into the figure stored on a record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LatencyMode {
    /// Rounded mean of every attempt, sentinels included.
    #[default]
    Mean,
    /// Median of the successful attempts' measured values only.
    Median,
}

/// Immutable settings for one scan run.
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    pub protocol: Protocol,
    pub port: u16,
    pub count: u32,
    pub timeout: Duration,
    /// Require every attempt of a stage to succeed instead of any one.
    pub all: bool,
    pub latency: LatencyMode,
    pub pause: Duration,
    pub http_url: String,
    pub http_port: u16,
    pub http_timeout: Duration,
    pub workers: usize,
    pub scanned_limit: Option<u64>,
    pub found_limit: Option<u64>,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        ProbeConfig {
            protocol: Protocol::Tcp,
            port: 443,
            count: 3,
            timeout: Duration::from_millis(1000),
            all: true,
            latency: LatencyMode::Mean,
            pause: ATTEMPT_PAUSE,
            http_url: "https://www.cloudflare.com/".into(),
            http_port: 443,
            http_timeout: Duration::from_millis(2000),
            workers: 128,
            scanned_limit: None,
            found_limit: None,
        }
    }
}

impl ProbeConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.count == 0 {
            return Err(ConfigError::ZeroCount);
        }
        if self.workers == 0 {
            return Err(ConfigError::ZeroWorkers);
        }
        if self.protocol.uses_port() && self.port == 0 {
            return Err(ConfigError::ZeroPort("ping"));
        }
        if self.http_port == 0 {
            return Err(ConfigError::ZeroPort("http"));
        }
        Ok(())
    }

    /// Address text stored on a record: `ip:port` for TCP/UDP, the bare address for ICMP.
    pub fn record_address(&self, ip: IpAddr) -> String {
        if self.protocol.uses_port() {
            SocketAddr::new(ip, self.port).to_string()
        } else {
            ip.to_string()
        }
    }
}
