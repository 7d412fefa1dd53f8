use thiserror::Error;

/// Problems with a probe configuration that must stop a run before any worker starts.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown probe protocol {0:?} (expected icmp, tcp or udp)")]
    InvalidProtocol(String),
    #[error("ping count must be at least 1")]
    ZeroCount,
    #[error("worker count must be at least 1")]
    ZeroWorkers,
    #[error("{0} port must be non-zero")]
    ZeroPort(&'static str),
}
