//! Core types shared by the range, probe, scan and report crates.

pub mod error;
pub mod probe;
pub mod record;

pub use error::ConfigError;
pub use probe::{
    Attempt, LatencyMode, Outcome, ProbeConfig, Protocol, ATTEMPT_PAUSE, ERROR_MS, REFUSED_MS,
    TIMEOUT_MS,
};
pub use record::{ScanRecord, ScanResult};

pub const fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
