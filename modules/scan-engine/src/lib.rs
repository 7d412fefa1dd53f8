//! Concurrent scan of an address pool: a fixed worker pool drains a closed-when-done queue,
//! probes each address in two stages and collects passing addresses.

mod coordinator;
mod prober;

pub use coordinator::run;
pub use prober::{probe_address, LayeredProber, Prober};
