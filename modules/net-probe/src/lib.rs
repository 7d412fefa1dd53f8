//! Network-layer reachability attempts (ICMP echo, TCP connect, UDP datagram) and the
//! repeated-attempt stage shared with the application-layer probe.

mod icmp;
mod stage;
mod tcp;
mod udp;

pub use icmp::IcmpAttempt;
pub use stage::{Stage, StageResult};
pub use tcp::TcpAttempt;
pub use udp::UdpAttempt;

use async_trait::async_trait;
use ipscan_core::{Attempt, Outcome, ProbeConfig, Protocol};
use std::io;
use std::net::IpAddr;

/// The configured network-layer attempt, chosen once per run.
pub enum NetworkAttempt {
    Icmp(IcmpAttempt),
    Tcp(TcpAttempt),
    Udp(UdpAttempt),
}

impl NetworkAttempt {
    /// Opening ICMP sockets can fail (usually missing privileges); that is a setup error.
    pub fn from_config(cfg: &ProbeConfig, with_ipv6: bool) -> io::Result<Self> {
        Ok(match cfg.protocol {
            Protocol::Icmp => NetworkAttempt::Icmp(IcmpAttempt::new(cfg.timeout, with_ipv6)?),
            Protocol::Tcp => NetworkAttempt::Tcp(TcpAttempt::new(cfg.port, cfg.timeout)),
            Protocol::Udp => NetworkAttempt::Udp(UdpAttempt::new(cfg.port, cfg.timeout)),
        })
    }
}

#[async_trait]
impl Attempt for NetworkAttempt {
    async fn attempt(&self, addr: IpAddr, seq: u16) -> Outcome {
        match self {
            NetworkAttempt::Icmp(a) => a.attempt(addr, seq).await,
            NetworkAttempt::Tcp(a) => a.attempt(addr, seq).await,
            NetworkAttempt::Udp(a) => a.attempt(addr, seq).await,
        }
    }
}

pub(crate) fn classify_io(e: io::Error) -> Outcome {
    match e.kind() {
        io::ErrorKind::ConnectionRefused => Outcome::Refused,
        io::ErrorKind::TimedOut => Outcome::Timeout,
        _ => Outcome::Failed(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_map_to_one_outcome_each() {
        let refused = io::Error::from(io::ErrorKind::ConnectionRefused);
        let timed_out = io::Error::from(io::ErrorKind::TimedOut);
        let other = io::Error::new(io::ErrorKind::Other, "no route");
        assert_eq!(classify_io(refused), Outcome::Refused);
        assert_eq!(classify_io(timed_out), Outcome::Timeout);
        assert_eq!(classify_io(other), Outcome::Failed("no route".into()));
    }

    #[test]
    fn tcp_and_udp_configs_build_socket_attempts() {
        let cfg = ProbeConfig { protocol: Protocol::Tcp, ..ProbeConfig::default() };
        let tcp = NetworkAttempt::from_config(&cfg, false).unwrap();
        assert!(matches!(tcp, NetworkAttempt::Tcp(_)));
        let cfg = ProbeConfig { protocol: Protocol::Udp, port: 53, ..ProbeConfig::default() };
        let udp = NetworkAttempt::from_config(&cfg, false).unwrap();
        assert!(matches!(udp, NetworkAttempt::Udp(_)));
    }
}
