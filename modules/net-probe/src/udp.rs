use crate::classify_io;
use async_trait::async_trait;
use ipscan_core::{Attempt, Outcome};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::time::timeout;

const PAYLOAD: &[u8] = b"Ping!Ping!Ping!";

/// Send one datagram to `addr:port` and wait for any answer.
#[derive(Debug, Clone)]
pub struct UdpAttempt {
    port: u16,
    timeout: Duration,
}

impl UdpAttempt {
    pub fn new(port: u16, timeout: Duration) -> Self {
        UdpAttempt { port, timeout }
    }
}

#[async_trait]
impl Attempt for UdpAttempt {
    async fn attempt(&self, addr: IpAddr, _seq: u16) -> Outcome {
        let target = SocketAddr::new(addr, self.port);
        let local: SocketAddr = match addr {
            IpAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
            IpAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
        };
        let sock = match UdpSocket::bind(local).await {
            Ok(s) => s,
            Err(e) => return classify_io(e),
        };
        // connected so ICMP port-unreachable surfaces as ConnectionRefused
        if let Err(e) = sock.connect(target).await {
            return classify_io(e);
        }
        let start = Instant::now();
        if let Err(e) = sock.send(PAYLOAD).await {
            return classify_io(e);
        }
        let mut buf = [0u8; 1500];
        match timeout(self.timeout, sock.recv(&mut buf)).await {
            Ok(Ok(_)) => Outcome::Reply(start.elapsed()),
            Ok(Err(e)) => classify_io(e),
            Err(_) => Outcome::Timeout,
        }
    }
}
