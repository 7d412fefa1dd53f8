use crate::classify_io;
use async_trait::async_trait;
use ipscan_core::{Attempt, Outcome};
use std::net::{IpAddr, SocketAddr};
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Timed TCP connect to `addr:port`.
#[derive(Debug, Clone)]
pub struct TcpAttempt {
    port: u16,
    timeout: Duration,
}

impl TcpAttempt {
    pub fn new(port: u16, timeout: Duration) -> Self {
        TcpAttempt { port, timeout }
    }
}

#[async_trait]
impl Attempt for TcpAttempt {
    async fn attempt(&self, addr: IpAddr, _seq: u16) -> Outcome {
        let target = SocketAddr::new(addr, self.port);
        let start = Instant::now();
        match timeout(self.timeout, TcpStream::connect(target)).await {
            Ok(Ok(_stream)) => Outcome::Reply(start.elapsed()),
            Ok(Err(e)) => classify_io(e),
            Err(_) => Outcome::Timeout,
        }
    }
}
