use async_trait::async_trait;
use ipscan_core::{Attempt, Outcome};
use std::io;
use std::net::IpAddr;
use std::time::Duration;
use surge_ping::{Client, Config, PingIdentifier, PingSequence, SurgeError, ICMP};
use tracing::debug;

const PAYLOAD: &[u8] = b"Ping!Ping!Ping!Ping!Ping!Ping!Ping!Ping!Ping!";

/// ICMP echo request/reply over raw sockets, one client per address family.
pub struct IcmpAttempt {
    v4: Client,
    v6: Option<Client>,
    ident: PingIdentifier,
    timeout: Duration,
}

impl IcmpAttempt {
    pub fn new(timeout: Duration, with_ipv6: bool) -> io::Result<Self> {
        let v4 = Client::new(&Config::default())?;
        let v6 = if with_ipv6 {
            Some(Client::new(&Config::builder().kind(ICMP::V6).build())?)
        } else {
            None
        };
        // identifier is the process id truncated to 16 bits
        let ident = PingIdentifier((std::process::id() & 0xffff) as u16);
        Ok(IcmpAttempt { v4, v6, ident, timeout })
    }
}

#[async_trait]
impl Attempt for IcmpAttempt {
    async fn attempt(&self, addr: IpAddr, seq: u16) -> Outcome {
        let client = match (addr, &self.v6) {
            (IpAddr::V4(_), _) => &self.v4,
            (IpAddr::V6(_), Some(v6)) => v6,
            (IpAddr::V6(_), None) => return Outcome::Failed("ICMPv6 is not enabled".into()),
        };
        let mut pinger = client.pinger(addr, self.ident).await;
        pinger.timeout(self.timeout);
        match pinger.ping(PingSequence(seq), PAYLOAD).await {
            Ok((_reply, rtt)) => Outcome::Reply(rtt),
            Err(SurgeError::Timeout { .. }) => Outcome::Timeout,
            Err(SurgeError::IOError(e)) => crate::classify_io(e),
            Err(e) => {
                debug!(%addr, error = %e, "icmp echo failed");
                Outcome::Failed(e.to_string())
            }
        }
    }
}
