use async_trait::async_trait;
use ipscan_core::{Attempt, ProbeConfig, ScanRecord};
use net_probe::{Stage, StageResult};
use std::net::IpAddr;
use tracing::debug;

/// The two probe stages the coordinator drives for every address.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn network(&self, addr: IpAddr) -> StageResult;
    async fn application(&self, addr: IpAddr) -> StageResult;
}

/// Network-layer attempt followed by an application-layer attempt, each repeated per [`Stage`].
pub struct LayeredProber<N, A> {
    net: N,
    app: A,
    net_stage: Stage,
    app_stage: Stage,
}

impl<N: Attempt, A: Attempt> LayeredProber<N, A> {
    pub fn new(cfg: &ProbeConfig, net: N, app: A) -> Self {
        LayeredProber { net, app, net_stage: Stage::network(cfg), app_stage: Stage::application(cfg) }
    }
}

#[async_trait]
impl<N: Attempt, A: Attempt> Prober for LayeredProber<N, A> {
    async fn network(&self, addr: IpAddr) -> StageResult {
        self.net_stage.run(&self.net, addr).await
    }

    async fn application(&self, addr: IpAddr) -> StageResult {
        self.app_stage.run(&self.app, addr).await
    }
}

/// Probe one address. The application stage only runs after the network stage passed;
/// a record comes back only when both passed.
pub async fn probe_address<P: Prober + ?Sized>(prober: &P, cfg: &ProbeConfig, addr: IpAddr) -> Option<ScanRecord> {
    let net = prober.network(addr).await;
    if !net.passed {
        debug!(%addr, latency = net.latency_ms, "network stage failed");
        return None;
    }
    let app = prober.application(addr).await;
    if !app.passed {
        debug!(%addr, latency = app.latency_ms, "application stage failed");
        return None;
    }
    Some(ScanRecord {
        ip: addr,
        address: cfg.record_address(addr),
        protocol: cfg.protocol,
        ping_rtt_ms: net.latency_ms,
        http_rtt_ms: app.latency_ms,
    })
}
