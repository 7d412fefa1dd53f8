use crate::prober::{probe_address, Prober};
use ipscan_core::{ProbeConfig, ScanResult};
use std::net::IpAddr;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

type Queue = Arc<Mutex<mpsc::Receiver<IpAddr>>>;

/// Probe every address with `cfg.workers` concurrent workers and return the shared result.
///
/// The queue is closed once every address has been enqueued; workers exit when it is
/// drained or when a configured scanned/found limit has been reached. Limits are checked
/// before each dequeue, so in-flight probes may overshoot them by up to `workers - 1`.
pub async fn run<P>(addresses: Vec<IpAddr>, cfg: &ProbeConfig, prober: Arc<P>) -> Arc<ScanResult>
where
    P: Prober + ?Sized + 'static,
{
    let result = Arc::new(ScanResult::new());
    let workers = cfg.workers.max(1);
    info!(addresses = addresses.len(), workers, protocol = %cfg.protocol, "starting scan");

    let (tx, rx) = mpsc::channel::<IpAddr>(workers * 2);
    let queue: Queue = Arc::new(Mutex::new(rx));
    let shared_cfg = Arc::new(cfg.clone());
    let mut set = JoinSet::new();
    for id in 0..workers {
        set.spawn(worker(id, queue.clone(), prober.clone(), shared_cfg.clone(), result.clone()));
    }
    // workers hold the only receivers; if they all stop early the sends below fail
    drop(queue);

    for addr in addresses {
        if tx.send(addr).await.is_err() {
            debug!("all workers stopped, no more addresses enqueued");
            break;
        }
    }
    drop(tx);

    while let Some(joined) = set.join_next().await {
        if let Err(e) = joined {
            warn!(error = %e, "scan worker ended abnormally");
        }
    }
    info!(scanned = result.scanned_count(), found = result.found_count(), "scan finished");
    result
}

async fn worker<P>(id: usize, queue: Queue, prober: Arc<P>, cfg: Arc<ProbeConfig>, result: Arc<ScanResult>)
where
    P: Prober + ?Sized,
{
    loop {
        if let Some(reason) = limit_reached(&cfg, &result) {
            debug!(worker = id, reason, "stop condition reached");
            break;
        }
        let next = queue.lock().await.recv().await;
        let Some(addr) = next else { break };
        result.inc_scanned();
        if let Some(record) = probe_address(&*prober, &cfg, addr).await {
            result.add(record);
        }
    }
}

fn limit_reached(cfg: &ProbeConfig, result: &ScanResult) -> Option<&'static str> {
    if cfg.scanned_limit.is_some_and(|l| result.scanned_count() >= l) {
        return Some("scanned limit");
    }
    if cfg.found_limit.is_some_and(|l| result.found_count() >= l) {
        return Some("found limit");
    }
    None
}
