use crate::Protocol;
use serde::Serialize;
use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use tracing::info;

/// A completed two-stage probe of one address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanRecord {
    pub ip: IpAddr,
    /// `ip:port` for TCP/UDP probes, the bare address for ICMP.
    pub address: String,
    pub protocol: Protocol,
    pub ping_rtt_ms: i64,
    pub http_rtt_ms: i64,
}

/// Results shared by all workers of a scan: an append-only record log plus counters.
#[derive(Debug, Default)]
pub struct ScanResult {
    scanned: AtomicU64,
    found: AtomicU64,
    records: Mutex<Vec<ScanRecord>>,
}

impl ScanResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, record: ScanRecord) {
        info!(address = %record.address, ping_ms = record.ping_rtt_ms, http_ms = record.http_rtt_ms, "found an address");
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
        self.found.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one dispatched address and return the new total.
    pub fn inc_scanned(&self) -> u64 {
        let n = self.scanned.fetch_add(1, Ordering::Relaxed) + 1;
        if n % 1000 == 0 {
            info!(scanned = n, found = self.found_count(), "scan progress");
        }
        n
    }

    pub fn scanned_count(&self) -> u64 {
        self.scanned.load(Ordering::Relaxed)
    }

    pub fn found_count(&self) -> u64 {
        self.found.load(Ordering::Relaxed)
    }

    /// Copy of the records in insertion order.
    pub fn records(&self) -> Vec<ScanRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
