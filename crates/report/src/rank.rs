use ipscan_core::ScanRecord;

/// Order by application-layer latency, fastest first. Equal latencies keep insertion order.
pub fn rank(mut records: Vec<ScanRecord>) -> Vec<ScanRecord> {
    records.sort_by_key(|r| r.http_rtt_ms);
    records
}

pub fn best(ranked: &[ScanRecord]) -> Option<&ScanRecord> {
    ranked.first()
}
