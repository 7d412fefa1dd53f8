use ipscan_core::ScanRecord;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use tracing::info;

/// One address per line, in ranked order. The file is replaced.
pub fn write_addresses(path: &Path, ranked: &[ScanRecord]) -> io::Result<()> {
    let mut w = BufWriter::new(File::create(path)?);
    for r in ranked {
        writeln!(w, "{}", r.address)?;
    }
    w.flush()?;
    info!(file = %path.display(), addresses = ranked.len(), "address list written");
    Ok(())
}

pub fn write_csv(path: &Path, ranked: &[ScanRecord]) -> Result<(), csv::Error> {
    let mut wtr = csv::Writer::from_writer(File::create(path)?);
    wtr.write_record(["ip", "address", "protocol", "ping_rtt_ms", "http_rtt_ms"])?;
    for r in ranked {
        wtr.write_record([
            r.ip.to_string(),
            r.address.clone(),
            r.protocol.to_string(),
            r.ping_rtt_ms.to_string(),
            r.http_rtt_ms.to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Run summary: totals cover every ranked record, `results` holds the best `top_k`.
pub fn json_summary(
    ranked: &[ScanRecord],
    top_k: usize,
    scanned: u64,
    started_at: &str,
    ended_at: &str,
) -> serde_json::Value {
    let top = &ranked[..ranked.len().min(top_k)];
    serde_json::json!({
        "started_at": started_at,
        "ended_at": ended_at,
        "scanned": scanned,
        "found": ranked.len(),
        "best": ranked.first().map(|r| r.ip.to_string()),
        "results": top,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ipscan_core::Protocol;
    use std::net::IpAddr;

    fn recs() -> Vec<ScanRecord> {
        [(7u8, 40i64), (3, 55)]
            .into_iter()
            .map(|(last, http)| {
                let ip = IpAddr::from([192, 0, 2, last]);
                ScanRecord {
                    ip,
                    address: format!("{}:443", ip),
                    protocol: Protocol::Tcp,
                    ping_rtt_ms: 9,
                    http_rtt_ms: http,
                }
            })
            .collect()
    }

    #[test]
    fn address_file_lists_ranked_addresses() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ip.txt");
        std::fs::write(&path, "stale\nstale\nstale\n").unwrap();
        write_addresses(&path, &recs()).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "192.0.2.7:443\n192.0.2.3:443\n");
    }

    #[test]
    fn csv_has_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        write_csv(&path, &recs()).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "ip,address,protocol,ping_rtt_ms,http_rtt_ms");
        assert_eq!(lines[1], "192.0.2.7,192.0.2.7:443,tcp,9,40");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn json_summary_fields() {
        let v = json_summary(&recs(), 10, 12, "2024-01-01T00:00:00Z", "2024-01-01T00:01:00Z");
        assert_eq!(v["found"], 2);
        assert_eq!(v["scanned"], 12);
        assert_eq!(v["best"], "192.0.2.7");
        assert_eq!(v["results"][1]["http_rtt_ms"], 55);
        assert_eq!(v["results"][0]["protocol"], "tcp");
        assert!(json_summary(&[], 10, 0, "", "")["best"].is_null());
    }

    #[test]
    fn json_found_counts_past_the_top_rows() {
        let many: Vec<ScanRecord> = (0..25).flat_map(|_| recs()).collect();
        let v = json_summary(&many, 10, 60, "", "");
        assert_eq!(v["found"], 50);
        assert_eq!(v["results"].as_array().map(Vec::len), Some(10));
    }
}
