use ipscan_core::ScanRecord;
use std::fmt::Write as _;
use std::io::{self, Write};

/// Rows printed in the console summary.
pub const TOP_K: usize = 10;

pub fn render_table(ranked: &[ScanRecord], k: usize) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{:<47} {:<8} {:>12} {:>12}", "ADDRESS", "PROTOCOL", "PING_RTT_MS", "HTTP_RTT_MS");
    for r in ranked.iter().take(k) {
        let _ = writeln!(out, "{:<47} {:<8} {:>12} {:>12}", r.address, r.protocol, r.ping_rtt_ms, r.http_rtt_ms);
    }
    out
}

pub fn print_summary<W: Write>(out: &mut W, ranked: &[ScanRecord]) -> io::Result<()> {
    if ranked.is_empty() {
        return writeln!(out, "No available address found.");
    }
    write!(out, "{}", render_table(ranked, TOP_K))
}
