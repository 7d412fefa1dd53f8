use ipscan_core::{Attempt, LatencyMode, Outcome, ProbeConfig, TIMEOUT_MS};
use std::net::IpAddr;
use std::time::Duration;
use tracing::debug;

/// Pass/fail verdict and collapsed latency of one probe stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageResult {
    pub passed: bool,
    pub latency_ms: i64,
}

/// Repeats an attempt `count` times and judges the outcomes. Protocol specifics stay in the
/// [`Attempt`]; the stage only knows whether a timeout counts as success.
#[derive(Debug, Clone)]
pub struct Stage {
    pub count: u32,
    pub all: bool,
    pub pause: Duration,
    pub timeout_is_success: bool,
    pub latency: LatencyMode,
}

impl Stage {
    pub fn network(cfg: &ProbeConfig) -> Self {
        Stage {
            count: cfg.count,
            all: cfg.all,
            pause: cfg.pause,
            timeout_is_success: cfg.protocol.timeout_is_success(),
            latency: cfg.latency,
        }
    }

    pub fn application(cfg: &ProbeConfig) -> Self {
        Stage { timeout_is_success: false, ..Self::network(cfg) }
    }

    pub async fn run<A: Attempt + ?Sized>(&self, attempt: &A, addr: IpAddr) -> StageResult {
        let mut outcomes = Vec::with_capacity(self.count as usize);
        for seq in 0..self.count {
            if seq > 0 && !self.pause.is_zero() {
                tokio::time::sleep(self.pause).await;
            }
            let outcome = attempt.attempt(addr, seq as u16).await;
            debug!(%addr, seq, ?outcome, "attempt");
            outcomes.push(outcome);
        }
        self.judge(&outcomes)
    }

    pub fn judge(&self, outcomes: &[Outcome]) -> StageResult {
        let successes = outcomes.iter().filter(|o| o.is_success(self.timeout_is_success)).count();
        let passed = if self.all {
            !outcomes.is_empty() && successes == outcomes.len()
        } else {
            successes > 0
        };
        let latency_ms = match self.latency {
            LatencyMode::Mean => mean_ms(outcomes),
            LatencyMode::Median => median_reply_ms(outcomes),
        };
        StageResult { passed, latency_ms }
    }
}

// Sentinels are averaged in, so a single timeout dominates the figure.
fn mean_ms(outcomes: &[Outcome]) -> i64 {
    if outcomes.is_empty() {
        return TIMEOUT_MS as i64;
    }
    let sum: f64 = outcomes.iter().map(Outcome::latency_ms).sum();
    (sum / outcomes.len() as f64).round() as i64
}

fn median_reply_ms(outcomes: &[Outcome]) -> i64 {
    let mut replies: Vec<f64> = outcomes
        .iter()
        .filter_map(|o| match o {
            Outcome::Reply(rtt) => Some(rtt.as_secs_f64() * 1000.0),
            _ => None,
        })
        .collect();
    if replies.is_empty() {
        return TIMEOUT_MS as i64;
    }
    replies.sort_by(f64::total_cmp);
    let mid = replies.len() / 2;
    let median = if replies.len() % 2 == 0 {
        (replies[mid - 1] + replies[mid]) / 2.0
    } else {
        replies[mid]
    };
    median.round() as i64
}
