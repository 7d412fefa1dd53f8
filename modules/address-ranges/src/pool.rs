use crate::{expand, InvalidRangeError};
use std::collections::HashSet;
use std::net::IpAddr;
use tracing::{error, info, warn};

/// Deduplicated addresses gathered from a set of ranges, in first-seen order.
#[derive(Debug, Default)]
pub struct AddressPool {
    addrs: Vec<IpAddr>,
    seen: HashSet<IpAddr>,
    limit: Option<usize>,
}

impl AddressPool {
    /// Stop accepting addresses once `limit` are held.
    fn with_limit(limit: Option<usize>) -> Self {
        AddressPool { limit, ..Self::default() }
    }

    /// Expand every range into a pool. Bad ranges are logged, skipped and returned.
    pub fn from_ranges<I, S>(ranges: I, limit: Option<usize>) -> (Self, Vec<InvalidRangeError>)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut pool = Self::with_limit(limit);
        let mut errors = Vec::new();
        for range in ranges {
            if pool.is_full() {
                warn!(limit = ?pool.limit, "address limit reached, remaining ranges skipped");
                break;
            }
            if let Err(e) = pool.extend_from_range(range.as_ref()) {
                error!(range = %e.range, "skipping invalid range");
                errors.push(e);
            }
        }
        info!(addresses = pool.len(), "loaded addresses");
        (pool, errors)
    }

    /// Add every address of one range; returns how many were new.
    pub fn extend_from_range(&mut self, range: &str) -> Result<usize, InvalidRangeError> {
        let before = self.addrs.len();
        for ip in expand(range)? {
            if self.is_full() {
                break;
            }
            self.push(ip);
        }
        Ok(self.addrs.len() - before)
    }

    pub fn push(&mut self, ip: IpAddr) -> bool {
        if self.is_full() || !self.seen.insert(ip) {
            return false;
        }
        self.addrs.push(ip);
        true
    }

    pub fn is_full(&self) -> bool {
        self.limit.is_some_and(|l| self.addrs.len() >= l)
    }

    pub fn len(&self) -> usize {
        self.addrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addrs.is_empty()
    }

    pub fn into_vec(self) -> Vec<IpAddr> {
        self.addrs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_range_does_not_stop_siblings() {
        let ranges = ["192.0.2.0/30", "bogus", "198.51.100.0/31"];
        let (pool, errors) = AddressPool::from_ranges(ranges, None);
        assert_eq!(pool.len(), 6);
        assert_eq!(errors, vec![InvalidRangeError { range: "bogus".into() }]);
    }

    #[test]
    fn overlapping_ranges_are_deduplicated() {
        let (pool, errors) = AddressPool::from_ranges(["192.0.2.0/29", "192.0.2.4/30"], None);
        assert!(errors.is_empty());
        assert_eq!(pool.len(), 8);
        let first: Vec<String> = pool.into_vec().iter().take(2).map(|ip| ip.to_string()).collect();
        assert_eq!(first, vec!["192.0.2.0", "192.0.2.1"]);
    }

    #[test]
    fn limit_caps_accumulation() {
        let (pool, _) = AddressPool::from_ranges(["10.0.0.0/24", "10.1.0.0/24"], Some(10));
        assert_eq!(pool.len(), 10);
        assert!(pool.is_full());
        assert_eq!(pool.into_vec().last().map(|ip| ip.to_string()), Some("10.0.0.9".to_string()));
    }
}
