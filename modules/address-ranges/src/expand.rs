use ipnet::{IpAddrRange, IpNet, Ipv4AddrRange, Ipv6AddrRange};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid address range {range:?}")]
pub struct InvalidRangeError {
    pub range: String,
}

/// Parse a prefix and mask it down to its network address.
pub fn parse_range(range: &str) -> Result<IpNet, InvalidRangeError> {
    range
        .trim()
        .parse::<IpNet>()
        .map(|net| net.trunc())
        .map_err(|_| InvalidRangeError { range: range.to_string() })
}

/// Lazily yield every address of a prefix in ascending order, network and broadcast included.
pub fn expand(range: &str) -> Result<IpAddrRange, InvalidRangeError> {
    Ok(match parse_range(range)? {
        IpNet::V4(net) => IpAddrRange::V4(Ipv4AddrRange::new(net.network(), net.broadcast())),
        IpNet::V6(net) => IpAddrRange::V6(Ipv6AddrRange::new(net.network(), net.broadcast())),
    })
}
