//! Address ranges: loading range lists, expanding prefixes, and pooling the addresses.

mod expand;
mod pool;
mod source;

pub use expand::{expand, parse_range, InvalidRangeError};
pub use pool::AddressPool;
pub use source::{load_ranges, parse_range_document, SourceError};
