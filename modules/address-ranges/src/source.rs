use crate::parse_range;
use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("cannot read range file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot parse range document {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("range file {0} contains no usable ranges")]
    Empty(PathBuf),
}

/// The two provider document shapes that ship as default range lists.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RangeDocument {
    Cloudflare { result: CloudflareRanges },
    Google { prefixes: Vec<GooglePrefix> },
}

#[derive(Debug, Deserialize)]
struct CloudflareRanges {
    #[serde(default)]
    ipv4_cidrs: Vec<String>,
    #[serde(default)]
    ipv6_cidrs: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GooglePrefix {
    ipv4_prefix: Option<String>,
    ipv6_prefix: Option<String>,
}

/// Load the ranges to scan: the operator's override list when it exists and holds valid ranges,
/// otherwise the bundled provider list. IPv6 ranges are dropped unless `with_ipv6` is set.
pub fn load_ranges(custom: Option<&Path>, default: &Path, with_ipv6: bool) -> Result<Vec<String>, SourceError> {
    if let Some(path) = custom.filter(|p| p.exists()) {
        let text = read(path)?;
        let ranges = valid_only(path, filter_family(parse_lines(&text), with_ipv6));
        if !ranges.is_empty() {
            info!(file = %path.display(), ranges = ranges.len(), "using custom ranges");
            return Ok(ranges);
        }
        warn!(file = %path.display(), "custom range file has no valid ranges, falling back to default list");
    }
    let text = read(default)?;
    let ranges = if looks_like_json(&text) {
        parse_range_document(&text, with_ipv6).map_err(|source| SourceError::Json { path: default.to_path_buf(), source })?
    } else {
        filter_family(parse_lines(&text), with_ipv6)
    };
    if ranges.is_empty() {
        return Err(SourceError::Empty(default.to_path_buf()));
    }
    info!(file = %default.display(), ranges = ranges.len(), "using default ranges");
    Ok(ranges)
}

/// Extract ranges from a provider JSON document.
pub fn parse_range_document(text: &str, with_ipv6: bool) -> Result<Vec<String>, serde_json::Error> {
    let doc: RangeDocument = serde_json::from_str(text)?;
    let mut out = Vec::new();
    match doc {
        RangeDocument::Cloudflare { result } => {
            out.extend(result.ipv4_cidrs);
            if with_ipv6 {
                out.extend(result.ipv6_cidrs);
            }
        }
        RangeDocument::Google { prefixes } => {
            for p in prefixes {
                out.extend(p.ipv4_prefix);
                if with_ipv6 {
                    out.extend(p.ipv6_prefix);
                }
            }
        }
    }
    out.retain(|r| !r.trim().is_empty());
    debug!(ranges = out.len(), "parsed range document");
    Ok(out)
}

fn read(path: &Path) -> Result<String, SourceError> {
    fs::read_to_string(path).map_err(|source| SourceError::Io { path: path.to_path_buf(), source })
}

fn looks_like_json(text: &str) -> bool {
    text.trim_start().starts_with('{')
}

// Blank lines and `#` comments are ignored.
fn parse_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(|l| l.split('#').next().unwrap_or("").trim())
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

fn valid_only(path: &Path, ranges: Vec<String>) -> Vec<String> {
    ranges
        .into_iter()
        .filter(|r| match parse_range(r) {
            Ok(_) => true,
            Err(e) => {
                warn!(file = %path.display(), range = %e.range, "ignoring invalid custom range");
                false
            }
        })
        .collect()
}

fn filter_family(ranges: Vec<String>, with_ipv6: bool) -> Vec<String> {
    if with_ipv6 {
        ranges
    } else {
        ranges.into_iter().filter(|r| !r.contains(':')).collect()
    }
}
