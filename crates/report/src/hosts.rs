//! Hosts-table rewrite for pinning hostnames to the winning address.

use crate::prompt::confirm;
use ipscan_core::ScanRecord;
use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, Write};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

#[cfg(windows)]
pub const LINE_SEPARATOR: &str = "\r\n";
#[cfg(not(windows))]
pub const LINE_SEPARATOR: &str = "\n";

#[derive(Debug, Error)]
pub enum HostsError {
    #[error("no known hosts file location on this platform")]
    UnsupportedPlatform,
    #[error("cannot back up {path} to {backup}: {source}")]
    Backup {
        path: PathBuf,
        backup: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("backup path {0} is the hosts file itself")]
    BackupIsHosts(PathBuf),
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot open {path} for writing, it was left unchanged: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("rewriting {path} failed, restore it from {backup}: {source}")]
    Rewrite {
        path: PathBuf,
        backup: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("confirmation prompt failed: {0}")]
    Prompt(#[source] io::Error),
}

pub fn system_hosts_path() -> Result<PathBuf, HostsError> {
    if cfg!(windows) {
        Ok(PathBuf::from(r"C:\Windows\System32\drivers\etc\hosts"))
    } else if cfg!(target_os = "macos") {
        Ok(PathBuf::from("/private/etc/hosts"))
    } else if cfg!(unix) {
        Ok(PathBuf::from("/etc/hosts"))
    } else {
        Err(HostsError::UnsupportedPlatform)
    }
}

/// Whether an entry maps any of `hostnames`. Only the name fields of the entry are
/// compared, whole-token and case-insensitively; comments never match.
pub fn references_host(line: &str, hostnames: &[String]) -> bool {
    let entry = line.split('#').next().unwrap_or("");
    entry
        .split_whitespace()
        .skip(1)
        .any(|name| hostnames.iter().any(|h| h.eq_ignore_ascii_case(name)))
}

/// Drop every entry for `hostnames` and append one `ip<TAB>hostname` line per name.
/// Other lines keep their order and content.
pub fn rewrite_hosts(content: &str, ip: IpAddr, hostnames: &[String], line_sep: &str) -> String {
    let mut out = String::with_capacity(content.len() + hostnames.len() * 48);
    for line in content.lines() {
        if references_host(line, hostnames) {
            continue;
        }
        out.push_str(line);
        out.push_str(line_sep);
    }
    for name in hostnames {
        out.push_str(&ip.to_string());
        out.push('\t');
        out.push_str(name);
        out.push_str(line_sep);
    }
    out
}

/// Back up `path`, then rewrite it in place. Nothing is touched unless the backup succeeded;
/// a failure after truncation is reported as [`HostsError::Rewrite`].
pub fn update_hosts_file(path: &Path, backup: &Path, ip: IpAddr, hostnames: &[String]) -> Result<(), HostsError> {
    if same_file(path, backup) {
        return Err(HostsError::BackupIsHosts(backup.to_path_buf()));
    }
    fs::copy(path, backup).map_err(|source| HostsError::Backup {
        path: path.to_path_buf(),
        backup: backup.to_path_buf(),
        source,
    })?;
    info!(backup = %backup.display(), "hosts file backed up");

    let content = fs::read_to_string(path).map_err(|source| HostsError::Read { path: path.to_path_buf(), source })?;
    let updated = rewrite_hosts(&content, ip, hostnames, LINE_SEPARATOR);

    let mut file = OpenOptions::new()
        .write(true)
        .open(path)
        .map_err(|source| HostsError::Open { path: path.to_path_buf(), source })?;
    let rewrite = |source: io::Error| HostsError::Rewrite { path: path.to_path_buf(), backup: backup.to_path_buf(), source };
    file.set_len(0).map_err(rewrite)?;
    file.write_all(updated.as_bytes()).map_err(rewrite)?;
    file.sync_all().map_err(rewrite)?;
    info!(file = %path.display(), %ip, names = hostnames.len(), "hosts file updated");
    Ok(())
}

// Copying a file onto itself truncates it. A backup that does not exist yet is resolved
// through its parent directory.
fn same_file(path: &Path, backup: &Path) -> bool {
    let Ok(target) = fs::canonicalize(path) else { return false };
    let resolved = fs::canonicalize(backup).or_else(|_| {
        let name = backup.file_name().ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))?;
        let parent = match backup.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        fs::canonicalize(parent).map(|dir| dir.join(name))
    });
    resolved.is_ok_and(|b| b == target)
}

/// Where and how to publish the winning address.
#[derive(Debug, Clone)]
pub struct HostsUpdate {
    pub hostnames: Vec<String>,
    pub hosts_file: PathBuf,
    pub backup: PathBuf,
    pub assume_yes: bool,
}

/// Show the entries that would be written, ask, and rewrite on "yes".
/// Returns whether the hosts file was changed.
pub fn offer_hosts_update<R: BufRead, W: Write>(
    winner: &ScanRecord,
    update: &HostsUpdate,
    input: &mut R,
    output: &mut W,
) -> Result<bool, HostsError> {
    if update.hostnames.is_empty() {
        return Ok(false);
    }
    for name in &update.hostnames {
        writeln!(output, "{}\t{}", winner.ip, name).map_err(HostsError::Prompt)?;
    }
    let approved = update.assume_yes
        || confirm(input, output, "Whether to write to the hosts file").map_err(HostsError::Prompt)?;
    if !approved {
        warn!("hosts file left unchanged");
        return Ok(false);
    }
    update_hosts_file(&update.hosts_file, &update.backup, winner.ip, &update.hostnames)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ipscan_core::Protocol;
    use std::io::Cursor;

    const BEFORE: &str = "127.0.0.1\tlocalhost\n\
        # 10.0.0.1 translate.google.com\n\
        10.0.0.2 translate.googleapis.com\n\
        ::1 ip6-localhost\n\
        10.0.0.3 mytranslate.google.com.example\n\
        10.0.0.4 alias TRANSLATE.GOOGLE.COM # old\n";

    fn names() -> Vec<String> {
        vec!["translate.googleapis.com".to_string(), "translate.google.com".to_string()]
    }

    fn ip() -> IpAddr {
        IpAddr::from([142, 250, 0, 1])
    }

    #[test]
    fn token_matching() {
        let n = names();
        assert!(references_host("1.2.3.4 translate.google.com", &n));
        assert!(references_host("1.2.3.4\tfoo   Translate.Google.Com", &n));
        assert!(!references_host("# 1.2.3.4 translate.google.com", &n));
        assert!(!references_host("1.2.3.4 xtranslate.google.com", &n));
        assert!(!references_host("1.2.3.4 other # translate.google.com", &n));
        assert!(!references_host("", &n));
    }

    #[test]
    fn rewrite_replaces_only_target_entries() {
        let out = rewrite_hosts(BEFORE, ip(), &names(), "\n");
        assert_eq!(
            out,
            "127.0.0.1\tlocalhost\n\
             # 10.0.0.1 translate.google.com\n\
             ::1 ip6-localhost\n\
             10.0.0.3 mytranslate.google.com.example\n\
             142.250.0.1\ttranslate.googleapis.com\n\
             142.250.0.1\ttranslate.google.com\n"
        );
    }

    #[test]
    fn rewrite_is_idempotent_and_honors_separator() {
        let once = rewrite_hosts("a b\r\n", ip(), &names(), "\r\n");
        let twice = rewrite_hosts(&once, ip(), &names(), "\r\n");
        assert_eq!(once, twice);
        assert_eq!(once.matches("\r\n").count(), 3);
    }

    #[test]
    fn update_backs_up_then_rewrites() {
        let dir = tempfile::tempdir().unwrap();
        let hosts = dir.path().join("hosts");
        let backup = dir.path().join("hosts.bak");
        fs::write(&hosts, BEFORE).unwrap();
        update_hosts_file(&hosts, &backup, ip(), &names()).unwrap();
        assert_eq!(fs::read_to_string(&backup).unwrap(), BEFORE);
        let now = fs::read_to_string(&hosts).unwrap();
        assert_eq!(now, rewrite_hosts(BEFORE, ip(), &names(), LINE_SEPARATOR));
    }

    #[test]
    fn failed_backup_leaves_hosts_alone() {
        let dir = tempfile::tempdir().unwrap();
        let hosts = dir.path().join("hosts");
        fs::write(&hosts, BEFORE).unwrap();
        let backup = dir.path().join("missing-dir").join("hosts.bak");
        let err = update_hosts_file(&hosts, &backup, ip(), &names()).unwrap_err();
        assert!(matches!(err, HostsError::Backup { .. }));
        assert_eq!(fs::read_to_string(&hosts).unwrap(), BEFORE);

        let absent = dir.path().join("no-hosts");
        let err = update_hosts_file(&absent, &dir.path().join("b"), ip(), &names()).unwrap_err();
        assert!(matches!(err, HostsError::Backup { .. }));
    }

    #[test]
    fn backup_onto_hosts_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let hosts = dir.path().join("hosts");
        fs::write(&hosts, BEFORE).unwrap();
        for backup in [hosts.clone(), dir.path().join(".").join("hosts")] {
            let err = update_hosts_file(&hosts, &backup, ip(), &names()).unwrap_err();
            assert!(matches!(err, HostsError::BackupIsHosts(_)), "{:?}", err);
            assert_eq!(fs::read_to_string(&hosts).unwrap(), BEFORE);
        }
        assert!(!same_file(&hosts, &dir.path().join("hosts.bak")));
    }

    fn winner() -> ScanRecord {
        ScanRecord {
            ip: ip(),
            address: "142.250.0.1:443".into(),
            protocol: Protocol::Tcp,
            ping_rtt_ms: 20,
            http_rtt_ms: 90,
        }
    }

    #[test]
    fn declined_prompt_changes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let hosts = dir.path().join("hosts");
        fs::write(&hosts, BEFORE).unwrap();
        let update = HostsUpdate {
            hostnames: names(),
            hosts_file: hosts.clone(),
            backup: dir.path().join("bak"),
            assume_yes: false,
        };
        let mut out = Vec::new();
        let mut answer = Cursor::new("no\n");
        let changed = offer_hosts_update(&winner(), &update, &mut answer, &mut out).unwrap();
        assert!(!changed);
        assert_eq!(fs::read_to_string(&hosts).unwrap(), BEFORE);
        assert!(!dir.path().join("bak").exists());
        let shown = String::from_utf8(out).unwrap();
        let proposed = "142.250.0.1\ttranslate.googleapis.com\n142.250.0.1\ttranslate.google.com\n";
        assert!(shown.starts_with(proposed));
    }

    #[test]
    fn accepted_prompt_writes_with_backup() {
        let dir = tempfile::tempdir().unwrap();
        let hosts = dir.path().join("hosts");
        fs::write(&hosts, BEFORE).unwrap();
        let update = HostsUpdate {
            hostnames: names(),
            hosts_file: hosts.clone(),
            backup: dir.path().join("bak"),
            assume_yes: false,
        };
        let mut answer = Cursor::new("Y\n");
        let changed = offer_hosts_update(&winner(), &update, &mut answer, &mut Vec::new()).unwrap();
        assert!(changed);
        assert!(fs::read_to_string(&hosts).unwrap().contains("142.250.0.1\ttranslate.google.com"));
        assert_eq!(fs::read_to_string(dir.path().join("bak")).unwrap(), BEFORE);
    }

    #[test]
    fn no_hostnames_means_no_prompt() {
        let update = HostsUpdate {
            hostnames: vec![],
            hosts_file: "/nonexistent".into(),
            backup: "/nonexistent.bak".into(),
            assume_yes: true,
        };
        let changed = offer_hosts_update(&winner(), &update, &mut Cursor::new(""), &mut Vec::new());
        assert!(!changed.unwrap());
    }
}
