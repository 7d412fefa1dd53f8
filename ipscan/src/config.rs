use anyhow::{anyhow, Context, Result};
use ipscan_core::{LatencyMode, ProbeConfig, Protocol, ATTEMPT_PAUSE};
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG: &str = "ipscan.yaml";

#[derive(Debug, Default, Deserialize, Clone)]
pub struct GeneralConfig {
    pub debug: Option<bool>,
    pub workers: Option<usize>,
    pub site: Option<String>,
    pub scanned_limit: Option<u64>,
    pub found_limit: Option<u64>,
    pub max_addresses: Option<usize>,
    pub hosts_backup: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct PingConfig {
    pub protocol: Option<String>,
    pub port: Option<u16>,
    pub count: Option<u32>,
    pub timeout_ms: Option<u64>,
    pub all: Option<bool>,
    pub latency: Option<LatencyMode>,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct HttpConfig {
    pub port: Option<u16>,
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct SiteConfig {
    pub ip_ranges_file: Option<PathBuf>,
    pub custom_ip_ranges_file: Option<PathBuf>,
    pub ip_output_file: Option<PathBuf>,
    pub with_ipv6: Option<bool>,
    pub https_url: Option<String>,
    pub hostnames: Option<Vec<String>>,
    pub write_hosts: Option<bool>,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct SitesConfig {
    pub cloudflare: Option<SiteConfig>,
    pub google_translate: Option<SiteConfig>,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct Config {
    pub general: Option<GeneralConfig>,
    pub ping: Option<PingConfig>,
    pub http: Option<HttpConfig>,
    pub sites: Option<SitesConfig>,
}

/// Read the YAML config. Without an explicit path, `ipscan.yaml` is used when present
/// and built-in defaults apply otherwise.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => {
            let p = Path::new(DEFAULT_CONFIG);
            if p.exists() { p.to_path_buf() } else { return Ok(Config::default()); }
        }
    };
    let s = fs::read_to_string(&path).with_context(|| format!("reading config {}", path.display()))?;
    serde_yaml::from_str(&s).with_context(|| format!("parsing config {}", path.display()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Site {
    Cloudflare,
    GoogleTranslate,
}

impl Site {
    pub fn from_name(name: &str) -> Option<Site> {
        match name.trim() {
            "Cloudflare" | "cloudflare" => Some(Site::Cloudflare),
            "GoogleTranslate" | "google_translate" | "google-translate" => Some(Site::GoogleTranslate),
            _ => None,
        }
    }

    fn key(self) -> &'static str {
        match self {
            Site::Cloudflare => "cloudflare",
            Site::GoogleTranslate => "google_translate",
        }
    }

    pub fn defaults(self) -> SiteSettings {
        let key = self.key();
        let (url, hostnames, write_hosts) = match self {
            Site::Cloudflare => ("https://www.cloudflare.com/", vec![], false),
            Site::GoogleTranslate => (
                "https://translate.google.com/",
                vec!["translate.googleapis.com".to_string(), "translate.google.com".to_string()],
                true,
            ),
        };
        SiteSettings {
            ip_ranges_file: PathBuf::from(format!("config/{}_ip_ranges.json", key)),
            custom_ip_ranges_file: Some(PathBuf::from(format!("config/{}_custom_ip_ranges.txt", key))),
            ip_output_file: PathBuf::from(format!("{}_ips.txt", key)),
            with_ipv6: false,
            https_url: url.to_string(),
            hostnames,
            write_hosts,
        }
    }
}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Site::Cloudflare => "Cloudflare",
            Site::GoogleTranslate => "GoogleTranslate",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SiteSettings {
    pub ip_ranges_file: PathBuf,
    pub custom_ip_ranges_file: Option<PathBuf>,
    pub ip_output_file: PathBuf,
    pub with_ipv6: bool,
    pub https_url: String,
    pub hostnames: Vec<String>,
    pub write_hosts: bool,
}

impl SiteSettings {
    fn merged(mut self, file: Option<&SiteConfig>) -> Self {
        let Some(c) = file else { return self };
        if let Some(v) = &c.ip_ranges_file { self.ip_ranges_file = v.clone(); }
        if let Some(v) = &c.custom_ip_ranges_file { self.custom_ip_ranges_file = Some(v.clone()); }
        if let Some(v) = &c.ip_output_file { self.ip_output_file = v.clone(); }
        if let Some(v) = c.with_ipv6 { self.with_ipv6 = v; }
        if let Some(v) = &c.https_url { self.https_url = v.clone(); }
        if let Some(v) = &c.hostnames { self.hostnames = v.clone(); }
        if let Some(v) = c.write_hosts { self.write_hosts = v; }
        self
    }
}

/// Command-line values; any that are set win over the config file.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub site: Option<String>,
    pub debug: bool,
    pub workers: Option<usize>,
    pub protocol: Option<String>,
    pub port: Option<u16>,
    pub count: Option<u32>,
    pub timeout_ms: Option<u64>,
    pub http_timeout_ms: Option<u64>,
    /// `Some(true)` strict, `Some(false)` lenient.
    pub all: Option<bool>,
    pub latency: Option<LatencyMode>,
    pub scanned_limit: Option<u64>,
    pub found_limit: Option<u64>,
    pub max_addresses: Option<usize>,
    pub output: Option<PathBuf>,
    pub ranges: Option<PathBuf>,
    pub hosts_backup: Option<PathBuf>,
    pub no_hosts: bool,
}

/// Everything a run needs, resolved once from file values, flags and built-in defaults.
#[derive(Debug, Clone)]
pub struct Settings {
    pub site: Site,
    pub site_settings: SiteSettings,
    pub probe: ProbeConfig,
    pub debug: bool,
    pub max_addresses: Option<usize>,
    pub hosts_backup: PathBuf,
}

pub fn resolve(file: &Config, cli: &Overrides) -> Result<Settings> {
    let general = file.general.clone().unwrap_or_default();
    let ping = file.ping.clone().unwrap_or_default();
    let http = file.http.clone().unwrap_or_default();
    let sites = file.sites.clone().unwrap_or_default();

    let site_name = cli.site.clone().or(general.site).unwrap_or_else(|| "GoogleTranslate".to_string());
    let site = Site::from_name(&site_name).ok_or_else(|| anyhow!("site {:?} is not supported (use Cloudflare or GoogleTranslate)", site_name))?;
    let site_file = match site {
        Site::Cloudflare => sites.cloudflare.as_ref(),
        Site::GoogleTranslate => sites.google_translate.as_ref(),
    };
    let mut site_settings = site.defaults().merged(site_file);
    if let Some(p) = &cli.output { site_settings.ip_output_file = p.clone(); }
    if let Some(p) = &cli.ranges { site_settings.custom_ip_ranges_file = Some(p.clone()); }
    if cli.no_hosts { site_settings.write_hosts = false; }

    let protocol: Protocol = match cli.protocol.as_deref().or(ping.protocol.as_deref()) {
        Some(p) => p.parse()?,
        None => Protocol::Tcp,
    };
    let defaults = ProbeConfig::default();
    let probe = ProbeConfig {
        protocol,
        port: cli.port.or(ping.port).unwrap_or(defaults.port),
        count: cli.count.or(ping.count).unwrap_or(defaults.count),
        timeout: cli.timeout_ms.or(ping.timeout_ms).map(Duration::from_millis).unwrap_or(defaults.timeout),
        all: cli.all.or(ping.all).unwrap_or(defaults.all),
        latency: cli.latency.or(ping.latency).unwrap_or_default(),
        pause: ATTEMPT_PAUSE,
        http_url: site_settings.https_url.clone(),
        http_port: http.port.unwrap_or(defaults.http_port),
        http_timeout: cli.http_timeout_ms.or(http.timeout_ms).map(Duration::from_millis).unwrap_or(defaults.http_timeout),
        workers: cli.workers.or(general.workers).unwrap_or(defaults.workers),
        scanned_limit: cli.scanned_limit.or(general.scanned_limit),
        found_limit: cli.found_limit.or(general.found_limit),
    };
    probe.validate()?;

    Ok(Settings {
        site,
        site_settings,
        probe,
        debug: cli.debug || general.debug.unwrap_or(false),
        max_addresses: cli.max_addresses.or(general.max_addresses),
        hosts_backup: cli.hosts_backup.clone().or(general.hosts_backup).unwrap_or_else(|| PathBuf::from("hosts.bak")),
    })
}
