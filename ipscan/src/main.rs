use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use http_probe::HttpAttempt;
use ipscan_core::{LatencyMode, ScanRecord};
use net_probe::NetworkAttempt;
use report::{HostsError, HostsUpdate};
use scan_engine::LayeredProber;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod config;

use config::{Overrides, Settings};

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_else(|_| String::new())
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat { Text, Json }

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Latency { Mean, Median }

impl From<Latency> for LatencyMode {
    fn from(l: Latency) -> Self {
        match l {
            Latency::Mean => LatencyMode::Mean,
            Latency::Median => LatencyMode::Median,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "ipscan", version, about = "Find the fastest reachable front-end addresses of a CDN-hosted site")]
struct Cli {
    /// Optional config file (YAML). If omitted, loads ./ipscan.yaml if present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Debug-level logging (RUST_LOG still wins)
    #[arg(long, global = true, default_value_t = false)]
    debug: bool,
    /// Log as JSON lines
    #[arg(long, global = true, default_value_t = false)]
    log_json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print version information
    Version,
    /// Scan the site's address ranges and rank reachable addresses by HTTPS latency
    Scan {
        /// Site to scan: Cloudflare or GoogleTranslate
        #[arg(long)]
        site: Option<String>,
        /// Number of concurrent workers
        #[arg(long)]
        workers: Option<usize>,
        /// Network-layer probe: icmp, tcp or udp
        #[arg(long)]
        protocol: Option<String>,
        /// Port for tcp/udp probes
        #[arg(long)]
        port: Option<u16>,
        /// Attempts per stage
        #[arg(long)]
        count: Option<u32>,
        /// Per-attempt network timeout in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
        /// Per-request HTTP timeout in milliseconds
        #[arg(long)]
        http_timeout_ms: Option<u64>,
        /// Require every attempt of a stage to succeed (strict mode)
        #[arg(long, default_value_t = false, conflicts_with = "any")]
        all: bool,
        /// Pass a stage when any one attempt succeeds (lenient mode)
        #[arg(long, default_value_t = false)]
        any: bool,
        /// How attempt latencies are collapsed
        #[arg(long, value_enum)]
        latency: Option<Latency>,
        /// Stop dequeuing once this many addresses were scanned
        #[arg(long)]
        scanned_limit: Option<u64>,
        /// Stop dequeuing once this many addresses were found
        #[arg(long)]
        found_limit: Option<u64>,
        /// Cap the number of addresses expanded from the ranges
        #[arg(long)]
        max_addresses: Option<usize>,
        /// Custom range list (one CIDR per line), used instead of the site's default list
        #[arg(long, value_name = "FILE")]
        ranges: Option<PathBuf>,
        /// Address list output file (overwrites)
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
        /// Also write all ranked records as CSV
        #[arg(long, value_name = "FILE")]
        csv: Option<PathBuf>,
        /// Output format: text or json
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
        /// Rewrite the hosts file without asking
        #[arg(long, default_value_t = false, conflicts_with = "no_hosts")]
        yes: bool,
        /// Never touch the hosts file
        #[arg(long, default_value_t = false)]
        no_hosts: bool,
        /// Hosts file to rewrite (default: the platform's hosts file)
        #[arg(long, value_name = "FILE")]
        hosts_file: Option<PathBuf>,
        /// Where the hosts file is backed up before rewriting
        #[arg(long, value_name = "FILE")]
        hosts_backup: Option<PathBuf>,
    },
}

fn init_logging(debug: bool, json: bool) {
    let level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let fmt = tracing_subscriber::fmt().with_env_filter(filter).with_writer(io::stderr);
    if json {
        fmt.json().init();
    } else {
        fmt.init();
    }
}

fn strictness(all: bool, any: bool) -> Option<bool> {
    match (all, any) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    }
}

struct Delivery {
    format: OutputFormat,
    csv: Option<PathBuf>,
    yes: bool,
    hosts_file: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Version => {
            println!("ipscan {}", ipscan_core::version());
        }
        Commands::Scan {
            site, workers, protocol, port, count, timeout_ms, http_timeout_ms, all, any, latency,
            scanned_limit, found_limit, max_addresses, ranges, out, csv, format, yes, no_hosts,
            hosts_file, hosts_backup,
        } => {
            let file = config::load_config(cli.config.as_deref())?;
            let overrides = Overrides {
                site,
                debug: cli.debug,
                workers,
                protocol,
                port,
                count,
                timeout_ms,
                http_timeout_ms,
                all: strictness(all, any),
                latency: latency.map(LatencyMode::from),
                scanned_limit,
                found_limit,
                max_addresses,
                output: out,
                ranges,
                hosts_backup,
                no_hosts,
            };
            let settings = config::resolve(&file, &overrides)?;
            init_logging(settings.debug, cli.log_json);
            scan(settings, Delivery { format, csv, yes, hosts_file })?;
        }
    }
    Ok(())
}

fn scan(settings: Settings, delivery: Delivery) -> Result<()> {
    let site = &settings.site_settings;
    info!(site = %settings.site, protocol = %settings.probe.protocol, "scan configured");

    let ranges = address_ranges::load_ranges(site.custom_ip_ranges_file.as_deref(), &site.ip_ranges_file, site.with_ipv6)?;
    if site.with_ipv6 && settings.max_addresses.is_none() {
        warn!("IPv6 ranges enabled without max_addresses, the address pool may not fit in memory");
    }
    let (pool, invalid) = address_ranges::AddressPool::from_ranges(&ranges, settings.max_addresses);
    if !invalid.is_empty() {
        warn!(skipped = invalid.len(), "some ranges could not be parsed");
    }
    if pool.is_empty() {
        warn!("no addresses to scan");
    }
    let http = HttpAttempt::new(&settings.probe.http_url, settings.probe.http_port, settings.probe.http_timeout)?;
    info!(url = %http.url(), "application stage target");

    let started_at = now_rfc3339();
    let t0 = Instant::now();
    let addresses = pool.into_vec();
    let probe = &settings.probe;
    let with_ipv6 = site.with_ipv6;
    let rt = tokio::runtime::Runtime::new()?;
    let result = rt.block_on(async move {
        // ICMP sockets register with the reactor, so they are opened inside the runtime
        let net = NetworkAttempt::from_config(probe, with_ipv6)
            .with_context(|| format!("setting up {} probes", probe.protocol))?;
        let prober = Arc::new(LayeredProber::new(probe, net, http));
        Ok::<_, anyhow::Error>(scan_engine::run(addresses, probe, prober).await)
    })?;
    let ended_at = now_rfc3339();
    info!(elapsed_ms = t0.elapsed().as_millis() as u64, scanned = result.scanned_count(), found = result.found_count(), "scan complete");

    let ranked = report::rank(result.records());
    let scanned = result.scanned_count();
    let console = Console { input: io::stdin().lock(), out: io::stdout().lock(), err: io::stderr().lock() };
    deliver(&ranked, scanned, (&started_at, &ended_at), &settings, &delivery, console)
}

/// Where the summary, the prompt and its answers go.
struct Console<R, W, E> {
    input: R,
    out: W,
    err: E,
}

/// Console summary, output files and the optional hosts rewrite. Every step is attempted;
/// any failure makes the whole run fail.
fn deliver<R: BufRead, W: Write, E: Write>(
    ranked: &[ScanRecord],
    scanned: u64,
    (started_at, ended_at): (&str, &str),
    settings: &Settings,
    delivery: &Delivery,
    mut console: Console<R, W, E>,
) -> Result<()> {
    let site = &settings.site_settings;
    let mut failures = 0usize;
    match delivery.format {
        OutputFormat::Text => report::print_summary(&mut console.out, ranked)?,
        OutputFormat::Json => {
            let obj = report::json_summary(ranked, report::TOP_K, scanned, started_at, ended_at);
            writeln!(console.out, "{}", serde_json::to_string_pretty(&obj)?)?;
        }
    }

    if let Err(e) = report::write_addresses(&site.ip_output_file, ranked) {
        error!(file = %site.ip_output_file.display(), error = %e, "writing address list failed");
        failures += 1;
    }
    if let Some(path) = &delivery.csv {
        if let Err(e) = report::write_csv(path, ranked) {
            error!(file = %path.display(), error = %e, "writing csv failed");
            failures += 1;
        }
    }

    if site.write_hosts {
        if let Some(best) = report::best(ranked) {
            // keep stdout clean for machine-readable output
            let prompt: &mut dyn Write = match delivery.format {
                OutputFormat::Text => &mut console.out,
                OutputFormat::Json => &mut console.err,
            };
            if let Err(e) = publish(best, settings, delivery, &mut console.input, prompt) {
                error!(error = %e, "hosts file update failed");
                if let HostsError::Rewrite { backup, .. } = &e {
                    writeln!(console.err, "The hosts file may be damaged. Restore it from {} before retrying.", backup.display())?;
                }
                failures += 1;
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{} output step(s) failed", failures);
    }
    Ok(())
}

fn publish<R: BufRead>(
    best: &ScanRecord,
    settings: &Settings,
    delivery: &Delivery,
    input: &mut R,
    mut prompt: &mut dyn Write,
) -> Result<bool, HostsError> {
    let hosts_file = match &delivery.hosts_file {
        Some(p) => p.clone(),
        None => report::system_hosts_path()?,
    };
    let update = HostsUpdate {
        hostnames: settings.site_settings.hostnames.clone(),
        hosts_file,
        backup: settings.hosts_backup.clone(),
        assume_yes: delivery.yes,
    };
    report::offer_hosts_update(best, &update, input, &mut prompt)
}
