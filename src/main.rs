//! Command-line iterative resolver.
//!
//! Resolves a name by querying the DNS hierarchy directly, starting from a
//! root server, and prints the data of the first matching record.
//!
//! # Usage
//!
//! ```bash
//! # A record lookup, the default
//! iterative-dns www.example.com
//!
//! # Name servers of a zone
//! iterative-dns example.com NS
//!
//! # Watch every hop
//! iterative-dns www.example.com --log-level debug
//! ```
//!
//! Logging goes to stderr and honours `RUST_LOG` when `--log-level` is not
//! given.

use std::net::Ipv4Addr;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use rand::rngs::OsRng;
use tracing::info;
use tracing_subscriber::EnvFilter;

use iterative_dns::dns::RecordType;
use iterative_dns::resolver::{
    DEFAULT_MAX_ITERATIONS, DEFAULT_ROOT_SERVER, Resolver, ResolverConfig,
};
use iterative_dns::transport::{TransportConfig, UdpTransport};

#[derive(Parser)]
#[command(name = "iterative-dns")]
#[command(version)]
#[command(about = "Resolve a domain name by walking the DNS hierarchy from the root")]
struct Cli {
    /// Domain name to resolve
    domain: String,

    /// Record type to ask for (A, NS, CNAME, SOA, MX, TXT, AAAA or TYPE<n>)
    #[arg(default_value = "A")]
    record_type: RecordType,

    /// Root server to start from
    #[arg(long, default_value_t = DEFAULT_ROOT_SERVER)]
    root: Ipv4Addr,

    /// Maximum number of queries before giving up
    #[arg(long, default_value_t = DEFAULT_MAX_ITERATIONS)]
    max_iterations: usize,

    /// Time to wait for each response, in milliseconds
    #[arg(long, default_value_t = 5000, value_parser = clap::value_parser!(u64).range(1..))]
    timeout_ms: u64,

    /// Retries per server after a timeout
    #[arg(long, default_value_t = 2)]
    retries: u8,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

fn init_logging(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level.as_deref());

    let transport = UdpTransport::new(TransportConfig {
        read_timeout: Duration::from_millis(cli.timeout_ms),
        max_retries: cli.retries,
        ..TransportConfig::default()
    });
    let config = ResolverConfig {
        root: cli.root,
        max_iterations: cli.max_iterations,
    };

    info!(
        domain = %cli.domain,
        record_type = %cli.record_type,
        root = %config.root,
        "starting resolution"
    );

    let mut resolver = Resolver::new(transport, OsRng, config);
    let data = resolver
        .resolve(&cli.domain, cli.record_type)
        .with_context(|| format!("Error resolving {} {}", cli.domain, cli.record_type))?;

    println!("{} {} {}", cli.domain, cli.record_type, data);
    Ok(())
}
