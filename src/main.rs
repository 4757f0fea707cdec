//! lazyresolv - query name servers and run a forwarding DNS proxy
//!
//! `lazyresolv query` races one question across the configured name servers
//! and prints the reply. `lazyresolv serve` starts UDP, TCP and DoH
//! listeners that forward every query through the same resolver.

use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand};
use lazyresolv::client::DohMethod;
use lazyresolv::config::Config;
use lazyresolv::dns::{RecordClass, RecordType};
use lazyresolv::logging::init_logging;
use lazyresolv::resolver::{ResolveOptions, Resolver};
use lazyresolv::server::{DnsServer, RequestHandler};
use lazyresolv::Protocol;
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};

/// lazyresolv command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace, -vvv trace for all crates)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve a name and print the reply
    Query(QueryArgs),
    /// Run the configured listeners with the resolver as a forwarding handler
    Serve {
        /// Configuration file path
        #[arg(short, long, default_value = "config.yaml")]
        config: PathBuf,
    },
}

#[derive(clap::Args, Debug)]
struct QueryArgs {
    /// Domain name, or an IP address for PTR queries
    name: String,

    /// Record type
    #[arg(short = 't', long = "type", default_value = "A")]
    rtype: RecordType,

    /// Record class
    #[arg(short = 'c', long = "class", default_value = "IN")]
    rclass: RecordClass,

    /// Name server to query; repeat to race several
    #[arg(short, long = "server")]
    servers: Vec<String>,

    /// Port for servers given without one
    #[arg(short, long)]
    port: Option<u16>,

    /// Transport: udp, tcp or doh
    #[arg(long)]
    protocol: Option<Protocol>,

    /// Per-attempt timeout in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Retries per server after the first attempt
    #[arg(long)]
    retries: Option<u32>,

    /// Clear the recursion desired bit
    #[arg(long)]
    no_recurse: bool,

    /// Use GET instead of POST for DoH
    #[arg(long)]
    doh_get: bool,

    /// Send an EDNS client subnet for this address
    #[arg(long)]
    client_ip: Option<IpAddr>,

    /// Configuration file supplying resolver defaults
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Query(args) => run_query(args, cli.verbose).await,
        Command::Serve { config } => run_serve(config, cli.verbose).await,
    }
}

async fn run_query(args: QueryArgs, verbose: u8) -> anyhow::Result<()> {
    let config = match &args.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => Config::default(),
    };
    init_logging(&config.log, Some(verbose))?;

    let mut resolver_config = config.resolver.to_resolver_config();
    if !args.servers.is_empty() {
        resolver_config.name_servers = args.servers.clone();
    }
    if let Some(port) = args.port {
        resolver_config = resolver_config.with_port(port);
    }
    if let Some(protocol) = args.protocol {
        resolver_config = resolver_config.with_protocol(protocol);
    }
    if let Some(ms) = args.timeout_ms {
        resolver_config = resolver_config.with_timeout(std::time::Duration::from_millis(ms));
    }
    if let Some(retries) = args.retries {
        resolver_config = resolver_config.with_retries(retries);
    }
    if args.no_recurse {
        resolver_config = resolver_config.with_recursive(false);
    }
    if args.doh_get {
        resolver_config = resolver_config.with_doh_method(DohMethod::Get);
    }

    let resolver = Resolver::new(resolver_config)?;

    // An address asked for PTR becomes its reverse name
    let name = match (args.rtype, args.name.parse::<IpAddr>()) {
        (RecordType::PTR, Ok(ip)) => lazyresolv::resolver::reverse_name(ip),
        _ => args.name.clone(),
    };

    let mut options = ResolveOptions::default();
    if let Some(ip) = args.client_ip {
        options = options.with_client_ip(ip);
    }

    let response = resolver
        .resolve(&name, args.rtype, args.rclass, options)
        .await?;
    println!("{}", response);
    Ok(())
}

async fn run_serve(path: PathBuf, verbose: u8) -> anyhow::Result<()> {
    let config =
        Config::from_file(&path).with_context(|| format!("loading {}", path.display()))?;
    init_logging(&config.log, Some(verbose))?;

    info!("lazyresolv {} starting", env!("CARGO_PKG_VERSION"));
    if config.servers.is_empty() {
        anyhow::bail!("{} configures no servers", path.display());
    }

    let resolver = Resolver::new(config.resolver.to_resolver_config())?;
    let handler: Arc<dyn RequestHandler> = Arc::new(resolver);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut tasks = Vec::with_capacity(config.servers.len());

    for listener in &config.servers {
        let server = DnsServer::bind(
            listener.protocol,
            listener.to_server_config(),
            Arc::clone(&handler),
        )
        .await
        .with_context(|| format!("binding {} listener on {}", listener.protocol, listener.addr))?;

        info!(
            protocol = %server.protocol(),
            addr = %server.local_addr()?,
            "listening"
        );

        let mut rx = shutdown_rx.clone();
        tasks.push(tokio::spawn(server.run_until(async move {
            let _ = rx.wait_for(|stop| *stop).await;
        })));
    }

    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");
    let _ = shutdown_tx.send(true);

    for task in tasks {
        match task.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("server stopped with error: {}", e),
            Err(e) => error!("server task failed: {}", e),
        }
    }

    Ok(())
}
