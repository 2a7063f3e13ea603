use anyhow::Context;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use data_feeds::api;
use data_feeds::config::load_config;
use data_feeds::rpc::ReqwestTransport;
use data_feeds::scheduler::Scheduler;
use data_feeds::state::AggregationState;
use data_feeds::store::{AnswerStore, RocksStore};
use data_feeds::telemetry::init_tracing;

/// CLI arguments
#[derive(Parser)]
#[command(name = "data-feeds", about = "Multi-provider price feed consensus service")]
struct Cli {
    /// Path to the TOML config file
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    /// IP address to bind the server to
    #[arg(long)]
    listen_ip: Option<String>,

    /// Port to bind the server to
    #[arg(long)]
    port: Option<u16>,

    /// Seconds between refresh cycles
    #[arg(long)]
    heartbeat_secs: Option<u64>,

    /// Seconds between scheduler wake-ups
    #[arg(long)]
    tick_secs: Option<u64>,

    /// Keep answers in memory only
    #[arg(long)]
    no_persist: bool,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_json);

    let mut config = load_config(&args.config)?;

    if let Some(ip) = args.listen_ip {
        config.server.listen_ip = Some(ip);
    }
    if let Some(port) = args.port {
        config.server.port = Some(port);
    }
    if let Some(secs) = args.heartbeat_secs {
        config.feeds.heartbeat_secs = secs;
    }
    if let Some(secs) = args.tick_secs {
        config.feeds.tick_secs = secs;
    }
    if args.no_persist {
        config.storage.persist = false;
    }

    let sources = config.symbol_sources()?;
    let request_timeout = config.request_timeout()?;
    let state = Arc::new(AggregationState::new(sources, config.heartbeat_interval()?));

    let store: Option<Arc<dyn AnswerStore>> = if config.storage.persist {
        let store = RocksStore::open(&config.storage.path)
            .with_context(|| format!("failed to open answer store at {}", config.storage.path))?;
        match store.load() {
            Ok(answers) => {
                info!(restored = answers.len(), "loaded stored answers");
                state.restore(answers);
            }
            Err(e) => warn!(error = %e, "could not load stored answers"),
        }
        Some(Arc::new(store))
    } else {
        None
    };

    let transport = ReqwestTransport::new(request_timeout)
        .context("failed to build HTTP client")?;
    let mut scheduler = Scheduler::new(Arc::clone(&state), Arc::new(transport), config.fetch_options());
    if let Some(store) = store {
        scheduler = scheduler.with_store(store);
    }

    let tick_every = Duration::from_secs(config.feeds.tick_secs.max(1));
    tokio::spawn(scheduler.run(tick_every));

    let app = api::router(state);

    let ip = config
        .server
        .listen_ip
        .unwrap_or_else(|| "127.0.0.1".to_string());
    let port = config.server.port.unwrap_or(3000);
    let addr: SocketAddr = format!("{}:{}", ip, port)
        .parse()
        .context("invalid listen address")?;

    info!(%addr, "serving latest answers");
    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}
