use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use feedwatch::{
    actors::{hub::HubHandle, monitor::MonitorHandle},
    config::{Config, read_config_file},
    gateway::{HttpGateway, StreamGateway},
    monitors::HealthChecker,
    registry::{MemoryRegistry, SourceRegistry},
    util::load_env,
};
use tracing::{info, level_filters::LevelFilter, trace};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
struct Args {
    /// Config file
    #[arg(short)]
    file: String,
}

fn init() {
    let filter = filter::Targets::new().with_targets(vec![
        ("feedwatch", LevelFilter::TRACE),
        ("feedwatch_hub", LevelFilter::TRACE),
    ]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init();
    load_env();

    let args = Args::parse();
    trace!("started with args: {args:?}");

    let config = read_config_file(&args.file)?;

    run(config).await
}

async fn run(config: Config) -> anyhow::Result<()> {
    let Config {
        monitor,
        gateway,
        hub,
        api,
        sources,
    } = config;

    info!("monitoring {} configured sources", sources.len());

    let registry: Arc<dyn SourceRegistry> = Arc::new(MemoryRegistry::with_sources(sources));
    let gateway: Arc<dyn StreamGateway> = Arc::new(HttpGateway::new(&gateway)?);

    let hub = HubHandle::spawn(&hub);
    let checker = HealthChecker::new(registry.clone(), gateway, hub.clone(), &monitor);
    let monitor = MonitorHandle::spawn(monitor.settings(), registry, checker);

    #[cfg(feature = "api")]
    {
        use feedwatch::api::{ApiState, spawn_api_server};

        let state = ApiState::new(hub.clone(), monitor.clone());
        spawn_api_server(api, state).await?;
    }
    #[cfg(not(feature = "api"))]
    let _ = api;

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;

    info!("shutting down");
    monitor.stop().await;
    hub.shutdown().await;

    Ok(())
}
