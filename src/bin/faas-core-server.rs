use anyhow::Result;
use clap::Parser;
use faas_core::config::Config;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "faas-core-server")]
#[command(about = "Execution core: HTTP listener, isolate sandbox, host-API surface")]
struct Args {
    /// Path to a TOML config file layered over the built-in defaults.
    #[arg(long)]
    config: Option<String>,

    /// Bind address override.
    #[arg(long)]
    bind: Option<String>,

    /// Port override.
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    faas_metrics::TracingService::init().map_err(|e| anyhow::anyhow!("{e}"))?;

    let args = Args::parse();
    let mut config = Config::load(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    info!(?config, "starting faas-core-server");

    let state = faas_core::build_state(&config).await?;
    let app = faas_core::build_router(state);

    let addr = format!("{}:{}", config.server.bind, config.server.port);
    info!(%addr, "listening");
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("received shutdown signal, draining in-flight invocations"),
        Err(err) => warn!(%err, "unable to listen for shutdown signal"),
    }
}
