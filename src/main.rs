use anyhow::Result;
use clap::Parser;
use comtrade_viewer::{api, config, state::AppState, telemetry};
use config::{Cli, Config};
use telemetry::init_tracing;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let cfg = Config::load(&cli)?;

    if cfg.browser.gather_usage_stats {
        info!("browser.gatherUsageStats is set; this server never sends usage statistics");
    }
    if !cfg.server.enable_xsrf_protection {
        warn!("XSRF protection disabled - uploads accept cross-site requests");
    }

    let app = api::router(AppState::new(cfg.clone()), &cfg);
    let addr = cfg.server.socket_addr()?;

    if cfg.server.address == "0.0.0.0" {
        warn!(
            "Server binding to 0.0.0.0 - the viewer will be reachable from the network. \
            Put it behind a firewall or reverse proxy outside a container."
        );
    }

    info!(%addr, "starting COMTRADE Viewer");
    if !cfg.server.headless {
        info!(url = %format!("http://{addr}"), "open the viewer in a browser");
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(telemetry::shutdown_signal())
        .await?;

    warn!("shutdown complete");
    Ok(())
}
