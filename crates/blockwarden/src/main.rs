//! `blockwarden` binary: parse configuration, set up logging, serve until
//! SIGINT or SIGTERM.

use blockwarden::{BlockwardenError, PanelConfig, PanelServer, logging};
use clap::Parser;

#[tokio::main]
async fn main() {
    let config = PanelConfig::parse();

    if let Err(e) = logging::init(&config.log_level, config.json_logs) {
        eprintln!("blockwarden: {e}");
        std::process::exit(1);
    }

    if let Err(e) = run(config).await {
        tracing::error!(error = %e, "blockwarden failed");
        std::process::exit(1);
    }
}

async fn run(config: PanelConfig) -> Result<(), BlockwardenError> {
    let settings = config.validate()?;
    tracing::info!(
        bind = %settings.bind,
        agent_bind = %settings.agent_bind,
        auth_mode = ?settings.auth_mode,
        production = settings.production,
        "starting Blockwarden"
    );

    let server = PanelServer::builder().settings(settings).build().await?;
    server.run().await
}
