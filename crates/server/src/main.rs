mod bootstrap;
mod health;

use std::time::Duration;

use anyhow::Result;
use gaffer_core::config::{AppConfig, LoadOptions};
use gaffer_discord::commands::command_definitions;
use gaffer_discord::presence;
use gaffer_discord::rest::DiscordApi;

fn init_logging(config: &AppConfig) {
    use gaffer_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Load config and initialize logging before any other operations
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;

    health::spawn(&app.config.server.bind_address, app.config.server.port).await?;

    if app.config.discord.application_id.is_some() {
        match app.api.overwrite_commands(&command_definitions()).await {
            Ok(()) => tracing::info!(
                event_name = "system.server.commands_registered",
                correlation_id = "bootstrap",
                "slash commands registered"
            ),
            Err(error) => tracing::warn!(
                event_name = "system.server.command_registration_failed",
                correlation_id = "bootstrap",
                error = %error,
                "slash command registration failed; continuing with existing registration"
            ),
        }
    } else {
        tracing::info!(
            event_name = "system.server.commands_skipped",
            correlation_id = "bootstrap",
            "no application id configured; skipping slash command registration"
        );
    }

    let rotation_period = Duration::from_secs(app.config.presence.interval_secs);
    tokio::spawn(presence::run(app.transport.clone(), app.rotator.clone(), rotation_period));

    app.runner.start().await?;

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        "gaffer-server started"
    );
    wait_for_shutdown().await?;
    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        "gaffer-server stopping"
    );

    Ok(())
}

async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
