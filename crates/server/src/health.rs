use axum::{routing::get, Router};
use tracing::{error, info};

/// The exact liveness body; external monitors match on it.
pub const LIVENESS_BODY: &str = "Bot is running and status has been updated!";

pub fn router() -> Router {
    Router::new().route("/", get(liveness))
}

pub async fn spawn(bind_address: &str, port: u16) -> std::io::Result<()> {
    let address = format!("{bind_address}:{port}");
    let listener = tokio::net::TcpListener::bind(&address).await?;

    info!(
        event_name = "system.liveness.start",
        correlation_id = "bootstrap",
        bind_address = %address,
        "liveness endpoint started"
    );

    tokio::spawn(async move {
        if let Err(error) = axum::serve(listener, router()).await {
            error!(
                event_name = "system.liveness.error",
                correlation_id = "bootstrap",
                error = %error,
                "liveness endpoint server terminated unexpectedly"
            );
        }
    });

    Ok(())
}

pub async fn liveness() -> &'static str {
    LIVENESS_BODY
}
