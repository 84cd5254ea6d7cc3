use std::sync::Arc;

use secrecy::ExposeSecret;
use thiserror::Error;
use tracing::{info, warn};

use gaffer_core::config::{AppConfig, ConfigError};
use gaffer_core::domain::ids::ChannelId;
use gaffer_core::domain::team::{RegistryError, TeamRegistry};
use gaffer_core::domain::token::OfferTokenCodec;
use gaffer_discord::events::{ComponentClickHandler, EventDispatcher, SlashCommandHandler};
use gaffer_discord::gateway::{
    GatewayRunner, GatewayTransport, NoopGatewayTransport, ReconnectPolicy,
};
use gaffer_discord::presence::StatusRotator;
use gaffer_discord::rest::{DiscordApi, RestClient};
use gaffer_discord::service::HubService;

pub struct Application {
    pub config: AppConfig,
    pub registry: Arc<TeamRegistry>,
    pub api: Arc<dyn DiscordApi>,
    pub transport: Arc<dyn GatewayTransport>,
    pub rotator: Arc<StatusRotator>,
    pub runner: GatewayRunner,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let registry = Arc::new(TeamRegistry::load(&config.registry.path)?);
    info!(
        event_name = "system.bootstrap.registry_loaded",
        correlation_id = "bootstrap",
        registry_path = %config.registry.path.display(),
        team_count = registry.len(),
        "team registry loaded"
    );
    for role_id in registry.duplicate_role_ids() {
        warn!(
            event_name = "system.bootstrap.registry_duplicate_role",
            correlation_id = "bootstrap",
            role_id = %role_id,
            "multiple registry teams share one role id; first lexicographic match wins"
        );
    }

    let api: Arc<dyn DiscordApi> = Arc::new(RestClient::new(
        config.discord.bot_token.clone(),
        config.discord.application_id.clone(),
    ));

    // Offer tokens are signed with the bot credential; rotating the token
    // invalidates outstanding accept controls along with the session.
    let tokens = OfferTokenCodec::new(config.discord.bot_token.expose_secret());
    let transaction_channel =
        config.discord.transaction_channel_id.clone().map(ChannelId);
    let service = Arc::new(HubService::new(
        api.clone(),
        registry.clone(),
        tokens,
        transaction_channel,
    ));

    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(SlashCommandHandler::new(service.clone()));
    dispatcher.register(ComponentClickHandler::new(service));

    let transport: Arc<dyn GatewayTransport> = Arc::new(NoopGatewayTransport);
    let runner =
        GatewayRunner::new(transport.clone(), dispatcher, api.clone(), ReconnectPolicy::default());
    let rotator = Arc::new(StatusRotator::new(config.presence.statuses.clone()));

    Ok(Application { config, registry, api, transport, rotator, runner })
}
