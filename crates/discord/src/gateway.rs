use std::{sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::commands::CommandRouteError;
use crate::embeds::OutboundMessage;
use crate::events::{
    default_dispatcher, DispatchError, EventContext, EventDispatcher, EventHandlerError,
    HandlerResult, InteractionEnvelope,
};
use crate::rest::DiscordApi;
use gaffer_core::errors::InterfaceError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport failed to connect: {0}")]
    Connect(String),
    #[error("transport read failed: {0}")]
    Receive(String),
    #[error("transport ack failed: {0}")]
    Acknowledge(String),
    #[error("transport presence update failed: {0}")]
    Presence(String),
    #[error("transport disconnect failed: {0}")]
    Disconnect(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_retries: 5, base_delay_ms: 250, max_delay_ms: 5_000 }
    }
}

impl ReconnectPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Availability {
    Online,
    Idle,
    DoNotDisturb,
}

/// Presence published through the gateway: a Playing activity plus an
/// availability state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PresenceUpdate {
    pub activity: String,
    pub availability: Availability,
}

impl PresenceUpdate {
    pub fn playing(activity: impl Into<String>) -> Self {
        Self { activity: activity.into(), availability: Availability::Idle }
    }
}

/// Event ingress. `acknowledge` defers the interaction inside the platform's
/// response window before any handler work begins.
#[async_trait]
pub trait GatewayTransport: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;
    async fn next_envelope(&self) -> Result<Option<InteractionEnvelope>, TransportError>;
    async fn acknowledge(&self, envelope: &InteractionEnvelope) -> Result<(), TransportError>;
    async fn update_presence(&self, presence: &PresenceUpdate) -> Result<(), TransportError>;
    async fn disconnect(&self) -> Result<(), TransportError>;
}

#[derive(Default)]
pub struct NoopGatewayTransport;

#[async_trait]
impl GatewayTransport for NoopGatewayTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn next_envelope(&self) -> Result<Option<InteractionEnvelope>, TransportError> {
        Ok(None)
    }

    async fn acknowledge(&self, _envelope: &InteractionEnvelope) -> Result<(), TransportError> {
        Ok(())
    }

    async fn update_presence(&self, _presence: &PresenceUpdate) -> Result<(), TransportError> {
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

pub struct GatewayRunner {
    transport: Arc<dyn GatewayTransport>,
    dispatcher: EventDispatcher,
    api: Arc<dyn DiscordApi>,
    reconnect_policy: ReconnectPolicy,
}

impl GatewayRunner {
    pub fn new(
        transport: Arc<dyn GatewayTransport>,
        dispatcher: EventDispatcher,
        api: Arc<dyn DiscordApi>,
        reconnect_policy: ReconnectPolicy,
    ) -> Self {
        Self { transport, dispatcher, api, reconnect_policy }
    }

    pub fn with_defaults(api: Arc<dyn DiscordApi>) -> Self {
        Self::new(
            Arc::new(NoopGatewayTransport),
            default_dispatcher(),
            api,
            ReconnectPolicy::default(),
        )
    }

    pub async fn start(&self) -> Result<()> {
        for attempt in 0..=self.reconnect_policy.max_retries {
            match self.connect_and_pump(attempt).await {
                Ok(()) => return Ok(()),
                Err(transport_error) => {
                    warn!(
                        attempt,
                        max_retries = self.reconnect_policy.max_retries,
                        error = %transport_error,
                        "gateway transport failed"
                    );

                    if attempt >= self.reconnect_policy.max_retries {
                        warn!(
                            max_retries = self.reconnect_policy.max_retries,
                            "gateway retries exhausted; continuing process without crash"
                        );
                        return Ok(());
                    }

                    let delay = self.reconnect_policy.backoff(attempt);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        Ok(())
    }

    async fn connect_and_pump(&self, attempt: u32) -> Result<(), TransportError> {
        info!(attempt, "opening gateway transport connection");
        self.transport.connect().await?;
        info!(attempt, "gateway transport connected");

        loop {
            let Some(envelope) = self.transport.next_envelope().await? else {
                info!(attempt, "gateway transport stream closed");
                self.transport.disconnect().await?;
                return Ok(());
            };

            info!(
                event_name = "ingress.discord.envelope_received",
                interaction_id = %envelope.interaction_id,
                interaction_kind = ?envelope.event.kind(),
                correlation_id = %envelope.interaction_id,
                "received interaction envelope"
            );

            if let Err(error) = self.transport.acknowledge(&envelope).await {
                warn!(
                    event_name = "ingress.discord.ack_failed",
                    interaction_id = %envelope.interaction_id,
                    correlation_id = %envelope.interaction_id,
                    error = %error,
                    "failed to acknowledge interaction"
                );
            } else {
                debug!(
                    event_name = "ingress.discord.ack_sent",
                    interaction_id = %envelope.interaction_id,
                    correlation_id = %envelope.interaction_id,
                    "acknowledged interaction"
                );
            }

            let context = EventContext { correlation_id: envelope.interaction_id.clone() };
            match self.dispatcher.dispatch(&envelope, &context).await {
                Ok(HandlerResult::Responded(reply)) => {
                    self.deliver_reply(&envelope, &reply).await;
                }
                Ok(HandlerResult::Processed) => {
                    debug!(
                        interaction_id = %envelope.interaction_id,
                        correlation_id = %envelope.interaction_id,
                        "interaction processed without a reply"
                    );
                }
                Ok(HandlerResult::Ignored) => {
                    debug!(
                        interaction_id = %envelope.interaction_id,
                        correlation_id = %envelope.interaction_id,
                        "interaction ignored"
                    );
                }
                // The blast radius of any handler failure is this one
                // interaction: log it, tell the invoker once, move on.
                Err(error) => {
                    warn!(
                        interaction_id = %envelope.interaction_id,
                        correlation_id = %envelope.interaction_id,
                        error = %error,
                        "event dispatch failed; continuing gateway loop"
                    );
                    let reply = error_reply(error, &envelope.interaction_id);
                    self.deliver_reply(&envelope, &reply).await;
                }
            }
        }
    }

    async fn deliver_reply(&self, envelope: &InteractionEnvelope, reply: &OutboundMessage) {
        if let Err(error) =
            self.api.interaction_followup(&envelope.interaction_token, reply).await
        {
            warn!(
                event_name = "egress.discord.reply_failed",
                interaction_id = %envelope.interaction_id,
                correlation_id = %envelope.interaction_id,
                error = %error,
                "could not deliver interaction reply"
            );
        }
    }
}

fn error_reply(error: DispatchError, correlation_id: &str) -> OutboundMessage {
    let DispatchError::Handler(handler_error) = error;
    let interface = match handler_error {
        EventHandlerError::Accept(application) => application.into_interface(correlation_id),
        EventHandlerError::Command(CommandRouteError::Application(application)) => {
            application.into_interface(correlation_id)
        }
        EventHandlerError::Command(CommandRouteError::Parse(parse)) => InterfaceError::BadRequest {
            message: parse.to_string(),
            correlation_id: correlation_id.to_owned(),
        },
    };
    OutboundMessage::text(interface.user_message()).private()
}
