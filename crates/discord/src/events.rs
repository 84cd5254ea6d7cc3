use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use thiserror::Error;

use gaffer_core::domain::ids::{ChannelId, GuildId, MessageId};
use gaffer_core::errors::ApplicationError;

use crate::commands::{
    CommandRouter, CommandRouteError, ContractService, NoopContractService, SlashCommandPayload,
    UserRef,
};
use crate::embeds::{ActionRow, Embed, OutboundMessage};

/// Custom id of the single interactive control this bot attaches to offer
/// documents. Issued controls append the signed claim token after a `.`
/// separator.
pub const ACCEPT_CUSTOM_ID: &str = "accept_offer";

/// The claim token carried by an accept control, when present.
pub fn accept_token(custom_id: &str) -> Option<&str> {
    custom_id
        .strip_prefix(ACCEPT_CUSTOM_ID)?
        .strip_prefix('.')
        .filter(|token| !token.is_empty())
}

pub fn is_accept_control(custom_id: &str) -> bool {
    custom_id == ACCEPT_CUSTOM_ID || custom_id.starts_with(&format!("{ACCEPT_CUSTOM_ID}."))
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InteractionEnvelope {
    pub interaction_id: String,
    pub interaction_token: String,
    pub event: InteractionEvent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InteractionEvent {
    SlashCommand(SlashCommandPayload),
    ComponentClick(ComponentClickEvent),
    Unsupported { kind: String },
}

impl InteractionEvent {
    pub fn kind(&self) -> InteractionKind {
        match self {
            Self::SlashCommand(_) => InteractionKind::SlashCommand,
            Self::ComponentClick(_) => InteractionKind::ComponentClick,
            Self::Unsupported { .. } => InteractionKind::Unsupported,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InteractionKind {
    SlashCommand,
    ComponentClick,
    Unsupported,
}

/// A button click, with a snapshot of the message it was clicked on. The
/// snapshot is what the fallback extraction path reads.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComponentClickEvent {
    pub custom_id: String,
    pub guild_id: Option<GuildId>,
    pub channel_id: ChannelId,
    pub user: UserRef,
    pub message: MessageSnapshot,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageSnapshot {
    pub id: MessageId,
    pub channel_id: ChannelId,
    pub embeds: Vec<Embed>,
    pub components: Vec<ActionRow>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: "unknown-correlation-id".to_owned() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    Responded(OutboundMessage),
    Processed,
    Ignored,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventHandlerError {
    #[error(transparent)]
    Command(#[from] CommandRouteError),
    #[error(transparent)]
    Accept(#[from] ApplicationError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error(transparent)]
    Handler(#[from] EventHandlerError),
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn kind(&self) -> InteractionKind;
    async fn handle(
        &self,
        envelope: &InteractionEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<InteractionKind, Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.handlers.insert(handler.kind(), Arc::new(handler));
    }

    pub async fn dispatch(
        &self,
        envelope: &InteractionEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, DispatchError> {
        let Some(handler) = self.handlers.get(&envelope.event.kind()) else {
            return Ok(HandlerResult::Ignored);
        };

        handler.handle(envelope, ctx).await.map_err(DispatchError::from)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

pub fn default_dispatcher() -> EventDispatcher {
    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(SlashCommandHandler::new(NoopContractService));
    dispatcher.register(ComponentClickHandler::new(NoopOfferAcceptService));
    dispatcher
}

pub struct SlashCommandHandler<S> {
    router: CommandRouter<S>,
}

impl<S> SlashCommandHandler<S>
where
    S: ContractService,
{
    pub fn new(service: S) -> Self {
        Self { router: CommandRouter::new(service) }
    }
}

#[async_trait]
impl<S> EventHandler for SlashCommandHandler<S>
where
    S: ContractService + 'static,
{
    fn kind(&self) -> InteractionKind {
        InteractionKind::SlashCommand
    }

    async fn handle(
        &self,
        envelope: &InteractionEnvelope,
        _ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let InteractionEvent::SlashCommand(payload) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        let reply = self.router.route(payload.clone()).await?;
        Ok(HandlerResult::Responded(reply))
    }
}

/// Accept-side of the offer flow. The implementation performs every platform
/// side effect itself; the optional return value is a private notice for the
/// acceptor (delivery problems, missing transaction channel).
#[async_trait]
pub trait OfferAcceptService: Send + Sync {
    async fn accept(
        &self,
        event: &ComponentClickEvent,
        ctx: &EventContext,
    ) -> Result<Option<OutboundMessage>, ApplicationError>;
}

pub struct ComponentClickHandler<S> {
    service: S,
}

impl<S> ComponentClickHandler<S>
where
    S: OfferAcceptService,
{
    pub fn new(service: S) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S> EventHandler for ComponentClickHandler<S>
where
    S: OfferAcceptService + 'static,
{
    fn kind(&self) -> InteractionKind {
        InteractionKind::ComponentClick
    }

    async fn handle(
        &self,
        envelope: &InteractionEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let InteractionEvent::ComponentClick(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        if !is_accept_control(&event.custom_id) {
            return Ok(HandlerResult::Ignored);
        }

        let reply = self.service.accept(event, ctx).await?;
        Ok(match reply {
            Some(reply) => HandlerResult::Responded(reply),
            None => HandlerResult::Processed,
        })
    }
}

#[async_trait]
impl<S> OfferAcceptService for Arc<S>
where
    S: OfferAcceptService + ?Sized,
{
    async fn accept(
        &self,
        event: &ComponentClickEvent,
        ctx: &EventContext,
    ) -> Result<Option<OutboundMessage>, ApplicationError> {
        self.as_ref().accept(event, ctx).await
    }
}

#[derive(Default)]
pub struct NoopOfferAcceptService;

#[async_trait]
impl OfferAcceptService for NoopOfferAcceptService {
    async fn accept(
        &self,
        event: &ComponentClickEvent,
        _ctx: &EventContext,
    ) -> Result<Option<OutboundMessage>, ApplicationError> {
        Ok(Some(
            OutboundMessage::text(format!(
                "Preview: would process acceptance by {}.",
                event.user.tag
            ))
            .private(),
        ))
    }
}
