use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use thiserror::Error;

use shoplist_core::domain::{ChannelId, GuildId, MessageId, UserId};
use shoplist_core::markers::Marker;

use crate::commands::{
    CommandInvocation, CommandParseError, CommandReply, CommandRouteError, CommandRouter,
    ShopCommandService,
};
use crate::follow_up::FollowUpHub;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatEnvelope {
    pub envelope_id: String,
    pub event: ChatEvent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChatEvent {
    CommandInvoked(CommandInvocation),
    MarkerAttached(MarkerAttachedEvent),
    FollowUpMessage(FollowUpMessageEvent),
    Unsupported { event_type: String },
}

impl ChatEvent {
    pub fn event_type(&self) -> ChatEventType {
        match self {
            Self::CommandInvoked(_) => ChatEventType::CommandInvoked,
            Self::MarkerAttached(_) => ChatEventType::MarkerAttached,
            Self::FollowUpMessage(_) => ChatEventType::FollowUpMessage,
            Self::Unsupported { .. } => ChatEventType::Unsupported,
        }
    }

    pub fn channel_id(&self) -> Option<&ChannelId> {
        match self {
            Self::CommandInvoked(invocation) => Some(&invocation.channel_id),
            Self::MarkerAttached(event) => Some(&event.channel_id),
            Self::FollowUpMessage(event) => Some(&event.channel_id),
            Self::Unsupported { .. } => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ChatEventType {
    CommandInvoked,
    MarkerAttached,
    FollowUpMessage,
    Unsupported,
}

/// A user reacted to a message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MarkerAttachedEvent {
    pub marker: Marker,
    pub message_id: MessageId,
    pub channel_id: ChannelId,
    pub guild_id: Option<GuildId>,
    pub user_id: UserId,
    pub user_is_bot: bool,
}

/// A plain channel message, candidate answer to a pending follow-up prompt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FollowUpMessageEvent {
    pub message_id: MessageId,
    pub channel_id: ChannelId,
    pub user_id: UserId,
    pub user_is_bot: bool,
    pub text: String,
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
    Responded(CommandReply),
    Processed,
    Ignored,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventHandlerError {
    #[error(transparent)]
    Parse(#[from] CommandParseError),
    #[error(transparent)]
    Route(#[from] CommandRouteError),
    #[error("marker handler failure: {0}")]
    Marker(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error(transparent)]
    Handler(#[from] EventHandlerError),
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn event_type(&self) -> ChatEventType;
    async fn handle(
        &self,
        envelope: &ChatEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<ChatEventType, Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.handlers.insert(handler.event_type(), Arc::new(handler));
    }

    pub async fn dispatch(
        &self,
        envelope: &ChatEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, DispatchError> {
        let Some(handler) = self.handlers.get(&envelope.event.event_type()) else {
            return Ok(HandlerResult::Ignored);
        };

        handler.handle(envelope, ctx).await.map_err(DispatchError::from)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

pub struct CommandHandler<S> {
    router: CommandRouter<S>,
}

impl<S> CommandHandler<S>
where
    S: ShopCommandService,
{
    pub fn new(service: S) -> Self {
        Self { router: CommandRouter::new(service) }
    }
}

#[async_trait]
impl<S> EventHandler for CommandHandler<S>
where
    S: ShopCommandService + 'static,
{
    fn event_type(&self) -> ChatEventType {
        ChatEventType::CommandInvoked
    }

    async fn handle(
        &self,
        envelope: &ChatEnvelope,
        _ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let ChatEvent::CommandInvoked(invocation) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        let reply = self.router.route(invocation).await?;
        Ok(HandlerResult::Responded(reply))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MarkerOutcome {
    /// Not a marker on a live list message, or placed by a bot.
    Ignored,
    Handled,
}

#[async_trait]
pub trait MarkerEventService: Send + Sync {
    async fn marker_attached(
        &self,
        event: &MarkerAttachedEvent,
        ctx: &EventContext,
    ) -> Result<MarkerOutcome, EventHandlerError>;
}

pub struct MarkerAttachedHandler<S> {
    service: S,
}

impl<S> MarkerAttachedHandler<S>
where
    S: MarkerEventService,
{
    pub fn new(service: S) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S> EventHandler for MarkerAttachedHandler<S>
where
    S: MarkerEventService + 'static,
{
    fn event_type(&self) -> ChatEventType {
        ChatEventType::MarkerAttached
    }

    async fn handle(
        &self,
        envelope: &ChatEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let ChatEvent::MarkerAttached(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };
        if event.user_is_bot {
            return Ok(HandlerResult::Ignored);
        }

        Ok(match self.service.marker_attached(event, ctx).await? {
            MarkerOutcome::Handled => HandlerResult::Processed,
            MarkerOutcome::Ignored => HandlerResult::Ignored,
        })
    }
}

pub struct FollowUpHandler {
    hub: Arc<FollowUpHub>,
}

impl FollowUpHandler {
    pub fn new(hub: Arc<FollowUpHub>) -> Self {
        Self { hub }
    }
}

#[async_trait]
impl EventHandler for FollowUpHandler {
    fn event_type(&self) -> ChatEventType {
        ChatEventType::FollowUpMessage
    }

    async fn handle(
        &self,
        envelope: &ChatEnvelope,
        _ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let ChatEvent::FollowUpMessage(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        Ok(if self.hub.offer(event).await {
            HandlerResult::Processed
        } else {
            HandlerResult::Ignored
        })
    }
}
