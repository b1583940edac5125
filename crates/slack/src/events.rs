//! Socket Mode envelope parsing and type-based dispatch.
//!
//! Raw frames are parsed into [`SocketMessage`]s. Envelope payloads are
//! deserialized into the typed records from `threadcast-core` right here at
//! the boundary, so handlers never see loose JSON. A payload that does not
//! fit its record becomes [`SlackEvent::Unsupported`] and is ignored.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use threadcast_core::domain::event::mention;
use threadcast_core::{ActionEvent, CommandEvent, MessageEvent};
use tracing::{debug, info, warn};

use crate::actions::{ActionOutcome, ActionRouter};
use crate::client::{ClientError, PostMessage};
use crate::commands::{CommandOutcome, CommandRouter};
use crate::context::AppContext;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlackEnvelope {
    pub envelope_id: String,
    pub event: SlackEvent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SlackEvent {
    SlashCommand(CommandEvent),
    BlockAction(ActionEvent),
    Message(MessageEvent),
    Unsupported { event_type: String },
}

impl SlackEvent {
    pub fn event_type(&self) -> SlackEventType {
        match self {
            Self::SlashCommand(_) => SlackEventType::SlashCommand,
            Self::BlockAction(_) => SlackEventType::BlockAction,
            Self::Message(_) => SlackEventType::Message,
            Self::Unsupported { .. } => SlackEventType::Unsupported,
        }
    }

    fn unsupported(event_type: impl Into<String>) -> Self {
        Self::Unsupported { event_type: event_type.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SlackEventType {
    SlashCommand,
    BlockAction,
    Message,
    Unsupported,
}

/// One frame received over the Socket Mode connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SocketMessage {
    Hello,
    Disconnect { reason: Option<String> },
    Envelope(SlackEnvelope),
    /// A frame type this bot does not handle, or an envelope without an id.
    Other { message_type: String },
}

#[derive(Debug, Error)]
#[error("malformed socket mode frame: {0}")]
pub struct SocketParseError(#[from] serde_json::Error);

#[derive(Debug, Deserialize)]
struct RawSocketMessage {
    #[serde(rename = "type")]
    message_type: String,
    #[serde(default)]
    envelope_id: Option<String>,
    #[serde(default)]
    payload: Option<serde_json::Value>,
    #[serde(default)]
    reason: Option<String>,
}

pub fn parse_socket_message(text: &str) -> Result<SocketMessage, SocketParseError> {
    let raw: RawSocketMessage = serde_json::from_str(text)?;

    let message = match raw.message_type.as_str() {
        "hello" => SocketMessage::Hello,
        "disconnect" => SocketMessage::Disconnect { reason: raw.reason },
        "slash_commands" | "interactive" | "events_api" => {
            let Some(envelope_id) = raw.envelope_id else {
                warn!(message_type = %raw.message_type, "envelope missing envelope_id, skipping");
                return Ok(SocketMessage::Other { message_type: raw.message_type });
            };
            let payload = raw.payload.unwrap_or(serde_json::Value::Null);
            let event = match raw.message_type.as_str() {
                "slash_commands" => normalize_slash_command(payload),
                "interactive" => normalize_interactive(payload),
                _ => normalize_events_api(payload),
            };
            SocketMessage::Envelope(SlackEnvelope { envelope_id, event })
        }
        _ => SocketMessage::Other { message_type: raw.message_type },
    };

    Ok(message)
}

#[derive(Debug, Deserialize)]
struct SlashCommandPayload {
    command: String,
    #[serde(default)]
    text: String,
    channel_id: String,
    user_id: String,
    #[serde(default)]
    thread_ts: Option<String>,
    #[serde(default)]
    response_url: Option<String>,
}

fn normalize_slash_command(payload: serde_json::Value) -> SlackEvent {
    match serde_json::from_value::<SlashCommandPayload>(payload) {
        Ok(payload) => SlackEvent::SlashCommand(CommandEvent {
            command: payload.command,
            channel_id: payload.channel_id,
            user_id: payload.user_id,
            text: payload.text,
            thread_ts: payload.thread_ts,
            response_url: payload.response_url,
        }),
        Err(error) => {
            warn!(error = %error, "malformed slash command payload");
            SlackEvent::unsupported("slash_commands")
        }
    }
}

#[derive(Debug, Deserialize)]
struct InteractivePayload {
    #[serde(rename = "type")]
    interaction_type: String,
    #[serde(default)]
    user: Option<IdRef>,
    #[serde(default)]
    channel: Option<IdRef>,
    #[serde(default)]
    container: Option<Container>,
    #[serde(default)]
    message: Option<ContainerMessage>,
    #[serde(default)]
    actions: Vec<ActionItem>,
}

#[derive(Debug, Deserialize)]
struct IdRef {
    id: String,
}

#[derive(Debug, Default, Deserialize)]
struct Container {
    #[serde(default)]
    channel_id: Option<String>,
    #[serde(default)]
    message_ts: Option<String>,
    #[serde(default)]
    thread_ts: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContainerMessage {
    #[serde(default)]
    ts: Option<String>,
    #[serde(default)]
    thread_ts: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ActionItem {
    action_id: String,
}

fn normalize_interactive(payload: serde_json::Value) -> SlackEvent {
    let payload = match serde_json::from_value::<InteractivePayload>(payload) {
        Ok(payload) => payload,
        Err(error) => {
            warn!(error = %error, "malformed interactive payload");
            return SlackEvent::unsupported("interactive");
        }
    };
    if payload.interaction_type != "block_actions" {
        return SlackEvent::unsupported(payload.interaction_type);
    }

    let container = payload.container.unwrap_or_default();
    let channel_id = payload.channel.map(|channel| channel.id).or(container.channel_id);
    // a single click delivers exactly one action; only the first is routed
    let action = payload.actions.into_iter().next();
    let (Some(user), Some(channel_id), Some(action)) = (payload.user, channel_id, action) else {
        warn!("block action missing user, channel or action; ignoring");
        return SlackEvent::unsupported("block_actions");
    };

    let (message_ts, message_thread_ts) = match payload.message {
        Some(message) => (message.ts, message.thread_ts),
        None => (None, None),
    };

    SlackEvent::BlockAction(ActionEvent {
        user_id: user.id,
        action_id: action.action_id,
        channel_id,
        message_ts: container.message_ts.or(message_ts),
        thread_ts: container.thread_ts.or(message_thread_ts),
    })
}

#[derive(Debug, Deserialize)]
struct EventsApiPayload {
    event: RawEvent,
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    subtype: Option<String>,
    #[serde(default)]
    bot_id: Option<String>,
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    user: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    ts: Option<String>,
    #[serde(default)]
    thread_ts: Option<String>,
}

fn normalize_events_api(payload: serde_json::Value) -> SlackEvent {
    let event = match serde_json::from_value::<EventsApiPayload>(payload) {
        Ok(payload) => payload.event,
        Err(error) => {
            warn!(error = %error, "malformed events api payload");
            return SlackEvent::unsupported("events_api");
        }
    };
    if event.event_type != "message" {
        return SlackEvent::unsupported(event.event_type);
    }
    if event.bot_id.is_some() || event.subtype.is_some() {
        debug!(subtype = ?event.subtype, "ignoring bot or system message");
        return SlackEvent::unsupported("message.filtered");
    }

    match (event.channel, event.user, event.ts) {
        (Some(channel_id), Some(user_id), Some(ts)) => SlackEvent::Message(MessageEvent {
            channel_id,
            user_id,
            text: event.text.unwrap_or_default(),
            ts,
            thread_ts: event.thread_ts,
        }),
        _ => SlackEvent::unsupported("message.incomplete"),
    }
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
    /// Something was sent back to Slack.
    Responded,
    /// Handled, but nothing was sent (or the send failed and was logged).
    Processed,
    Ignored,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventHandlerError {
    #[error("message reply failed: {0}")]
    MessageReply(#[from] ClientError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error(transparent)]
    Handler(#[from] EventHandlerError),
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn event_type(&self) -> SlackEventType;
    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<SlackEventType, Arc<dyn EventHandler>>,
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
        envelope: &SlackEnvelope,
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

/// Registers the slash command, block action and message handlers against `ctx`.
pub fn build_dispatcher(ctx: &AppContext) -> EventDispatcher {
    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(SlashCommandHandler::new(CommandRouter::new(ctx.clone())));
    dispatcher.register(BlockActionHandler::new(ActionRouter::new(ctx.clone())));
    dispatcher.register(MessageHandler::new(ctx.clone()));
    dispatcher
}

pub struct SlashCommandHandler {
    router: CommandRouter,
}

impl SlashCommandHandler {
    pub fn new(router: CommandRouter) -> Self {
        Self { router }
    }
}

#[async_trait]
impl EventHandler for SlashCommandHandler {
    fn event_type(&self) -> SlackEventType {
        SlackEventType::SlashCommand
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::SlashCommand(command) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        let outcome = self.router.route(command).await;
        debug!(correlation_id = %ctx.correlation_id, outcome = ?outcome, "slash command handled");
        Ok(match outcome {
            CommandOutcome::Posted(_)
            | CommandOutcome::Generated { .. }
            | CommandOutcome::Responded => HandlerResult::Responded,
            CommandOutcome::Failed => HandlerResult::Processed,
            CommandOutcome::Unsupported => HandlerResult::Ignored,
        })
    }
}

pub struct BlockActionHandler {
    router: ActionRouter,
}

impl BlockActionHandler {
    pub fn new(router: ActionRouter) -> Self {
        Self { router }
    }
}

#[async_trait]
impl EventHandler for BlockActionHandler {
    fn event_type(&self) -> SlackEventType {
        SlackEventType::BlockAction
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::BlockAction(action) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        let outcome = self.router.route(action).await;
        debug!(correlation_id = %ctx.correlation_id, outcome = ?outcome, "block action handled");
        Ok(match outcome {
            ActionOutcome::Replied(_) => HandlerResult::Responded,
            ActionOutcome::Failed => HandlerResult::Processed,
            ActionOutcome::Unsupported => HandlerResult::Ignored,
        })
    }
}

const GREETING_TRIGGER: &str = "hello";

/// Greets anyone who says `hello` in a channel the bot can read.
pub struct MessageHandler {
    ctx: AppContext,
}

impl MessageHandler {
    pub fn new(ctx: AppContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl EventHandler for MessageHandler {
    fn event_type(&self) -> SlackEventType {
        SlackEventType::Message
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::Message(message) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };
        if !message.text.contains(GREETING_TRIGGER) {
            return Ok(HandlerResult::Processed);
        }

        info!(
            event_name = "messages.greeting",
            correlation_id = %ctx.correlation_id,
            channel_id = %message.channel_id,
            user_id = %message.user_id,
            "greeting user"
        );
        let reply = PostMessage::text(
            message.channel_id.clone(),
            format!("Hey there {}!", mention(&message.user_id)),
        )
        .in_thread(message.thread_ts.clone());
        self.ctx.client.post_message(reply).await?;
        Ok(HandlerResult::Responded)
    }
}
