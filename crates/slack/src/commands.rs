//! Slash command handlers.
//!
//! Every handler runs after the envelope has been acknowledged, so failures
//! never propagate: they are logged and the user gets a fallback notice.

use threadcast_core::{get_images, CommandEvent, MessageRef};
use tracing::{debug, error, info, warn};

use crate::blocks::{experiment_submitted_message, hello_message};
use crate::client::{CommandResponse, PostMessage};
use crate::context::AppContext;
use crate::threads::post_images;

pub const HELLO_COMMAND: &str = "/hello";
pub const GENERATE_COMMAND: &str = "/generate";
pub const WEATHER_COMMAND: &str = "/weather";

pub const GENERATE_EMPTY_REJECTION: &str =
    "We do not accept empty parameter for the /generate command.";
pub const GENERATE_FAILURE_NOTICE: &str = "An error occurred while processing your command.";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlashCommand {
    Hello,
    Generate,
    Weather,
}

impl SlashCommand {
    pub fn parse(command: &str) -> Option<Self> {
        match command.trim() {
            HELLO_COMMAND => Some(Self::Hello),
            GENERATE_COMMAND => Some(Self::Generate),
            WEATHER_COMMAND => Some(Self::Weather),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Hello => HELLO_COMMAND,
            Self::Generate => GENERATE_COMMAND,
            Self::Weather => WEATHER_COMMAND,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommandOutcome {
    /// A channel message went out.
    Posted(MessageRef),
    /// `/generate` posted its parent and uploaded `uploaded` images under it.
    Generated { parent: MessageRef, uploaded: usize },
    /// Only an ephemeral reply was sent (or attempted).
    Responded,
    /// The domain action failed; a fallback notice was attempted.
    Failed,
    Unsupported,
}

pub struct CommandRouter {
    ctx: AppContext,
}

impl CommandRouter {
    pub fn new(ctx: AppContext) -> Self {
        Self { ctx }
    }

    pub async fn route(&self, command: &CommandEvent) -> CommandOutcome {
        let Some(kind) = SlashCommand::parse(&command.command) else {
            debug!(command = %command.command, "ignoring unsupported slash command");
            return CommandOutcome::Unsupported;
        };

        info!(
            event_name = "commands.received",
            command = kind.name(),
            channel_id = %command.channel_id,
            user_id = %command.user_id,
            "handling slash command"
        );

        match kind {
            SlashCommand::Hello => self.hello(command).await,
            SlashCommand::Generate => self.generate(command).await,
            SlashCommand::Weather => self.weather(command).await,
        }
    }

    async fn hello(&self, command: &CommandEvent) -> CommandOutcome {
        let mention = command.user_mention();
        let message =
            PostMessage::from_template(command.channel_id.clone(), hello_message(&mention));

        match self.ctx.client.post_message(message).await {
            Ok(posted) => CommandOutcome::Posted(posted),
            Err(error) => {
                error!(
                    event_name = "commands.hello.failed",
                    channel_id = %command.channel_id,
                    user_id = %command.user_id,
                    error = %error,
                    "failed to post hello message"
                );
                let fallback = PostMessage::text(
                    command.channel_id.clone(),
                    format!(
                        "Hello {mention}! I tried to send you an image, but encountered an error."
                    ),
                );
                if let Err(error) = self.ctx.client.post_message(fallback).await {
                    error!(
                        event_name = "commands.hello.fallback_failed",
                        channel_id = %command.channel_id,
                        error = %error,
                        "failed to post hello fallback"
                    );
                }
                CommandOutcome::Failed
            }
        }
    }

    async fn generate(&self, command: &CommandEvent) -> CommandOutcome {
        if !command.has_arguments() {
            info!(
                event_name = "commands.generate.rejected",
                channel_id = %command.channel_id,
                user_id = %command.user_id,
                "rejecting /generate without parameters"
            );
            self.respond_ephemeral(command, GENERATE_EMPTY_REJECTION).await;
            return CommandOutcome::Responded;
        }

        let message = PostMessage::from_template(
            command.channel_id.clone(),
            experiment_submitted_message(&command.user_mention()),
        )
        .in_thread(command.thread_ts.clone());

        let parent = match self.ctx.client.post_message(message).await {
            Ok(parent) => parent,
            Err(error) => {
                error!(
                    event_name = "commands.generate.failed",
                    channel_id = %command.channel_id,
                    user_id = %command.user_id,
                    error = %error,
                    "failed to post experiment message"
                );
                self.respond_ephemeral(command, GENERATE_FAILURE_NOTICE).await;
                return CommandOutcome::Failed;
            }
        };

        let images_dir = self.ctx.images_dir.clone();
        let images = match tokio::task::spawn_blocking(move || get_images(images_dir)).await {
            Ok(images) => images,
            Err(error) => {
                error!(
                    event_name = "commands.generate.failed",
                    channel_id = %command.channel_id,
                    thread_ts = %parent.ts,
                    error = %error,
                    "image listing task failed"
                );
                self.respond_ephemeral(command, GENERATE_FAILURE_NOTICE).await;
                return CommandOutcome::Failed;
            }
        };
        match post_images(&parent, command, self.ctx.client.as_ref(), &images).await {
            Ok(uploaded) => CommandOutcome::Generated { parent, uploaded },
            Err(error) => {
                error!(
                    event_name = "commands.generate.upload_failed",
                    channel_id = %command.channel_id,
                    thread_ts = %parent.ts,
                    file_index = error.index,
                    error = %error,
                    "image upload batch stopped"
                );
                self.respond_ephemeral(command, GENERATE_FAILURE_NOTICE).await;
                CommandOutcome::Failed
            }
        }
    }

    async fn weather(&self, command: &CommandEvent) -> CommandOutcome {
        let location = command.text.trim();
        let location = if location.is_empty() { "your location" } else { location };
        self.respond_ephemeral(command, &format!("Weather forecast for {location}: ☀️ Sunny!"))
            .await;
        CommandOutcome::Responded
    }

    async fn respond_ephemeral(&self, command: &CommandEvent, text: &str) {
        let Some(response_url) = command.response_url.as_deref() else {
            warn!(
                command = %command.command,
                channel_id = %command.channel_id,
                "slash command has no response_url; skipping ephemeral reply"
            );
            return;
        };

        if let Err(error) =
            self.ctx.client.respond(response_url, CommandResponse::ephemeral(text)).await
        {
            error!(
                event_name = "commands.respond.failed",
                command = %command.command,
                channel_id = %command.channel_id,
                error = %error,
                "failed to send ephemeral reply"
            );
        }
    }
}
