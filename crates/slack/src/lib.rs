//! Slack Integration - Socket Mode bot interface
//!
//! This crate provides the Slack side of threadcast:
//! - **Socket Mode** (`socket`) - WebSocket connection to Slack (no public URL needed)
//! - **Slash Commands** (`commands`) - `/hello`, `/generate`, `/weather`
//! - **Actions** (`actions`) - replies to the `button_click` and `rerun_experiment` buttons
//! - **Events** (`events`) - envelope parsing, typed events, dispatch
//! - **Threads** (`threads`) - code-block replies and image uploads under a parent message
//! - **Block Kit** (`blocks`) - message builders and the bot's message templates
//! - **Client** (`client`) - the `ChatClient` capability and its Web API implementation
//!
//! # Getting Started
//!
//! 1. Create a Slack app at https://api.slack.com/apps
//! 2. Enable Socket Mode, interactivity and the `message.channels` event
//! 3. Add slash commands: `/hello`, `/generate`, `/weather`
//! 4. Set env vars: `THREADCAST_SLACK_APP_TOKEN`, `THREADCAST_SLACK_BOT_TOKEN`
//!
//! # Architecture
//!
//! ```text
//! WebSocket → SocketModeRunner → ack → EventDispatcher → Command/Action routers
//!                                                              ↓
//!                                     ChatClient ← post / upload / respond
//! ```
//!
//! # Key Types
//!
//! - `SocketModeRunner` - WebSocket event loop with reconnection logic
//! - `EventDispatcher` - Routes events to appropriate handlers
//! - `AppContext` - Client handle and images directory shared by handlers
//! - `ChatClient` - Trait for outbound Slack calls; swapped for a fake in tests

pub mod actions;
pub mod blocks;
pub mod client;
pub mod commands;
pub mod context;
pub mod events;
pub mod socket;
pub mod threads;

#[cfg(test)]
mod testing;

pub use client::{ChatClient, SlackWebClient};
pub use context::AppContext;
pub use events::build_dispatcher;
pub use socket::{ReconnectPolicy, SocketModeRunner, WebSocketTransport};
