use std::{sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use secrecy::SecretString;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use crate::client::SlackWebClient;
use crate::events::{
    parse_socket_message, EventContext, EventDispatcher, SlackEnvelope, SlackEvent, SocketMessage,
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport failed to connect: {0}")]
    Connect(String),
    #[error("transport read failed: {0}")]
    Receive(String),
    #[error("transport ack failed: {0}")]
    Acknowledge(String),
    #[error("transport disconnect failed: {0}")]
    Disconnect(String),
}

/// Why a connection attempt ended. Only connect failures count toward the retry budget.
#[derive(Debug, Error)]
pub enum SocketError {
    #[error("connect failed: {0}")]
    Connect(#[source] TransportError),
    #[error("session ended: {0}")]
    Session(#[source] TransportError),
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

#[async_trait]
pub trait SocketTransport: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;
    /// `Ok(None)` means the transport is finished for good and the runner should stop.
    async fn next_envelope(&self) -> Result<Option<SlackEnvelope>, TransportError>;
    async fn acknowledge(&self, envelope_id: &str) -> Result<(), TransportError>;
    async fn disconnect(&self) -> Result<(), TransportError>;
}

/// Transport that never delivers anything; used for dry runs.
#[derive(Default)]
pub struct NoopSocketTransport;

#[async_trait]
impl SocketTransport for NoopSocketTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn next_envelope(&self) -> Result<Option<SlackEnvelope>, TransportError> {
        Ok(None)
    }

    async fn acknowledge(&self, _envelope_id: &str) -> Result<(), TransportError> {
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Slack Socket Mode over a WebSocket opened with `apps.connections.open`.
///
/// Control frames are handled internally: `hello` is logged, pings are
/// answered, and a `disconnect` request or close frame ends the session with
/// an error so the runner reconnects.
pub struct WebSocketTransport {
    client: SlackWebClient,
    app_token: SecretString,
    sink: Mutex<Option<SplitSink<WsStream, Message>>>,
    stream: Mutex<Option<SplitStream<WsStream>>>,
}

impl WebSocketTransport {
    pub fn new(client: SlackWebClient, app_token: SecretString) -> Self {
        Self { client, app_token, sink: Mutex::new(None), stream: Mutex::new(None) }
    }

    async fn send(&self, message: Message) -> Result<(), String> {
        let mut sink = self.sink.lock().await;
        let Some(sink) = sink.as_mut() else {
            return Err("socket is not connected".to_owned());
        };
        sink.send(message).await.map_err(|error| error.to_string())
    }
}

#[async_trait]
impl SocketTransport for WebSocketTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        let url = self
            .client
            .connections_open(&self.app_token)
            .await
            .map_err(|error| TransportError::Connect(error.to_string()))?;
        let (socket, _response) = connect_async(url.as_str())
            .await
            .map_err(|error| TransportError::Connect(error.to_string()))?;

        let (sink, stream) = socket.split();
        *self.sink.lock().await = Some(sink);
        *self.stream.lock().await = Some(stream);
        Ok(())
    }

    async fn next_envelope(&self) -> Result<Option<SlackEnvelope>, TransportError> {
        let mut stream = self.stream.lock().await;
        let Some(stream) = stream.as_mut() else {
            return Err(TransportError::Receive("socket is not connected".to_owned()));
        };

        loop {
            let Some(frame) = stream.next().await else {
                return Err(TransportError::Receive("connection closed by peer".to_owned()));
            };
            let frame = frame.map_err(|error| TransportError::Receive(error.to_string()))?;

            match frame {
                Message::Text(text) => match parse_socket_message(text.as_str()) {
                    Ok(SocketMessage::Envelope(envelope)) => return Ok(Some(envelope)),
                    Ok(SocketMessage::Hello) => info!("socket mode connection established"),
                    Ok(SocketMessage::Disconnect { reason }) => {
                        return Err(TransportError::Receive(format!(
                            "slack requested disconnect ({})",
                            reason.as_deref().unwrap_or("no reason")
                        )));
                    }
                    Ok(SocketMessage::Other { message_type }) => {
                        debug!(message_type = %message_type, "skipping socket frame");
                    }
                    Err(error) => warn!(error = %error, "skipping unparseable socket frame"),
                },
                Message::Ping(payload) => {
                    self.send(Message::Pong(payload)).await.map_err(TransportError::Receive)?;
                }
                Message::Close(frame) => {
                    return Err(TransportError::Receive(format!("close frame received: {frame:?}")));
                }
                _ => {}
            }
        }
    }

    async fn acknowledge(&self, envelope_id: &str) -> Result<(), TransportError> {
        let ack = serde_json::json!({ "envelope_id": envelope_id }).to_string();
        self.send(Message::Text(ack.into())).await.map_err(TransportError::Acknowledge)
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.stream.lock().await.take();
        let Some(mut sink) = self.sink.lock().await.take() else {
            return Ok(());
        };
        sink.close().await.map_err(|error| TransportError::Disconnect(error.to_string()))
    }
}

/// Reads envelopes, acks each one, and hands it to the dispatcher on its own task
/// so a slow handler never delays the next ack.
pub struct SocketModeRunner {
    transport: Arc<dyn SocketTransport>,
    dispatcher: Arc<EventDispatcher>,
    reconnect_policy: ReconnectPolicy,
}

impl Default for SocketModeRunner {
    fn default() -> Self {
        Self {
            transport: Arc::new(NoopSocketTransport),
            dispatcher: Arc::new(EventDispatcher::default()),
            reconnect_policy: ReconnectPolicy::default(),
        }
    }
}

impl SocketModeRunner {
    pub fn new(
        transport: Arc<dyn SocketTransport>,
        dispatcher: EventDispatcher,
        reconnect_policy: ReconnectPolicy,
    ) -> Self {
        Self { transport, dispatcher: Arc::new(dispatcher), reconnect_policy }
    }

    /// Runs until the transport finishes or connect retries are exhausted.
    /// A session that connected and later dropped resets the retry budget.
    /// Handlers still running when the runner stops are awaited before returning.
    pub async fn start(&self) -> Result<()> {
        let mut in_flight = JoinSet::new();
        self.run(&mut in_flight).await;
        drain(&mut in_flight).await;
        Ok(())
    }

    async fn run(&self, in_flight: &mut JoinSet<()>) {
        let mut attempt = 0_u32;
        loop {
            let delay = match self.connect_and_pump(attempt, in_flight).await {
                Ok(()) => return,
                Err(SocketError::Session(error)) => {
                    warn!(
                        event_name = "ingress.slack.session_ended",
                        error = %error,
                        "socket mode session ended; reconnecting"
                    );
                    attempt = 0;
                    self.reconnect_policy.backoff(0)
                }
                Err(SocketError::Connect(error)) => {
                    warn!(
                        attempt,
                        max_retries = self.reconnect_policy.max_retries,
                        error = %error,
                        "socket mode transport failed"
                    );

                    if attempt >= self.reconnect_policy.max_retries {
                        warn!(
                            max_retries = self.reconnect_policy.max_retries,
                            "socket mode retries exhausted; continuing process without crash"
                        );
                        return;
                    }

                    let delay = self.reconnect_policy.backoff(attempt);
                    attempt += 1;
                    delay
                }
            };

            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
    }

    async fn connect_and_pump(
        &self,
        attempt: u32,
        in_flight: &mut JoinSet<()>,
    ) -> Result<(), SocketError> {
        info!(attempt, "opening socket mode transport connection");
        self.transport.connect().await.map_err(SocketError::Connect)?;
        info!(attempt, "socket mode transport connected");

        loop {
            while let Some(finished) = in_flight.try_join_next() {
                log_handler_panic(finished);
            }

            let envelope = match self.transport.next_envelope().await {
                Ok(Some(envelope)) => envelope,
                Ok(None) => {
                    info!(attempt, "socket mode transport stream closed");
                    self.transport.disconnect().await.map_err(SocketError::Session)?;
                    return Ok(());
                }
                Err(error) => {
                    if let Err(disconnect_error) = self.transport.disconnect().await {
                        debug!(error = %disconnect_error, "disconnect after session failure failed");
                    }
                    return Err(SocketError::Session(error));
                }
            };
            let (channel_id, user_id) = correlation_fields(&envelope);

            info!(
                event_name = "ingress.slack.envelope_received",
                envelope_id = %envelope.envelope_id,
                event_type = ?envelope.event.event_type(),
                correlation_id = %envelope.envelope_id,
                channel_id = channel_id.unwrap_or("unknown"),
                user_id = user_id.unwrap_or("unknown"),
                "received slack envelope"
            );

            // Slack retries envelopes that are not acked within 3 seconds
            if let Err(error) = self.transport.acknowledge(&envelope.envelope_id).await {
                warn!(
                    event_name = "ingress.slack.ack_sent",
                    envelope_id = %envelope.envelope_id,
                    correlation_id = %envelope.envelope_id,
                    error = %error,
                    "failed to acknowledge slack envelope"
                );
            } else {
                debug!(
                    event_name = "ingress.slack.ack_sent",
                    envelope_id = %envelope.envelope_id,
                    correlation_id = %envelope.envelope_id,
                    "acknowledged slack envelope"
                );
            }

            let dispatcher = Arc::clone(&self.dispatcher);
            in_flight.spawn(async move { dispatch_envelope(&dispatcher, envelope).await });
        }
    }
}

async fn dispatch_envelope(dispatcher: &EventDispatcher, envelope: SlackEnvelope) {
    let context = EventContext { correlation_id: envelope.envelope_id.clone() };
    if let Err(error) = dispatcher.dispatch(&envelope, &context).await {
        let (channel_id, user_id) = correlation_fields(&envelope);
        warn!(
            envelope_id = %envelope.envelope_id,
            correlation_id = %envelope.envelope_id,
            channel_id = channel_id.unwrap_or("unknown"),
            user_id = user_id.unwrap_or("unknown"),
            error = %error,
            "event dispatch failed; continuing socket loop"
        );
    }
}

async fn drain(in_flight: &mut JoinSet<()>) {
    while let Some(finished) = in_flight.join_next().await {
        log_handler_panic(finished);
    }
}

fn log_handler_panic(finished: Result<(), tokio::task::JoinError>) {
    if let Err(error) = finished {
        error!(error = %error, "event handler task did not complete");
    }
}

fn correlation_fields(envelope: &SlackEnvelope) -> (Option<&str>, Option<&str>) {
    match &envelope.event {
        SlackEvent::SlashCommand(command) => {
            (Some(command.channel_id.as_str()), Some(command.user_id.as_str()))
        }
        SlackEvent::BlockAction(action) => {
            (Some(action.channel_id.as_str()), Some(action.user_id.as_str()))
        }
        SlackEvent::Message(message) => {
            (Some(message.channel_id.as_str()), Some(message.user_id.as_str()))
        }
        SlackEvent::Unsupported { .. } => (None, None),
    }
}
