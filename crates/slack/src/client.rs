//! Outbound Slack calls.
//!
//! Handlers only see the [`ChatClient`] capability set. [`SlackWebClient`] is
//! the production implementation over the Slack Web API; tests substitute a
//! recording fake.

use std::fmt;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use threadcast_core::config::DEFAULT_SLACK_API_BASE_URL;
use threadcast_core::MessageRef;
use tracing::{debug, warn};

use crate::blocks::{Block, MessageTemplate};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PostMessage {
    pub channel: String,
    pub text: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub blocks: Vec<Block>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_ts: Option<String>,
}

impl PostMessage {
    pub fn text(channel: impl Into<String>, text: impl Into<String>) -> Self {
        Self::from_template(channel, MessageTemplate::plain(text))
    }

    pub fn from_template(channel: impl Into<String>, template: MessageTemplate) -> Self {
        Self {
            channel: channel.into(),
            text: template.fallback_text,
            blocks: template.blocks,
            thread_ts: None,
        }
    }

    pub fn in_thread(mut self, thread_ts: Option<String>) -> Self {
        self.thread_ts = thread_ts;
        self
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct FileUpload {
    pub channel: String,
    pub thread_ts: String,
    pub filename: String,
    pub title: String,
    pub content: Vec<u8>,
}

impl fmt::Debug for FileUpload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileUpload")
            .field("channel", &self.channel)
            .field("thread_ts", &self.thread_ts)
            .field("filename", &self.filename)
            .field("title", &self.title)
            .field("content_len", &self.content.len())
            .finish()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    Ephemeral,
    InChannel,
}

/// Reply sent through a slash command's `response_url`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CommandResponse {
    pub text: String,
    pub response_type: ResponseType,
}

impl CommandResponse {
    pub fn ephemeral(text: impl Into<String>) -> Self {
        Self { text: text.into(), response_type: ResponseType::Ephemeral }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ClientError {
    #[error("{method} request failed: {message}")]
    Request { method: String, message: String },
    #[error("{method} error: {error}")]
    Api { method: String, error: String },
    #[error("{method} response missing `{field}`")]
    MissingField { method: String, field: &'static str },
}

#[async_trait]
pub trait ChatClient: Send + Sync {
    /// `chat.postMessage`; the returned reference anchors threaded replies.
    async fn post_message(&self, message: PostMessage) -> Result<MessageRef, ClientError>;

    /// Attaches file bytes to a thread.
    async fn upload_file(&self, upload: FileUpload) -> Result<(), ClientError>;

    /// Replies through a command's `response_url`.
    async fn respond(
        &self,
        response_url: &str,
        response: CommandResponse,
    ) -> Result<(), ClientError>;
}

#[derive(Debug, Deserialize)]
struct SlackApiResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    ts: Option<String>,
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    upload_url: Option<String>,
    #[serde(default)]
    file_id: Option<String>,
}

#[derive(Clone, Debug)]
pub struct SlackWebClient {
    http: reqwest::Client,
    bot_token: SecretString,
    api_base: String,
}

impl SlackWebClient {
    pub fn new(bot_token: SecretString) -> Self {
        Self {
            http: reqwest::Client::new(),
            bot_token,
            api_base: DEFAULT_SLACK_API_BASE_URL.to_owned(),
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_owned();
        self
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Opens a Socket Mode session and returns its WebSocket URL. Authenticates
    /// with the app-level token rather than the bot token.
    pub async fn connections_open(&self, app_token: &SecretString) -> Result<String, ClientError> {
        const METHOD: &str = "apps.connections.open";
        debug!("opening socket mode connection");
        let response = self
            .http
            .post(self.method_url(METHOD))
            .bearer_auth(app_token.expose_secret())
            .header("Content-Type", "application/x-www-form-urlencoded")
            .send()
            .await
            .map_err(|error| request_error(METHOD, error))?;

        let api_response = parse_api_response(METHOD, response).await?;
        api_response.url.ok_or_else(|| missing_field(METHOD, "url"))
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{method}", self.api_base)
    }

    async fn call_bot_api(
        &self,
        method: &str,
        body: &serde_json::Value,
    ) -> Result<SlackApiResponse, ClientError> {
        let response = self
            .http
            .post(self.method_url(method))
            .bearer_auth(self.bot_token.expose_secret())
            .json(body)
            .send()
            .await
            .map_err(|error| request_error(method, error))?;

        parse_api_response(method, response).await
    }
}

#[async_trait]
impl ChatClient for SlackWebClient {
    async fn post_message(&self, message: PostMessage) -> Result<MessageRef, ClientError> {
        const METHOD: &str = "chat.postMessage";
        let body = serde_json::to_value(&message).map_err(|error| ClientError::Request {
            method: METHOD.to_owned(),
            message: format!("could not encode message: {error}"),
        })?;
        debug!(channel = %message.channel, thread_ts = ?message.thread_ts, "posting message");

        let response = self.call_bot_api(METHOD, &body).await?;
        let ts = response.ts.ok_or_else(|| missing_field(METHOD, "ts"))?;
        let channel = response.channel.unwrap_or(message.channel);
        Ok(MessageRef::new(channel, ts))
    }

    async fn upload_file(&self, upload: FileUpload) -> Result<(), ClientError> {
        const GET_URL: &str = "files.getUploadURLExternal";
        const COMPLETE: &str = "files.completeUploadExternal";
        debug!(channel = %upload.channel, filename = %upload.filename, "uploading file");

        let length = upload.content.len().to_string();
        let response = self
            .http
            .post(self.method_url(GET_URL))
            .bearer_auth(self.bot_token.expose_secret())
            .form(&[("filename", upload.filename.as_str()), ("length", length.as_str())])
            .send()
            .await
            .map_err(|error| request_error(GET_URL, error))?;
        let ticket = parse_api_response(GET_URL, response).await?;
        let upload_url = ticket.upload_url.ok_or_else(|| missing_field(GET_URL, "upload_url"))?;
        let file_id = ticket.file_id.ok_or_else(|| missing_field(GET_URL, "file_id"))?;

        self.http
            .post(&upload_url)
            .body(upload.content)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|error| request_error("file upload", error))?;

        let body = serde_json::json!({
            "files": [{ "id": file_id, "title": upload.title }],
            "channel_id": upload.channel,
            "thread_ts": upload.thread_ts,
        });
        self.call_bot_api(COMPLETE, &body).await?;
        Ok(())
    }

    async fn respond(
        &self,
        response_url: &str,
        response: CommandResponse,
    ) -> Result<(), ClientError> {
        const METHOD: &str = "response_url";
        self.http
            .post(response_url)
            .json(&response)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|error| request_error(METHOD, error))?;
        Ok(())
    }
}

async fn parse_api_response(
    method: &str,
    response: reqwest::Response,
) -> Result<SlackApiResponse, ClientError> {
    let api_response: SlackApiResponse = response.json().await.map_err(|error| {
        ClientError::Request {
            method: method.to_owned(),
            message: format!("response parse failed: {error}"),
        }
    })?;

    if !api_response.ok {
        let error = api_response.error.unwrap_or_else(|| "unknown".to_owned());
        warn!(method, error = %error, "slack api error");
        return Err(ClientError::Api { method: method.to_owned(), error });
    }

    Ok(api_response)
}

fn request_error(method: &str, error: reqwest::Error) -> ClientError {
    ClientError::Request { method: method.to_owned(), message: error.to_string() }
}

fn missing_field(method: &str, field: &'static str) -> ClientError {
    ClientError::MissingField { method: method.to_owned(), field }
}
