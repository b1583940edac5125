//! Recording chat client and log capture shared by the handler tests.

use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use threadcast_core::{CommandEvent, MessageRef};

use crate::client::{ChatClient, ClientError, CommandResponse, FileUpload, PostMessage};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecordedCall {
    Post(PostMessage),
    Upload(FileUpload),
    Respond { response_url: String, response: CommandResponse },
}

/// Ordered log shared with other fakes so tests can assert cross-component ordering.
pub type Journal = Arc<Mutex<Vec<String>>>;

#[derive(Default)]
pub struct RecordingClient {
    calls: Mutex<Vec<RecordedCall>>,
    journal: Option<Journal>,
    fail_posts: bool,
    fail_upload_at: Option<usize>,
    upload_delay: Option<Duration>,
}

impl RecordingClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_journal(mut self, journal: Journal) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn failing_posts(mut self) -> Self {
        self.fail_posts = true;
        self
    }

    /// Fails the `index`-th (1-based) upload attempt.
    pub fn failing_upload_at(mut self, index: usize) -> Self {
        self.fail_upload_at = Some(index);
        self
    }

    /// Each upload waits `delay` before it is recorded.
    pub fn slow_uploads(mut self, delay: Duration) -> Self {
        self.upload_delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub fn posts(&self) -> Vec<PostMessage> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                RecordedCall::Post(message) => Some(message),
                _ => None,
            })
            .collect()
    }

    pub fn uploads(&self) -> Vec<FileUpload> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                RecordedCall::Upload(upload) => Some(upload),
                _ => None,
            })
            .collect()
    }

    pub fn responses(&self) -> Vec<CommandResponse> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                RecordedCall::Respond { response, .. } => Some(response),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: RecordedCall, label: String) -> usize {
        if let Some(journal) = &self.journal {
            journal.lock().expect("journal lock").push(label);
        }
        let mut calls = self.calls.lock().expect("calls lock");
        calls.push(call);
        calls.len()
    }
}

#[async_trait]
impl ChatClient for RecordingClient {
    async fn post_message(&self, message: PostMessage) -> Result<MessageRef, ClientError> {
        let channel = message.channel.clone();
        let label = format!("post:{}", message.text);
        let sequence = self.record(RecordedCall::Post(message), label);
        if self.fail_posts {
            return Err(ClientError::Api {
                method: "chat.postMessage".to_owned(),
                error: "channel_not_found".to_owned(),
            });
        }
        Ok(MessageRef::new(channel, format!("1700000000.{sequence:06}")))
    }

    async fn upload_file(&self, upload: FileUpload) -> Result<(), ClientError> {
        if let Some(delay) = self.upload_delay {
            tokio::time::sleep(delay).await;
        }
        let label = format!("upload:{}", upload.filename);
        self.record(RecordedCall::Upload(upload), label);
        let attempts = self.uploads().len();
        if self.fail_upload_at == Some(attempts) {
            return Err(ClientError::Api {
                method: "files.completeUploadExternal".to_owned(),
                error: "ratelimited".to_owned(),
            });
        }
        Ok(())
    }

    async fn respond(
        &self,
        response_url: &str,
        response: CommandResponse,
    ) -> Result<(), ClientError> {
        let label = format!("respond:{}", response.text);
        self.record(
            RecordedCall::Respond { response_url: response_url.to_owned(), response },
            label,
        );
        Ok(())
    }
}

pub fn command(name: &str, text: &str) -> CommandEvent {
    CommandEvent {
        command: name.to_owned(),
        channel_id: "C100".to_owned(),
        user_id: "U200".to_owned(),
        text: text.to_owned(),
        thread_ts: None,
        response_url: Some("https://hooks.slack.test/commands/1".to_owned()),
    }
}

/// Formatted log output captured while a [`capture_logs`] guard is alive.
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    pub fn lines(&self) -> Vec<String> {
        let bytes = self.0.lock().expect("log buffer lock");
        String::from_utf8_lossy(&bytes).lines().map(str::to_owned).collect()
    }

    /// Lines logged at `level`, e.g. `"ERROR"` or `"INFO"`.
    pub fn at_level(&self, level: &str) -> Vec<String> {
        self.lines().into_iter().filter(|line| line.trim_start().starts_with(level)).collect()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().expect("log buffer lock").extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Routes this thread's `tracing` output into a buffer until the guard drops.
pub fn capture_logs() -> (CapturedLogs, tracing::subscriber::DefaultGuard) {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .without_time()
        .with_target(false)
        .with_max_level(tracing::Level::TRACE)
        .finish();
    (logs, tracing::subscriber::set_default(subscriber))
}
