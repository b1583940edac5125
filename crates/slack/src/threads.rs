//! Threaded follow-ups anchored to a previously posted parent message.

use std::io;

use thiserror::Error;
use threadcast_core::{CommandEvent, FileDescriptor, MessageRef};
use tracing::{error, info};

use crate::blocks::generated_content_message;
use crate::client::{ChatClient, ClientError, FileUpload, PostMessage};

#[derive(Debug, Error)]
pub enum UploadFailure {
    #[error("could not read file: {0}")]
    Read(#[from] io::Error),
    #[error(transparent)]
    Client(#[from] ClientError),
}

/// The batch stopped at `index` (1-based); `uploaded` files went through before it.
#[derive(Debug, Error)]
#[error("upload of file {index} (`{name}`) failed after {uploaded} uploaded: {source}")]
pub struct UploadError {
    pub index: usize,
    pub name: String,
    pub uploaded: usize,
    #[source]
    pub source: UploadFailure,
}

/// Posts the command text as a code block in the parent's thread.
///
/// Failures are logged and reported as `None`.
pub async fn post_thread(
    parent: &MessageRef,
    command: &CommandEvent,
    client: &dyn ChatClient,
) -> Option<MessageRef> {
    let message = PostMessage::from_template(
        command.channel_id.clone(),
        generated_content_message(&command.text),
    )
    .in_thread(Some(parent.ts.clone()));

    match client.post_message(message).await {
        Ok(reply) => Some(reply),
        Err(error) => {
            error!(
                event_name = "threads.post_thread.failed",
                channel_id = %command.channel_id,
                thread_ts = %parent.ts,
                error = %error,
                "failed to post generated content to thread"
            );
            None
        }
    }
}

/// Uploads `files` one by one into the parent's thread, stopping at the first
/// failure. Returns how many files were uploaded.
pub async fn post_images(
    parent: &MessageRef,
    command: &CommandEvent,
    client: &dyn ChatClient,
    files: &[FileDescriptor],
) -> Result<usize, UploadError> {
    if files.is_empty() {
        info!(
            event_name = "threads.post_images.empty",
            channel_id = %command.channel_id,
            "no files to upload"
        );
        return Ok(0);
    }

    for (position, file) in files.iter().enumerate() {
        upload_one(parent, command, client, file).await.map_err(|source| UploadError {
            index: position + 1,
            name: file.name.clone(),
            uploaded: position,
            source,
        })?;
    }

    info!(
        event_name = "threads.post_images.completed",
        channel_id = %command.channel_id,
        thread_ts = %parent.ts,
        uploaded = files.len(),
        "uploaded {} files",
        files.len()
    );
    Ok(files.len())
}

async fn upload_one(
    parent: &MessageRef,
    command: &CommandEvent,
    client: &dyn ChatClient,
    file: &FileDescriptor,
) -> Result<(), UploadFailure> {
    let content = tokio::fs::read(&file.path).await?;
    client
        .upload_file(FileUpload {
            channel: command.channel_id.clone(),
            thread_ts: parent.ts.clone(),
            filename: file.name.clone(),
            title: file.title().to_owned(),
            content,
        })
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use threadcast_core::{FileDescriptor, MessageRef};

    use super::{post_images, post_thread, UploadFailure};
    use crate::testing::{capture_logs, command, RecordingClient};

    fn parent() -> MessageRef {
        MessageRef::new("C100", "1700000000.000001")
    }

    fn fixture_files(dir: &tempfile::TempDir, names: &[&str]) -> Vec<FileDescriptor> {
        names
            .iter()
            .map(|name| {
                let path = dir.path().join(name);
                fs::write(&path, name.as_bytes()).expect("write fixture");
                FileDescriptor::from_path(path).expect("descriptor")
            })
            .collect()
    }

    #[tokio::test]
    async fn post_thread_replies_in_parent_thread_with_code_block() {
        let client = RecordingClient::new();
        let reply = post_thread(&parent(), &command("/generate", "seed=7"), &client).await;

        assert!(reply.is_some());
        let posts = client.posts();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].text, "seed=7");
        assert_eq!(posts[0].thread_ts.as_deref(), Some("1700000000.000001"));
        let value = serde_json::to_value(&posts[0].blocks).expect("serialize");
        assert_eq!(value[0]["text"]["text"], "*Generated content:*\n```seed=7```");
    }

    #[tokio::test]
    async fn post_thread_swallows_client_failure() {
        let client = RecordingClient::new().failing_posts();
        let reply = post_thread(&parent(), &command("/generate", "seed=7"), &client).await;
        assert!(reply.is_none());
    }

    #[tokio::test]
    async fn post_images_is_noop_for_empty_batch() {
        let (logs, _guard) = capture_logs();
        let client = RecordingClient::new();
        let uploaded =
            post_images(&parent(), &command("/generate", "demo"), &client, &[]).await.expect("ok");

        assert_eq!(uploaded, 0);
        assert!(client.calls().is_empty());
        let info = logs.at_level("INFO");
        assert_eq!(info.len(), 1);
        assert!(info[0].contains("no files to upload"));
        assert!(logs.at_level("ERROR").is_empty());
    }

    #[tokio::test]
    async fn post_images_uploads_each_file_in_order_with_title() {
        let dir = tempfile::tempdir().expect("tempdir");
        let files = fixture_files(&dir, &["a.png", "b.gif"]);
        let client = RecordingClient::new();

        let uploaded = post_images(&parent(), &command("/generate", "demo"), &client, &files)
            .await
            .expect("uploads succeed");

        assert_eq!(uploaded, 2);
        let uploads = client.uploads();
        assert_eq!(uploads.len(), 2);
        assert_eq!(uploads[0].filename, "a.png");
        assert_eq!(uploads[0].title, "File a.png");
        assert_eq!(uploads[0].content, b"a.png".to_vec());
        assert_eq!(uploads[0].thread_ts, "1700000000.000001");
        assert_eq!(uploads[0].channel, "C100");
        assert_eq!(uploads[1].filename, "b.gif");
    }

    #[tokio::test]
    async fn post_images_stops_at_first_failed_upload() {
        let dir = tempfile::tempdir().expect("tempdir");
        let files = fixture_files(&dir, &["1.png", "2.png", "3.png", "4.png"]);
        let client = RecordingClient::new().failing_upload_at(2);

        let error = post_images(&parent(), &command("/generate", "demo"), &client, &files)
            .await
            .expect_err("second upload fails");

        assert_eq!(error.index, 2);
        assert_eq!(error.name, "2.png");
        assert_eq!(error.uploaded, 1);
        assert!(matches!(error.source, UploadFailure::Client(_)));
        assert_eq!(client.uploads().len(), 2);
    }

    #[tokio::test]
    async fn post_images_reports_unreadable_file_without_calling_client() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut files = fixture_files(&dir, &["1.png"]);
        let missing = dir.path().join("gone.png");
        files.insert(0, FileDescriptor::from_path(missing).expect("descriptor"));
        let client = RecordingClient::new();

        let error = post_images(&parent(), &command("/generate", "demo"), &client, &files)
            .await
            .expect_err("missing file fails");

        assert_eq!(error.index, 1);
        assert!(matches!(error.source, UploadFailure::Read(_)));
        assert!(client.uploads().is_empty());
    }
}
