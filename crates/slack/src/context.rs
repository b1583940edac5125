use std::path::PathBuf;
use std::sync::Arc;

use crate::client::ChatClient;

/// Shared state handed to every handler at registration time.
#[derive(Clone)]
pub struct AppContext {
    pub client: Arc<dyn ChatClient>,
    pub images_dir: PathBuf,
}

impl AppContext {
    pub fn new(client: Arc<dyn ChatClient>, images_dir: impl Into<PathBuf>) -> Self {
        Self { client, images_dir: images_dir.into() }
    }
}

impl std::fmt::Debug for AppContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContext").field("images_dir", &self.images_dir).finish_non_exhaustive()
    }
}
