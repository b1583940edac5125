use std::sync::Arc;

use threadcast_core::config::{AppConfig, ConfigError};
use threadcast_slack::{
    build_dispatcher, AppContext, ReconnectPolicy, SlackWebClient, SocketModeRunner,
    WebSocketTransport,
};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub context: AppContext,
    pub slack_runner: SocketModeRunner,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );
    config.validate()?;

    let client = SlackWebClient::new(config.slack.bot_token.clone())
        .with_api_base(config.slack.api_base_url.as_str());
    let context = AppContext::new(Arc::new(client.clone()), config.images.dir.clone());
    let transport = WebSocketTransport::new(client, config.slack.app_token.clone());
    let slack_runner = SocketModeRunner::new(
        Arc::new(transport),
        build_dispatcher(&context),
        ReconnectPolicy::default(),
    );

    info!(
        event_name = "system.bootstrap.ready",
        correlation_id = "bootstrap",
        api_base_url = %config.slack.api_base_url,
        images_dir = %context.images_dir.display(),
        "slack client and socket mode runner initialized"
    );

    Ok(Application { config, context, slack_runner })
}
