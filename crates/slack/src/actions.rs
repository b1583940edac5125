use threadcast_core::{ActionEvent, MessageRef};
use tracing::{debug, error, info};

use crate::blocks::{BUTTON_CLICK_ACTION, RERUN_EXPERIMENT_ACTION};
use crate::client::PostMessage;
use crate::context::AppContext;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ActionOutcome {
    Replied(MessageRef),
    Failed,
    Unsupported,
}

/// Replies to clicks on the buttons attached by `/hello` and `/generate`.
pub struct ActionRouter {
    ctx: AppContext,
}

impl ActionRouter {
    pub fn new(ctx: AppContext) -> Self {
        Self { ctx }
    }

    pub async fn route(&self, action: &ActionEvent) -> ActionOutcome {
        let Some(reply) = reply_text(action) else {
            debug!(action_id = %action.action_id, "ignoring unsupported block action");
            return ActionOutcome::Unsupported;
        };

        info!(
            event_name = "actions.received",
            action_id = %action.action_id,
            channel_id = %action.channel_id,
            user_id = %action.user_id,
            "handling block action"
        );

        let message = PostMessage::text(action.channel_id.clone(), reply);
        match self.ctx.client.post_message(message).await {
            Ok(posted) => ActionOutcome::Replied(posted),
            Err(error) => {
                error!(
                    event_name = "actions.reply.failed",
                    action_id = %action.action_id,
                    channel_id = %action.channel_id,
                    error = %error,
                    "failed to reply to block action"
                );
                ActionOutcome::Failed
            }
        }
    }
}

fn reply_text(action: &ActionEvent) -> Option<String> {
    let mention = action.user_mention();
    match action.action_id.as_str() {
        BUTTON_CLICK_ACTION => Some(format!("{mention} clicked the button")),
        RERUN_EXPERIMENT_ACTION => Some(format!("{mention} retrigger the experiment")),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use threadcast_core::ActionEvent;

    use super::{ActionOutcome, ActionRouter};
    use crate::context::AppContext;
    use crate::testing::RecordingClient;

    fn action(action_id: &str) -> ActionEvent {
        ActionEvent {
            user_id: "U9".to_owned(),
            action_id: action_id.to_owned(),
            channel_id: "C5".to_owned(),
            message_ts: Some("1700000000.000001".to_owned()),
            thread_ts: None,
        }
    }

    fn router(client: Arc<RecordingClient>) -> ActionRouter {
        ActionRouter::new(AppContext::new(client, "static/images"))
    }

    #[tokio::test]
    async fn button_click_names_the_clicking_user() {
        let client = Arc::new(RecordingClient::new());

        let outcome = router(client.clone()).route(&action("button_click")).await;

        assert!(matches!(outcome, ActionOutcome::Replied(_)));
        let posts = client.posts();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].channel, "C5");
        assert_eq!(posts[0].text, "<@U9> clicked the button");
        assert!(posts[0].blocks.is_empty());
    }

    #[tokio::test]
    async fn rerun_experiment_has_its_own_reply() {
        let client = Arc::new(RecordingClient::new());

        router(client.clone()).route(&action("rerun_experiment")).await;

        let posts = client.posts();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].text, "<@U9> retrigger the experiment");
    }

    #[tokio::test]
    async fn reply_failure_is_contained() {
        let client = Arc::new(RecordingClient::new().failing_posts());

        let outcome = router(client.clone()).route(&action("button_click")).await;

        assert_eq!(outcome, ActionOutcome::Failed);
        assert_eq!(client.posts().len(), 1);
    }

    #[tokio::test]
    async fn unknown_action_posts_nothing() {
        let client = Arc::new(RecordingClient::new());

        let outcome = router(client.clone()).route(&action("approve_quote")).await;

        assert_eq!(outcome, ActionOutcome::Unsupported);
        assert!(client.calls().is_empty());
    }
}
