use serde::{Deserialize, Serialize};

/// A slash command invocation, validated at the transport boundary.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandEvent {
    pub command: String,
    pub channel_id: String,
    pub user_id: String,
    pub text: String,
    pub thread_ts: Option<String>,
    pub response_url: Option<String>,
}

impl CommandEvent {
    /// Whether the free-text argument carries anything besides whitespace.
    pub fn has_arguments(&self) -> bool {
        !self.text.trim().is_empty()
    }

    /// Slack mention markup for the invoking user.
    pub fn user_mention(&self) -> String {
        mention(&self.user_id)
    }
}

/// A click on an interactive control attached to a previously posted message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionEvent {
    pub user_id: String,
    pub action_id: String,
    pub channel_id: String,
    pub message_ts: Option<String>,
    pub thread_ts: Option<String>,
}

impl ActionEvent {
    pub fn user_mention(&self) -> String {
        mention(&self.user_id)
    }
}

/// A plain channel message delivered through the Events API.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageEvent {
    pub channel_id: String,
    pub user_id: String,
    pub text: String,
    pub ts: String,
    pub thread_ts: Option<String>,
}

pub fn mention(user_id: &str) -> String {
    format!("<@{user_id}>")
}

#[cfg(test)]
mod tests {
    use super::{mention, CommandEvent};

    fn command(text: &str) -> CommandEvent {
        CommandEvent {
            command: "/generate".to_owned(),
            channel_id: "C1".to_owned(),
            user_id: "U1".to_owned(),
            text: text.to_owned(),
            thread_ts: None,
            response_url: None,
        }
    }

    #[test]
    fn whitespace_only_text_has_no_arguments() {
        assert!(!command("").has_arguments());
        assert!(!command("  \t ").has_arguments());
        assert!(command(" demo ").has_arguments());
    }

    #[test]
    fn mention_wraps_user_id() {
        assert_eq!(mention("U42"), "<@U42>");
        assert_eq!(command("x").user_mention(), "<@U1>");
    }
}
