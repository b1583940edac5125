use serde::Serialize;

pub const BUTTON_CLICK_ACTION: &str = "button_click";
pub const RERUN_EXPERIMENT_ACTION: &str = "rerun_experiment";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum TextObject {
    #[serde(rename = "plain_text")]
    Plain { text: String },
    #[serde(rename = "mrkdwn")]
    Mrkdwn { text: String },
}

impl TextObject {
    pub fn plain(text: impl Into<String>) -> Self {
        Self::Plain { text: text.into() }
    }

    pub fn mrkdwn(text: impl Into<String>) -> Self {
        Self::Mrkdwn { text: text.into() }
    }

    pub fn text(&self) -> &str {
        match self {
            Self::Plain { text } | Self::Mrkdwn { text } => text,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ButtonElement {
    pub action_id: String,
    pub text: TextObject,
}

impl ButtonElement {
    pub fn new(action_id: impl Into<String>, label: impl Into<String>) -> Self {
        Self { action_id: action_id.into(), text: TextObject::plain(label) }
    }
}

/// Interactive element placed inside a block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Element {
    Button(ButtonElement),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Section {
        text: TextObject,
        #[serde(skip_serializing_if = "Option::is_none")]
        accessory: Option<Element>,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MessageTemplate {
    pub fallback_text: String,
    pub blocks: Vec<Block>,
}

impl MessageTemplate {
    /// Message with no layout blocks; Slack renders `fallback_text` as is.
    pub fn plain(text: impl Into<String>) -> Self {
        Self { fallback_text: text.into(), blocks: Vec::new() }
    }
}

pub struct MessageBuilder {
    fallback_text: String,
    blocks: Vec<Block>,
}

impl MessageBuilder {
    pub fn new(fallback_text: impl Into<String>) -> Self {
        Self { fallback_text: fallback_text.into(), blocks: Vec::new() }
    }

    pub fn section<F>(mut self, build: F) -> Self
    where
        F: FnOnce(&mut SectionBuilder),
    {
        let mut builder = SectionBuilder::default();
        build(&mut builder);
        self.blocks.push(builder.build());
        self
    }

    pub fn build(self) -> MessageTemplate {
        MessageTemplate { fallback_text: self.fallback_text, blocks: self.blocks }
    }
}

#[derive(Default)]
pub struct SectionBuilder {
    text: Option<TextObject>,
    accessory: Option<Element>,
}

impl SectionBuilder {
    pub fn mrkdwn(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::mrkdwn(text));
        self
    }

    pub fn button(&mut self, button: ButtonElement) -> &mut Self {
        self.accessory = Some(Element::Button(button));
        self
    }

    fn build(self) -> Block {
        Block::Section {
            text: self.text.unwrap_or_else(|| TextObject::mrkdwn("")),
            accessory: self.accessory,
        }
    }
}

/// Greeting posted by `/hello`, with a `Click Me` button.
pub fn hello_message(user_mention: &str) -> MessageTemplate {
    let greeting = format!("{user_mention}, hello");
    MessageBuilder::new(greeting.clone())
        .section(|section| {
            section.mrkdwn(greeting).button(ButtonElement::new(BUTTON_CLICK_ACTION, "Click Me"));
        })
        .build()
}

/// Parent message for `/generate`; uploaded images thread under it.
pub fn experiment_submitted_message(user_mention: &str) -> MessageTemplate {
    MessageBuilder::new(format!("{user_mention} submitted the experiment"))
        .section(|section| {
            // "parmeters" is the wording users already see in channel history
            section
                .mrkdwn(format!(
                    "{user_mention} submitted an experiment with the following parmeters"
                ))
                .button(ButtonElement::new(RERUN_EXPERIMENT_ACTION, "Rerun this experiment"));
        })
        .build()
}

pub fn generated_content_message(command_text: &str) -> MessageTemplate {
    MessageBuilder::new(command_text.to_owned())
        .section(|section| {
            section.mrkdwn(format!("*Generated content:*\n```{command_text}```"));
        })
        .build()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{
        experiment_submitted_message, generated_content_message, hello_message, Block,
        ButtonElement, Element, MessageBuilder, MessageTemplate, TextObject, BUTTON_CLICK_ACTION,
        RERUN_EXPERIMENT_ACTION,
    };

    fn accessory_button(message: &MessageTemplate) -> Option<&ButtonElement> {
        message.blocks.iter().find_map(|block| match block {
            Block::Section { accessory: Some(Element::Button(button)), .. } => Some(button),
            Block::Section { .. } => None,
        })
    }

    #[test]
    fn section_builder_defaults_to_empty_text_without_accessory() {
        let message = MessageBuilder::new("fallback").section(|_| {}).build();

        assert_eq!(
            message.blocks,
            vec![Block::Section { text: TextObject::mrkdwn(""), accessory: None }]
        );
    }

    #[test]
    fn hello_message_carries_click_me_button() {
        let message = hello_message("<@U1>");

        assert_eq!(message.fallback_text, "<@U1>, hello");
        let button = accessory_button(&message).expect("button accessory");
        assert_eq!(button.action_id, BUTTON_CLICK_ACTION);
        assert_eq!(button.text, TextObject::plain("Click Me"));
    }

    #[test]
    fn experiment_message_offers_rerun() {
        let message = experiment_submitted_message("<@U2>");

        assert_eq!(message.fallback_text, "<@U2> submitted the experiment");
        let button = accessory_button(&message).expect("button accessory");
        assert_eq!(button.action_id, RERUN_EXPERIMENT_ACTION);
        assert_eq!(button.text, TextObject::plain("Rerun this experiment"));
        let Block::Section { text, .. } = &message.blocks[0];
        assert!(text.text().starts_with("<@U2> submitted an experiment"));
    }

    #[test]
    fn generated_content_wraps_text_in_code_block() {
        let message = generated_content_message("demo run");

        assert_eq!(message.fallback_text, "demo run");
        assert!(accessory_button(&message).is_none());
        let Block::Section { text, .. } = &message.blocks[0];
        assert_eq!(text.text(), "*Generated content:*\n```demo run```");
    }

    #[test]
    fn serializes_to_block_kit_json() {
        let value = serde_json::to_value(&hello_message("<@U1>").blocks).expect("serialize");

        assert_eq!(
            value,
            json!([{
                "type": "section",
                "text": {"type": "mrkdwn", "text": "<@U1>, hello"},
                "accessory": {
                    "type": "button",
                    "action_id": "button_click",
                    "text": {"type": "plain_text", "text": "Click Me"}
                }
            }])
        );
    }

    #[test]
    fn plain_template_has_no_blocks() {
        let message = MessageTemplate::plain("just text");
        assert!(message.blocks.is_empty());
        assert!(accessory_button(&message).is_none());
    }
}
