use serde::{Deserialize, Serialize};

/// Display message handed to a chat transport: body text plus optional
/// attachment blocks. Interactive framing (buttons, callback routing) rides
/// inside the attachments; the core never talks to the wire directly.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

impl Message {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            attachments: Vec::new(),
        }
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }
}

/// One attachment block: a titled summary with short fields and optional
/// selectable actions routed back through `callback_id`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub title: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub text: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub color: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<AttachmentField>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<MessageAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// One labeled value inside an attachment summary block.
pub struct AttachmentField {
    pub title: String,
    pub value: String,
    pub short: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// Enumerates supported `ActionStyle` values.
pub enum ActionStyle {
    Default,
    Danger,
}

/// Confirmation dialog attached to a destructive action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionConfirm {
    pub title: String,
    pub text: String,
    pub ok_label: String,
    pub dismiss_label: String,
}

/// A selectable action button; `value` comes back verbatim in the
/// interactive callback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageAction {
    pub name: String,
    pub label: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<ActionStyle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirm: Option<ActionConfirm>,
}

impl MessageAction {
    pub fn button(name: impl Into<String>, label: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            value: name.clone(),
            name,
            label: label.into(),
            style: None,
            confirm: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// Enumerates supported `InboundKind` values.
pub enum InboundKind {
    DirectMessage,
    DirectMention,
    Mention,
}

impl InboundKind {
    pub fn is_direct_message(self) -> bool {
        matches!(self, Self::DirectMessage)
    }
}

/// An inbound chat message as handed to the command layer by the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub kind: InboundKind,
    pub user_id: String,
    pub channel_id: String,
    pub text: String,
}

/// A button press relayed back by the transport's interactive callback hook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractiveAction {
    pub callback_id: String,
    pub value: String,
    pub user_id: String,
    pub channel_id: String,
}
