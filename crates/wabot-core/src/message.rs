use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One text-bearing field of an inbound message.
///
/// Messages can carry several of these at once; [`extract_text`] picks the
/// first non-empty one by rank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageContent {
    Text(String),
    ExtendedText(String),
    ImageCaption(String),
    VideoCaption(String),
    DocumentCaption(String),
    ButtonsResponse {
        display_text: Option<String>,
        button_id: Option<String>,
    },
    ListResponse {
        row_id: Option<String>,
        title: Option<String>,
    },
    TemplateButtonReply {
        display_text: Option<String>,
        id: Option<String>,
    },
    InteractiveResponse {
        body: Option<String>,
        params_json: Option<String>,
    },
    /// Disappearing-message wrapper.
    Ephemeral(Vec<MessageContent>),
    /// Copy of a message sent from another of the account's devices.
    DeviceSent(Vec<MessageContent>),
}

impl MessageContent {
    fn rank(&self) -> u8 {
        match self {
            Self::Text(_) => 0,
            Self::ExtendedText(_) => 1,
            Self::ImageCaption(_) => 2,
            Self::VideoCaption(_) => 3,
            Self::DocumentCaption(_) => 4,
            Self::ButtonsResponse { .. } => 5,
            Self::ListResponse { .. } => 6,
            Self::TemplateButtonReply { .. } => 7,
            Self::InteractiveResponse { .. } => 8,
            Self::Ephemeral(_) => 9,
            Self::DeviceSent(_) => 10,
        }
    }

    fn text(&self) -> Option<String> {
        match self {
            Self::Text(t)
            | Self::ExtendedText(t)
            | Self::ImageCaption(t)
            | Self::VideoCaption(t)
            | Self::DocumentCaption(t) => non_empty(Some(t)),
            Self::ButtonsResponse {
                display_text,
                button_id,
            } => non_empty(display_text.as_ref()).or_else(|| non_empty(button_id.as_ref())),
            Self::ListResponse { row_id, title } => {
                non_empty(row_id.as_ref()).or_else(|| non_empty(title.as_ref()))
            }
            Self::TemplateButtonReply { display_text, id } => {
                non_empty(display_text.as_ref()).or_else(|| non_empty(id.as_ref()))
            }
            Self::InteractiveResponse { body, params_json } => {
                non_empty(body.as_ref()).or_else(|| non_empty(params_json.as_ref()))
            }
            Self::Ephemeral(inner) | Self::DeviceSent(inner) => {
                let text = extract_text(inner);
                (!text.is_empty()).then_some(text)
            }
        }
    }
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value.filter(|v| !v.is_empty()).cloned()
}

/// The human-readable text of a message: the first non-empty candidate in
/// rank order, or an empty string.
pub fn extract_text(contents: &[MessageContent]) -> String {
    let mut ranked: Vec<&MessageContent> = contents.iter().collect();
    ranked.sort_by_key(|c| c.rank());
    ranked.into_iter().find_map(|c| c.text()).unwrap_or_default()
}

/// A message received from the transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Transport message id.
    pub id: String,
    /// Conversation the message belongs to (group or individual address).
    pub chat_id: String,
    /// Sender's user part (phone digits).
    pub sender_id: String,
    /// Display name, if the sender set one.
    pub sender_name: Option<String>,
    pub is_group: bool,
    pub timestamp: DateTime<Utc>,
    pub contents: Vec<MessageContent>,
}

impl InboundMessage {
    pub fn text(&self) -> String {
        extract_text(&self.contents)
    }
}

/// A group the connected account participates in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupInfo {
    pub id: String,
    pub name: String,
    pub owner: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}
