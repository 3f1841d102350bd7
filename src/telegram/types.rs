//! Subset of the Telegram Bot API object model used by the bot.

use serde::{Deserialize, Serialize};

/// Envelope wrapping every Bot API response.
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,

    pub result: Option<T>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub error_code: Option<i32>,

    #[serde(default)]
    pub parameters: Option<ResponseParameters>,
}

/// Extra information attached to some failed requests.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponseParameters {
    /// Seconds to wait before repeating the request (flood control).
    pub retry_after: Option<u32>,
}

/// An incoming update from `getUpdates`.
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,

    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,

    pub chat: Chat,

    #[serde(default)]
    pub from: Option<User>,

    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,

    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,

    pub is_bot: bool,

    pub first_name: String,

    #[serde(default)]
    pub username: Option<String>,
}

/// Entry of the command menu shown by Telegram clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuCommand {
    pub command: String,
    pub description: String,
}

impl MenuCommand {
    #[must_use]
    pub fn new(command: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            description: description.into(),
        }
    }
}

/// Formatting applied to outgoing text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParseMode {
    #[default]
    Plain,
    Html,
}

impl ParseMode {
    /// Value of the `parse_mode` request field, if any.
    #[must_use]
    pub const fn as_api_str(self) -> Option<&'static str> {
        match self {
            Self::Plain => None,
            Self::Html => Some("HTML"),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct SendMessageParams<'a> {
    pub chat_id: i64,
    pub text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_mode: Option<&'static str>,
    pub disable_web_page_preview: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct GetUpdatesParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<i64>,
    pub timeout: u64,
    pub allowed_updates: &'static [&'static str],
}

#[derive(Debug, Serialize)]
pub(crate) struct SetMyCommandsParams<'a> {
    pub commands: &'a [MenuCommand],
}
