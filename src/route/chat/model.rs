use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

pub const MAX_MESSAGE_LENGTH: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
	System,
	User,
	Assistant,
}

impl ChatRole {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::System => "system",
			Self::User => "user",
			Self::Assistant => "assistant",
		}
	}

	/// Maps a stored role onto the roles the assistant understands. Anything
	/// that is not the user, including the legacy `bot`, was said by the assistant.
	pub fn normalize(role: &str) -> Self {
		match role {
			"user" => Self::User,
			"system" => Self::System,
			_ => Self::Assistant,
		}
	}
}

impl From<String> for ChatRole {
	fn from(value: String) -> Self {
		Self::normalize(&value)
	}
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ChatMessage {
	/// Monotonic per store, breaks ties between equal timestamps.
	pub id: i64,
	#[serde(skip)]
	pub user_id: Uuid,
	#[sqlx(try_from = "String")]
	pub role: ChatRole,
	pub content: String,
	pub created_at: DateTime<Utc>,
}

/// One entry of the context window sent to the assistant.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ContextMessage {
	pub role: ChatRole,
	pub content: String,
}

impl From<ChatMessage> for ContextMessage {
	fn from(message: ChatMessage) -> Self {
		Self {
			role: message.role,
			content: message.content,
		}
	}
}

/// The message is trimmed and checked by [`super::window::normalize_message`].
#[derive(Debug, Deserialize, Validate)]
pub struct SendInput {
	pub message: String,
}

#[derive(Debug, Serialize)]
pub struct Reply {
	pub reply: String,
}

#[derive(Debug, Serialize)]
pub struct History {
	pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
pub struct Health {
	pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct Cleared {
	pub deleted: u64,
}
