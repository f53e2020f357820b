//! Per-user chat history and the context window sent to the assistant.

use uuid::Uuid;

use super::{
	model::{ChatMessage, ChatRole, ContextMessage, MAX_MESSAGE_LENGTH},
	Error, RouteError,
};
use crate::store::{self, Store};

/// Messages kept per user. Older ones are removed after every insert.
pub const HISTORY_CAP: i64 = 100;
/// Prior messages included in the context window.
pub const CONTEXT_MESSAGES: i64 = 10;
/// Messages returned by the history endpoint.
pub const HISTORY_PAGE: i64 = 20;

pub const PERSONA: &str = "You are Bapsimi, a friendly cooking assistant. You help with recipes, \
	cooking tips, ingredient information and food recommendations, and you are especially good at \
	suggesting dishes for the weather or the user's mood. Answer briefly and warmly, in under 200 \
	characters, in the language the user writes in.";

/// Trims a message and checks its length.
pub fn normalize_message(content: &str) -> Result<&str, Error> {
	let content = content.trim();

	if content.is_empty() {
		return Err(Error::EmptyMessage);
	}

	if content.chars().count() > MAX_MESSAGE_LENGTH {
		return Err(Error::MessageTooLong);
	}

	Ok(content)
}

/// Builds the window: the persona, the prior messages oldest first, then the
/// new message.
pub fn context_window(history: Vec<ChatMessage>, current: ContextMessage) -> Vec<ContextMessage> {
	let mut window = Vec::with_capacity(history.len() + 2);

	window.push(ContextMessage {
		role: ChatRole::System,
		content: PERSONA.to_owned(),
	});
	window.extend(history.into_iter().map(ContextMessage::from));
	window.push(current);

	window
}

async fn insert_and_prune(
	database: &dyn Store,
	user_id: Uuid,
	role: ChatRole,
	content: &str,
) -> store::Result<ChatMessage> {
	let message = database.insert_chat_message(user_id, role, content).await?;
	let pruned = database.prune_chat_messages(user_id, HISTORY_CAP).await?;

	if pruned > 0 {
		tracing::debug!(user = %user_id, pruned, "pruned chat history");
	}

	Ok(message)
}

/// Stores a new message and returns the context window to send to the
/// assistant. The prior messages are read before the new one is stored.
pub async fn append_and_get_context(
	database: &dyn Store,
	user_id: Uuid,
	role: ChatRole,
	content: &str,
) -> Result<Vec<ContextMessage>, RouteError> {
	let content = normalize_message(content)?;
	let history = database
		.recent_chat_messages(user_id, CONTEXT_MESSAGES)
		.await?;

	insert_and_prune(database, user_id, role, content).await?;

	Ok(context_window(
		history,
		ContextMessage {
			role,
			content: content.to_owned(),
		},
	))
}

/// Stores the assistant's reply.
pub async fn record_reply(
	database: &dyn Store,
	user_id: Uuid,
	content: &str,
) -> store::Result<ChatMessage> {
	insert_and_prune(database, user_id, ChatRole::Assistant, content).await
}

/// The `limit` most recent messages of a user, oldest first.
pub async fn history(
	database: &dyn Store,
	user_id: Uuid,
	limit: i64,
) -> store::Result<Vec<ChatMessage>> {
	database.recent_chat_messages(user_id, limit).await
}

/// Deletes every message of a user, returning how many there were.
pub async fn clear_history(database: &dyn Store, user_id: Uuid) -> store::Result<u64> {
	let deleted = database.clear_chat_messages(user_id).await?;

	tracing::info!(user = %user_id, deleted, "cleared chat history");

	Ok(deleted)
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::test::*;

	#[test]
	fn test_normalize_message() {
		assert_eq!(normalize_message("  hi  ").unwrap(), "hi");
		assert!(matches!(normalize_message(" \n "), Err(Error::EmptyMessage)));
		assert!(matches!(
			normalize_message(&"a".repeat(501)),
			Err(Error::MessageTooLong)
		));
		assert!(normalize_message(&"a".repeat(500)).is_ok());
	}

	#[tokio::test]
	async fn test_history_is_capped_to_newest() {
		let store = MemoryStore::new();
		let user_id = Uuid::new_v4();

		for i in 0..105 {
			insert_and_prune(&store, user_id, ChatRole::User, &format!("message {i}"))
				.await
				.unwrap();
		}

		assert_eq!(
			store.recent_chat_messages(user_id, i64::MAX).await.unwrap().len(),
			100
		);

		let kept = history(&store, user_id, HISTORY_CAP).await.unwrap();

		assert_eq!(kept.first().unwrap().content, "message 5");
		assert_eq!(kept.last().unwrap().content, "message 104");
	}

	#[tokio::test]
	async fn test_context_window_shape() {
		let store = MemoryStore::new();
		let user_id = Uuid::new_v4();

		let window = append_and_get_context(&store, user_id, ChatRole::User, "first")
			.await
			.unwrap();

		assert_eq!(window.len(), 2);
		assert_eq!(window[0].role, ChatRole::System);
		assert_eq!(window[1].content, "first");

		record_reply(&store, user_id, "reply").await.unwrap();

		for i in 0..20 {
			insert_and_prune(&store, user_id, ChatRole::User, &i.to_string())
				.await
				.unwrap();
		}

		let window = append_and_get_context(&store, user_id, ChatRole::User, " latest ")
			.await
			.unwrap();

		assert_eq!(window.len(), 1 + 10 + 1);
		assert_eq!(window[1].content, "10");
		assert_eq!(window[10].content, "19");
		assert_eq!(window[11].content, "latest");
	}

	#[tokio::test]
	async fn test_invalid_message_is_not_stored() {
		let store = MemoryStore::new();
		let user_id = Uuid::new_v4();

		let error = append_and_get_context(&store, user_id, ChatRole::User, "   ")
			.await
			.unwrap_err();

		assert!(matches!(error, RouteError::Route(Error::EmptyMessage)));
		assert!(store
			.recent_chat_messages(user_id, i64::MAX)
			.await
			.unwrap()
			.is_empty());
	}

	#[test]
	fn test_legacy_roles_are_normalized_in_window() {
		let message = ChatMessage {
			id: 1,
			user_id: Uuid::nil(),
			role: ChatRole::from("bot".to_owned()),
			content: "hello".into(),
			created_at: chrono::Utc::now(),
		};

		let window = context_window(
			vec![message],
			ContextMessage {
				role: ChatRole::User,
				content: "hi".into(),
			},
		);

		assert_eq!(window[1].role, ChatRole::Assistant);
	}
}
