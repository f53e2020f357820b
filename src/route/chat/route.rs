use axum::{extract::State, http::StatusCode};

use crate::{
	extract::{Json, Session},
	AppState, Database,
};

use super::{
	model::{self, ChatRole},
	window, Error, RouteError,
};

/// Sends a message to the cooking assistant and returns its reply.
///
/// The user's message is stored before the assistant is called, so it stays in
/// the history even when the assistant fails.
pub async fn send_message(
	State(state): State<AppState>,
	session: Session,
	Json(input): Json<model::SendInput>,
) -> Result<Json<model::Reply>, RouteError> {
	let content = window::normalize_message(&input.message)?;
	let assistant = state.assistant.clone().ok_or(Error::NotConfigured)?;
	let database = state.database.as_ref();
	let user_id = session.user.id;

	let context = window::append_and_get_context(database, user_id, ChatRole::User, content).await?;
	let reply = assistant.complete(&context).await.map_err(|error| {
		tracing::warn!(%error, user = %user_id, "assistant call failed");
		Error::Assistant(error)
	})?;

	window::record_reply(database, user_id, &reply).await?;

	Ok(Json(model::Reply { reply }))
}

/// Returns your most recent chat messages, oldest first.
pub async fn get_history(
	State(database): State<Database>,
	session: Session,
) -> Result<Json<model::History>, RouteError> {
	let messages = window::history(database.as_ref(), session.user.id, window::HISTORY_PAGE).await?;

	Ok(Json(model::History { messages }))
}

/// Deletes your chat history.
pub async fn clear_history(
	State(database): State<Database>,
	session: Session,
) -> Result<Json<model::Cleared>, RouteError> {
	let deleted = window::clear_history(database.as_ref(), session.user.id).await?;

	Ok(Json(model::Cleared { deleted }))
}

/// Reports whether an assistant is configured.
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<model::Health>) {
	if state.assistant.is_some() {
		(StatusCode::OK, Json(model::Health { status: "healthy" }))
	} else {
		(
			StatusCode::SERVICE_UNAVAILABLE,
			Json(model::Health { status: "unhealthy" }),
		)
	}
}
