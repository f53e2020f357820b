use argon2::Argon2;
use axum::{
	extract::State,
	http::{header, StatusCode},
	response::IntoResponse,
};
use uuid::Uuid;

use crate::{
	extract::{Json, Session},
	route::chat,
	session,
	store::NewUser,
	AppState, Database,
};

use super::{model, Error, RouteError};

pub const KEY_LENGTH: usize = 32;

/// Hashes a password with Argon2, using the user's id as a salt.
/// Since this is only used for logging in and creating a new password,
/// the scope of this function can remain in here with no issues.
fn hash_password(
	hasher: &Argon2,
	password: &str,
	id: &Uuid,
) -> Result<[u8; KEY_LENGTH], argon2::Error> {
	let mut hash = [0; KEY_LENGTH];

	hasher.hash_password_into(password.as_bytes(), id.as_bytes(), &mut hash)?;
	Ok(hash)
}

/// Logs in to an account, returning the user and an associated session cookie.
pub async fn login(
	State(state): State<AppState>,
	Json(auth): Json<model::LoginInput>,
) -> Result<impl IntoResponse, RouteError> {
	let email = model::normalize_email(&auth.email);

	let Some(user) = state.database.user_by_email(&email).await? else {
		return Err(Error::InvalidEmailOrPassword.into());
	};

	let hashed = hash_password(&state.hasher, &auth.password, &user.id).map_err(Error::Argon)?;

	if user.password != hashed {
		return Err(Error::InvalidEmailOrPassword.into());
	}

	let session = state.database.insert_session(user.id).await?;
	let cookie = session::create_cookie(session.id);

	tracing::info!(user = %user.id, "logged in");

	Ok(([(header::SET_COOKIE, cookie.to_string())], Json(user)))
}

/// Logs out of the authenticated account.
///
/// The session is always deleted first. Clearing the chat history afterwards
/// is best-effort.
pub async fn logout(
	State(database): State<Database>,
	session: Session,
) -> Result<impl IntoResponse, RouteError> {
	database.delete_session(session.id).await?;

	if let Err(error) = chat::window::clear_history(database.as_ref(), session.user.id).await {
		tracing::warn!(%error, user = %session.user.id, "failed to clear chat history on logout");
	}

	Ok((
		[(header::SET_COOKIE, session::clear_cookie().to_string())],
		StatusCode::NO_CONTENT,
	))
}

/// Registers a new account, returning the user and an associated session cookie.
pub async fn register(
	State(state): State<AppState>,
	Json(auth): Json<model::RegisterInput>,
) -> Result<impl IntoResponse, RouteError> {
	let user_id = Uuid::new_v4();
	let hashed = hash_password(&state.hasher, &auth.password, &user_id).map_err(Error::Argon)?;

	let user = state
		.database
		.insert_user(NewUser {
			id: user_id,
			name: auth.name.trim().to_owned(),
			email: model::normalize_email(&auth.email),
			password: hashed.to_vec(),
			marketing_agree: auth.marketing_agree,
		})
		.await?;

	let session = state.database.insert_session(user.id).await?;
	let cookie = session::create_cookie(session.id);

	tracing::info!(user = %user.id, "registered");

	Ok((
		StatusCode::CREATED,
		[(header::SET_COOKIE, cookie.to_string())],
		Json(user),
	))
}

/// Returns the authenticated user.
pub async fn get_me(session: Session) -> Json<model::User> {
	Json(session.user)
}
