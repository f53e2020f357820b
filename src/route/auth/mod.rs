use axum::{
	http::StatusCode,
	routing::{get, post},
	Router,
};

use crate::{error, AppState};

pub mod model;
pub mod route;

/// An error that can occur during authentication.
///
/// Note that the messages are presented to the client, so they should not contain
/// sensitive information. Duplicate emails and names surface as store conflicts.
#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("invalid email or password")]
	InvalidEmailOrPassword,
	#[error("password hashing error: {0}")]
	Argon(#[from] argon2::Error),
	#[error("no session cookie")]
	NoSessionCookie,
	#[error("invalid session cookie")]
	InvalidSessionCookie,
}

pub type RouteError = error::RouteError<Error>;

impl From<Error> for RouteError {
	fn from(error: Error) -> Self {
		Self::Route(error)
	}
}

pub fn routes() -> Router<AppState> {
	use route::*;

	Router::new()
		.route("/login", post(login))
		.route("/logout", get(logout))
		.route("/register", post(register))
		.route("/me", get(get_me))
}

impl error::ErrorShape for Error {
	fn status(&self) -> StatusCode {
		match self {
			Self::InvalidEmailOrPassword | Self::NoSessionCookie | Self::InvalidSessionCookie => {
				StatusCode::UNAUTHORIZED
			}
			Self::Argon(..) => StatusCode::INTERNAL_SERVER_ERROR,
		}
	}

	fn message(&self) -> error::Message<'static> {
		match self {
			Self::InvalidEmailOrPassword => error::Message::new("invalid_credentials")
				.content("The email or password is incorrect."),
			Self::Argon(..) => error::Message::new("internal").content("An internal error occurred."),
			Self::NoSessionCookie => {
				error::Message::new("unauthenticated").content("You need to log in first.")
			}
			Self::InvalidSessionCookie => error::Message::new("unauthenticated")
				.content("Your session has expired. Please log in again."),
		}
	}
}

#[cfg(test)]
mod test {
	use crate::test::*;

	#[tokio::test]
	async fn test_signup_flow() {
		let app = server(state());

		let response = app
			.post("/auth/register")
			.json(&json!({
				"email": "John@Smith.com",
				"name": "john",
				"password": "hunter2hunter",
			}))
			.await;

		assert_eq!(response.status_code(), 201);

		assert!(response
			.header("set-cookie")
			.to_str()
			.unwrap()
			.contains("session="));

		let response = app
			.post("/auth/login")
			.json(&json!({
				"email": "john@smith.com",
				"password": "hunter2hunter",
			}))
			.await;

		assert_eq!(response.status_code(), 200);

		let response = app.get("/auth/me").await;

		assert_eq!(response.status_code(), 200);

		let me = response.json::<Value>();

		assert_eq!(me["name"], "john");
		assert!(me.get("email").is_none());
		assert!(me.get("password").is_none());
	}

	#[tokio::test]
	async fn test_duplicate_signup_conflicts() {
		let app = server(state());

		register(&app, "john", "john@smith.com").await;

		let response = app
			.post("/auth/register")
			.json(&json!({
				"email": "JOHN@smith.com",
				"name": "johnny",
				"password": "hunter2hunter",
			}))
			.await;

		assert_eq!(response.status_code(), 409);
		assert_eq!(response.json::<Value>()["error"], "conflict");

		let response = app
			.post("/auth/register")
			.json(&json!({
				"email": "other@smith.com",
				"name": "john",
				"password": "hunter2hunter",
			}))
			.await;

		assert_eq!(response.status_code(), 409);
	}

	#[tokio::test]
	async fn test_wrong_password_is_unauthorized() {
		let app = server(state());

		register(&app, "john", "john@smith.com").await;

		let response = app
			.post("/auth/login")
			.json(&json!({
				"email": "john@smith.com",
				"password": "wrong-password",
			}))
			.await;

		assert_eq!(response.status_code(), 401);
		assert_eq!(response.json::<Value>()["error"], "invalid_credentials");

		let response = app
			.post("/auth/login")
			.json(&json!({
				"email": "nobody@smith.com",
				"password": "hunter2hunter",
			}))
			.await;

		assert_eq!(response.status_code(), 401);
	}

	#[tokio::test]
	async fn test_register_validates_input() {
		let app = server(state());

		let response = app
			.post("/auth/register")
			.json(&json!({
				"email": "not-an-email",
				"name": "john",
				"password": "short",
			}))
			.await;

		assert_eq!(response.status_code(), 400);
		assert_eq!(response.json::<Value>()["error"], "invalid_input");
	}

	#[tokio::test]
	async fn test_logout_ends_session_and_clears_chat() {
		let state = state();
		let app = server(state.clone());
		let user = register(&app, "john", "john@smith.com").await;

		state
			.database
			.insert_chat_message(user, ChatRole::User, "hello")
			.await
			.unwrap();

		let response = app.get("/auth/logout").await;

		assert_eq!(response.status_code(), 204);
		assert!(state
			.database
			.recent_chat_messages(user, i64::MAX)
			.await
			.unwrap()
			.is_empty());

		let response = app.get("/auth/me").await;

		assert_eq!(response.status_code(), 401);
	}
}
