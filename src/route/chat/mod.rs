use axum::{
	http::StatusCode,
	routing::{get, post},
	Router,
};

use crate::{assistant, error, AppState};

pub mod model;
pub mod route;
pub mod window;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("message is empty")]
	EmptyMessage,
	#[error("message is longer than {} characters", model::MAX_MESSAGE_LENGTH)]
	MessageTooLong,
	#[error("no assistant is configured")]
	NotConfigured,
	#[error(transparent)]
	Assistant(#[from] assistant::Error),
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
		.route("/", post(send_message))
		.route("/history", get(get_history).delete(clear_history))
		.route("/health", get(health))
}

impl error::ErrorShape for Error {
	fn status(&self) -> StatusCode {
		match self {
			Self::EmptyMessage | Self::MessageTooLong => StatusCode::BAD_REQUEST,
			Self::NotConfigured => StatusCode::INTERNAL_SERVER_ERROR,
			Self::Assistant(error) => match error {
				assistant::Error::RateLimited => StatusCode::TOO_MANY_REQUESTS,
				assistant::Error::AuthFailed => StatusCode::UNAUTHORIZED,
				assistant::Error::Timeout => StatusCode::REQUEST_TIMEOUT,
				assistant::Error::InvalidRequest(..) => StatusCode::BAD_REQUEST,
				assistant::Error::Other(..) => StatusCode::INTERNAL_SERVER_ERROR,
			},
		}
	}

	fn message(&self) -> error::Message<'static> {
		match self {
			Self::EmptyMessage | Self::MessageTooLong => {
				error::Message::new("invalid_input").content(self.to_string())
			}
			Self::NotConfigured => error::Message::new("assistant_unavailable")
				.content("The cooking assistant is not available right now."),
			Self::Assistant(error) => match error {
				assistant::Error::RateLimited => error::Message::new("assistant_rate_limited")
					.content("The assistant is busy. Please try again in a moment."),
				assistant::Error::AuthFailed => error::Message::new("assistant_auth_failed")
					.content("The assistant could not be reached."),
				assistant::Error::Timeout => error::Message::new("assistant_timeout")
					.content("The assistant took too long to answer. Please try again."),
				assistant::Error::InvalidRequest(..) => error::Message::new("assistant_invalid_request")
					.content("The assistant could not process that message."),
				assistant::Error::Other(..) => error::Message::new("assistant_error")
					.content("The assistant failed to answer. Please try again later."),
			},
		}
	}
}
