use axum::{http::StatusCode, routing::put, Router};
use uuid::Uuid;

use crate::{error, upload, AppState};

pub mod model;
pub mod rename;
pub mod route;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("name is empty")]
	EmptyName,
	#[error("name is longer than {} characters", crate::route::auth::model::MAX_NAME_LENGTH)]
	NameTooLong,
	#[error("name {0} is taken")]
	NameTaken(String),
	#[error("unknown user {0}")]
	UnknownUser(Uuid),
	#[error("no profile image was uploaded")]
	MissingImage,
	#[error("image rejected: {0}")]
	Image(#[from] upload::Error),
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
		.route("/me/name", put(update_name))
		.route("/me/image", put(update_image))
}

impl error::ErrorShape for Error {
	fn status(&self) -> StatusCode {
		match self {
			Self::EmptyName | Self::NameTooLong | Self::MissingImage => StatusCode::BAD_REQUEST,
			Self::NameTaken(..) => StatusCode::CONFLICT,
			Self::UnknownUser(..) => StatusCode::NOT_FOUND,
			Self::Image(upload::Error::Io(..)) => StatusCode::INTERNAL_SERVER_ERROR,
			Self::Image(..) => StatusCode::BAD_REQUEST,
		}
	}

	fn message(&self) -> error::Message<'static> {
		match self {
			Self::EmptyName | Self::NameTooLong => {
				error::Message::new("invalid_input").content(self.to_string())
			}
			Self::NameTaken(name) => error::Message::new("name_taken")
				.content("That name is already taken.")
				.detail("name", name.as_str()),
			Self::UnknownUser(user) => error::Message::new("unknown_user")
				.content("The user does not exist.")
				.detail("user", user.to_string()),
			Self::MissingImage => error::Message::new("invalid_input")
				.content("Attach an image in the `profile_image` field."),
			Self::Image(upload::Error::Io(..)) => {
				error::Message::new("internal").content("An internal error occurred.")
			}
			Self::Image(error) => error::Message::new("invalid_image").content(error.to_string()),
		}
	}
}
