use std::borrow::Cow;

use axum::{
	extract::{
		multipart::{MultipartError, MultipartRejection},
		rejection,
	},
	http::StatusCode,
	response::{IntoResponse, Response},
	Json,
};
use serde::Serialize;
use serde_json::json;

use crate::store;

pub type Map = serde_json::Map<String, serde_json::Value>;

/// The body of every error response.
///
/// `error` is a stable machine-readable code, `message` is meant for humans.
#[derive(Debug, Serialize)]
pub struct Message<'a> {
	pub error: Cow<'a, str>,
	pub message: Cow<'a, str>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub details: Option<Map>,
}

impl<'a> Message<'a> {
	pub fn new(error: impl Into<Cow<'a, str>>) -> Self {
		let error = error.into();

		Self {
			message: error.clone(),
			error,
			details: None,
		}
	}

	#[must_use]
	pub fn content(mut self, message: impl Into<Cow<'a, str>>) -> Self {
		self.message = message.into();
		self
	}

	#[must_use]
	pub fn detail(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
		self.details
			.get_or_insert_with(Map::new)
			.insert(key.to_owned(), value.into());
		self
	}
}

/// How a route module's error is presented to the client.
///
/// The message is sent as-is, so it must not contain sensitive information.
pub trait ErrorShape: std::fmt::Display {
	fn status(&self) -> StatusCode;

	fn message(&self) -> Message<'static>;
}

/// Error type for a route module.
///
/// Wraps the module's own error `T` along with the failures every route shares.
/// The Display output is only logged, never sent to the client.
#[derive(Debug, thiserror::Error)]
pub enum RouteError<T> {
	#[error("validation error: {0}")]
	Validation(#[from] validator::ValidationErrors),
	#[error("json error: {0}")]
	Json(#[from] rejection::JsonRejection),
	#[error("query error: {0}")]
	Query(#[from] rejection::QueryRejection),
	#[error("path error: {0}")]
	Path(#[from] rejection::PathRejection),
	#[error("multipart error: {0}")]
	Multipart(#[from] MultipartError),
	#[error("multipart error: {0}")]
	MultipartRejection(#[from] MultipartRejection),
	#[error("store error: {0}")]
	Store(#[from] store::Error),
	#[error("{0}")]
	Route(T),
}

/// Rejection of the validating extractors, which only fail with the shared kinds.
pub type Rejection = RouteError<std::convert::Infallible>;

impl ErrorShape for std::convert::Infallible {
	fn status(&self) -> StatusCode {
		match *self {}
	}

	fn message(&self) -> Message<'static> {
		match *self {}
	}
}

fn validation_message(errors: &validator::ValidationErrors) -> Message<'static> {
	let mut message = Message::new("invalid_input");
	let mut summary = Vec::new();

	for (field, errors) in errors.field_errors() {
		let field = field.to_string();
		let reasons = errors
			.iter()
			.map(|error| {
				error
					.message
					.as_ref()
					.map_or_else(|| error.code.to_string(), ToString::to_string)
			})
			.collect::<Vec<_>>();

		summary.push(format!("{field}: {}", reasons.join(", ")));
		message = message.detail(&field, json!(reasons));
	}

	summary.sort();

	message.content(summary.join("; "))
}

fn internal() -> Response {
	(
		StatusCode::INTERNAL_SERVER_ERROR,
		Json(Message::new("internal").content("An internal error occurred.")),
	)
		.into_response()
}

impl<T> IntoResponse for RouteError<T>
where
	T: ErrorShape,
{
	fn into_response(self) -> Response {
		match self {
			Self::Validation(errors) => {
				(StatusCode::BAD_REQUEST, Json(validation_message(&errors))).into_response()
			}
			Self::Json(rejection) => (
				rejection.status(),
				Json(Message::new("invalid_json").content(rejection.body_text())),
			)
				.into_response(),
			Self::Query(rejection) => (
				rejection.status(),
				Json(Message::new("invalid_query").content(rejection.body_text())),
			)
				.into_response(),
			Self::Path(rejection) => (
				rejection.status(),
				Json(Message::new("invalid_path").content(rejection.body_text())),
			)
				.into_response(),
			Self::Multipart(error) => (
				error.status(),
				Json(Message::new("invalid_multipart").content(error.body_text())),
			)
				.into_response(),
			Self::MultipartRejection(rejection) => (
				rejection.status(),
				Json(Message::new("invalid_multipart").content(rejection.body_text())),
			)
				.into_response(),
			Self::Store(store::Error::Conflict(constraint)) => {
				let message = match constraint {
					store::Constraint::UserEmail => "That email is already registered.",
					store::Constraint::UserName => "That name is already taken.",
				};

				(StatusCode::CONFLICT, Json(Message::new("conflict").content(message))).into_response()
			}
			Self::Store(error) => {
				tracing::error!(%error, "store failure");
				internal()
			}
			Self::Route(error) => {
				let status = error.status();

				if status.is_server_error() {
					tracing::error!(%error, "route failure");
				}

				(status, Json(error.message())).into_response()
			}
		}
	}
}

#[cfg(test)]
mod test {
	use validator::Validate;

	use super::*;

	#[derive(Validate)]
	struct Input {
		#[validate(length(min = 1))]
		title: String,
	}

	#[test]
	fn test_validation_message_lists_fields() {
		let errors = Input {
			title: String::new(),
		}
		.validate()
		.unwrap_err();

		let message = validation_message(&errors);

		assert_eq!(message.error, "invalid_input");
		assert!(message.message.starts_with("title: "));
		assert!(message.details.unwrap().contains_key("title"));
	}

	#[test]
	fn test_message_builder() {
		let message = Message::new("unknown_post")
			.content("The post does not exist.")
			.detail("post", "abc");

		assert_eq!(
			serde_json::to_value(&message).unwrap(),
			json!({ "error": "unknown_post", "message": "The post does not exist.", "details": { "post": "abc" } })
		);
	}
}
