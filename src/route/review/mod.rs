use axum::{
	http::StatusCode,
	routing::{delete, get},
	Router,
};
use uuid::Uuid;

use crate::{error, AppState};

pub mod aggregate;
pub mod model;
pub mod route;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("unknown post {0}")]
	UnknownPost(Uuid),
	#[error("unknown review {0}")]
	UnknownReview(Uuid),
	#[error("authors cannot review their own post")]
	SelfReview,
	#[error("not the author of review {0}")]
	NotAuthor(Uuid),
	#[error("rating {0} is not between 1 and 5")]
	InvalidRating(i32),
	#[error("comment is longer than {} characters", model::MAX_COMMENT_LENGTH)]
	CommentTooLong,
}

pub type RouteError = error::RouteError<Error>;

impl From<Error> for RouteError {
	fn from(error: Error) -> Self {
		Self::Route(error)
	}
}

/// Routes nested under a post, `/posts/:id/reviews`.
pub fn post_routes() -> Router<AppState> {
	use route::*;

	Router::new()
		.route("/:id/reviews", get(get_reviews).post(submit_review))
		.route("/:id/reviews/me", get(get_my_review))
}

pub fn routes() -> Router<AppState> {
	use route::*;

	Router::new().route("/:id", delete(delete_review))
}

impl error::ErrorShape for Error {
	fn status(&self) -> StatusCode {
		match self {
			Self::UnknownPost(..) | Self::UnknownReview(..) => StatusCode::NOT_FOUND,
			Self::SelfReview | Self::NotAuthor(..) => StatusCode::FORBIDDEN,
			Self::InvalidRating(..) | Self::CommentTooLong => StatusCode::BAD_REQUEST,
		}
	}

	fn message(&self) -> error::Message<'static> {
		match self {
			Self::UnknownPost(post) => error::Message::new("unknown_post")
				.content("The post does not exist.")
				.detail("post", post.to_string()),
			Self::UnknownReview(review) => error::Message::new("unknown_review")
				.content("The review does not exist.")
				.detail("review", review.to_string()),
			Self::SelfReview => {
				error::Message::new("forbidden").content("You cannot review your own recipe.")
			}
			Self::NotAuthor(review) => error::Message::new("forbidden")
				.content("Only the author can delete this review.")
				.detail("review", review.to_string()),
			Self::InvalidRating(..) | Self::CommentTooLong => {
				error::Message::new("invalid_input").content(self.to_string())
			}
		}
	}
}
