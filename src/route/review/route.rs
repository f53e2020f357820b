use axum::{extract::State, http::StatusCode, response::IntoResponse};

use crate::{
	extract::{Json, Path, Session},
	Database,
};

use super::{aggregate, model, RouteError};

/// Lists the reviews of a post, newest first, with rating statistics.
pub async fn get_reviews(
	State(database): State<Database>,
	Path(path): Path<model::IdInput>,
) -> Result<Json<model::ReviewList>, RouteError> {
	let list = aggregate::get_reviews(database.as_ref(), path.id).await?;

	Ok(Json(list))
}

/// Returns your review of a post, or `null` if you have not reviewed it.
pub async fn get_my_review(
	State(database): State<Database>,
	session: Session,
	Path(path): Path<model::IdInput>,
) -> Result<Json<Option<model::Review>>, RouteError> {
	let review = aggregate::get_my_review(database.as_ref(), path.id, session.user.id).await?;

	Ok(Json(review))
}

/// Creates your review of a post, or replaces it if you already left one.
pub async fn submit_review(
	State(database): State<Database>,
	session: Session,
	Path(path): Path<model::IdInput>,
	Json(input): Json<model::ReviewInput>,
) -> Result<impl IntoResponse, RouteError> {
	let submitted = aggregate::submit_review(
		database.as_ref(),
		path.id,
		&session.user,
		input.rating,
		&input.comment,
	)
	.await?;

	let status = match submitted.action {
		model::Action::Created => StatusCode::CREATED,
		model::Action::Updated => StatusCode::OK,
	};

	Ok((status, Json(submitted)))
}

/// Deletes one of your reviews.
pub async fn delete_review(
	State(database): State<Database>,
	session: Session,
	Path(path): Path<model::IdInput>,
) -> Result<StatusCode, RouteError> {
	aggregate::delete_review(database.as_ref(), path.id, session.user.id).await?;

	Ok(StatusCode::NO_CONTENT)
}
