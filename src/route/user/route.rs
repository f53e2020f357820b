use axum::extract::{Multipart, State};

use crate::{
	extract::{Json, Session},
	AppState, Database,
};

use super::{model, rename, Error, RouteError};

pub const PROFILE_IMAGE_FIELD: &str = "profile_image";

/// Changes the display name of the authenticated user.
pub async fn update_name(
	State(database): State<Database>,
	session: Session,
	Json(input): Json<model::RenameInput>,
) -> Result<Json<model::User>, RouteError> {
	let user = rename::rename_user(database.as_ref(), session.user.id, &input.name).await?;

	Ok(Json(user))
}

/// Replaces the profile image of the authenticated user.
pub async fn update_image(
	State(state): State<AppState>,
	session: Session,
	mut multipart: Multipart,
) -> Result<Json<model::User>, RouteError> {
	let mut image = None;

	while let Some(field) = multipart.next_field().await? {
		if field.name() != Some(PROFILE_IMAGE_FIELD) {
			continue;
		}

		let file_name = field.file_name().unwrap_or_default().to_owned();
		let bytes = field.bytes().await?;

		image = Some((file_name, bytes));
	}

	let (file_name, bytes) = image.ok_or(Error::MissingImage)?;
	let url = state
		.uploads
		.store(&bytes, &file_name)
		.await
		.map_err(Error::Image)?;

	state.database.set_profile_image(session.user.id, &url).await?;

	let user = state
		.database
		.user(session.user.id)
		.await?
		.ok_or(Error::UnknownUser(session.user.id))?;

	Ok(Json(user))
}
