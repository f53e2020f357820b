use std::collections::HashMap;

use axum::{
	extract::{multipart::Field, Multipart, State},
	http::StatusCode,
	response::IntoResponse,
};
use validator::Validate;

use crate::{
	extract::{Json, Path, Query, Session},
	store::{NewPost, Page, PostFilter, PostSort},
	AppState, Database,
};

use super::{like, model, Error, RouteError};

pub const IMAGE_FIELD: &str = "image";
pub const TOP_POSTS: i64 = 10;
pub const MAX_SEARCH_RESULTS: i64 = 50;
/// Body limit of the post form. Images over the upload cap are skipped while
/// reading, so this only bounds how much a client may stream.
pub const MAX_FORM_BYTES: usize = 64 * 1024 * 1024;
pub const MAX_TEXT_FIELD_BYTES: usize = 64 * 1024;

fn listing(posts: Vec<model::Post>) -> Json<Vec<model::Post>> {
	Json(
		posts
			.into_iter()
			.map(|mut post| {
				post.likes = post.display_likes();
				post
			})
			.collect(),
	)
}

/// Returns a paginated response of published public posts, newest first.
pub async fn get_posts(
	State(database): State<Database>,
	Query(paginate): Query<model::Paginate>,
) -> Result<Json<Vec<model::Post>>, RouteError> {
	let posts = database
		.posts(PostFilter::Public, PostSort::Recent, paginate.into())
		.await?;

	Ok(listing(posts))
}

/// Returns the most liked posts, newest first among ties.
pub async fn get_top_posts(
	State(database): State<Database>,
) -> Result<Json<Vec<model::Post>>, RouteError> {
	let posts = database
		.posts(PostFilter::Public, PostSort::Likes, Page::first(TOP_POSTS))
		.await?;

	Ok(listing(posts))
}

/// Searches published public posts by title, ignoring case.
pub async fn search_posts(
	State(database): State<Database>,
	Query(search): Query<model::SearchInput>,
) -> Result<Json<Vec<model::Post>>, RouteError> {
	let filter = PostFilter::TitleContains(search.q.trim().to_owned());
	let posts = database
		.posts(filter, search.sort, Page::first(MAX_SEARCH_RESULTS))
		.await?;

	Ok(listing(posts))
}

/// Returns a paginated response of your posts, newest first.
pub async fn get_user_posts(
	State(database): State<Database>,
	session: Session,
	Query(paginate): Query<model::Paginate>,
) -> Result<Json<Vec<model::Post>>, RouteError> {
	let posts = database
		.posts(
			PostFilter::Author(session.user.id),
			PostSort::Recent,
			paginate.into(),
		)
		.await?;

	Ok(listing(posts))
}

/// Returns a paginated response of the posts you like, most liked first.
pub async fn get_liked_posts(
	State(database): State<Database>,
	session: Session,
	Query(paginate): Query<model::Paginate>,
) -> Result<Json<Vec<model::Post>>, RouteError> {
	let posts = database
		.posts(
			PostFilter::LikedBy(session.user.id),
			PostSort::Likes,
			paginate.into(),
		)
		.await?;

	Ok(listing(posts))
}

/// Returns a single post by its unique id. Drafts are only shown to their author.
pub async fn get_post(
	State(database): State<Database>,
	session: Option<Session>,
	Path(path): Path<model::IdInput>,
) -> Result<Json<model::PostDetail>, RouteError> {
	let viewer = session.map(|session| session.user.id);
	let post = database
		.post(path.id)
		.await?
		.filter(|post| post.is_visible() || Some(post.author_id) == viewer)
		.ok_or(Error::UnknownPost(path.id))?;

	Ok(Json(model::PostDetail::new(post, viewer)))
}

/// Reads a field up to `limit` bytes. Once the field grows past the limit the
/// rest of it is drained and `None` is returned.
async fn read_capped(
	field: &mut Field<'_>,
	limit: usize,
) -> Result<Option<Vec<u8>>, RouteError> {
	let mut buffer = Vec::new();
	let mut overflowed = false;

	while let Some(chunk) = field.chunk().await? {
		if overflowed {
			continue;
		}

		if buffer.len() + chunk.len() > limit {
			overflowed = true;
			buffer = Vec::new();
		} else {
			buffer.extend_from_slice(&chunk);
		}
	}

	Ok((!overflowed).then_some(buffer))
}

/// Splits a post form into its text fields and the optional image.
///
/// An image over `max_image_bytes` is skipped rather than failing the form.
async fn read_form(
	mut multipart: Multipart,
	max_image_bytes: usize,
) -> Result<(HashMap<String, String>, Option<(String, Vec<u8>)>), RouteError> {
	let mut fields = HashMap::new();
	let mut image = None;

	while let Some(mut field) = multipart.next_field().await? {
		let Some(name) = field.name().map(str::to_owned) else {
			continue;
		};

		if name == IMAGE_FIELD {
			let file_name = field.file_name().unwrap_or_default().to_owned();

			match read_capped(&mut field, max_image_bytes).await? {
				Some(bytes) if !file_name.is_empty() && !bytes.is_empty() => {
					image = Some((file_name, bytes));
				}
				Some(..) => {}
				None => {
					tracing::warn!(
						file = %file_name,
						limit = max_image_bytes,
						"discarding oversized post image"
					);
				}
			}
		} else {
			let bytes = read_capped(&mut field, MAX_TEXT_FIELD_BYTES)
				.await?
				.ok_or_else(|| Error::FieldTooLarge(name.clone()))?;

			fields.insert(name, String::from_utf8_lossy(&bytes).into_owned());
		}
	}

	Ok((fields, image))
}

/// Publishes a new post from a multipart form.
///
/// A rejected image does not fail the request, the post is published without one.
pub async fn create_post(
	State(state): State<AppState>,
	session: Session,
	multipart: Multipart,
) -> Result<impl IntoResponse, RouteError> {
	let (fields, image) = read_form(multipart, state.uploads.max_bytes()).await?;
	let input = model::from_form(&fields);

	input.validate()?;

	let image_url = match image {
		Some((file_name, bytes)) => match state.uploads.store(&bytes, &file_name).await {
			Ok(url) => Some(url),
			Err(error) => {
				tracing::warn!(%error, file = %file_name, "discarding post image");
				None
			}
		},
		None => None,
	};

	let post = state
		.database
		.insert_post(NewPost {
			author_id: session.user.id,
			author_name: session.user.name,
			input,
			image_url,
		})
		.await?;

	tracing::info!(post = %post.id, author = %post.author_id, "published post");

	Ok((
		StatusCode::CREATED,
		Json(model::PostDetail::new(post, Some(session.user.id))),
	))
}

/// Loads a post and checks that the session user wrote it.
async fn owned_post(
	database: &Database,
	session: &Session,
	post_id: uuid::Uuid,
) -> Result<model::Post, RouteError> {
	let post = database
		.post(post_id)
		.await?
		.ok_or(Error::UnknownPost(post_id))?;

	if post.author_id != session.user.id {
		return Err(Error::NotAuthor(post_id).into());
	}

	Ok(post)
}

/// Updates an existing post by its unique id.
pub async fn update_post(
	State(database): State<Database>,
	session: Session,
	Path(path): Path<model::IdInput>,
	Json(input): Json<model::UpdatePost>,
) -> Result<Json<model::PostDetail>, RouteError> {
	owned_post(&database, &session, path.id).await?;

	let post = database
		.update_post(path.id, input)
		.await?
		.ok_or(Error::UnknownPost(path.id))?;

	Ok(Json(model::PostDetail::new(post, Some(session.user.id))))
}

/// Deletes an existing post by its unique id, along with its reviews.
pub async fn delete_post(
	State(database): State<Database>,
	session: Session,
	Path(path): Path<model::IdInput>,
) -> Result<StatusCode, RouteError> {
	owned_post(&database, &session, path.id).await?;

	if !database.delete_post(path.id).await? {
		return Err(Error::UnknownPost(path.id).into());
	}

	tracing::info!(post = %path.id, "deleted post");

	Ok(StatusCode::NO_CONTENT)
}

/// Likes a post, or removes your like if you already like it.
pub async fn like_post(
	State(database): State<Database>,
	session: Session,
	Path(path): Path<model::IdInput>,
) -> Result<Json<model::LikeState>, RouteError> {
	let state = like::toggle_like(database.as_ref(), path.id, session.user.id).await?;

	Ok(Json(state))
}
