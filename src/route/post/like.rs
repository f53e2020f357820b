use uuid::Uuid;

use super::{model::LikeState, Error, RouteError};
use crate::store::Store;

/// Likes the post for the user, or removes the like if they already like it.
///
/// The membership change and the counter change are applied by one conditional
/// store update, so the counter always matches the set of liking users. When the
/// condition no longer holds because a concurrent toggle got there first, the
/// current state is reported instead.
pub async fn toggle_like(
	database: &dyn Store,
	post_id: Uuid,
	user_id: Uuid,
) -> Result<LikeState, RouteError> {
	let post = database
		.post(post_id)
		.await?
		.ok_or(Error::UnknownPost(post_id))?;

	let applied = if post.is_liked_by(user_id) {
		database
			.remove_like(post_id, user_id)
			.await?
			.map(|likes| LikeState { liked: false, likes })
	} else {
		database
			.add_like(post_id, user_id)
			.await?
			.map(|likes| LikeState { liked: true, likes })
	};

	let state = match applied {
		Some(state) => state,
		None => {
			let post = database
				.post(post_id)
				.await?
				.ok_or(Error::UnknownPost(post_id))?;

			tracing::debug!(post = %post_id, user = %user_id, "like toggle lost a race");

			LikeState {
				liked: post.is_liked_by(user_id),
				likes: post.likes,
			}
		}
	};

	Ok(LikeState {
		likes: state.likes.max(0),
		..state
	})
}
