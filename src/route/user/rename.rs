//! Display name changes.
//!
//! Posts and reviews carry a copy of their author's name. A rename updates the
//! user first, then rewrites every copy. The rewrite only touches rows that
//! still carry a different name, so running it again is harmless; it is retried
//! a few times, and renaming a user to their current name runs it once more.

use std::time::Duration;

use uuid::Uuid;

use super::{model::Propagated, Error, RouteError};
use crate::{
	route::auth::model::{User, MAX_NAME_LENGTH},
	store::{self, Store},
};

const PROPAGATION_ATTEMPTS: u32 = 3;
const PROPAGATION_BACKOFF: Duration = Duration::from_millis(50);

/// Renames a user and propagates the new name to their posts and reviews.
pub async fn rename_user(database: &dyn Store, user_id: Uuid, name: &str) -> Result<User, RouteError> {
	let name = name.trim();

	if name.is_empty() {
		return Err(Error::EmptyName.into());
	}

	if name.chars().count() > MAX_NAME_LENGTH {
		return Err(Error::NameTooLong.into());
	}

	if let Some(holder) = database.user_by_name(name).await? {
		if holder.id != user_id {
			return Err(Error::NameTaken(name.to_owned()).into());
		}
	}

	// The unique constraint decides races between two users taking the same name.
	match database.set_user_name(user_id, name).await {
		Ok(true) => {}
		Ok(false) => return Err(Error::UnknownUser(user_id).into()),
		Err(store::Error::Conflict(..)) => return Err(Error::NameTaken(name.to_owned()).into()),
		Err(error) => return Err(error.into()),
	}

	propagate_name(database, user_id, name).await?;

	database
		.user(user_id)
		.await?
		.ok_or_else(|| Error::UnknownUser(user_id).into())
}

/// Writes `name` into every post and review of the user that does not carry it yet.
pub async fn propagate_name(
	database: &dyn Store,
	user_id: Uuid,
	name: &str,
) -> store::Result<Propagated> {
	let mut attempt = 1;

	loop {
		match fan_out(database, user_id, name).await {
			Ok(propagated) => {
				tracing::info!(
					user = %user_id,
					posts = propagated.posts,
					reviews = propagated.reviews,
					"propagated display name"
				);

				return Ok(propagated);
			}
			Err(error) if attempt < PROPAGATION_ATTEMPTS => {
				tracing::warn!(%error, user = %user_id, attempt, "name propagation failed, retrying");
				tokio::time::sleep(PROPAGATION_BACKOFF * attempt).await;
				attempt += 1;
			}
			Err(error) => {
				tracing::error!(%error, user = %user_id, "name propagation failed, rename again to retry");
				return Err(error);
			}
		}
	}
}

async fn fan_out(database: &dyn Store, user_id: Uuid, name: &str) -> store::Result<Propagated> {
	Ok(Propagated {
		posts: database.set_author_name(user_id, name).await?,
		reviews: database.set_reviewer_name(user_id, name).await?,
	})
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::test::*;

	#[tokio::test]
	async fn test_rename_propagates_to_posts_and_reviews() {
		let store = MemoryStore::new();
		let author = seed_user(&store, "author").await;
		let reviewer = seed_user(&store, "reviewer").await;
		let post = seed_post(&store, &author, "kimchi stew").await;
		let other = seed_post(&store, &reviewer, "bibimbap").await;

		seed_review(&store, &post, &reviewer, 4).await;

		let renamed = rename_user(&store, reviewer.id, " critic ").await.unwrap();

		assert_eq!(renamed.name, "critic");
		assert_eq!(store.post(other.id).await.unwrap().unwrap().author_name, "critic");
		assert_eq!(store.post(post.id).await.unwrap().unwrap().author_name, "author");

		let reviews = store.reviews_for_post(post.id).await.unwrap();

		assert_eq!(reviews[0].user_name, "critic");
	}

	#[tokio::test]
	async fn test_rename_conflict_changes_nothing() {
		let store = MemoryStore::new();
		let author = seed_user(&store, "author").await;
		let taken = seed_user(&store, "taken").await;
		let post = seed_post(&store, &author, "kimchi stew").await;

		let error = rename_user(&store, author.id, "taken").await.unwrap_err();

		assert!(matches!(error, RouteError::Route(Error::NameTaken(..))));
		assert_eq!(store.user(author.id).await.unwrap().unwrap().name, "author");
		assert_eq!(store.user(taken.id).await.unwrap().unwrap().name, "taken");
		assert_eq!(store.post(post.id).await.unwrap().unwrap().author_name, "author");
	}

	#[tokio::test]
	async fn test_rename_validates_length() {
		let store = MemoryStore::new();
		let user = seed_user(&store, "author").await;

		assert!(matches!(
			rename_user(&store, user.id, "   ").await,
			Err(RouteError::Route(Error::EmptyName))
		));
		assert!(matches!(
			rename_user(&store, user.id, &"a".repeat(21)).await,
			Err(RouteError::Route(Error::NameTooLong))
		));
		assert!(rename_user(&store, user.id, &"a".repeat(20)).await.is_ok());
	}

	#[tokio::test]
	async fn test_same_name_rename_repairs_stale_copies() {
		let store = MemoryStore::new();
		let author = seed_user(&store, "author").await;
		let post = seed_post(&store, &author, "kimchi stew").await;

		// A rename that stopped after updating the user.
		store.set_user_name(author.id, "chef").await.unwrap();
		assert_eq!(store.post(post.id).await.unwrap().unwrap().author_name, "author");

		rename_user(&store, author.id, "chef").await.unwrap();

		assert_eq!(store.post(post.id).await.unwrap().unwrap().author_name, "chef");
		assert_eq!(
			propagate_name(&store, author.id, "chef").await.unwrap(),
			Propagated::default()
		);
	}
}
