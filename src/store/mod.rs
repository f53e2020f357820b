//! Durable persistence for users, sessions, posts, reviews and chat messages.
//!
//! The [`Store`] trait is the only way the rest of the application touches
//! persisted state. It guarantees per-row atomicity for every method, but never
//! atomicity across two calls. Compound updates that must not be torn apart
//! (a like and its counter, a review upsert) are therefore single methods.

mod memory;
mod postgres;

use uuid::Uuid;

use crate::route::{
	auth::model::{Session, User},
	chat::model::{ChatMessage, ChatRole},
	post::model::{Post, Rating, UpdatePost},
	review::model::Review,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A uniqueness constraint enforced by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constraint {
	UserEmail,
	UserName,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("unique constraint {0:?} violated")]
	Conflict(Constraint),
	#[error("database error: {0}")]
	Database(#[from] sqlx::Error),
	#[error("migration error: {0}")]
	Migrate(#[from] sqlx::migrate::MigrateError),
}

/// A user about to be inserted. The id is chosen up front because it salts
/// the password hash.
#[derive(Debug)]
pub struct NewUser {
	pub id: Uuid,
	pub name: String,
	pub email: String,
	pub password: Vec<u8>,
	pub marketing_agree: bool,
}

#[derive(Debug)]
pub struct NewPost {
	pub author_id: Uuid,
	pub author_name: String,
	pub input: crate::route::post::model::CreatePost,
	pub image_url: Option<String>,
}

#[derive(Debug)]
pub struct NewReview {
	pub post_id: Uuid,
	pub user_id: Uuid,
	pub user_name: String,
	pub rating: i32,
	pub comment: String,
}

/// The result of an insert-or-update on the (post, user) review pair.
#[derive(Debug)]
pub struct UpsertedReview {
	pub review: Review,
	pub created: bool,
}

/// Which posts a listing should return.
#[derive(Debug, Clone)]
pub enum PostFilter {
	/// Published, public posts.
	Public,
	/// Published, public posts whose title contains the text, ignoring case.
	TitleContains(String),
	/// Every post written by the user, regardless of status.
	Author(Uuid),
	/// Every post the user currently likes.
	LikedBy(Uuid),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostSort {
	/// Most liked first, newest first among ties.
	#[default]
	Likes,
	/// Newest first.
	Recent,
	/// Shortest cook time first, newest first among ties.
	Time,
}

#[derive(Debug, Clone, Copy)]
pub struct Page {
	pub limit: i64,
	pub offset: i64,
}

impl Page {
	pub fn first(limit: i64) -> Self {
		Self { limit, offset: 0 }
	}
}

#[axum::async_trait]
pub trait Store: Send + Sync {
	/// Inserts a user, failing with [`Error::Conflict`] when the email or name is taken.
	async fn insert_user(&self, user: NewUser) -> Result<User>;
	async fn user(&self, id: Uuid) -> Result<Option<User>>;
	async fn user_by_email(&self, email: &str) -> Result<Option<User>>;
	async fn user_by_name(&self, name: &str) -> Result<Option<User>>;
	/// Renames a user. Returns `false` if the user does not exist and fails
	/// with [`Error::Conflict`] if another user holds the name.
	async fn set_user_name(&self, id: Uuid, name: &str) -> Result<bool>;
	async fn set_profile_image(&self, id: Uuid, url: &str) -> Result<bool>;

	async fn insert_session(&self, user_id: Uuid) -> Result<Session>;
	/// Resolves a session id to the user that owns it.
	async fn session_user(&self, session_id: Uuid) -> Result<Option<User>>;
	async fn delete_session(&self, session_id: Uuid) -> Result<()>;

	async fn insert_post(&self, post: NewPost) -> Result<Post>;
	async fn post(&self, id: Uuid) -> Result<Option<Post>>;
	async fn update_post(&self, id: Uuid, update: UpdatePost) -> Result<Option<Post>>;
	/// Deletes a post along with its reviews.
	async fn delete_post(&self, id: Uuid) -> Result<bool>;
	async fn posts(&self, filter: PostFilter, sort: PostSort, page: Page) -> Result<Vec<Post>>;
	/// Adds the user to the post's liking set and increments the counter, as one
	/// update that only applies while the user is absent from the set.
	///
	/// Returns the new counter, or `None` if nothing matched.
	async fn add_like(&self, post_id: Uuid, user_id: Uuid) -> Result<Option<i64>>;
	/// Removes the user from the post's liking set and decrements the counter, as
	/// one update that only applies while the user is in the set.
	///
	/// Returns the new counter, or `None` if nothing matched.
	async fn remove_like(&self, post_id: Uuid, user_id: Uuid) -> Result<Option<i64>>;
	async fn set_rating(&self, post_id: Uuid, rating: Rating) -> Result<bool>;
	/// Writes `name` into the author name of every post by `author_id` that
	/// does not already carry it. Returns the number of rows changed.
	async fn set_author_name(&self, author_id: Uuid, name: &str) -> Result<u64>;

	/// Inserts the review, or overwrites the existing one for the same
	/// (post, user) pair, atomically.
	async fn upsert_review(&self, review: NewReview) -> Result<UpsertedReview>;
	async fn review(&self, id: Uuid) -> Result<Option<Review>>;
	async fn review_by_pair(&self, post_id: Uuid, user_id: Uuid) -> Result<Option<Review>>;
	/// Every live review of a post, newest first.
	async fn reviews_for_post(&self, post_id: Uuid) -> Result<Vec<Review>>;
	async fn delete_review(&self, id: Uuid) -> Result<bool>;
	/// Writes `name` into the reviewer name of every review by `user_id` that
	/// does not already carry it. Returns the number of rows changed.
	async fn set_reviewer_name(&self, user_id: Uuid, name: &str) -> Result<u64>;

	async fn insert_chat_message(
		&self,
		user_id: Uuid,
		role: ChatRole,
		content: &str,
	) -> Result<ChatMessage>;
	/// The `limit` most recent messages of a user, oldest first.
	async fn recent_chat_messages(&self, user_id: Uuid, limit: i64) -> Result<Vec<ChatMessage>>;
	/// Deletes all but the `keep` most recent messages of a user.
	async fn prune_chat_messages(&self, user_id: Uuid, keep: i64) -> Result<u64>;
	async fn clear_chat_messages(&self, user_id: Uuid) -> Result<u64>;
}
