use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

pub use crate::route::model::IdInput;

pub const MAX_COMMENT_LENGTH: usize = 500;

/// A rating left by a user on someone else's post. There is at most one per
/// (post, user) pair.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Review {
	pub id: Uuid,
	pub post_id: Uuid,
	pub user_id: Uuid,
	/// Copy of the reviewer's display name.
	pub user_name: String,
	/// Between 1 and 5.
	pub rating: i32,
	pub comment: String,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

/// Rating and comment bounds are checked by [`super::aggregate::submit_review`].
#[derive(Debug, Deserialize, Validate)]
pub struct ReviewInput {
	pub rating: i32,
	#[serde(default)]
	pub comment: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
	Created,
	Updated,
}

#[derive(Debug, Serialize)]
pub struct Submitted {
	pub action: Action,
	pub review: Review,
}

/// Rating statistics of a post, computed from its live reviews.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RatingStats {
	pub average: f64,
	pub count: i64,
	/// Number of reviews per rating, indexed by `rating - 1`.
	pub histogram: [i64; 5],
}

#[derive(Debug, Serialize)]
pub struct ReviewList {
	pub reviews: Vec<Review>,
	pub stats: RatingStats,
}
