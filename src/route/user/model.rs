use serde::Deserialize;
use validator::Validate;

pub use crate::route::auth::model::User;

/// Names are checked by [`super::rename::rename_user`] after trimming.
#[derive(Debug, Deserialize, Validate)]
pub struct RenameInput {
	pub name: String,
}

/// How many denormalized copies of a name were rewritten.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Propagated {
	pub posts: u64,
	pub reviews: u64,
}
