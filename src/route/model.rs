use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::store::Page;

/// These can be removed when [`serde`] supports
/// literal defaults: <https://github.com/serde-rs/serde/issues/368>
#[inline]
fn one() -> i64 {
	1
}

#[inline]
fn twenty() -> i64 {
	20
}

#[derive(Debug, Deserialize, Validate)]
pub struct Paginate {
	/// The page number to return (1-indexed).
	#[validate(range(min = 1, max = 1000))]
	#[serde(default = "one")]
	pub page: i64,
	/// The number of items to return per page.
	#[validate(range(min = 1, max = 100))]
	#[serde(default = "twenty")]
	pub size: i64,
}

impl Paginate {
	pub fn offset(&self) -> i64 {
		(self.page - 1) * self.size
	}

	pub fn limit(&self) -> i64 {
		self.size
	}
}

impl From<Paginate> for Page {
	fn from(paginate: Paginate) -> Self {
		Self {
			limit: paginate.limit(),
			offset: paginate.offset(),
		}
	}
}

#[derive(Debug, Deserialize, Validate)]
pub struct IdInput {
	pub id: Uuid,
}
