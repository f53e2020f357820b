pub use crate::route::model::{IdInput, Paginate};

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use macros::model;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::store::PostSort;

pub const MAX_TITLE_LENGTH: u64 = 30;
pub const MAX_QUERY_LENGTH: usize = 100;

/// A single step of a recipe.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Step {
	pub text: String,
	/// How long the step takes, in minutes.
	#[serde(default, alias = "min")]
	pub minutes: i32,
}

/// The rating aggregate of a post, recomputed from its live reviews after every
/// review change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize, Serialize)]
pub struct Rating {
	/// Mean rating rounded to one decimal, or 0 without reviews.
	pub average: f64,
	pub count: i64,
}

#[derive(Debug, thiserror::Error)]
#[error("unknown variant `{0}`")]
pub struct UnknownVariant(String);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
	#[default]
	Public,
	Private,
}

impl Visibility {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Public => "public",
			Self::Private => "private",
		}
	}
}

impl TryFrom<String> for Visibility {
	type Error = UnknownVariant;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		match value.as_str() {
			"public" => Ok(Self::Public),
			"private" => Ok(Self::Private),
			_ => Err(UnknownVariant(value)),
		}
	}
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
	#[default]
	Published,
	Draft,
}

impl Status {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Published => "published",
			Self::Draft => "draft",
		}
	}
}

impl TryFrom<String> for Status {
	type Error = UnknownVariant;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		match value.as_str() {
			"published" => Ok(Self::Published),
			"draft" => Ok(Self::Draft),
			_ => Err(UnknownVariant(value)),
		}
	}
}

/// A single recipe, published by a user.
#[model]
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct Post {
	/// The unique identifier of the post.
	#[serde(skip_deserializing)]
	pub id: Uuid,
	/// The user that published the post.
	#[serde(skip_deserializing)]
	pub author_id: Uuid,
	/// Copy of the author's display name.
	#[serde(skip_deserializing)]
	pub author_name: String,
	#[validate(length(min = 1, max = MAX_TITLE_LENGTH))]
	pub title: String,
	#[validate(range(min = 1, max = 100))]
	pub servings: i32,
	/// Total cook time, in minutes.
	#[validate(range(min = 0, max = 10080))]
	pub time_minutes: i32,
	/// Difficulty, free text.
	#[validate(length(max = 20))]
	pub level: String,
	#[validate(length(max = 30))]
	pub category: String,
	#[validate(length(max = 30))]
	pub tags: Vec<String>,
	#[validate(length(max = 5000))]
	pub description: String,
	#[validate(length(max = 100))]
	pub ingredients: Vec<String>,
	#[validate(length(max = 100))]
	pub steps: Vec<Step>,
	pub visibility: Visibility,
	pub status: Status,
	/// Number of users that like the post. Always the size of `liked_by`.
	#[serde(skip_deserializing)]
	pub likes: i64,
	/// The users that like the post, each at most once.
	#[serde(skip)]
	pub liked_by: Vec<Uuid>,
	#[serde(skip_deserializing)]
	pub rating: Rating,
	#[serde(skip_deserializing)]
	pub image_url: Option<String>,
	#[serde(skip_deserializing)]
	pub created_at: DateTime<Utc>,
	#[serde(skip_deserializing)]
	pub updated_at: Option<DateTime<Utc>>,
}

impl Post {
	pub fn is_liked_by(&self, user_id: Uuid) -> bool {
		self.liked_by.contains(&user_id)
	}

	/// Whether anyone may open the post by id. Private posts are only left out
	/// of listings.
	pub fn is_visible(&self) -> bool {
		self.status == Status::Published
	}

	/// Clamps the counter for display. The store keeps it equal to the size of
	/// the liking set, so this only hides a transient underflow.
	pub fn display_likes(&self) -> i64 {
		self.likes.max(0)
	}
}

/// A post as shown to a specific viewer.
#[derive(Debug, Serialize)]
pub struct PostDetail {
	#[serde(flatten)]
	pub post: Post,
	/// Whether the viewer likes the post. Always `false` for anonymous viewers.
	pub user_liked: bool,
}

impl PostDetail {
	pub fn new(mut post: Post, viewer: Option<Uuid>) -> Self {
		post.likes = post.display_likes();

		Self {
			user_liked: viewer.is_some_and(|viewer| post.is_liked_by(viewer)),
			post,
		}
	}
}

/// The outcome of a like toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LikeState {
	pub liked: bool,
	pub likes: i64,
}

/// Rejects search terms that are blank once trimmed.
pub fn validate_query(q: &str) -> Result<(), ValidationError> {
	let trimmed = q.trim();

	if trimmed.is_empty() {
		return Err(ValidationError::new("query must not be blank"));
	}

	if trimmed.chars().count() > MAX_QUERY_LENGTH {
		return Err(ValidationError::new("query must be at most 100 characters"));
	}

	Ok(())
}

#[derive(Debug, Deserialize, Validate)]
pub struct SearchInput {
	#[validate(custom(function = "validate_query"))]
	pub q: String,
	#[serde(default)]
	pub sort: PostSort,
}

/// Normalizes a list field coming from a form: either a JSON array or a
/// comma/newline separated string. Blank entries are dropped.
pub fn parse_list(raw: &str) -> Vec<String> {
	if let Ok(items) = serde_json::from_str::<Vec<serde_json::Value>>(raw) {
		return items
			.into_iter()
			.map(|item| match item {
				serde_json::Value::String(s) => s.trim().to_owned(),
				other => other.to_string(),
			})
			.filter(|item| !item.is_empty())
			.collect();
	}

	raw.lines()
		.flat_map(|line| line.split(','))
		.map(str::trim)
		.filter(|item| !item.is_empty())
		.map(str::to_owned)
		.collect()
}

/// Parses the `steps` form field. Accepts objects with `text` and `min`/`minutes`
/// or bare strings; empty steps are dropped and negative minutes become 0.
pub fn parse_steps(raw: &str) -> Vec<Step> {
	let Ok(items) = serde_json::from_str::<Vec<serde_json::Value>>(raw) else {
		return Vec::new();
	};

	items
		.into_iter()
		.filter_map(|item| {
			let (text, minutes) = match item {
				serde_json::Value::Object(map) => {
					let text = map
						.get("text")
						.and_then(serde_json::Value::as_str)
						.unwrap_or_default()
						.trim()
						.to_owned();
					let minutes = map
						.get("min")
						.or_else(|| map.get("minutes"))
						.and_then(parse_int)
						.unwrap_or(0);

					(text, minutes)
				}
				serde_json::Value::String(s) => (s.trim().to_owned(), 0),
				other => (other.to_string(), 0),
			};

			(!text.is_empty()).then(|| Step {
				text,
				minutes: minutes.max(0),
			})
		})
		.collect()
}

/// Builds a post from the text fields of a multipart form. Missing or malformed
/// numbers fall back to their defaults and are clamped to their minimum.
pub fn from_form(fields: &HashMap<String, String>) -> CreatePost {
	let text = |key: &str| fields.get(key).map_or("", |value| value.trim());
	let number = |key: &str, default: i32, min: i32| {
		text(key).parse::<i32>().map_or(default, |value| value.max(min))
	};
	let level = text("level");

	CreatePost {
		title: text("title").to_owned(),
		servings: number("servings", 1, 1),
		time_minutes: number("time", 0, 0),
		level: (if level.is_empty() { "low" } else { level }).to_owned(),
		category: text("category").to_owned(),
		tags: parse_list(text("tags")),
		description: text("desc").to_owned(),
		ingredients: parse_list(text("ingredients")),
		steps: parse_steps(text("steps")),
		visibility: Visibility::Public,
		status: Status::Published,
	}
}

fn parse_int(value: &serde_json::Value) -> Option<i32> {
	match value {
		serde_json::Value::Number(n) => n.as_i64().and_then(|n| i32::try_from(n).ok()),
		serde_json::Value::String(s) => s.trim().parse().ok(),
		_ => None,
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn test_parse_list_json_and_plain() {
		assert_eq!(parse_list(r#"["salt", " pepper ", ""]"#), vec!["salt", "pepper"]);
		assert_eq!(parse_list("salt, pepper\nrice,,"), vec!["salt", "pepper", "rice"]);
		assert!(parse_list("").is_empty());
	}

	#[test]
	fn test_parse_steps_normalizes() {
		let steps = parse_steps(
			r#"[{"text": "boil", "min": "5"}, {"text": "  "}, "stir", {"text": "rest", "minutes": -3}]"#,
		);

		assert_eq!(
			steps,
			vec![
				Step { text: "boil".into(), minutes: 5 },
				Step { text: "stir".into(), minutes: 0 },
				Step { text: "rest".into(), minutes: 0 },
			]
		);
		assert!(parse_steps("not json").is_empty());
	}

	#[test]
	fn test_from_form_defaults_and_clamps() {
		let fields = HashMap::from([
			("title".to_owned(), "  soup ".to_owned()),
			("servings".to_owned(), "0".to_owned()),
			("time".to_owned(), "abc".to_owned()),
			("tags".to_owned(), r#"["hot", "spicy"]"#.to_owned()),
			("steps".to_owned(), r#"[{"text": "boil", "min": 5}]"#.to_owned()),
		]);

		let post = from_form(&fields);

		assert_eq!(post.title, "soup");
		assert_eq!(post.servings, 1);
		assert_eq!(post.time_minutes, 0);
		assert_eq!(post.level, "low");
		assert_eq!(post.tags, vec!["hot", "spicy"]);
		assert!(post.ingredients.is_empty());
		assert_eq!(post.steps.len(), 1);
	}

	#[test]
	fn test_validate_query() {
		assert!(validate_query(" kimchi ").is_ok());
		assert!(validate_query("").is_err());
		assert!(validate_query(" \t ").is_err());
		assert!(validate_query(&"a".repeat(100)).is_ok());
		assert!(validate_query(&"a".repeat(101)).is_err());
	}

	#[test]
	fn test_title_length_is_validated() {
		let mut post = CreatePost {
			title: "a".repeat(30),
			servings: 1,
			time_minutes: 0,
			level: String::new(),
			category: String::new(),
			tags: Vec::new(),
			description: String::new(),
			ingredients: Vec::new(),
			steps: Vec::new(),
			visibility: Visibility::Public,
			status: Status::Published,
		};

		assert!(post.validate().is_ok());

		post.title = "a".repeat(31);
		assert!(post.validate().is_err());

		post.title = String::new();
		assert!(post.validate().is_err());
	}

	#[test]
	fn test_update_applies_only_given_fields() {
		let mut post = Post {
			id: Uuid::new_v4(),
			author_id: Uuid::new_v4(),
			author_name: "cook".into(),
			title: "old".into(),
			servings: 2,
			time_minutes: 10,
			level: "low".into(),
			category: "soup".into(),
			tags: Vec::new(),
			description: String::new(),
			ingredients: Vec::new(),
			steps: Vec::new(),
			visibility: Visibility::Public,
			status: Status::Published,
			likes: 0,
			liked_by: Vec::new(),
			rating: Rating::default(),
			image_url: None,
			created_at: Utc::now(),
			updated_at: None,
		};

		let update: UpdatePost = serde_json::from_value(serde_json::json!({
			"title": "new",
			"servings": 4,
		}))
		.unwrap();
		update.apply(&mut post);

		assert_eq!(post.title, "new");
		assert_eq!(post.servings, 4);
		assert_eq!(post.category, "soup");
	}
}
