use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

pub const MAX_NAME_LENGTH: usize = 20;

/// Rejects names that are blank once surrounding whitespace is removed.
pub fn validate_name(name: &str) -> Result<(), ValidationError> {
	let trimmed = name.trim();

	if trimmed.is_empty() {
		return Err(ValidationError::new("name must not be blank"));
	}

	if trimmed.chars().count() > MAX_NAME_LENGTH {
		return Err(ValidationError::new("name must be at most 20 characters"));
	}

	Ok(())
}

/// A single user.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
	/// The unique identifier of the user.
	pub id: Uuid,
	/// The display name, unique across users. Posts and reviews keep a copy of it.
	pub name: String,
	/// The user's email address, used for logging in. Stored lowercased.
	#[serde(skip_serializing)]
	pub email: String,
	/// The hashed password, salted with `id`.
	#[serde(skip)]
	pub password: Vec<u8>,
	pub marketing_agree: bool,
	pub profile_image_url: Option<String>,
	/// The creation time of the user.
	pub created_at: chrono::DateTime<chrono::Utc>,
	pub updated_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Session {
	/// The session id.
	#[serde(rename = "session_id")]
	pub id: Uuid,
	/// The user that owns the session.
	#[serde(skip)]
	pub user_id: Uuid,
	/// The creation time of the session.
	pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginInput {
	#[validate(length(min = 1, max = 254))]
	pub email: String,
	#[validate(length(min = 1, max = 128))]
	pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterInput {
	/// The name that is displayed to the public.
	#[validate(custom(function = "validate_name"))]
	pub name: String,
	#[validate(email)]
	pub email: String,
	#[validate(length(min = 8, max = 128))]
	pub password: String,
	#[serde(default)]
	pub marketing_agree: bool,
}

/// Normalizes an email for storage and lookup.
pub fn normalize_email(email: &str) -> String {
	email.trim().to_lowercase()
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn test_validate_name() {
		assert!(validate_name("cook").is_ok());
		assert!(validate_name("  cook  ").is_ok());
		assert!(validate_name("   ").is_err());
		assert!(validate_name(&"a".repeat(20)).is_ok());
		assert!(validate_name(&"a".repeat(21)).is_err());
	}

	#[test]
	fn test_register_input_rejects_short_password() {
		let input = RegisterInput {
			name: "cook".into(),
			email: "a@b.com".into(),
			password: "short".into(),
			marketing_agree: false,
		};

		assert!(input.validate().is_err());
	}

	#[test]
	fn test_normalize_email() {
		assert_eq!(normalize_email("  A@B.Com "), "a@b.com");
	}
}
