use uuid::Uuid;

pub const COOKIE_NAME: &str = "session";

/// Creates a session cookie that lasts for the browser session.
pub fn create_cookie(session_id: Uuid) -> cookie::Cookie<'static> {
	cookie::Cookie::build((COOKIE_NAME, session_id.to_string()))
		.http_only(true)
		.secure(!cfg!(debug_assertions))
		.same_site(cookie::SameSite::Lax)
		.path("/")
		.into()
}

/// Creates an expired session cookie used to invalidate a previous one.
pub fn clear_cookie() -> cookie::Cookie<'static> {
	cookie::Cookie::build(COOKIE_NAME)
		.http_only(true)
		.path("/")
		.max_age(cookie::time::Duration::ZERO)
		.into()
}

#[cfg(test)]
mod test {
	#[test]
	fn test_cookie_carries_session_id() {
		let id = uuid::Uuid::new_v4();
		let cookie = super::create_cookie(id);

		assert_eq!(cookie.name(), super::COOKIE_NAME);
		assert_eq!(cookie.value(), id.to_string());
		assert_eq!(cookie.http_only(), Some(true));
	}

	#[test]
	fn test_clear_cookie_expires() {
		let cookie = super::clear_cookie();

		assert_eq!(cookie.value(), "");
		assert_eq!(cookie.max_age(), Some(cookie::time::Duration::ZERO));
	}
}
