use axum::{
	extract::DefaultBodyLimit,
	http::StatusCode,
	routing::{get, post},
	Router,
};
use uuid::Uuid;

use crate::{error, AppState};

pub mod like;
pub mod model;
pub mod route;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("unknown post {0}")]
	UnknownPost(Uuid),
	#[error("not the author of post {0}")]
	NotAuthor(Uuid),
	#[error("form field {0} is too large")]
	FieldTooLarge(String),
}

pub type RouteError = error::RouteError<Error>;

impl From<Error> for RouteError {
	fn from(error: Error) -> Self {
		Self::Route(error)
	}
}

pub fn routes() -> Router<AppState> {
	use route::*;

	Router::new()
		.route(
			"/",
			get(get_posts)
				.merge(post(create_post).layer(DefaultBodyLimit::max(MAX_FORM_BYTES))),
		)
		.route("/top", get(get_top_posts))
		.route("/search", get(search_posts))
		.route("/me", get(get_user_posts))
		.route("/liked", get(get_liked_posts))
		.route(
			"/:id",
			get(get_post).put(update_post).delete(delete_post),
		)
		.route("/:id/like", post(like_post))
}

impl error::ErrorShape for Error {
	fn status(&self) -> StatusCode {
		match self {
			Self::UnknownPost(..) => StatusCode::NOT_FOUND,
			Self::NotAuthor(..) => StatusCode::FORBIDDEN,
			Self::FieldTooLarge(..) => StatusCode::BAD_REQUEST,
		}
	}

	fn message(&self) -> error::Message<'static> {
		match self {
			Self::UnknownPost(post) => error::Message::new("unknown_post")
				.content("The post does not exist.")
				.detail("post", post.to_string()),
			Self::NotAuthor(post) => error::Message::new("forbidden")
				.content("Only the author can change this post.")
				.detail("post", post.to_string()),
			Self::FieldTooLarge(field) => error::Message::new("invalid_input")
				.content(self.to_string())
				.detail("field", field.clone()),
		}
	}
}

#[cfg(test)]
mod test {
	use crate::test::*;

	#[tokio::test]
	async fn test_long_title_is_rejected() {
		let app = server(state());

		register(&app, "john", "john@smith.com").await;

		let response = multipart(
			app.post("/posts"),
			&[FormPart::text("title", &"a".repeat(31))],
		)
		.await;

		assert_eq!(response.status_code(), 400);
		assert_eq!(response.json::<Value>()["error"], "invalid_input");

		let response = multipart(app.post("/posts"), &[FormPart::text("title", "   ")]).await;

		assert_eq!(response.status_code(), 400);
	}

	#[tokio::test]
	async fn test_create_and_read_post() {
		let app = server(state());

		register(&app, "john", "john@smith.com").await;

		let response = multipart(
			app.post("/posts"),
			&[
				FormPart::text("title", "Kimchi stew"),
				FormPart::text("servings", "2"),
				FormPart::text("ingredients", r#"["kimchi", "pork"]"#),
				FormPart::text("steps", r#"[{"text": "boil", "min": 10}]"#),
				FormPart::file("image", "stew.exe", b"nope"),
			],
		)
		.await;

		assert_eq!(response.status_code(), 201);

		let post = response.json::<Value>();

		assert_eq!(post["author_name"], "john");
		assert_eq!(post["likes"], 0);
		assert!(post["image_url"].is_null());
		assert_eq!(post["steps"][0]["minutes"], 10);

		let id = post["id"].as_str().unwrap();
		let response = app.get(&format!("/posts/{id}")).await;

		assert_eq!(response.status_code(), 200);
		assert_eq!(response.json::<Value>()["user_liked"], false);
	}

	#[tokio::test]
	async fn test_like_unknown_post_is_not_found() {
		let app = server(state());

		register(&app, "john", "john@smith.com").await;

		let response = app
			.post(&format!("/posts/{}/like", Uuid::new_v4()))
			.await;

		assert_eq!(response.status_code(), 404);
		assert_eq!(response.json::<Value>()["error"], "unknown_post");
	}

	#[tokio::test]
	async fn test_like_requires_session() {
		let state = state();
		let author = seed_user(state.database.as_ref(), "author").await;
		let post = seed_post(state.database.as_ref(), &author, "soup").await;
		let app = server(state);

		let response = app.post(&format!("/posts/{}/like", post.id)).await;

		assert_eq!(response.status_code(), 401);
	}

	#[tokio::test]
	async fn test_like_toggle_over_http() {
		let state = state();
		let author = seed_user(state.database.as_ref(), "author").await;
		let post = seed_post(state.database.as_ref(), &author, "soup").await;
		let app = server(state);

		register(&app, "john", "john@smith.com").await;

		let response = app.post(&format!("/posts/{}/like", post.id)).await;

		assert_eq!(response.json::<Value>(), json!({ "liked": true, "likes": 1 }));

		let response = app.get(&format!("/posts/{}", post.id)).await;

		assert_eq!(response.json::<Value>()["user_liked"], true);

		let response = app.get("/posts/liked").await;

		assert_eq!(response.json::<Value>().as_array().unwrap().len(), 1);

		let response = app.post(&format!("/posts/{}/like", post.id)).await;

		assert_eq!(response.json::<Value>(), json!({ "liked": false, "likes": 0 }));
	}

	#[tokio::test]
	async fn test_only_author_changes_post() {
		let state = state();
		let author = seed_user(state.database.as_ref(), "author").await;
		let post = seed_post(state.database.as_ref(), &author, "soup").await;
		let app = server(state.clone());

		register(&app, "john", "john@smith.com").await;

		let response = app
			.put(&format!("/posts/{}", post.id))
			.json(&json!({ "title": "mine now" }))
			.await;

		assert_eq!(response.status_code(), 403);

		let response = app.delete(&format!("/posts/{}", post.id)).await;

		assert_eq!(response.status_code(), 403);
		assert!(state.database.post(post.id).await.unwrap().is_some());
	}

	#[tokio::test]
	async fn test_author_updates_and_deletes_post() {
		let app = server(state());

		register(&app, "john", "john@smith.com").await;

		let response = multipart(app.post("/posts"), &[FormPart::text("title", "soup")]).await;
		let id = response.json::<Value>()["id"].as_str().unwrap().to_owned();

		let response = app
			.put(&format!("/posts/{id}"))
			.json(&json!({ "title": "better soup", "status": "draft" }))
			.await;

		assert_eq!(response.status_code(), 200);
		assert_eq!(response.json::<Value>()["title"], "better soup");

		let response = app
			.put(&format!("/posts/{id}"))
			.json(&json!({ "title": "a".repeat(31) }))
			.await;

		assert_eq!(response.status_code(), 400);

		// Drafts stay visible to their author.
		assert_eq!(app.get(&format!("/posts/{id}")).await.status_code(), 200);
		assert!(app.get("/posts").await.json::<Value>().as_array().unwrap().is_empty());

		let response = app.delete(&format!("/posts/{id}")).await;

		assert_eq!(response.status_code(), 204);
		assert_eq!(app.get(&format!("/posts/{id}")).await.status_code(), 404);
	}

	#[tokio::test]
	async fn test_search_and_top() {
		let state = state();
		let author = seed_user(state.database.as_ref(), "author").await;

		for title in ["Kimchi stew", "kimchi fried rice", "Bulgogi", "100% juice"] {
			seed_post(state.database.as_ref(), &author, title).await;
		}

		let app = server(state);

		let response = app.get("/posts/search").add_query_param("q", "KIMCHI").await;

		assert_eq!(response.json::<Value>().as_array().unwrap().len(), 2);

		let response = app.get("/posts/search").add_query_param("q", "%").await;

		assert_eq!(response.json::<Value>().as_array().unwrap().len(), 1);

		let response = app.get("/posts/top").await;

		assert_eq!(response.json::<Value>().as_array().unwrap().len(), 4);
	}

	#[tokio::test]
	async fn test_blank_search_is_rejected() {
		let state = state();
		let author = seed_user(state.database.as_ref(), "author").await;

		seed_post(state.database.as_ref(), &author, "soup").await;

		let app = server(state);

		let response = app.get("/posts/search").add_query_param("q", "   ").await;

		assert_eq!(response.status_code(), 400);
		assert_eq!(response.json::<Value>()["error"], "invalid_input");

		let response = app.get("/posts/search").add_query_param("q", " soup ").await;

		assert_eq!(response.status_code(), 200);
		assert_eq!(response.json::<Value>().as_array().unwrap().len(), 1);
	}

	#[tokio::test]
	async fn test_oversized_image_is_dropped() {
		let app = server(state());

		register(&app, "john", "john@smith.com").await;

		let image = vec![0_u8; 2 * 1024 * 1024];
		let response = multipart(
			app.post("/posts"),
			&[
				FormPart::file("image", "big.png", &image),
				FormPart::text("title", "soup"),
			],
		)
		.await;

		assert_eq!(response.status_code(), 201);

		let post = response.json::<Value>();

		assert_eq!(post["title"], "soup");
		assert!(post["image_url"].is_null());
	}

	#[tokio::test]
	async fn test_oversized_text_field_is_rejected() {
		let app = server(state());

		register(&app, "john", "john@smith.com").await;

		let description = "a".repeat(65 * 1024);
		let response = multipart(
			app.post("/posts"),
			&[
				FormPart::text("title", "soup"),
				FormPart::text("desc", &description),
			],
		)
		.await;

		assert_eq!(response.status_code(), 400);
		assert_eq!(response.json::<Value>()["details"]["field"], "desc");
	}
}
