use sqlx::{postgres::PgPoolOptions, types::Json, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{
	Constraint, Error, NewPost, NewReview, NewUser, Page, PostFilter, PostSort, Result, Store,
	UpsertedReview,
};
use crate::route::{
	auth::model::{Session, User},
	chat::model::{ChatMessage, ChatRole},
	post::model::{Post, Rating, Status, Step, UpdatePost, Visibility},
	review::model::Review,
};

/// The production store, backed by a PostgreSQL pool.
#[derive(Clone)]
pub struct PgStore {
	pool: PgPool,
}

impl PgStore {
	/// Connects to the database and applies any pending migrations.
	pub async fn connect(url: &str) -> Result<Self> {
		let pool = PgPoolOptions::new().max_connections(16).connect(url).await?;

		sqlx::migrate!("./migrations").run(&pool).await?;

		Ok(Self { pool })
	}
}

#[derive(sqlx::FromRow)]
struct PostRow {
	id: Uuid,
	author_id: Uuid,
	author_name: String,
	title: String,
	servings: i32,
	time_minutes: i32,
	level: String,
	category: String,
	tags: Vec<String>,
	description: String,
	ingredients: Vec<String>,
	steps: Json<Vec<Step>>,
	#[sqlx(try_from = "String")]
	visibility: Visibility,
	#[sqlx(try_from = "String")]
	status: Status,
	likes: i64,
	liked_by: Vec<Uuid>,
	rating_average: f64,
	rating_count: i64,
	image_url: Option<String>,
	created_at: chrono::DateTime<chrono::Utc>,
	updated_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<PostRow> for Post {
	fn from(row: PostRow) -> Self {
		Self {
			id: row.id,
			author_id: row.author_id,
			author_name: row.author_name,
			title: row.title,
			servings: row.servings,
			time_minutes: row.time_minutes,
			level: row.level,
			category: row.category,
			tags: row.tags,
			description: row.description,
			ingredients: row.ingredients,
			steps: row.steps.0,
			visibility: row.visibility,
			status: row.status,
			likes: row.likes,
			liked_by: row.liked_by,
			rating: Rating {
				average: row.rating_average,
				count: row.rating_count,
			},
			image_url: row.image_url,
			created_at: row.created_at,
			updated_at: row.updated_at,
		}
	}
}

#[derive(sqlx::FromRow)]
struct UpsertRow {
	#[sqlx(flatten)]
	review: Review,
	created: bool,
}

/// Maps unique violations on the user table onto [`Error::Conflict`].
fn map_unique(error: sqlx::Error) -> Error {
	if let sqlx::Error::Database(ref database) = error {
		match database.constraint() {
			Some("user_email_key") => return Error::Conflict(Constraint::UserEmail),
			Some("user_name_key") => return Error::Conflict(Constraint::UserName),
			_ => {}
		}
	}

	Error::Database(error)
}

/// Escapes the wildcards of a `LIKE` pattern.
fn escape_like(text: &str) -> String {
	let mut escaped = String::with_capacity(text.len());

	for c in text.chars() {
		if matches!(c, '\\' | '%' | '_') {
			escaped.push('\\');
		}

		escaped.push(c);
	}

	escaped
}

#[axum::async_trait]
impl Store for PgStore {
	async fn insert_user(&self, user: NewUser) -> Result<User> {
		sqlx::query_as::<_, User>(
			r#"
				INSERT INTO "user" (id, name, email, password, marketing_agree)
				VALUES ($1, $2, $3, $4, $5)
				RETURNING *
			"#,
		)
		.bind(user.id)
		.bind(&user.name)
		.bind(&user.email)
		.bind(&user.password)
		.bind(user.marketing_agree)
		.fetch_one(&self.pool)
		.await
		.map_err(map_unique)
	}

	async fn user(&self, id: Uuid) -> Result<Option<User>> {
		Ok(
			sqlx::query_as::<_, User>(r#"SELECT * FROM "user" WHERE id = $1"#)
				.bind(id)
				.fetch_optional(&self.pool)
				.await?,
		)
	}

	async fn user_by_email(&self, email: &str) -> Result<Option<User>> {
		Ok(
			sqlx::query_as::<_, User>(r#"SELECT * FROM "user" WHERE email = $1"#)
				.bind(email)
				.fetch_optional(&self.pool)
				.await?,
		)
	}

	async fn user_by_name(&self, name: &str) -> Result<Option<User>> {
		Ok(
			sqlx::query_as::<_, User>(r#"SELECT * FROM "user" WHERE name = $1"#)
				.bind(name)
				.fetch_optional(&self.pool)
				.await?,
		)
	}

	async fn set_user_name(&self, id: Uuid, name: &str) -> Result<bool> {
		let result = sqlx::query(r#"UPDATE "user" SET name = $2, updated_at = now() WHERE id = $1"#)
			.bind(id)
			.bind(name)
			.execute(&self.pool)
			.await
			.map_err(map_unique)?;

		Ok(result.rows_affected() > 0)
	}

	async fn set_profile_image(&self, id: Uuid, url: &str) -> Result<bool> {
		let result = sqlx::query(
			r#"UPDATE "user" SET profile_image_url = $2, updated_at = now() WHERE id = $1"#,
		)
		.bind(id)
		.bind(url)
		.execute(&self.pool)
		.await?;

		Ok(result.rows_affected() > 0)
	}

	async fn insert_session(&self, user_id: Uuid) -> Result<Session> {
		Ok(
			sqlx::query_as::<_, Session>("INSERT INTO session (user_id) VALUES ($1) RETURNING *")
				.bind(user_id)
				.fetch_one(&self.pool)
				.await?,
		)
	}

	async fn session_user(&self, session_id: Uuid) -> Result<Option<User>> {
		Ok(sqlx::query_as::<_, User>(
			r#"
				SELECT * FROM "user" WHERE id = (
					SELECT user_id FROM session WHERE id = $1
				)
			"#,
		)
		.bind(session_id)
		.fetch_optional(&self.pool)
		.await?)
	}

	async fn delete_session(&self, session_id: Uuid) -> Result<()> {
		sqlx::query("DELETE FROM session WHERE id = $1")
			.bind(session_id)
			.execute(&self.pool)
			.await?;

		Ok(())
	}

	async fn insert_post(&self, post: NewPost) -> Result<Post> {
		let NewPost {
			author_id,
			author_name,
			input,
			image_url,
		} = post;

		let row = sqlx::query_as::<_, PostRow>(
			r#"
				INSERT INTO post (
					author_id, author_name, title, servings, time_minutes, level, category,
					tags, description, ingredients, steps, visibility, status, image_url
				)
				VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
				RETURNING *
			"#,
		)
		.bind(author_id)
		.bind(author_name)
		.bind(input.title)
		.bind(input.servings)
		.bind(input.time_minutes)
		.bind(input.level)
		.bind(input.category)
		.bind(input.tags)
		.bind(input.description)
		.bind(input.ingredients)
		.bind(Json(input.steps))
		.bind(input.visibility.as_str())
		.bind(input.status.as_str())
		.bind(image_url)
		.fetch_one(&self.pool)
		.await?;

		Ok(row.into())
	}

	async fn post(&self, id: Uuid) -> Result<Option<Post>> {
		let row = sqlx::query_as::<_, PostRow>("SELECT * FROM post WHERE id = $1")
			.bind(id)
			.fetch_optional(&self.pool)
			.await?;

		Ok(row.map(Post::from))
	}

	async fn update_post(&self, id: Uuid, update: UpdatePost) -> Result<Option<Post>> {
		let row = sqlx::query_as::<_, PostRow>(
			r#"
				UPDATE post SET
					title = COALESCE($2, title),
					servings = COALESCE($3, servings),
					time_minutes = COALESCE($4, time_minutes),
					level = COALESCE($5, level),
					category = COALESCE($6, category),
					tags = COALESCE($7, tags),
					description = COALESCE($8, description),
					ingredients = COALESCE($9, ingredients),
					steps = COALESCE($10, steps),
					visibility = COALESCE($11, visibility),
					status = COALESCE($12, status),
					updated_at = now()
				WHERE id = $1
				RETURNING *
			"#,
		)
		.bind(id)
		.bind(update.title)
		.bind(update.servings)
		.bind(update.time_minutes)
		.bind(update.level)
		.bind(update.category)
		.bind(update.tags)
		.bind(update.description)
		.bind(update.ingredients)
		.bind(update.steps.map(Json))
		.bind(update.visibility.map(Visibility::as_str))
		.bind(update.status.map(Status::as_str))
		.fetch_optional(&self.pool)
		.await?;

		Ok(row.map(Post::from))
	}

	async fn delete_post(&self, id: Uuid) -> Result<bool> {
		let result = sqlx::query("DELETE FROM post WHERE id = $1")
			.bind(id)
			.execute(&self.pool)
			.await?;

		Ok(result.rows_affected() > 0)
	}

	async fn posts(&self, filter: PostFilter, sort: PostSort, page: Page) -> Result<Vec<Post>> {
		let mut query = QueryBuilder::<Postgres>::new("SELECT * FROM post WHERE ");

		match filter {
			PostFilter::Public => {
				query.push("status = 'published' AND visibility = 'public'");
			}
			PostFilter::TitleContains(text) => {
				query.push("status = 'published' AND visibility = 'public' AND title ILIKE ");
				query.push_bind(format!("%{}%", escape_like(&text)));
			}
			PostFilter::Author(author_id) => {
				query.push("author_id = ");
				query.push_bind(author_id);
			}
			PostFilter::LikedBy(user_id) => {
				query.push_bind(user_id);
				query.push(" = ANY(liked_by)");
			}
		}

		query.push(match sort {
			PostSort::Likes => " ORDER BY likes DESC, created_at DESC, id DESC",
			PostSort::Recent => " ORDER BY created_at DESC, id DESC",
			PostSort::Time => " ORDER BY time_minutes ASC, created_at DESC, id DESC",
		});

		query.push(" LIMIT ");
		query.push_bind(page.limit);
		query.push(" OFFSET ");
		query.push_bind(page.offset);

		let rows = query
			.build_query_as::<PostRow>()
			.fetch_all(&self.pool)
			.await?;

		Ok(rows.into_iter().map(Post::from).collect())
	}

	async fn add_like(&self, post_id: Uuid, user_id: Uuid) -> Result<Option<i64>> {
		Ok(sqlx::query_scalar::<_, i64>(
			r#"
				UPDATE post
				SET liked_by = array_append(liked_by, $2), likes = likes + 1
				WHERE id = $1 AND NOT ($2 = ANY(liked_by))
				RETURNING likes
			"#,
		)
		.bind(post_id)
		.bind(user_id)
		.fetch_optional(&self.pool)
		.await?)
	}

	async fn remove_like(&self, post_id: Uuid, user_id: Uuid) -> Result<Option<i64>> {
		Ok(sqlx::query_scalar::<_, i64>(
			r#"
				UPDATE post
				SET liked_by = array_remove(liked_by, $2), likes = likes - 1
				WHERE id = $1 AND $2 = ANY(liked_by)
				RETURNING likes
			"#,
		)
		.bind(post_id)
		.bind(user_id)
		.fetch_optional(&self.pool)
		.await?)
	}

	async fn set_rating(&self, post_id: Uuid, rating: Rating) -> Result<bool> {
		let result =
			sqlx::query("UPDATE post SET rating_average = $2, rating_count = $3 WHERE id = $1")
				.bind(post_id)
				.bind(rating.average)
				.bind(rating.count)
				.execute(&self.pool)
				.await?;

		Ok(result.rows_affected() > 0)
	}

	async fn set_author_name(&self, author_id: Uuid, name: &str) -> Result<u64> {
		let result =
			sqlx::query("UPDATE post SET author_name = $2 WHERE author_id = $1 AND author_name <> $2")
				.bind(author_id)
				.bind(name)
				.execute(&self.pool)
				.await?;

		Ok(result.rows_affected())
	}

	async fn upsert_review(&self, review: NewReview) -> Result<UpsertedReview> {
		let row = sqlx::query_as::<_, UpsertRow>(
			r#"
				INSERT INTO review (post_id, user_id, user_name, rating, comment)
				VALUES ($1, $2, $3, $4, $5)
				ON CONFLICT (post_id, user_id) DO UPDATE SET
					user_name = EXCLUDED.user_name,
					rating = EXCLUDED.rating,
					comment = EXCLUDED.comment,
					updated_at = now()
				RETURNING *, (xmax = 0) AS created
			"#,
		)
		.bind(review.post_id)
		.bind(review.user_id)
		.bind(&review.user_name)
		.bind(review.rating)
		.bind(&review.comment)
		.fetch_one(&self.pool)
		.await?;

		Ok(UpsertedReview {
			review: row.review,
			created: row.created,
		})
	}

	async fn review(&self, id: Uuid) -> Result<Option<Review>> {
		Ok(
			sqlx::query_as::<_, Review>("SELECT * FROM review WHERE id = $1")
				.bind(id)
				.fetch_optional(&self.pool)
				.await?,
		)
	}

	async fn review_by_pair(&self, post_id: Uuid, user_id: Uuid) -> Result<Option<Review>> {
		Ok(
			sqlx::query_as::<_, Review>("SELECT * FROM review WHERE post_id = $1 AND user_id = $2")
				.bind(post_id)
				.bind(user_id)
				.fetch_optional(&self.pool)
				.await?,
		)
	}

	async fn reviews_for_post(&self, post_id: Uuid) -> Result<Vec<Review>> {
		Ok(sqlx::query_as::<_, Review>(
			"SELECT * FROM review WHERE post_id = $1 ORDER BY created_at DESC, id DESC",
		)
		.bind(post_id)
		.fetch_all(&self.pool)
		.await?)
	}

	async fn delete_review(&self, id: Uuid) -> Result<bool> {
		let result = sqlx::query("DELETE FROM review WHERE id = $1")
			.bind(id)
			.execute(&self.pool)
			.await?;

		Ok(result.rows_affected() > 0)
	}

	async fn set_reviewer_name(&self, user_id: Uuid, name: &str) -> Result<u64> {
		let result =
			sqlx::query("UPDATE review SET user_name = $2 WHERE user_id = $1 AND user_name <> $2")
				.bind(user_id)
				.bind(name)
				.execute(&self.pool)
				.await?;

		Ok(result.rows_affected())
	}

	async fn insert_chat_message(
		&self,
		user_id: Uuid,
		role: ChatRole,
		content: &str,
	) -> Result<ChatMessage> {
		Ok(sqlx::query_as::<_, ChatMessage>(
			"INSERT INTO chat_message (user_id, role, content) VALUES ($1, $2, $3) RETURNING *",
		)
		.bind(user_id)
		.bind(role.as_str())
		.bind(content)
		.fetch_one(&self.pool)
		.await?)
	}

	async fn recent_chat_messages(&self, user_id: Uuid, limit: i64) -> Result<Vec<ChatMessage>> {
		Ok(sqlx::query_as::<_, ChatMessage>(
			r#"
				SELECT * FROM (
					SELECT * FROM chat_message
					WHERE user_id = $1
					ORDER BY created_at DESC, id DESC
					LIMIT $2
				) recent
				ORDER BY created_at ASC, id ASC
			"#,
		)
		.bind(user_id)
		.bind(limit)
		.fetch_all(&self.pool)
		.await?)
	}

	async fn prune_chat_messages(&self, user_id: Uuid, keep: i64) -> Result<u64> {
		let result = sqlx::query(
			r#"
				DELETE FROM chat_message
				WHERE user_id = $1 AND id NOT IN (
					SELECT id FROM chat_message
					WHERE user_id = $1
					ORDER BY created_at DESC, id DESC
					LIMIT $2
				)
			"#,
		)
		.bind(user_id)
		.bind(keep)
		.execute(&self.pool)
		.await?;

		Ok(result.rows_affected())
	}

	async fn clear_chat_messages(&self, user_id: Uuid) -> Result<u64> {
		let result = sqlx::query("DELETE FROM chat_message WHERE user_id = $1")
			.bind(user_id)
			.execute(&self.pool)
			.await?;

		Ok(result.rows_affected())
	}
}

#[cfg(test)]
mod test {
	use super::*;

	async fn seed_user(store: &PgStore, name: &str) -> User {
		store
			.insert_user(NewUser {
				id: Uuid::new_v4(),
				name: name.to_owned(),
				email: format!("{name}@example.com"),
				password: vec![0; 32],
				marketing_agree: false,
			})
			.await
			.unwrap()
	}

	async fn seed_post(store: &PgStore, author: &User) -> Post {
		store
			.insert_post(NewPost {
				author_id: author.id,
				author_name: author.name.clone(),
				input: crate::test::create_post_input("soup"),
				image_url: None,
			})
			.await
			.unwrap()
	}

	fn review(post: &Post, user: &User, rating: i32, comment: &str) -> NewReview {
		NewReview {
			post_id: post.id,
			user_id: user.id,
			user_name: user.name.clone(),
			rating,
			comment: comment.to_owned(),
		}
	}

	#[test]
	fn test_escape_like() {
		assert_eq!(escape_like("kimchi"), "kimchi");
		assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
	}

	#[sqlx::test(migrations = "./migrations")]
	async fn test_unique_constraints_map_to_conflicts(pool: PgPool) {
		let store = PgStore { pool };
		let first = seed_user(&store, "first").await;
		let second = seed_user(&store, "second").await;

		assert!(matches!(
			store.set_user_name(second.id, "first").await,
			Err(Error::Conflict(Constraint::UserName))
		));
		assert_eq!(store.user(second.id).await.unwrap().unwrap().name, "second");

		let duplicate = store
			.insert_user(NewUser {
				id: Uuid::new_v4(),
				name: "third".into(),
				email: first.email.clone(),
				password: Vec::new(),
				marketing_agree: false,
			})
			.await;

		assert!(matches!(
			duplicate,
			Err(Error::Conflict(Constraint::UserEmail))
		));
		assert!(!store.set_user_name(Uuid::new_v4(), "ghost").await.unwrap());
	}

	#[sqlx::test(migrations = "./migrations")]
	async fn test_like_counter_matches_liking_set(pool: PgPool) {
		let store = PgStore { pool };
		let author = seed_user(&store, "author").await;
		let post = seed_post(&store, &author).await;
		let (fan, other) = (Uuid::new_v4(), Uuid::new_v4());

		assert_eq!(store.add_like(post.id, fan).await.unwrap(), Some(1));
		assert_eq!(store.add_like(post.id, fan).await.unwrap(), None);
		assert_eq!(store.add_like(post.id, other).await.unwrap(), Some(2));
		assert_eq!(store.remove_like(post.id, fan).await.unwrap(), Some(1));
		assert_eq!(store.remove_like(post.id, fan).await.unwrap(), None);
		assert_eq!(store.add_like(Uuid::new_v4(), fan).await.unwrap(), None);

		let post = store.post(post.id).await.unwrap().unwrap();

		assert_eq!(post.likes, 1);
		assert_eq!(post.liked_by, vec![other]);

		let liked = store
			.posts(PostFilter::LikedBy(other), PostSort::Likes, Page::first(10))
			.await
			.unwrap();

		assert_eq!(liked.len(), 1);
	}

	#[sqlx::test(migrations = "./migrations")]
	async fn test_review_upsert_keeps_one_per_pair(pool: PgPool) {
		let store = PgStore { pool };
		let author = seed_user(&store, "author").await;
		let reviewer = seed_user(&store, "reviewer").await;
		let post = seed_post(&store, &author).await;

		let first = store.upsert_review(review(&post, &reviewer, 2, "meh")).await.unwrap();
		let second = store.upsert_review(review(&post, &reviewer, 5, "wow")).await.unwrap();

		assert!(first.created);
		assert!(!second.created);
		assert_eq!(first.review.id, second.review.id);

		let reviews = store.reviews_for_post(post.id).await.unwrap();

		assert_eq!(reviews.len(), 1);
		assert_eq!(reviews[0].rating, 5);
		assert_eq!(reviews[0].comment, "wow");

		let rating = Rating {
			average: 5.0,
			count: 1,
		};

		assert!(store.set_rating(post.id, rating).await.unwrap());
		assert_eq!(store.post(post.id).await.unwrap().unwrap().rating, rating);

		assert!(store.delete_post(post.id).await.unwrap());
		assert!(store.review(first.review.id).await.unwrap().is_none());
	}

	#[sqlx::test(migrations = "./migrations")]
	async fn test_name_fan_out_is_idempotent(pool: PgPool) {
		let store = PgStore { pool };
		let author = seed_user(&store, "author").await;
		let reviewer = seed_user(&store, "reviewer").await;
		let post = seed_post(&store, &author).await;

		seed_post(&store, &author).await;
		store
			.upsert_review(review(&post, &reviewer, 4, ""))
			.await
			.unwrap();

		assert_eq!(store.set_author_name(author.id, "chef").await.unwrap(), 2);
		assert_eq!(store.set_author_name(author.id, "chef").await.unwrap(), 0);
		assert_eq!(store.set_reviewer_name(reviewer.id, "critic").await.unwrap(), 1);
		assert_eq!(store.set_reviewer_name(reviewer.id, "critic").await.unwrap(), 0);

		assert_eq!(store.post(post.id).await.unwrap().unwrap().author_name, "chef");
		assert_eq!(
			store.reviews_for_post(post.id).await.unwrap()[0].user_name,
			"critic"
		);
	}

	#[sqlx::test(migrations = "./migrations")]
	async fn test_chat_history_is_pruned_to_newest(pool: PgPool) {
		let store = PgStore { pool };
		let user = seed_user(&store, "cook").await;

		for i in 0..105 {
			store
				.insert_chat_message(user.id, ChatRole::User, &format!("message {i}"))
				.await
				.unwrap();
		}

		assert_eq!(store.prune_chat_messages(user.id, 100).await.unwrap(), 5);

		let kept = store.recent_chat_messages(user.id, i64::MAX).await.unwrap();

		assert_eq!(kept.len(), 100);
		assert_eq!(kept[0].content, "message 5");
		assert_eq!(kept[99].content, "message 104");

		let recent = store.recent_chat_messages(user.id, 2).await.unwrap();

		assert_eq!(recent[0].content, "message 103");
		assert_eq!(recent[1].content, "message 104");

		assert_eq!(store.clear_chat_messages(user.id).await.unwrap(), 100);
	}
}
