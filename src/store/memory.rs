use std::{
	collections::HashMap,
	sync::atomic::{AtomicI64, Ordering},
};

use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
	Constraint, Error, NewPost, NewReview, NewUser, Page, PostFilter, PostSort, Result, Store,
	UpsertedReview,
};
use crate::route::{
	auth::model::{Session, User},
	chat::model::{ChatMessage, ChatRole},
	post::model::{Post, Rating, Status, UpdatePost, Visibility},
	review::model::Review,
};

/// A store that keeps everything in process memory. Used by tests and for
/// local development without a database.
///
/// Each table sits behind its own lock, and every method holds the lock of the
/// table it mutates for its whole duration, which gives the same per-row
/// atomicity as the database.
#[derive(Default)]
pub struct MemoryStore {
	users: RwLock<HashMap<Uuid, User>>,
	sessions: RwLock<HashMap<Uuid, Session>>,
	posts: RwLock<HashMap<Uuid, Post>>,
	reviews: RwLock<HashMap<Uuid, Review>>,
	chat: RwLock<Vec<ChatMessage>>,
	chat_sequence: AtomicI64,
}

impl MemoryStore {
	pub fn new() -> Self {
		Self::default()
	}
}

fn paginate<T>(items: Vec<T>, page: Page) -> Vec<T> {
	let offset = usize::try_from(page.offset).unwrap_or(0);
	let limit = usize::try_from(page.limit).unwrap_or(0);

	items.into_iter().skip(offset).take(limit).collect()
}

#[axum::async_trait]
impl Store for MemoryStore {
	async fn insert_user(&self, user: NewUser) -> Result<User> {
		let mut users = self.users.write().await;

		if users.values().any(|u| u.email == user.email) {
			return Err(Error::Conflict(Constraint::UserEmail));
		}

		if users.values().any(|u| u.name == user.name) {
			return Err(Error::Conflict(Constraint::UserName));
		}

		let user = User {
			id: user.id,
			name: user.name,
			email: user.email,
			password: user.password,
			marketing_agree: user.marketing_agree,
			profile_image_url: None,
			created_at: Utc::now(),
			updated_at: None,
		};

		users.insert(user.id, user.clone());

		Ok(user)
	}

	async fn user(&self, id: Uuid) -> Result<Option<User>> {
		Ok(self.users.read().await.get(&id).cloned())
	}

	async fn user_by_email(&self, email: &str) -> Result<Option<User>> {
		let users = self.users.read().await;

		Ok(users.values().find(|u| u.email == email).cloned())
	}

	async fn user_by_name(&self, name: &str) -> Result<Option<User>> {
		let users = self.users.read().await;

		Ok(users.values().find(|u| u.name == name).cloned())
	}

	async fn set_user_name(&self, id: Uuid, name: &str) -> Result<bool> {
		let mut users = self.users.write().await;

		if users.values().any(|u| u.id != id && u.name == name) {
			return Err(Error::Conflict(Constraint::UserName));
		}

		let Some(user) = users.get_mut(&id) else {
			return Ok(false);
		};

		name.clone_into(&mut user.name);
		user.updated_at = Some(Utc::now());

		Ok(true)
	}

	async fn set_profile_image(&self, id: Uuid, url: &str) -> Result<bool> {
		let mut users = self.users.write().await;

		let Some(user) = users.get_mut(&id) else {
			return Ok(false);
		};

		user.profile_image_url = Some(url.to_owned());
		user.updated_at = Some(Utc::now());

		Ok(true)
	}

	async fn insert_session(&self, user_id: Uuid) -> Result<Session> {
		let session = Session {
			id: Uuid::new_v4(),
			user_id,
			created_at: Utc::now(),
		};

		self.sessions
			.write()
			.await
			.insert(session.id, session.clone());

		Ok(session)
	}

	async fn session_user(&self, session_id: Uuid) -> Result<Option<User>> {
		let Some(user_id) = self
			.sessions
			.read()
			.await
			.get(&session_id)
			.map(|session| session.user_id)
		else {
			return Ok(None);
		};

		self.user(user_id).await
	}

	async fn delete_session(&self, session_id: Uuid) -> Result<()> {
		self.sessions.write().await.remove(&session_id);

		Ok(())
	}

	async fn insert_post(&self, post: NewPost) -> Result<Post> {
		let NewPost {
			author_id,
			author_name,
			input,
			image_url,
		} = post;

		let post = Post {
			id: Uuid::new_v4(),
			author_id,
			author_name,
			title: input.title,
			servings: input.servings,
			time_minutes: input.time_minutes,
			level: input.level,
			category: input.category,
			tags: input.tags,
			description: input.description,
			ingredients: input.ingredients,
			steps: input.steps,
			visibility: input.visibility,
			status: input.status,
			likes: 0,
			liked_by: Vec::new(),
			rating: Rating::default(),
			image_url,
			created_at: Utc::now(),
			updated_at: None,
		};

		self.posts.write().await.insert(post.id, post.clone());

		Ok(post)
	}

	async fn post(&self, id: Uuid) -> Result<Option<Post>> {
		Ok(self.posts.read().await.get(&id).cloned())
	}

	async fn update_post(&self, id: Uuid, update: UpdatePost) -> Result<Option<Post>> {
		let mut posts = self.posts.write().await;

		let Some(post) = posts.get_mut(&id) else {
			return Ok(None);
		};

		update.apply(post);
		post.updated_at = Some(Utc::now());

		Ok(Some(post.clone()))
	}

	async fn delete_post(&self, id: Uuid) -> Result<bool> {
		let mut posts = self.posts.write().await;

		if posts.remove(&id).is_none() {
			return Ok(false);
		}

		self.reviews
			.write()
			.await
			.retain(|_, review| review.post_id != id);

		Ok(true)
	}

	async fn posts(&self, filter: PostFilter, sort: PostSort, page: Page) -> Result<Vec<Post>> {
		let posts = self.posts.read().await;
		let listed = |post: &Post| post.status == Status::Published && post.visibility == Visibility::Public;

		let mut matched = match filter {
			PostFilter::Public => posts.values().filter(|p| listed(*p)).cloned().collect::<Vec<_>>(),
			PostFilter::TitleContains(text) => {
				let text = text.to_lowercase();

				posts
					.values()
					.filter(|p| listed(*p) && p.title.to_lowercase().contains(&text))
					.cloned()
					.collect()
			}
			PostFilter::Author(author_id) => posts
				.values()
				.filter(|p| p.author_id == author_id)
				.cloned()
				.collect(),
			PostFilter::LikedBy(user_id) => posts
				.values()
				.filter(|p| p.is_liked_by(user_id))
				.cloned()
				.collect(),
		};

		match sort {
			PostSort::Likes => matched.sort_by(|a, b| {
				b.likes
					.cmp(&a.likes)
					.then(b.created_at.cmp(&a.created_at))
					.then(b.id.cmp(&a.id))
			}),
			PostSort::Recent => {
				matched.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
			}
			PostSort::Time => matched.sort_by(|a, b| {
				a.time_minutes
					.cmp(&b.time_minutes)
					.then(b.created_at.cmp(&a.created_at))
					.then(b.id.cmp(&a.id))
			}),
		}

		Ok(paginate(matched, page))
	}

	async fn add_like(&self, post_id: Uuid, user_id: Uuid) -> Result<Option<i64>> {
		let mut posts = self.posts.write().await;

		match posts.get_mut(&post_id) {
			Some(post) if !post.is_liked_by(user_id) => {
				post.liked_by.push(user_id);
				post.likes += 1;

				Ok(Some(post.likes))
			}
			_ => Ok(None),
		}
	}

	async fn remove_like(&self, post_id: Uuid, user_id: Uuid) -> Result<Option<i64>> {
		let mut posts = self.posts.write().await;

		match posts.get_mut(&post_id) {
			Some(post) if post.is_liked_by(user_id) => {
				post.liked_by.retain(|id| *id != user_id);
				post.likes -= 1;

				Ok(Some(post.likes))
			}
			_ => Ok(None),
		}
	}

	async fn set_rating(&self, post_id: Uuid, rating: Rating) -> Result<bool> {
		let mut posts = self.posts.write().await;

		let Some(post) = posts.get_mut(&post_id) else {
			return Ok(false);
		};

		post.rating = rating;

		Ok(true)
	}

	async fn set_author_name(&self, author_id: Uuid, name: &str) -> Result<u64> {
		let mut posts = self.posts.write().await;
		let mut changed = 0;

		for post in posts
			.values_mut()
			.filter(|p| p.author_id == author_id && p.author_name != name)
		{
			name.clone_into(&mut post.author_name);
			changed += 1;
		}

		Ok(changed)
	}

	async fn upsert_review(&self, review: NewReview) -> Result<UpsertedReview> {
		let mut reviews = self.reviews.write().await;
		let now = Utc::now();

		if let Some(existing) = reviews
			.values_mut()
			.find(|r| r.post_id == review.post_id && r.user_id == review.user_id)
		{
			existing.user_name = review.user_name;
			existing.rating = review.rating;
			existing.comment = review.comment;
			existing.updated_at = now;

			return Ok(UpsertedReview {
				review: existing.clone(),
				created: false,
			});
		}

		let created = Review {
			id: Uuid::new_v4(),
			post_id: review.post_id,
			user_id: review.user_id,
			user_name: review.user_name,
			rating: review.rating,
			comment: review.comment,
			created_at: now,
			updated_at: now,
		};

		reviews.insert(created.id, created.clone());

		Ok(UpsertedReview {
			review: created,
			created: true,
		})
	}

	async fn review(&self, id: Uuid) -> Result<Option<Review>> {
		Ok(self.reviews.read().await.get(&id).cloned())
	}

	async fn review_by_pair(&self, post_id: Uuid, user_id: Uuid) -> Result<Option<Review>> {
		let reviews = self.reviews.read().await;

		Ok(reviews
			.values()
			.find(|r| r.post_id == post_id && r.user_id == user_id)
			.cloned())
	}

	async fn reviews_for_post(&self, post_id: Uuid) -> Result<Vec<Review>> {
		let reviews = self.reviews.read().await;
		let mut matched = reviews
			.values()
			.filter(|r| r.post_id == post_id)
			.cloned()
			.collect::<Vec<_>>();

		matched.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

		Ok(matched)
	}

	async fn delete_review(&self, id: Uuid) -> Result<bool> {
		Ok(self.reviews.write().await.remove(&id).is_some())
	}

	async fn set_reviewer_name(&self, user_id: Uuid, name: &str) -> Result<u64> {
		let mut reviews = self.reviews.write().await;
		let mut changed = 0;

		for review in reviews
			.values_mut()
			.filter(|r| r.user_id == user_id && r.user_name != name)
		{
			name.clone_into(&mut review.user_name);
			changed += 1;
		}

		Ok(changed)
	}

	async fn insert_chat_message(
		&self,
		user_id: Uuid,
		role: ChatRole,
		content: &str,
	) -> Result<ChatMessage> {
		let mut chat = self.chat.write().await;
		let message = ChatMessage {
			id: self.chat_sequence.fetch_add(1, Ordering::SeqCst) + 1,
			user_id,
			role,
			content: content.to_owned(),
			created_at: Utc::now(),
		};

		chat.push(message.clone());

		Ok(message)
	}

	async fn recent_chat_messages(&self, user_id: Uuid, limit: i64) -> Result<Vec<ChatMessage>> {
		let chat = self.chat.read().await;
		let mut mine = chat
			.iter()
			.filter(|m| m.user_id == user_id)
			.cloned()
			.collect::<Vec<_>>();

		mine.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

		let limit = usize::try_from(limit).unwrap_or(0);
		let skip = mine.len().saturating_sub(limit);

		Ok(mine.split_off(skip))
	}

	async fn prune_chat_messages(&self, user_id: Uuid, keep: i64) -> Result<u64> {
		let mut chat = self.chat.write().await;
		let mut mine = chat
			.iter()
			.filter(|m| m.user_id == user_id)
			.map(|m| (m.created_at, m.id))
			.collect::<Vec<_>>();

		mine.sort_unstable_by(|a, b| b.cmp(a));

		let keep = usize::try_from(keep).unwrap_or(0);
		let kept = mine
			.into_iter()
			.take(keep)
			.map(|(_, id)| id)
			.collect::<std::collections::HashSet<_>>();

		let before = chat.len();
		chat.retain(|m| m.user_id != user_id || kept.contains(&m.id));

		Ok((before - chat.len()) as u64)
	}

	async fn clear_chat_messages(&self, user_id: Uuid) -> Result<u64> {
		let mut chat = self.chat.write().await;
		let before = chat.len();

		chat.retain(|m| m.user_id != user_id);

		Ok((before - chat.len()) as u64)
	}
}

#[cfg(test)]
mod test {
	use super::*;

	fn new_user(name: &str, email: &str) -> NewUser {
		NewUser {
			id: Uuid::new_v4(),
			name: name.into(),
			email: email.into(),
			password: Vec::new(),
			marketing_agree: false,
		}
	}

	#[tokio::test]
	async fn test_unique_user_fields() {
		let store = MemoryStore::new();

		store.insert_user(new_user("cook", "a@b.com")).await.unwrap();

		assert!(matches!(
			store.insert_user(new_user("other", "a@b.com")).await,
			Err(Error::Conflict(Constraint::UserEmail))
		));
		assert!(matches!(
			store.insert_user(new_user("cook", "c@d.com")).await,
			Err(Error::Conflict(Constraint::UserName))
		));
	}

	#[tokio::test]
	async fn test_conditional_like_updates() {
		let store = MemoryStore::new();
		let user = store.insert_user(new_user("cook", "a@b.com")).await.unwrap();
		let post = store
			.insert_post(NewPost {
				author_id: user.id,
				author_name: user.name.clone(),
				input: crate::test::create_post_input("soup"),
				image_url: None,
			})
			.await
			.unwrap();
		let liker = Uuid::new_v4();

		assert_eq!(store.add_like(post.id, liker).await.unwrap(), Some(1));
		assert_eq!(store.add_like(post.id, liker).await.unwrap(), None);
		assert_eq!(store.remove_like(post.id, liker).await.unwrap(), Some(0));
		assert_eq!(store.remove_like(post.id, liker).await.unwrap(), None);
		assert_eq!(store.add_like(Uuid::new_v4(), liker).await.unwrap(), None);
	}

	#[tokio::test]
	async fn test_recent_and_prune_keep_newest() {
		let store = MemoryStore::new();
		let user_id = Uuid::new_v4();

		for i in 0..5 {
			store
				.insert_chat_message(user_id, ChatRole::User, &i.to_string())
				.await
				.unwrap();
		}

		let recent = store.recent_chat_messages(user_id, 2).await.unwrap();
		assert_eq!(
			recent.iter().map(|m| m.content.as_str()).collect::<Vec<_>>(),
			["3", "4"]
		);

		assert_eq!(store.prune_chat_messages(user_id, 3).await.unwrap(), 2);
		assert_eq!(
			store.recent_chat_messages(user_id, i64::MAX).await.unwrap().len(),
			3
		);

		let recent = store.recent_chat_messages(user_id, 10).await.unwrap();
		assert_eq!(recent[0].content, "2");
	}
}
