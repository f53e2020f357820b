//! Reviews and the rating aggregate stored on each post.
//!
//! The aggregate is never adjusted incrementally. After every change to a
//! post's reviews it is recomputed from the full set of live reviews and written
//! back, so a stale aggregate heals on the next write.

use uuid::Uuid;

use super::{
	model::{Action, RatingStats, Review, ReviewList, Submitted, MAX_COMMENT_LENGTH},
	Error, RouteError,
};
use crate::{
	route::{auth::model::User, post::model::Rating},
	store::{self, NewReview, Store},
};

fn round_to_tenth(value: f64) -> f64 {
	(value * 10.0).round() / 10.0
}

/// Computes the statistics of a set of reviews. The average is rounded to one
/// decimal and is 0 without reviews.
#[allow(clippy::cast_precision_loss)]
pub fn rating_stats(reviews: &[Review]) -> RatingStats {
	let mut histogram = [0; 5];
	let mut sum = 0_i64;

	for review in reviews {
		if let Some(slot) = usize::try_from(review.rating - 1)
			.ok()
			.and_then(|index| histogram.get_mut(index))
		{
			*slot += 1;
		}

		sum += i64::from(review.rating);
	}

	let count = i64::try_from(reviews.len()).unwrap_or(i64::MAX);
	let average = if count == 0 {
		0.0
	} else {
		round_to_tenth(sum as f64 / count as f64)
	};

	RatingStats {
		average,
		count,
		histogram,
	}
}

/// Recomputes the rating aggregate of a post from its live reviews and stores it.
pub async fn recompute_rating(database: &dyn Store, post_id: Uuid) -> store::Result<Rating> {
	let reviews = database.reviews_for_post(post_id).await?;
	let stats = rating_stats(&reviews);
	let rating = Rating {
		average: stats.average,
		count: stats.count,
	};

	database.set_rating(post_id, rating).await?;

	Ok(rating)
}

/// Creates or replaces the user's review of a post, then refreshes the post's
/// aggregate. The reviewer name is copied from `user` on every submission.
pub async fn submit_review(
	database: &dyn Store,
	post_id: Uuid,
	user: &User,
	rating: i32,
	comment: &str,
) -> Result<Submitted, RouteError> {
	if !(1..=5).contains(&rating) {
		return Err(Error::InvalidRating(rating).into());
	}

	let comment = comment.trim();

	if comment.chars().count() > MAX_COMMENT_LENGTH {
		return Err(Error::CommentTooLong.into());
	}

	let post = database
		.post(post_id)
		.await?
		.ok_or(Error::UnknownPost(post_id))?;

	if post.author_id == user.id {
		return Err(Error::SelfReview.into());
	}

	let upserted = database
		.upsert_review(NewReview {
			post_id,
			user_id: user.id,
			user_name: user.name.clone(),
			rating,
			comment: comment.to_owned(),
		})
		.await?;

	let aggregate = recompute_rating(database, post_id).await?;

	tracing::info!(
		post = %post_id,
		user = %user.id,
		created = upserted.created,
		average = aggregate.average,
		count = aggregate.count,
		"review submitted"
	);

	Ok(Submitted {
		action: if upserted.created {
			Action::Created
		} else {
			Action::Updated
		},
		review: upserted.review,
	})
}

/// Deletes a review written by the user, then refreshes the post's aggregate.
pub async fn delete_review(
	database: &dyn Store,
	review_id: Uuid,
	user_id: Uuid,
) -> Result<(), RouteError> {
	let review = database
		.review(review_id)
		.await?
		.ok_or(Error::UnknownReview(review_id))?;

	if review.user_id != user_id {
		return Err(Error::NotAuthor(review_id).into());
	}

	if !database.delete_review(review_id).await? {
		return Err(Error::UnknownReview(review_id).into());
	}

	recompute_rating(database, review.post_id).await?;

	Ok(())
}

/// Lists the reviews of a post, newest first, with statistics computed the same
/// way as the stored aggregate.
pub async fn get_reviews(database: &dyn Store, post_id: Uuid) -> Result<ReviewList, RouteError> {
	if database.post(post_id).await?.is_none() {
		return Err(Error::UnknownPost(post_id).into());
	}

	let reviews = database.reviews_for_post(post_id).await?;
	let stats = rating_stats(&reviews);

	Ok(ReviewList { reviews, stats })
}

pub async fn get_my_review(
	database: &dyn Store,
	post_id: Uuid,
	user_id: Uuid,
) -> Result<Option<Review>, RouteError> {
	Ok(database.review_by_pair(post_id, user_id).await?)
}
