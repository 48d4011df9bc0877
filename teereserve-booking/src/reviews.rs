use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use teereserve_core::collections::{BOOKINGS, COURSES, REVIEWS, USERS};
use teereserve_core::course::GolfCourse;
use teereserve_core::repository::{fetch, fetch_all};
use teereserve_core::user::{UserProfile, POINTS_FIRST_REVIEW_BONUS, POINTS_REVIEW};
use teereserve_core::{DocumentStore, Filter, WriteBatch};

use crate::models::{Booking, BookingStatus};
use crate::{Actor, BookingError, BookingResult};

/// One review per booking; the review id is the booking id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: String,
    pub booking_id: String,
    pub course_id: String,
    pub user_id: String,
    pub rating: u8,
    #[serde(default)]
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRequest {
    pub booking_id: String,
    pub rating: u8,
    #[serde(default)]
    pub comment: String,
}

pub struct ReviewService {
    store: Arc<dyn DocumentStore>,
}

impl ReviewService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn submit(&self, actor: &Actor, request: ReviewRequest) -> BookingResult<Review> {
        if !(1..=5).contains(&request.rating) {
            return Err(BookingError::Validation("Rating must be between 1 and 5".into()));
        }

        let booking: Booking = fetch(self.store.as_ref(), BOOKINGS, &request.booking_id)
            .await?
            .ok_or_else(|| BookingError::NotFound(format!("Booking {}", request.booking_id)))?;
        if booking.user_id != actor.uid {
            return Err(BookingError::Forbidden(format!("Booking {}", booking.id)));
        }
        if booking.status != BookingStatus::Completed {
            return Err(BookingError::Validation(
                "Only completed rounds can be reviewed".into(),
            ));
        }
        if self.store.get(REVIEWS, &booking.id).await?.is_some() {
            return Err(BookingError::Conflict(format!(
                "Booking {} has already been reviewed",
                booking.id
            )));
        }

        let (course, profile) = tokio::try_join!(
            fetch::<GolfCourse>(self.store.as_ref(), COURSES, &booking.course_id),
            fetch::<UserProfile>(self.store.as_ref(), USERS, &actor.uid),
        )?;
        let mut course = course.ok_or_else(|| BookingError::NotFound(format!("Course {}", booking.course_id)))?;

        let review = Review {
            id: booking.id.clone(),
            booking_id: booking.id.clone(),
            course_id: booking.course_id.clone(),
            user_id: actor.uid.clone(),
            rating: request.rating,
            comment: request.comment.trim().to_string(),
            created_at: Utc::now(),
        };
        course.rating_sum += review.rating as u64;
        course.rating_count += 1;

        let mut batch = WriteBatch::new();
        batch.set(REVIEWS, &review.id, &review)?;
        batch.set(COURSES, &course.id, &course)?;
        if let Some(mut profile) = profile {
            let bonus = if profile.reviews_written == 0 {
                POINTS_FIRST_REVIEW_BONUS
            } else {
                0
            };
            profile.reviews_written += 1;
            profile.award(POINTS_REVIEW + bonus);
            batch.set(USERS, &profile.uid, &profile)?;
        }
        self.store.commit(batch).await?;

        info!("Review {} added for course {}", review.id, review.course_id);
        Ok(review)
    }

    /// Newest first.
    pub async fn list_course_reviews(&self, course_id: &str) -> BookingResult<Vec<Review>> {
        let mut reviews: Vec<Review> =
            fetch_all(self.store.as_ref(), REVIEWS, &Filter::new().eq("courseId", course_id)).await?;
        reviews.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(reviews)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{member, Harness};
    use teereserve_core::user::Tier;

    fn request(booking_id: &str, rating: u8) -> ReviewRequest {
        ReviewRequest {
            booking_id: booking_id.to_string(),
            rating,
            comment: " Fast greens ".to_string(),
        }
    }

    #[tokio::test]
    async fn test_review_completed_round() {
        let h = Harness::new().await;
        let actor = member("user-1");
        h.seed_profile("user-1").await;
        let booking = h.confirmed_booking(&actor).await;
        let reviews = ReviewService::new(h.store.clone());

        // Not yet played
        let early = reviews.submit(&actor, request(&booking.id, 5)).await;
        assert!(matches!(early, Err(BookingError::Validation(_))));

        h.service.complete_booking(&booking.id).await.unwrap();
        let review = reviews.submit(&actor, request(&booking.id, 4)).await.unwrap();
        assert_eq!(review.comment, "Fast greens");

        let course: GolfCourse = fetch(h.store.as_ref(), COURSES, &h.course_id).await.unwrap().unwrap();
        assert_eq!(course.average_rating(), Some(4.0));

        let profile: UserProfile = fetch(h.store.as_ref(), USERS, "user-1").await.unwrap().unwrap();
        assert_eq!(profile.points, 100 + 50 + 25);
        assert_eq!(profile.reviews_written, 1);
        assert_eq!(profile.tier, Tier::Bogey);

        let again = reviews.submit(&actor, request(&booking.id, 3)).await;
        assert!(matches!(again, Err(BookingError::Conflict(_))));
        assert_eq!(reviews.list_course_reviews(&h.course_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_rating_and_ownership() {
        let h = Harness::new().await;
        let actor = member("user-1");
        let booking = h.confirmed_booking(&actor).await;
        h.service.complete_booking(&booking.id).await.unwrap();
        let reviews = ReviewService::new(h.store.clone());

        let zero = reviews.submit(&actor, request(&booking.id, 0)).await;
        assert!(matches!(zero, Err(BookingError::Validation(_))));

        let stranger = reviews.submit(&member("user-2"), request(&booking.id, 5)).await;
        assert!(matches!(stranger, Err(BookingError::Forbidden(_))));
    }
}
