use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use teereserve_core::collections::{COURSES, TEE_TIMES};
use teereserve_core::course::{GolfCourse, TeeSheetRequest, TeeTime, TeeTimeStatus};
use teereserve_core::repository::{fetch, fetch_all, put};
use teereserve_core::search::CourseSearchQuery;
use teereserve_core::{CoreError, DocumentStore, Filter, WriteBatch, MAX_BATCH_OPS};
use teereserve_pricing::DayOccupancy;

use crate::{RepoError, RepoResult};

/// Admin input for creating or replacing a course.
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseInput {
    pub name: String,
    pub city: String,
    pub region: String,
    pub holes: u32,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub amenities: Vec<String>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Clone)]
pub struct CatalogRepository {
    store: Arc<dyn DocumentStore>,
}

impl CatalogRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn create_course(&self, input: CourseInput) -> RepoResult<GolfCourse> {
        let course = GolfCourse {
            id: Uuid::new_v4().to_string(),
            name: input.name,
            city: input.city,
            region: input.region,
            holes: input.holes,
            description: input.description,
            amenities: input.amenities,
            active: input.active,
            rating_sum: 0,
            rating_count: 0,
            created_at: Utc::now(),
        };
        course.validate()?;
        put(self.store.as_ref(), COURSES, &course.id, &course).await?;
        info!("Course created: {} ({})", course.name, course.id);
        Ok(course)
    }

    /// Replaces the editable fields; ratings are kept.
    pub async fn update_course(&self, id: &str, input: CourseInput) -> RepoResult<GolfCourse> {
        let mut course = self.get_course(id).await?;
        course.name = input.name;
        course.city = input.city;
        course.region = input.region;
        course.holes = input.holes;
        course.description = input.description;
        course.amenities = input.amenities;
        course.active = input.active;
        course.validate()?;
        put(self.store.as_ref(), COURSES, id, &course).await?;
        Ok(course)
    }

    pub async fn delete_course(&self, id: &str) -> RepoResult<()> {
        self.get_course(id).await?;
        let booked = self
            .store
            .count(
                TEE_TIMES,
                &Filter::new().eq("courseId", id).eq("status", "booked"),
            )
            .await?;
        if booked > 0 {
            return Err(RepoError::Conflict(format!(
                "Course {} still has {} booked tee times",
                id, booked
            )));
        }
        self.store.delete(COURSES, id).await?;
        Ok(())
    }

    pub async fn get_course(&self, id: &str) -> RepoResult<GolfCourse> {
        fetch(self.store.as_ref(), COURSES, id)
            .await?
            .ok_or_else(|| RepoError::NotFound(format!("Course {}", id)))
    }

    pub async fn save_course(&self, course: &GolfCourse) -> RepoResult<()> {
        put(self.store.as_ref(), COURSES, &course.id, course).await?;
        Ok(())
    }

    pub async fn search_courses(&self, query: &CourseSearchQuery) -> RepoResult<Vec<GolfCourse>> {
        let courses: Vec<GolfCourse> = fetch_all(self.store.as_ref(), COURSES, &Filter::new()).await?;
        let mut matched: Vec<_> = courses.into_iter().filter(|c| query.matches(c)).collect();
        matched.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(matched)
    }

    pub async fn list_all_courses(&self) -> RepoResult<Vec<GolfCourse>> {
        Ok(fetch_all(self.store.as_ref(), COURSES, &Filter::new()).await?)
    }

    pub async fn get_tee_time(&self, id: &str) -> RepoResult<TeeTime> {
        fetch(self.store.as_ref(), TEE_TIMES, id)
            .await?
            .ok_or_else(|| RepoError::NotFound(format!("Tee time {}", id)))
    }

    pub async fn list_tee_times(&self, course_id: &str, date: NaiveDate) -> RepoResult<Vec<TeeTime>> {
        let filter = Filter::new()
            .eq("courseId", course_id)
            .eq("date", date.to_string());
        let mut tee_times: Vec<TeeTime> = fetch_all(self.store.as_ref(), TEE_TIMES, &filter).await?;
        tee_times.sort_by_key(|t| t.time);
        Ok(tee_times)
    }

    /// Lays out a day's slots. Slots that already exist are left untouched.
    pub async fn generate_tee_times(
        &self,
        course_id: &str,
        request: &TeeSheetRequest,
    ) -> RepoResult<Vec<TeeTime>> {
        self.get_course(course_id).await?;
        let slots = request.slots(course_id)?;

        let existing: Vec<String> = self
            .list_tee_times(course_id, request.date)
            .await?
            .into_iter()
            .map(|t| t.id)
            .collect();

        let fresh: Vec<TeeTime> = slots
            .into_iter()
            .filter(|slot| !existing.contains(&slot.id))
            .collect();

        for chunk in fresh.chunks(MAX_BATCH_OPS) {
            let mut batch = WriteBatch::new();
            for slot in chunk {
                batch.set(TEE_TIMES, &slot.id, slot)?;
            }
            self.store.commit(batch).await?;
        }

        info!(
            "Generated {} tee times for course {} on {}",
            fresh.len(),
            course_id,
            request.date
        );
        Ok(fresh)
    }

    /// Blocks or reopens a slot. Booked slots only change through bookings.
    pub async fn set_tee_time_status(&self, id: &str, status: TeeTimeStatus) -> RepoResult<TeeTime> {
        let mut tee_time = self.get_tee_time(id).await?;
        if status == TeeTimeStatus::Booked {
            return Err(CoreError::ValidationError(
                "Tee times are booked through the booking flow".into(),
            )
            .into());
        }
        if tee_time.status == TeeTimeStatus::Booked {
            return Err(RepoError::Conflict(format!("Tee time {} is booked", id)));
        }
        tee_time.status = status;
        put(self.store.as_ref(), TEE_TIMES, id, &tee_time).await?;
        Ok(tee_time)
    }

    pub async fn day_occupancy(&self, course_id: &str, date: NaiveDate) -> RepoResult<DayOccupancy> {
        let mut occupancy = DayOccupancy::default();
        for tee_time in self.list_tee_times(course_id, date).await? {
            occupancy.record(
                tee_time.status == TeeTimeStatus::Booked,
                tee_time.status == TeeTimeStatus::Blocked,
            );
        }
        Ok(occupancy)
    }
}
