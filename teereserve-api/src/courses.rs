use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use teereserve_booking::{Review, TeeTimeOffer};
use teereserve_core::course::{GolfCourse, TeeTime};
use teereserve_core::search::{CourseSearchQuery, TeeTimeQuery};
use teereserve_pricing::Quote;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseView {
    #[serde(flatten)]
    pub course: GolfCourse,
    pub average_rating: Option<f64>,
}

impl From<GolfCourse> for CourseView {
    fn from(course: GolfCourse) -> Self {
        Self {
            average_rating: course.average_rating(),
            course,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRequest {
    pub tee_time_id: String,
    pub players: u32,
    pub promo_code: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteResponse {
    pub tee_time: TeeTime,
    pub quote: Quote,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/courses", get(search_courses))
        .route("/v1/courses/{id}", get(get_course))
        .route("/v1/courses/{id}/tee-times", get(list_tee_times))
        .route("/v1/courses/{id}/reviews", get(list_reviews))
        .route("/v1/quotes", post(quote))
}

/// GET /v1/courses?city=&region=&holes=&minRating=&q=
async fn search_courses(
    State(state): State<AppState>,
    Query(query): Query<CourseSearchQuery>,
) -> Result<Json<Vec<CourseView>>, AppError> {
    let courses = state.catalog.search_courses(&query).await?;
    Ok(Json(courses.into_iter().map(CourseView::from).collect()))
}

async fn get_course(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<CourseView>, AppError> {
    let course = state.catalog.get_course(&id).await?;
    if !course.active {
        return Err(AppError::NotFoundError(format!("Course {} not found", id)));
    }
    Ok(Json(course.into()))
}

/// GET /v1/courses/{id}/tee-times?date=&players=
async fn list_tee_times(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<TeeTimeQuery>,
) -> Result<Json<Vec<TeeTimeOffer>>, AppError> {
    let offers = state.bookings.tee_sheet(&id, query.date, query.players).await?;
    Ok(Json(offers))
}

async fn list_reviews(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Vec<Review>>, AppError> {
    Ok(Json(state.reviews.list_course_reviews(&id).await?))
}

/// POST /v1/quotes
async fn quote(State(state): State<AppState>, Json(req): Json<QuoteRequest>) -> Result<Json<QuoteResponse>, AppError> {
    let (tee_time, quote) = state
        .bookings
        .quote_tee_time(&req.tee_time_id, req.players, req.promo_code)
        .await?;
    Ok(Json(QuoteResponse { tee_time, quote }))
}
