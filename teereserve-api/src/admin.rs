use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Extension, Json, Router,
};
use serde::Deserialize;
use serde_json::Value;

use teereserve_booking::models::BookingSummary;
use teereserve_booking::Booking;
use teereserve_core::course::{GolfCourse, TeeSheetRequest, TeeTime, TeeTimeStatus};
use teereserve_store::backup::{BackupJob, RestoreReport};
use teereserve_store::catalog_repo::CourseInput;
use teereserve_store::PricingKind;

use crate::error::AppError;
use crate::middleware::Claims;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct TeeTimeStatusRequest {
    pub status: TeeTimeStatus,
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateBackupRequest {
    #[serde(default)]
    pub collections: Vec<String>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        // Courses & tee sheets
        .route("/v1/admin/courses", get(list_courses).post(create_course))
        .route("/v1/admin/courses/{id}", put(update_course).delete(delete_course))
        .route("/v1/admin/courses/{id}/tee-times", post(generate_tee_times))
        .route("/v1/admin/tee-times/{id}/status", put(set_tee_time_status))
        // Pricing
        .route("/v1/admin/pricing/{kind}", get(list_pricing).post(create_pricing))
        .route(
            "/v1/admin/pricing/{kind}/{id}",
            put(update_pricing).delete(delete_pricing),
        )
        // Bookings
        .route("/v1/admin/bookings/summary", get(booking_summary))
        .route("/v1/admin/bookings/{id}/complete", post(complete_booking))
        // Backups
        .route("/v1/admin/backups", get(list_backups).post(create_backup))
        .route("/v1/admin/backups/{id}", get(get_backup))
        .route("/v1/admin/backups/{id}/restore", post(restore_backup))
}

// ============================================================================
// Courses
// ============================================================================

/// Includes inactive courses.
async fn list_courses(State(state): State<AppState>) -> Result<Json<Vec<GolfCourse>>, AppError> {
    let mut courses = state.catalog.list_all_courses().await?;
    courses.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(Json(courses))
}

async fn create_course(
    State(state): State<AppState>,
    Json(req): Json<CourseInput>,
) -> Result<(StatusCode, Json<GolfCourse>), AppError> {
    let course = state.catalog.create_course(req).await?;
    Ok((StatusCode::CREATED, Json(course)))
}

async fn update_course(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<CourseInput>,
) -> Result<Json<GolfCourse>, AppError> {
    Ok(Json(state.catalog.update_course(&id, req).await?))
}

async fn delete_course(State(state): State<AppState>, Path(id): Path<String>) -> Result<StatusCode, AppError> {
    state.catalog.delete_course(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /v1/admin/courses/{id}/tee-times
async fn generate_tee_times(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<TeeSheetRequest>,
) -> Result<(StatusCode, Json<Vec<TeeTime>>), AppError> {
    let created = state.catalog.generate_tee_times(&id, &req).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn set_tee_time_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<TeeTimeStatusRequest>,
) -> Result<Json<TeeTime>, AppError> {
    Ok(Json(state.catalog.set_tee_time_status(&id, req.status).await?))
}

// ============================================================================
// Pricing
// ============================================================================

async fn list_pricing(State(state): State<AppState>, Path(kind): Path<String>) -> Result<Json<Value>, AppError> {
    let kind: PricingKind = kind.parse()?;
    Ok(Json(state.pricing.list_kind(kind).await?))
}

async fn create_pricing(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let kind: PricingKind = kind.parse()?;
    let created = state.pricing.upsert_kind(kind, None, body).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_pricing(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, AppError> {
    let kind: PricingKind = kind.parse()?;
    Ok(Json(state.pricing.upsert_kind(kind, Some(&id), body).await?))
}

async fn delete_pricing(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    let kind: PricingKind = kind.parse()?;
    state.pricing.delete_kind(kind, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Bookings
// ============================================================================

async fn booking_summary(State(state): State<AppState>) -> Result<Json<BookingSummary>, AppError> {
    Ok(Json(state.bookings.summary().await?))
}

async fn complete_booking(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Booking>, AppError> {
    Ok(Json(state.bookings.complete_booking(&id).await?))
}

// ============================================================================
// Backups
// ============================================================================

async fn list_backups(State(state): State<AppState>) -> Result<Json<Vec<BackupJob>>, AppError> {
    Ok(Json(state.backups.list_backups().await?))
}

async fn create_backup(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateBackupRequest>,
) -> Result<(StatusCode, Json<BackupJob>), AppError> {
    let job = state.backups.create_backup(req.collections, &claims.sub).await?;
    Ok((StatusCode::CREATED, Json(job)))
}

async fn get_backup(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<BackupJob>, AppError> {
    Ok(Json(state.backups.get_backup(&id).await?))
}

async fn restore_backup(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<RestoreReport>, AppError> {
    Ok(Json(state.backups.restore_backup(&id).await?))
}
