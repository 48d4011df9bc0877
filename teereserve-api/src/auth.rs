use axum::{extract::State, routing::post, Extension, Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use teereserve_booking::MigrationReport;
use teereserve_core::collections::USERS;
use teereserve_core::repository::{fetch_all, put};
use teereserve_core::user::UserProfile;
use teereserve_core::Filter;

use crate::error::AppError;
use crate::middleware::auth::{issue_token, Claims, ROLE_CUSTOMER, ROLE_GUEST};
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AuthResponse {
    token: String,
    uid: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpgradeRequest {
    pub email: String,
    pub display_name: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UpgradeResponse {
    token: String,
    uid: String,
    migration: MigrationReport,
}

pub fn public_routes() -> Router<AppState> {
    Router::new().route("/v1/auth/guest", post(login_guest))
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/auth/upgrade", post(upgrade_account))
}

/// POST /v1/auth/guest
async fn login_guest(State(state): State<AppState>) -> Result<Json<AuthResponse>, AppError> {
    let uid = format!("anon-{}", Uuid::new_v4());
    let profile = UserProfile::anonymous(&uid);
    put(state.store.as_ref(), USERS, &uid, &profile).await?;

    let token = issue_token(&state.auth, &uid, None, ROLE_GUEST)?;
    tracing::info!("Guest session started: {}", uid);
    Ok(Json(AuthResponse { token, uid }))
}

/// POST /v1/auth/upgrade
/// Turn the calling guest into a customer and move their bookings over.
async fn upgrade_account(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpgradeRequest>,
) -> Result<Json<UpgradeResponse>, AppError> {
    if !claims.is_anonymous {
        return Err(AppError::ConflictError("Account is already registered".into()));
    }
    let email = req.email.trim().to_lowercase();
    if !email.contains('@') {
        return Err(AppError::ValidationError("A valid email is required".into()));
    }

    let taken: Vec<UserProfile> =
        fetch_all(state.store.as_ref(), USERS, &Filter::new().eq("email", email.as_str())).await?;
    if taken.iter().any(|p| !p.is_anonymous) {
        return Err(AppError::ConflictError(format!("{} is already registered", email)));
    }

    let new_uid = Uuid::new_v4().to_string();
    let report = state
        .migrator
        .migrate(&claims.sub, &new_uid, &email, req.display_name)
        .await?;

    let token = issue_token(&state.auth, &new_uid, Some(email), ROLE_CUSTOMER)?;
    Ok(Json(UpgradeResponse {
        token,
        uid: new_uid,
        migration: report,
    }))
}
