//! User registry endpoints.
//!
//! Registration is unauthenticated (it bootstraps the first account);
//! account lookup and the doctor directory require a resolved actor.

use axum::extract::{Path, State};
use axum::Extension;
use axum::Json;
use serde::Serialize;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::{ActorContext, ApiContext};
use crate::db::DatabaseError;
use crate::models::{NewUser, User};
use crate::registry;

#[derive(Serialize)]
pub struct UserResponse {
    pub user: User,
}

/// `POST /api/users` — register an account with its role profile. A
/// re-used email is a conflict, not a validation error.
pub async fn create(
    State(ctx): State<ApiContext>,
    Json(payload): Json<NewUser>,
) -> Result<Json<UserResponse>, ApiError> {
    let conn = ctx.core.open_db()?;
    let user = registry::create_user(&conn, &payload).map_err(|e| match e {
        DatabaseError::ConstraintViolation(msg) if msg.contains("already registered") => {
            ApiError::Conflict(msg)
        }
        other => ApiError::from(other),
    })?;

    tracing::info!(user_id = %user.id, role = user.role.as_str(), "account registered");
    Ok(Json(UserResponse { user }))
}

/// `GET /api/users/:id` — account lookup.
pub async fn get(
    State(ctx): State<ApiContext>,
    Extension(_actor): Extension<ActorContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<UserResponse>, ApiError> {
    let conn = ctx.core.open_db()?;
    let user = registry::user_account(&conn, &id).map_err(ApiError::from)?;
    Ok(Json(UserResponse { user }))
}

#[derive(Serialize)]
pub struct DoctorsResponse {
    pub doctors: Vec<registry::DoctorListing>,
}

/// `GET /api/doctors` — the doctor directory for booking.
pub async fn doctors(
    State(ctx): State<ApiContext>,
    Extension(_actor): Extension<ActorContext>,
) -> Result<Json<DoctorsResponse>, ApiError> {
    let conn = ctx.core.open_db()?;
    let doctors = registry::list_doctors(&conn).map_err(ApiError::from)?;
    Ok(Json(DoctorsResponse { doctors }))
}
