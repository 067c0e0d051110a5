//! Fundraising endpoints — patient requests, admin approval toggling,
//! and serial-numbered certificate downloads.

use axum::extract::{Path, State};
use axum::response::Response;
use axum::Extension;
use axum::Json;
use serde::Serialize;
use uuid::Uuid;

use crate::api::endpoints::{pdf_attachment, require_admin, require_patient};
use crate::api::error::ApiError;
use crate::api::types::{ActorContext, ApiContext};
use crate::db::repository;
use crate::db::DatabaseError;
use crate::fundraising::{self, NewFundraisingRequest};
use crate::models::enums::UserRole;
use crate::models::FundraisingRequest;

#[derive(Serialize)]
pub struct RequestResponse {
    pub request: FundraisingRequest,
}

/// `POST /api/fundraising` — patient files a request; starts unapproved.
pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<ActorContext>,
    Json(payload): Json<NewFundraisingRequest>,
) -> Result<Json<RequestResponse>, ApiError> {
    let conn = ctx.core.open_db()?;
    let patient = require_patient(&conn, &actor)?;
    let request =
        fundraising::create_request(&conn, &patient.id, &payload).map_err(ApiError::from)?;
    tracing::info!(request_id = %request.id, "fundraising request filed");
    Ok(Json(RequestResponse { request }))
}

#[derive(Serialize)]
pub struct RequestsResponse {
    pub requests: Vec<FundraisingRequest>,
}

/// `GET /api/fundraising` — all requests for admins, own requests for
/// patients.
pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<ActorContext>,
) -> Result<Json<RequestsResponse>, ApiError> {
    let conn = ctx.core.open_db()?;
    let requests = if actor.is_admin {
        fundraising::all_requests(&conn).map_err(ApiError::from)?
    } else if actor.role == UserRole::Patient {
        let patient = require_patient(&conn, &actor)?;
        fundraising::patient_requests(&conn, &patient.id).map_err(ApiError::from)?
    } else {
        return Err(ApiError::Forbidden(
            "patient role or admin access required".into(),
        ));
    };
    Ok(Json(RequestsResponse { requests }))
}

/// `POST /api/fundraising/:id/approve` — toggle approval; approving mints
/// the certificate serial, revoking clears it.
pub async fn toggle_approval(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<RequestResponse>, ApiError> {
    require_admin(&actor)?;
    let conn = ctx.core.open_db()?;
    let request = fundraising::toggle_approval(&conn, &id).map_err(ApiError::from)?;
    tracing::info!(
        request_id = %request.id,
        approved = request.is_approved,
        "fundraising approval toggled"
    );
    Ok(Json(RequestResponse { request }))
}

/// `GET /api/fundraising/:id/certificate` — printable certificate for an
/// approved request. Admins can fetch any certificate; a patient only
/// their own, and a foreign request id reads as not found.
pub async fn certificate(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let conn = ctx.core.open_db()?;
    if !actor.is_admin {
        if actor.role != UserRole::Patient {
            return Err(ApiError::Forbidden(
                "patient role or admin access required".into(),
            ));
        }
        let patient = require_patient(&conn, &actor)?;
        let owned = repository::get_fundraising_request(&conn, &id)
            .map_err(ApiError::from)?
            .map(|r| r.patient_id == patient.id)
            .unwrap_or(false);
        if !owned {
            return Err(ApiError::NotFound("fundraising request not found".into()));
        }
    }
    let download = fundraising::certificate(&conn, &id).map_err(|e| match e {
        DatabaseError::ConstraintViolation(msg) if msg.contains("not approved") => {
            ApiError::Conflict(msg)
        }
        other => ApiError::from(other),
    })?;
    Ok(pdf_attachment(&download.filename, download.bytes))
}
