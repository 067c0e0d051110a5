//! Prescription endpoints — doctor-side authoring and storekeeper-side
//! review and dispensing.

use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::Extension;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::endpoints::{pdf_attachment, require_doctor, require_storekeeper};
use crate::api::error::ApiError;
use crate::api::types::{ActorContext, ApiContext};
use crate::db::DatabaseError;
use crate::dispensary::{self, PrescriptionCard, PrescriptionDetails};
use crate::models::Prescription;
use crate::prescribing::{self, PrescriptionDraft, PrescriptionFormInfo};

#[derive(Serialize)]
pub struct FormInfoResponse {
    pub form: PrescriptionFormInfo,
}

/// `GET /api/prescriptions/form/:appointment_id` — everything the doctor
/// needs on screen before writing: patient sheet, catalogs, frequencies.
pub async fn form_info(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<ActorContext>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<FormInfoResponse>, ApiError> {
    let conn = ctx.core.open_db()?;
    let doctor = require_doctor(&conn, &actor)?;
    let form = prescribing::prescription_form_info(&conn, &doctor.id, &appointment_id)
        .map_err(ApiError::from)?;
    Ok(Json(FormInfoResponse { form }))
}

#[derive(Serialize)]
pub struct SavedResponse {
    pub prescription: Prescription,
}

/// `POST /api/prescriptions/:appointment_id` — save the prescription and
/// complete the appointment. A second save for the same appointment is a
/// conflict, not a validation error.
pub async fn save(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<ActorContext>,
    Path(appointment_id): Path<Uuid>,
    Json(payload): Json<PrescriptionDraft>,
) -> Result<Json<SavedResponse>, ApiError> {
    let conn = ctx.core.open_db()?;
    let doctor = require_doctor(&conn, &actor)?;
    let prescription = prescribing::save_prescription(&conn, &doctor.id, &appointment_id, &payload)
        .map_err(|e| match e {
            DatabaseError::ConstraintViolation(msg) if msg.contains("already has a prescription") => {
                ApiError::Conflict(msg)
            }
            other => ApiError::from(other),
        })?;
    tracing::info!(prescription_id = %prescription.id, "prescription saved");
    Ok(Json(SavedResponse { prescription }))
}

#[derive(Serialize)]
pub struct PrescriptionsResponse {
    pub prescriptions: Vec<PrescriptionCard>,
}

/// `GET /api/prescriptions` — every prescription, newest first.
pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<ActorContext>,
) -> Result<Json<PrescriptionsResponse>, ApiError> {
    let conn = ctx.core.open_db()?;
    require_storekeeper(&conn, &actor)?;
    let prescriptions = dispensary::list_prescriptions(&conn).map_err(ApiError::from)?;
    Ok(Json(PrescriptionsResponse { prescriptions }))
}

#[derive(Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

/// `GET /api/prescriptions/search?q=` — filter by patient name.
pub async fn search(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<ActorContext>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<PrescriptionsResponse>, ApiError> {
    let conn = ctx.core.open_db()?;
    require_storekeeper(&conn, &actor)?;
    let q = query.q.unwrap_or_default();
    let prescriptions = dispensary::search_prescriptions(&conn, &q).map_err(ApiError::from)?;
    Ok(Json(PrescriptionsResponse { prescriptions }))
}

#[derive(Serialize)]
pub struct DetailsResponse {
    pub details: PrescriptionDetails,
}

/// `GET /api/prescriptions/:id/details` — per-line stock coverage view.
pub async fn details(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<DetailsResponse>, ApiError> {
    let conn = ctx.core.open_db()?;
    require_storekeeper(&conn, &actor)?;
    let details = dispensary::prescription_details(&conn, &id).map_err(ApiError::from)?;
    Ok(Json(DetailsResponse { details }))
}

/// `POST /api/prescriptions/:id/dispense` — decrement stock for every
/// covered line and hand back the printable receipt.
pub async fn dispense(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let conn = ctx.core.open_db()?;
    require_storekeeper(&conn, &actor)?;
    let receipt = dispensary::dispense(&conn, &id).map_err(|e| match e {
        DatabaseError::ConstraintViolation(msg) if msg == "Not enough stock." => {
            ApiError::InsufficientStock
        }
        other => ApiError::from(other),
    })?;
    tracing::info!(prescription_id = %id, dispensed = receipt.dispensed, "medicines dispensed");
    Ok(pdf_attachment(&receipt.filename, receipt.bytes))
}
