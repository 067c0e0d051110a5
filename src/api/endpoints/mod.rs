//! API endpoint handlers.
//!
//! One module per clinic surface. Handlers resolve the actor's role
//! profile row, call into the domain modules, and wrap the results in
//! JSON (or PDF attachment) responses.

pub mod appointments;
pub mod fundraising;
pub mod health;
pub mod lab;
pub mod medicines;
pub mod prescriptions;
pub mod users;

use axum::http::header;
use axum::response::{IntoResponse, Response};
use rusqlite::Connection;

use crate::api::error::ApiError;
use crate::api::types::ActorContext;
use crate::db::repository;
use crate::models::enums::UserRole;
use crate::models::{Doctor, LabTechnician, Patient, Storekeeper};

/// Resolve the actor's patient profile row; 403 for any other role.
pub(crate) fn require_patient(
    conn: &Connection,
    actor: &ActorContext,
) -> Result<Patient, ApiError> {
    if actor.role != UserRole::Patient {
        return Err(ApiError::Forbidden("patient role required".into()));
    }
    repository::get_patient_by_user(conn, &actor.user_id)?
        .ok_or_else(|| ApiError::Internal("patient profile row missing".into()))
}

/// Resolve the actor's doctor profile row; 403 for any other role.
pub(crate) fn require_doctor(conn: &Connection, actor: &ActorContext) -> Result<Doctor, ApiError> {
    if actor.role != UserRole::Doctor {
        return Err(ApiError::Forbidden("doctor role required".into()));
    }
    repository::get_doctor_by_user(conn, &actor.user_id)?
        .ok_or_else(|| ApiError::Internal("doctor profile row missing".into()))
}

/// Resolve the actor's storekeeper profile row; 403 for any other role.
pub(crate) fn require_storekeeper(
    conn: &Connection,
    actor: &ActorContext,
) -> Result<Storekeeper, ApiError> {
    if actor.role != UserRole::Storekeeper {
        return Err(ApiError::Forbidden("storekeeper role required".into()));
    }
    repository::get_storekeeper_by_user(conn, &actor.user_id)?
        .ok_or_else(|| ApiError::Internal("storekeeper profile row missing".into()))
}

/// Resolve the actor's lab technician profile row; 403 for any other role.
pub(crate) fn require_lab_technician(
    conn: &Connection,
    actor: &ActorContext,
) -> Result<LabTechnician, ApiError> {
    if actor.role != UserRole::LabTechnician {
        return Err(ApiError::Forbidden("lab technician role required".into()));
    }
    repository::get_lab_technician_by_user(conn, &actor.user_id)?
        .ok_or_else(|| ApiError::Internal("lab technician profile row missing".into()))
}

/// Admin gate; 403 for regular accounts.
pub(crate) fn require_admin(actor: &ActorContext) -> Result<(), ApiError> {
    if !actor.is_admin {
        return Err(ApiError::Forbidden("admin access required".into()));
    }
    Ok(())
}

/// Wrap generated PDF bytes as a download attachment.
pub(crate) fn pdf_attachment(filename: &str, bytes: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        bytes,
    )
        .into_response()
}
