//! Lab endpoints — pending test worklist, report filing with an optional
//! attachment, and PDF report downloads.
//!
//! Attachments arrive as base64 data URLs inside the JSON body
//! (e.g., `data:image/png;base64,iVBOR...`). The stored extension comes
//! from the magic bytes, not from the client-supplied name.

use axum::extract::{Path, State};
use axum::response::Response;
use axum::Extension;
use axum::Json;
use base64::Engine;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::endpoints::{pdf_attachment, require_lab_technician, require_patient};
use crate::api::error::ApiError;
use crate::api::types::{ActorContext, ApiContext};
use crate::db::DatabaseError;
use crate::laboratory::{self, NewTestReport, PendingTest, ReportAttachment, ReportCard};
use crate::models::enums::UserRole;
use crate::models::TestReport;

/// Maximum attachment size in bytes (4 MB).
const MAX_FILE_BYTES: usize = 4 * 1024 * 1024;

#[derive(Serialize)]
pub struct PendingTestsResponse {
    pub tests: Vec<PendingTest>,
}

/// `GET /api/lab/prescribed-tests` — prescribed tests without a report yet.
pub async fn pending_tests(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<ActorContext>,
) -> Result<Json<PendingTestsResponse>, ApiError> {
    let conn = ctx.core.open_db()?;
    require_lab_technician(&conn, &actor)?;
    let tests = laboratory::pending_tests(&conn).map_err(ApiError::from)?;
    Ok(Json(PendingTestsResponse { tests }))
}

#[derive(Deserialize)]
pub struct ReportUpload {
    pub result: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub file: Option<UploadFile>,
}

#[derive(Deserialize)]
pub struct UploadFile {
    pub name: String,
    /// Base64 data URL (e.g., `data:image/png;base64,iVBOR...`).
    pub data: String,
}

#[derive(Serialize)]
pub struct ReportResponse {
    pub report: TestReport,
}

/// `POST /api/lab/reports/:prescribed_test_id` — file the report. A second
/// report for the same prescribed test is a conflict.
pub async fn save_report(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<ActorContext>,
    Path(prescribed_test_id): Path<Uuid>,
    Json(payload): Json<ReportUpload>,
) -> Result<Json<ReportResponse>, ApiError> {
    let conn = ctx.core.open_db()?;
    require_lab_technician(&conn, &actor)?;

    let attachment = match &payload.file {
        Some(file) => Some(decode_attachment(file)?),
        None => None,
    };
    let new = NewTestReport {
        prescribed_test_id,
        result: payload.result.clone(),
        notes: payload.notes.clone(),
        attachment,
    };
    let report =
        laboratory::save_report(&conn, &ctx.core.attachments_dir, &new).map_err(|e| match e {
            DatabaseError::ConstraintViolation(msg) if msg.contains("already exists") => {
                ApiError::Conflict(msg)
            }
            other => ApiError::from(other),
        })?;
    tracing::info!(report_id = %report.id, "test report filed");
    Ok(Json(ReportResponse { report }))
}

#[derive(Serialize)]
pub struct ReportsResponse {
    pub reports: Vec<ReportCard>,
}

/// `GET /api/lab/reports` — every filed report, newest first.
pub async fn all_reports(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<ActorContext>,
) -> Result<Json<ReportsResponse>, ApiError> {
    let conn = ctx.core.open_db()?;
    require_lab_technician(&conn, &actor)?;
    let reports = laboratory::all_reports(&conn).map_err(ApiError::from)?;
    Ok(Json(ReportsResponse { reports }))
}

/// `GET /api/lab/reports/mine` — the patient's own reports.
pub async fn my_reports(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<ActorContext>,
) -> Result<Json<ReportsResponse>, ApiError> {
    let conn = ctx.core.open_db()?;
    let patient = require_patient(&conn, &actor)?;
    let reports = laboratory::patient_reports(&conn, &patient.id).map_err(ApiError::from)?;
    Ok(Json(ReportsResponse { reports }))
}

/// `GET /api/lab/reports/:id/download` — printable PDF rendition.
///
/// Technicians and admins can fetch any report; a patient only their own,
/// and a foreign report id reads as not found rather than forbidden.
pub async fn download(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let conn = ctx.core.open_db()?;
    if !actor.is_admin {
        match actor.role {
            UserRole::LabTechnician => {
                require_lab_technician(&conn, &actor)?;
            }
            UserRole::Patient => {
                let patient = require_patient(&conn, &actor)?;
                let owned = laboratory::patient_reports(&conn, &patient.id)
                    .map_err(ApiError::from)?
                    .iter()
                    .any(|r| r.id == id);
                if !owned {
                    return Err(ApiError::NotFound("report not found".into()));
                }
            }
            _ => {
                return Err(ApiError::Forbidden(
                    "lab technician or patient role required".into(),
                ))
            }
        }
    }
    let download = laboratory::report_download(&conn, &id).map_err(ApiError::from)?;
    Ok(pdf_attachment(&download.filename, download.bytes))
}

/// Decode an uploaded file into an attachment, enforcing the size cap.
fn decode_attachment(file: &UploadFile) -> Result<ReportAttachment, ApiError> {
    let bytes = decode_data_url(&file.data)
        .map_err(|e| ApiError::Validation(format!("invalid attachment data: {e}")))?;
    if bytes.len() > MAX_FILE_BYTES {
        return Err(ApiError::Validation(format!(
            "attachment exceeds 4 MB size limit ({} bytes)",
            bytes.len()
        )));
    }
    let ext = detect_extension(&bytes);
    let stem = file
        .name
        .rsplit_once('.')
        .map(|(s, _)| s)
        .unwrap_or(&file.name);
    Ok(ReportAttachment {
        filename: format!("{stem}.{ext}"),
        bytes,
    })
}

/// Decode a base64 data URL to raw bytes.
///
/// Handles both `data:image/png;base64,...` and raw base64 strings.
fn decode_data_url(data_url: &str) -> Result<Vec<u8>, String> {
    let base64_data = match data_url.find(',') {
        Some(idx) => &data_url[idx + 1..],
        None => data_url,
    };

    base64::engine::general_purpose::STANDARD
        .decode(base64_data)
        .map_err(|e| format!("Base64 decode failed: {e}"))
}

/// Detect file extension from magic bytes.
fn detect_extension(bytes: &[u8]) -> &'static str {
    if bytes.len() >= 3 && bytes[0..3] == [0xFF, 0xD8, 0xFF] {
        "jpg"
    } else if bytes.len() >= 8 && bytes[0..8] == [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A] {
        "png"
    } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        "webp"
    } else if bytes.len() >= 8 && &bytes[4..8] == b"ftyp" {
        "heic"
    } else if bytes.len() >= 5 && &bytes[0..5] == b"%PDF-" {
        "pdf"
    } else {
        "bin"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_data_url_png() {
        let data = "data:image/png;base64,iVBORw0KGgo=";
        let bytes = decode_data_url(data).unwrap();
        assert_eq!(bytes[0], 0x89);
    }

    #[test]
    fn decode_data_url_raw_base64() {
        let raw = base64::engine::general_purpose::STANDARD.encode(b"hello");
        let bytes = decode_data_url(&raw).unwrap();
        assert_eq!(bytes, b"hello");
    }

    #[test]
    fn decode_data_url_invalid_base64() {
        assert!(decode_data_url("not-valid-base64!!!").is_err());
    }

    #[test]
    fn detect_extension_jpeg() {
        assert_eq!(detect_extension(&[0xFF, 0xD8, 0xFF, 0xE0]), "jpg");
    }

    #[test]
    fn detect_extension_pdf() {
        assert_eq!(detect_extension(b"%PDF-1.4"), "pdf");
    }

    #[test]
    fn detect_extension_unknown() {
        assert_eq!(detect_extension(&[0x00, 0x01, 0x02]), "bin");
    }

    #[test]
    fn attachment_extension_follows_magic_bytes() {
        let data = base64::engine::general_purpose::STANDARD.encode(b"%PDF-1.4 fake");
        let file = UploadFile {
            name: "scan.png".to_string(),
            data: format!("data:image/png;base64,{data}"),
        };
        let attachment = decode_attachment(&file).unwrap();
        assert_eq!(attachment.filename, "scan.pdf");
    }

    #[test]
    fn attachment_without_extension_gains_one() {
        let data = base64::engine::general_purpose::STANDARD.encode(&[0xFF, 0xD8, 0xFF, 0xE0]);
        let file = UploadFile {
            name: "xray".to_string(),
            data,
        };
        let attachment = decode_attachment(&file).unwrap();
        assert_eq!(attachment.filename, "xray.jpg");
    }

    #[test]
    fn oversized_attachment_is_rejected() {
        let data = base64::engine::general_purpose::STANDARD
            .encode(vec![0u8; MAX_FILE_BYTES + 1]);
        let file = UploadFile {
            name: "huge.bin".to_string(),
            data,
        };
        let err = decode_attachment(&file).unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }
}
