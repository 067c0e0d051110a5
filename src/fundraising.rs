//! Fundraising — patient requests, approval toggling and certificates.
//!
//! Approval is a toggle: flipping a request to approved mints a fresh
//! 20-character serial, flipping it back clears the serial. The
//! certificate PDF is only available while the request is approved.

use chrono::Utc;
use rand::Rng;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config;
use crate::db::repository;
use crate::db::DatabaseError;
use crate::models::FundraisingRequest;
use crate::pdf::PageWriter;

const SERIAL_LEN: usize = 20;
const SERIAL_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

// ═══════════════════════════════════════════
// Payloads and view types
// ═══════════════════════════════════════════

/// Request submitted by a patient.
#[derive(Debug, Clone, Deserialize)]
pub struct NewFundraisingRequest {
    pub disease_name: String,
    pub amount_needed: f64,
    #[serde(default)]
    pub details: String,
}

/// A generated certificate ready for download.
#[derive(Debug, Clone)]
pub struct CertificateDownload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

// ═══════════════════════════════════════════
// Requests
// ═══════════════════════════════════════════

/// File a fundraising request for a patient. New requests start
/// unapproved and without a serial.
pub fn create_request(
    conn: &Connection,
    patient_id: &Uuid,
    new: &NewFundraisingRequest,
) -> Result<FundraisingRequest, DatabaseError> {
    if new.disease_name.trim().is_empty() {
        return Err(DatabaseError::ConstraintViolation(
            "disease name must not be empty".to_string(),
        ));
    }
    if !new.amount_needed.is_finite() || new.amount_needed <= 0.0 {
        return Err(DatabaseError::ConstraintViolation(
            "amount needed must be positive".to_string(),
        ));
    }

    let request = FundraisingRequest {
        id: Uuid::new_v4(),
        patient_id: *patient_id,
        disease_name: new.disease_name.trim().to_string(),
        amount_needed: new.amount_needed,
        details: new.details.trim().to_string(),
        is_approved: false,
        serial_number: None,
        created_at: Utc::now(),
    };
    repository::insert_fundraising_request(conn, &request)?;
    Ok(request)
}

/// Admin review list, newest first.
pub fn all_requests(conn: &Connection) -> Result<Vec<FundraisingRequest>, DatabaseError> {
    repository::list_fundraising_requests(conn)
}

/// The patient's own requests, newest first.
pub fn patient_requests(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Vec<FundraisingRequest>, DatabaseError> {
    repository::list_fundraising_requests_for_patient(conn, patient_id)
}

/// Flip the approval state. Approving mints a serial, revoking clears it;
/// toggling twice restores the original state. Returns the updated row.
pub fn toggle_approval(
    conn: &Connection,
    request_id: &Uuid,
) -> Result<FundraisingRequest, DatabaseError> {
    let tx = conn.unchecked_transaction()?;

    let current = repository::get_fundraising_request(&tx, request_id)?.ok_or_else(|| {
        DatabaseError::NotFound {
            entity_type: "fundraising_request".to_string(),
            id: request_id.to_string(),
        }
    })?;

    let now_approved = !current.is_approved;
    let serial = if now_approved { Some(generate_serial()) } else { None };
    repository::update_fundraising_approval(&tx, request_id, now_approved, serial.as_deref())?;
    tx.commit()?;

    tracing::info!(
        request_id = %request_id,
        approved = now_approved,
        "fundraising approval toggled"
    );
    Ok(FundraisingRequest {
        is_approved: now_approved,
        serial_number: serial,
        ..current
    })
}

fn generate_serial() -> String {
    let mut rng = rand::thread_rng();
    (0..SERIAL_LEN)
        .map(|_| {
            let idx = rng.gen_range(0..SERIAL_ALPHABET.len());
            SERIAL_ALPHABET[idx] as char
        })
        .collect()
}

// ═══════════════════════════════════════════
// Certificate
// ═══════════════════════════════════════════

/// Render the certificate for an approved request. Unapproved requests
/// are a constraint failure, unknown ids are `NotFound`.
pub fn certificate(
    conn: &Connection,
    request_id: &Uuid,
) -> Result<CertificateDownload, DatabaseError> {
    let request = repository::get_fundraising_request(conn, request_id)?.ok_or_else(|| {
        DatabaseError::NotFound {
            entity_type: "fundraising_request".to_string(),
            id: request_id.to_string(),
        }
    })?;
    let Some(serial) = &request.serial_number else {
        return Err(DatabaseError::ConstraintViolation(
            "request is not approved".to_string(),
        ));
    };

    let patient_name: String = conn
        .query_row(
            "SELECT u.name FROM patients p JOIN users u ON p.user_id = u.id WHERE p.id = ?1",
            params![request.patient_id.to_string()],
            |row| row.get(0),
        )
        .optional()?
        .unwrap_or_else(|| "Unknown patient".to_string());

    let mut page = PageWriter::new("Fundraising Certificate")?;
    page.heading("Fundraising Certificate");
    page.meta(&format!("{} v{}", config::APP_NAME, config::APP_VERSION));
    page.meta(&format!("Serial: {serial}"));
    page.meta(&format!(
        "Issued: {}",
        Utc::now().format("%Y-%m-%d %H:%M UTC")
    ));
    page.gap(6.0);

    page.strong_line(&patient_name);
    page.gap(2.0);
    page.line(&format!(
        "This certifies an approved fundraising request for the treatment of {}.",
        request.disease_name
    ));
    page.line(&format!("Amount needed: {:.2}", request.amount_needed));
    if !request.details.is_empty() {
        page.gap(3.0);
        page.section("Details");
        page.line(&request.details);
    }
    page.gap(6.0);
    page.meta(&format!("Request: {}", request.id));

    Ok(CertificateDownload {
        filename: format!("FundraisingCertificate_{request_id}.pdf"),
        bytes: page.finish()?,
    })
}
