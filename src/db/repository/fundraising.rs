use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::repository::user::{parse_datetime, parse_uuid};
use crate::db::DatabaseError;
use crate::models::*;

pub fn insert_fundraising_request(
    conn: &Connection,
    request: &FundraisingRequest,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO fundraising_requests
         (id, patient_id, disease_name, amount_needed, details, is_approved, serial_number, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            request.id.to_string(),
            request.patient_id.to_string(),
            request.disease_name,
            request.amount_needed,
            request.details,
            request.is_approved as i32,
            request.serial_number,
            request.created_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

pub fn get_fundraising_request(
    conn: &Connection,
    id: &Uuid,
) -> Result<Option<FundraisingRequest>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, patient_id, disease_name, amount_needed, details, is_approved, serial_number, created_at
         FROM fundraising_requests WHERE id = ?1",
    )?;

    let mut rows = stmt.query_map(params![id.to_string()], |row| Ok(fundraising_row(row)))?;

    match rows.next() {
        Some(row) => Ok(Some(fundraising_from_row(row??)?)),
        None => Ok(None),
    }
}

pub fn list_fundraising_requests(conn: &Connection) -> Result<Vec<FundraisingRequest>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, patient_id, disease_name, amount_needed, details, is_approved, serial_number, created_at
         FROM fundraising_requests ORDER BY created_at DESC",
    )?;

    let rows = stmt.query_map([], |row| Ok(fundraising_row(row)))?;

    let mut requests = Vec::new();
    for row in rows {
        requests.push(fundraising_from_row(row??)?);
    }
    Ok(requests)
}

pub fn list_fundraising_requests_for_patient(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Vec<FundraisingRequest>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, patient_id, disease_name, amount_needed, details, is_approved, serial_number, created_at
         FROM fundraising_requests WHERE patient_id = ?1 ORDER BY created_at DESC",
    )?;

    let rows = stmt.query_map(params![patient_id.to_string()], |row| Ok(fundraising_row(row)))?;

    let mut requests = Vec::new();
    for row in rows {
        requests.push(fundraising_from_row(row??)?);
    }
    Ok(requests)
}

/// Flip the approval flag and replace the serial number in one statement.
/// The serial is set when approving and cleared when revoking.
pub fn update_fundraising_approval(
    conn: &Connection,
    id: &Uuid,
    is_approved: bool,
    serial_number: Option<&str>,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE fundraising_requests SET is_approved = ?2, serial_number = ?3 WHERE id = ?1",
        params![id.to_string(), is_approved as i32, serial_number],
    )?;

    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "fundraising_request".to_string(),
            id: id.to_string(),
        });
    }
    Ok(())
}

// ─── Row mapping ────────────────────────────────────────────

struct FundraisingRow {
    id: String,
    patient_id: String,
    disease_name: String,
    amount_needed: f64,
    details: String,
    is_approved: i32,
    serial_number: Option<String>,
    created_at: String,
}

fn fundraising_row(row: &rusqlite::Row<'_>) -> Result<FundraisingRow, rusqlite::Error> {
    Ok(FundraisingRow {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        disease_name: row.get(2)?,
        amount_needed: row.get(3)?,
        details: row.get(4)?,
        is_approved: row.get(5)?,
        serial_number: row.get(6)?,
        created_at: row.get(7)?,
    })
}

fn fundraising_from_row(row: FundraisingRow) -> Result<FundraisingRequest, DatabaseError> {
    Ok(FundraisingRequest {
        id: parse_uuid(&row.id)?,
        patient_id: parse_uuid(&row.patient_id)?,
        disease_name: row.disease_name,
        amount_needed: row.amount_needed,
        details: row.details,
        is_approved: row.is_approved != 0,
        serial_number: row.serial_number,
        created_at: parse_datetime(&row.created_at)?,
    })
}
