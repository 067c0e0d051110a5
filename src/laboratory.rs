//! Laboratory — prescribed-test worklist, report filing and PDF export.
//!
//! A prescribed test carries at most one report. Attachments land in the
//! configured attachments directory under a timestamped name and only the
//! stored filename is recorded on the row.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config;
use crate::db::repository::{self, parse_uuid};
use crate::db::DatabaseError;
use crate::models::TestReport;
use crate::pdf::PageWriter;

// ═══════════════════════════════════════════
// Payloads and view types
// ═══════════════════════════════════════════

/// A decoded file attachment ready to be stored.
#[derive(Debug, Clone)]
pub struct ReportAttachment {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Report submission, attachment already decoded by the transport layer.
#[derive(Debug, Clone)]
pub struct NewTestReport {
    pub prescribed_test_id: Uuid,
    pub result: String,
    pub notes: String,
    pub attachment: Option<ReportAttachment>,
}

/// A prescribed test still waiting for its report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingTest {
    pub prescribed_test_id: Uuid,
    pub prescription_id: Uuid,
    pub test_name: String,
    pub department: String,
    pub patient_name: String,
    pub prescribed_on: DateTime<Utc>,
}

/// A filed report with its surrounding names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportCard {
    pub id: Uuid,
    pub prescribed_test_id: Uuid,
    pub test_name: String,
    pub patient_name: String,
    pub result: String,
    pub notes: String,
    pub attached_file: Option<String>,
    pub report_date: DateTime<Utc>,
}

/// A rendered report PDF ready for download.
#[derive(Debug, Clone)]
pub struct ReportDownload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

// ═══════════════════════════════════════════
// Worklist
// ═══════════════════════════════════════════

/// Every prescribed test without a report yet, oldest prescription first.
pub fn pending_tests(conn: &Connection) -> Result<Vec<PendingTest>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT pt.id, rx.id, t.name, t.department, u.name, rx.date_issued
         FROM prescribed_tests pt
         JOIN medical_tests t ON pt.test_id = t.id
         JOIN prescriptions rx ON pt.prescription_id = rx.id
         JOIN doctor_appointments a ON rx.doctor_appointment_id = a.id
         JOIN patients p ON a.patient_id = p.id
         JOIN users u ON p.user_id = u.id
         LEFT JOIN test_reports r ON r.prescribed_test_id = pt.id
         WHERE r.id IS NULL
         ORDER BY rx.date_issued ASC",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, String>(4)?,
            row.get::<_, DateTime<Utc>>(5)?,
        ))
    })?;

    let mut pending = Vec::new();
    for row in rows {
        let (prescribed_test_id, prescription_id, test_name, department, patient_name, issued) =
            row?;
        pending.push(PendingTest {
            prescribed_test_id: parse_uuid(&prescribed_test_id)?,
            prescription_id: parse_uuid(&prescription_id)?,
            test_name,
            department,
            patient_name,
            prescribed_on: issued,
        });
    }
    Ok(pending)
}

// ═══════════════════════════════════════════
// Report filing
// ═══════════════════════════════════════════

/// File a report for a prescribed test. The result text is required, one
/// report per prescribed test, and the optional attachment is written to
/// `attachments_dir` before the row is inserted.
pub fn save_report(
    conn: &Connection,
    attachments_dir: &Path,
    new: &NewTestReport,
) -> Result<TestReport, DatabaseError> {
    if new.result.trim().is_empty() {
        return Err(DatabaseError::ConstraintViolation(
            "result text is required".to_string(),
        ));
    }

    let exists: Option<String> = conn
        .query_row(
            "SELECT id FROM prescribed_tests WHERE id = ?1",
            [new.prescribed_test_id.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    if exists.is_none() {
        return Err(DatabaseError::NotFound {
            entity_type: "prescribed_test".to_string(),
            id: new.prescribed_test_id.to_string(),
        });
    }
    if repository::get_test_report_by_prescribed_test(conn, &new.prescribed_test_id)?.is_some() {
        return Err(DatabaseError::ConstraintViolation(
            "a report already exists for this prescribed test".to_string(),
        ));
    }

    let attached_file = match &new.attachment {
        Some(attachment) => Some(store_attachment(attachments_dir, attachment)?),
        None => None,
    };

    let report = TestReport {
        id: Uuid::new_v4(),
        prescribed_test_id: new.prescribed_test_id,
        result: new.result.trim().to_string(),
        attached_file,
        notes: new.notes.trim().to_string(),
        report_date: Utc::now(),
    };
    repository::insert_test_report(conn, &report)?;

    tracing::info!(
        report_id = %report.id,
        prescribed_test_id = %new.prescribed_test_id,
        has_attachment = report.attached_file.is_some(),
        "test report filed"
    );
    Ok(report)
}

fn store_attachment(
    attachments_dir: &Path,
    attachment: &ReportAttachment,
) -> Result<String, DatabaseError> {
    let stored_name = format!(
        "{}_{}",
        Utc::now().format("%Y%m%d%H%M%S"),
        sanitize_filename(&attachment.filename)
    );
    fs::create_dir_all(attachments_dir).map_err(|e| {
        DatabaseError::ConstraintViolation(format!("cannot create attachments dir: {e}"))
    })?;
    fs::write(attachments_dir.join(&stored_name), &attachment.bytes).map_err(|e| {
        DatabaseError::ConstraintViolation(format!("cannot store attachment: {e}"))
    })?;
    Ok(stored_name)
}

/// Strip path separators and shell-hostile characters from an uploaded
/// filename; empty names fall back to "attachment".
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let trimmed = cleaned.trim_matches('.').to_string();
    if trimmed.is_empty() {
        "attachment".to_string()
    } else {
        trimmed
    }
}

// ═══════════════════════════════════════════
// Report views
// ═══════════════════════════════════════════

/// Every filed report, newest first.
pub fn all_reports(conn: &Connection) -> Result<Vec<ReportCard>, DatabaseError> {
    report_cards(conn, None)
}

/// Reports reachable from the patient's own appointments.
pub fn patient_reports(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Vec<ReportCard>, DatabaseError> {
    report_cards(conn, Some(patient_id))
}

fn report_cards(
    conn: &Connection,
    patient_id: Option<&Uuid>,
) -> Result<Vec<ReportCard>, DatabaseError> {
    let mut sql = String::from(
        "SELECT r.id, pt.id, t.name, u.name, r.result, r.notes, r.attached_file, r.report_date
         FROM test_reports r
         JOIN prescribed_tests pt ON r.prescribed_test_id = pt.id
         JOIN medical_tests t ON pt.test_id = t.id
         JOIN prescriptions rx ON pt.prescription_id = rx.id
         JOIN doctor_appointments a ON rx.doctor_appointment_id = a.id
         JOIN patients p ON a.patient_id = p.id
         JOIN users u ON p.user_id = u.id",
    );
    let mut params_vec: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();
    if let Some(patient_id) = patient_id {
        sql.push_str(" WHERE p.id = ?1");
        params_vec.push(Box::new(patient_id.to_string()));
    }
    sql.push_str(" ORDER BY r.report_date DESC");

    let params_refs: Vec<&dyn rusqlite::types::ToSql> =
        params_vec.iter().map(|p| p.as_ref()).collect();

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_refs.as_slice(), |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, String>(4)?,
            row.get::<_, String>(5)?,
            row.get::<_, Option<String>>(6)?,
            row.get::<_, DateTime<Utc>>(7)?,
        ))
    })?;

    let mut cards = Vec::new();
    for row in rows {
        let (id, prescribed_test_id, test_name, patient_name, result, notes, attached, date) =
            row?;
        cards.push(ReportCard {
            id: parse_uuid(&id)?,
            prescribed_test_id: parse_uuid(&prescribed_test_id)?,
            test_name,
            patient_name,
            result,
            notes,
            attached_file: attached,
            report_date: date,
        });
    }
    Ok(cards)
}

// ═══════════════════════════════════════════
// PDF export
// ═══════════════════════════════════════════

/// Render one report as a downloadable PDF. Unknown ids are `NotFound`.
pub fn report_download(
    conn: &Connection,
    report_id: &Uuid,
) -> Result<ReportDownload, DatabaseError> {
    let card = report_card(conn, report_id)?;

    let mut page = PageWriter::new("Test Report")?;
    page.heading("Test Report");
    page.meta(&format!("{} v{}", config::APP_NAME, config::APP_VERSION));
    page.meta(&format!("Report: {}", card.id));
    page.meta(&format!("Patient: {}", card.patient_name));
    page.meta(&format!("Test: {}", card.test_name));
    page.meta(&format!(
        "Reported: {}",
        card.report_date.format("%Y-%m-%d %H:%M UTC")
    ));
    page.gap(4.0);

    page.section("Result");
    page.line(&card.result);
    if !card.notes.is_empty() {
        page.gap(3.0);
        page.section("Notes");
        page.line(&card.notes);
    }
    if let Some(attached) = &card.attached_file {
        page.gap(3.0);
        page.meta(&format!("Attachment on file: {attached}"));
    }

    Ok(ReportDownload {
        filename: format!("TestReport_{report_id}.pdf"),
        bytes: page.finish()?,
    })
}

fn report_card(conn: &Connection, report_id: &Uuid) -> Result<ReportCard, DatabaseError> {
    all_reports(conn)?
        .into_iter()
        .find(|card| card.id == *report_id)
        .ok_or_else(|| DatabaseError::NotFound {
            entity_type: "test_report".to_string(),
            id: report_id.to_string(),
        })
}
