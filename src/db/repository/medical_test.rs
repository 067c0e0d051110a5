use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::repository::user::{parse_datetime, parse_uuid};
use crate::db::DatabaseError;
use crate::models::*;

pub fn insert_medical_test(conn: &Connection, test: &MedicalTest) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO medical_tests (id, name, description, department, is_available)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            test.id.to_string(),
            test.name,
            test.description,
            test.department,
            test.is_available as i32,
        ],
    )?;
    Ok(())
}

pub fn get_medical_test(conn: &Connection, id: &Uuid) -> Result<Option<MedicalTest>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, name, description, department, is_available
         FROM medical_tests WHERE id = ?1",
    )?;

    let mut rows = stmt.query_map(params![id.to_string()], |row| Ok(medical_test_row(row)))?;

    match rows.next() {
        Some(row) => Ok(Some(medical_test_from_row(row??)?)),
        None => Ok(None),
    }
}

pub fn list_available_tests(conn: &Connection) -> Result<Vec<MedicalTest>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, name, description, department, is_available
         FROM medical_tests WHERE is_available = 1 ORDER BY name",
    )?;

    let rows = stmt.query_map([], |row| Ok(medical_test_row(row)))?;

    let mut tests = Vec::new();
    for row in rows {
        tests.push(medical_test_from_row(row??)?);
    }
    Ok(tests)
}

// ─── Test reports ───────────────────────────────────────────

pub fn insert_test_report(conn: &Connection, report: &TestReport) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO test_reports (id, prescribed_test_id, result, attached_file, notes, report_date)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            report.id.to_string(),
            report.prescribed_test_id.to_string(),
            report.result,
            report.attached_file,
            report.notes,
            report.report_date.to_rfc3339(),
        ],
    )?;
    Ok(())
}

pub fn get_test_report(conn: &Connection, id: &Uuid) -> Result<Option<TestReport>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, prescribed_test_id, result, attached_file, notes, report_date
         FROM test_reports WHERE id = ?1",
    )?;

    let mut rows = stmt.query_map(params![id.to_string()], |row| Ok(test_report_row(row)))?;

    match rows.next() {
        Some(row) => Ok(Some(test_report_from_row(row??)?)),
        None => Ok(None),
    }
}

pub fn get_test_report_by_prescribed_test(
    conn: &Connection,
    prescribed_test_id: &Uuid,
) -> Result<Option<TestReport>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, prescribed_test_id, result, attached_file, notes, report_date
         FROM test_reports WHERE prescribed_test_id = ?1",
    )?;

    let mut rows = stmt.query_map(params![prescribed_test_id.to_string()], |row| {
        Ok(test_report_row(row))
    })?;

    match rows.next() {
        Some(row) => Ok(Some(test_report_from_row(row??)?)),
        None => Ok(None),
    }
}

pub fn list_test_reports(conn: &Connection) -> Result<Vec<TestReport>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, prescribed_test_id, result, attached_file, notes, report_date
         FROM test_reports ORDER BY report_date DESC",
    )?;

    let rows = stmt.query_map([], |row| Ok(test_report_row(row)))?;

    let mut reports = Vec::new();
    for row in rows {
        reports.push(test_report_from_row(row??)?);
    }
    Ok(reports)
}

// ─── Row mapping ────────────────────────────────────────────

struct MedicalTestRow {
    id: String,
    name: String,
    description: String,
    department: String,
    is_available: i32,
}

fn medical_test_row(row: &rusqlite::Row<'_>) -> Result<MedicalTestRow, rusqlite::Error> {
    Ok(MedicalTestRow {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        department: row.get(3)?,
        is_available: row.get(4)?,
    })
}

fn medical_test_from_row(row: MedicalTestRow) -> Result<MedicalTest, DatabaseError> {
    Ok(MedicalTest {
        id: parse_uuid(&row.id)?,
        name: row.name,
        description: row.description,
        department: row.department,
        is_available: row.is_available != 0,
    })
}

struct TestReportRow {
    id: String,
    prescribed_test_id: String,
    result: String,
    attached_file: Option<String>,
    notes: String,
    report_date: String,
}

fn test_report_row(row: &rusqlite::Row<'_>) -> Result<TestReportRow, rusqlite::Error> {
    Ok(TestReportRow {
        id: row.get(0)?,
        prescribed_test_id: row.get(1)?,
        result: row.get(2)?,
        attached_file: row.get(3)?,
        notes: row.get(4)?,
        report_date: row.get(5)?,
    })
}

fn test_report_from_row(row: TestReportRow) -> Result<TestReport, DatabaseError> {
    Ok(TestReport {
        id: parse_uuid(&row.id)?,
        prescribed_test_id: parse_uuid(&row.prescribed_test_id)?,
        result: row.result,
        attached_file: row.attached_file,
        notes: row.notes,
        report_date: parse_datetime(&row.report_date)?,
    })
}
