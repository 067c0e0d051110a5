use std::str::FromStr;

use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::repository::user::{parse_datetime, parse_uuid};
use crate::db::DatabaseError;
use crate::models::enums::*;
use crate::models::*;

pub fn insert_prescription(conn: &Connection, rx: &Prescription) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO prescriptions (id, doctor_appointment_id, complains, vitals, diagnosis,
         referrals, date_issued, next_checkup, is_referred)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            rx.id.to_string(),
            rx.doctor_appointment_id.to_string(),
            rx.complains,
            rx.vitals,
            rx.diagnosis,
            rx.referrals,
            rx.date_issued.to_rfc3339(),
            rx.next_checkup.map(|dt| dt.to_rfc3339()),
            rx.is_referred as i32,
        ],
    )?;
    Ok(())
}

pub fn get_prescription(conn: &Connection, id: &Uuid) -> Result<Option<Prescription>, DatabaseError> {
    prescription_query(conn, "WHERE id = ?1", &id.to_string())
}

pub fn get_prescription_by_appointment(
    conn: &Connection,
    appointment_id: &Uuid,
) -> Result<Option<Prescription>, DatabaseError> {
    prescription_query(conn, "WHERE doctor_appointment_id = ?1", &appointment_id.to_string())
}

fn prescription_query(
    conn: &Connection,
    clause: &str,
    value: &str,
) -> Result<Option<Prescription>, DatabaseError> {
    let sql = format!(
        "SELECT id, doctor_appointment_id, complains, vitals, diagnosis, referrals,
         date_issued, next_checkup, is_referred
         FROM prescriptions {clause}"
    );
    let mut stmt = conn.prepare(&sql)?;

    let mut rows = stmt.query_map(params![value], |row| Ok(prescription_row(row)))?;

    match rows.next() {
        Some(row) => Ok(Some(prescription_from_row(row??)?)),
        None => Ok(None),
    }
}

pub fn insert_prescribed_medicine(
    conn: &Connection,
    item: &PrescribedMedicine,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO prescribed_medicines (id, prescription_id, medicine_id, duration,
         instructions, dosage_frequency)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            item.id.to_string(),
            item.prescription_id.to_string(),
            item.medicine_id.to_string(),
            item.duration,
            item.instructions,
            item.dosage_frequency.as_str(),
        ],
    )?;
    Ok(())
}

pub fn list_prescribed_medicines(
    conn: &Connection,
    prescription_id: &Uuid,
) -> Result<Vec<PrescribedMedicine>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, prescription_id, medicine_id, duration, instructions, dosage_frequency
         FROM prescribed_medicines WHERE prescription_id = ?1",
    )?;

    let rows = stmt.query_map(params![prescription_id.to_string()], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, i64>(3)?,
            row.get::<_, String>(4)?,
            row.get::<_, String>(5)?,
        ))
    })?;

    let mut items = Vec::new();
    for row in rows {
        let (id, prescription_id, medicine_id, duration, instructions, frequency) = row?;
        items.push(PrescribedMedicine {
            id: parse_uuid(&id)?,
            prescription_id: parse_uuid(&prescription_id)?,
            medicine_id: parse_uuid(&medicine_id)?,
            duration,
            instructions,
            dosage_frequency: DosageFrequency::from_str(&frequency)?,
        });
    }
    Ok(items)
}

pub fn insert_prescribed_test(conn: &Connection, item: &PrescribedTest) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO prescribed_tests (id, prescription_id, test_id) VALUES (?1, ?2, ?3)",
        params![
            item.id.to_string(),
            item.prescription_id.to_string(),
            item.test_id.to_string(),
        ],
    )?;
    Ok(())
}

pub fn list_prescribed_tests(
    conn: &Connection,
    prescription_id: &Uuid,
) -> Result<Vec<PrescribedTest>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, prescription_id, test_id FROM prescribed_tests WHERE prescription_id = ?1",
    )?;

    let rows = stmt.query_map(params![prescription_id.to_string()], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
        ))
    })?;

    let mut items = Vec::new();
    for row in rows {
        let (id, prescription_id, test_id) = row?;
        items.push(PrescribedTest {
            id: parse_uuid(&id)?,
            prescription_id: parse_uuid(&prescription_id)?,
            test_id: parse_uuid(&test_id)?,
        });
    }
    Ok(items)
}

// ─── Row mapping ────────────────────────────────────────────

struct PrescriptionRow {
    id: String,
    doctor_appointment_id: String,
    complains: String,
    vitals: String,
    diagnosis: String,
    referrals: String,
    date_issued: String,
    next_checkup: Option<String>,
    is_referred: i32,
}

fn prescription_row(row: &rusqlite::Row<'_>) -> Result<PrescriptionRow, rusqlite::Error> {
    Ok(PrescriptionRow {
        id: row.get(0)?,
        doctor_appointment_id: row.get(1)?,
        complains: row.get(2)?,
        vitals: row.get(3)?,
        diagnosis: row.get(4)?,
        referrals: row.get(5)?,
        date_issued: row.get(6)?,
        next_checkup: row.get(7)?,
        is_referred: row.get(8)?,
    })
}

fn prescription_from_row(row: PrescriptionRow) -> Result<Prescription, DatabaseError> {
    Ok(Prescription {
        id: parse_uuid(&row.id)?,
        doctor_appointment_id: parse_uuid(&row.doctor_appointment_id)?,
        complains: row.complains,
        vitals: row.vitals,
        diagnosis: row.diagnosis,
        referrals: row.referrals,
        date_issued: parse_datetime(&row.date_issued)?,
        next_checkup: row.next_checkup.as_deref().map(parse_datetime).transpose()?,
        is_referred: row.is_referred != 0,
    })
}
