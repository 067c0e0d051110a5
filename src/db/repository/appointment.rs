use std::str::FromStr;

use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::repository::user::{parse_datetime, parse_uuid};
use crate::db::DatabaseError;
use crate::models::enums::*;
use crate::models::*;

pub fn insert_doctor_appointment(
    conn: &Connection,
    appt: &DoctorAppointment,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO doctor_appointments (id, patient_id, doctor_id, appointment_date_time,
         status, reason, is_emergency, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            appt.id.to_string(),
            appt.patient_id.to_string(),
            appt.doctor_id.to_string(),
            appt.appointment_date_time.to_rfc3339(),
            appt.status.as_str(),
            appt.reason,
            appt.is_emergency as i32,
            appt.created_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

pub fn get_doctor_appointment(
    conn: &Connection,
    id: &Uuid,
) -> Result<Option<DoctorAppointment>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, patient_id, doctor_id, appointment_date_time, status, reason,
         is_emergency, created_at
         FROM doctor_appointments WHERE id = ?1",
    )?;

    let mut rows = stmt.query_map(params![id.to_string()], |row| {
        Ok(doctor_appointment_row(row))
    })?;

    match rows.next() {
        Some(row) => Ok(Some(doctor_appointment_from_row(row??)?)),
        None => Ok(None),
    }
}

pub fn list_doctor_appointments_for_patient(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Vec<DoctorAppointment>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, patient_id, doctor_id, appointment_date_time, status, reason,
         is_emergency, created_at
         FROM doctor_appointments WHERE patient_id = ?1
         ORDER BY appointment_date_time DESC",
    )?;

    let rows = stmt.query_map(params![patient_id.to_string()], |row| {
        Ok(doctor_appointment_row(row))
    })?;

    let mut appts = Vec::new();
    for row in rows {
        appts.push(doctor_appointment_from_row(row??)?);
    }
    Ok(appts)
}

pub fn list_scheduled_appointments_for_doctor(
    conn: &Connection,
    doctor_id: &Uuid,
) -> Result<Vec<DoctorAppointment>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, patient_id, doctor_id, appointment_date_time, status, reason,
         is_emergency, created_at
         FROM doctor_appointments WHERE doctor_id = ?1 AND status = 'scheduled'
         ORDER BY appointment_date_time",
    )?;

    let rows = stmt.query_map(params![doctor_id.to_string()], |row| {
        Ok(doctor_appointment_row(row))
    })?;

    let mut appts = Vec::new();
    for row in rows {
        appts.push(doctor_appointment_from_row(row??)?);
    }
    Ok(appts)
}

pub fn delete_doctor_appointment(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "DELETE FROM doctor_appointments WHERE id = ?1",
        params![id.to_string()],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "DoctorAppointment".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

pub fn set_doctor_appointment_status(
    conn: &Connection,
    id: &Uuid,
    status: AppointmentStatus,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE doctor_appointments SET status = ?2 WHERE id = ?1",
        params![id.to_string(), status.as_str()],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "DoctorAppointment".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

/// Whether the patient has ever booked this doctor before. Drives the
/// first-visit bump of `no_of_patients`.
pub fn patient_has_seen_doctor(
    conn: &Connection,
    patient_id: &Uuid,
    doctor_id: &Uuid,
) -> Result<bool, DatabaseError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM doctor_appointments WHERE patient_id = ?1 AND doctor_id = ?2",
        params![patient_id.to_string(), doctor_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

// ─── Test appointments ──────────────────────────────────────

pub fn insert_test_appointment(
    conn: &Connection,
    appt: &TestAppointment,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO test_appointments (id, patient_id, lab_technician_id, medical_test_id,
         appointment_date_time, status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            appt.id.to_string(),
            appt.patient_id.to_string(),
            appt.lab_technician_id.to_string(),
            appt.medical_test_id.to_string(),
            appt.appointment_date_time.to_rfc3339(),
            appt.status.as_str(),
            appt.created_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

pub fn get_test_appointment(
    conn: &Connection,
    id: &Uuid,
) -> Result<Option<TestAppointment>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, patient_id, lab_technician_id, medical_test_id, appointment_date_time,
         status, created_at
         FROM test_appointments WHERE id = ?1",
    )?;

    let mut rows = stmt.query_map(params![id.to_string()], |row| Ok(test_appointment_row(row)))?;

    match rows.next() {
        Some(row) => Ok(Some(test_appointment_from_row(row??)?)),
        None => Ok(None),
    }
}

pub fn list_test_appointments_for_technician(
    conn: &Connection,
    technician_id: &Uuid,
) -> Result<Vec<TestAppointment>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, patient_id, lab_technician_id, medical_test_id, appointment_date_time,
         status, created_at
         FROM test_appointments WHERE lab_technician_id = ?1
         ORDER BY appointment_date_time",
    )?;

    let rows = stmt.query_map(params![technician_id.to_string()], |row| {
        Ok(test_appointment_row(row))
    })?;

    let mut appts = Vec::new();
    for row in rows {
        appts.push(test_appointment_from_row(row??)?);
    }
    Ok(appts)
}

pub fn update_test_appointment_time(
    conn: &Connection,
    id: &Uuid,
    new_time: &chrono::DateTime<chrono::Utc>,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE test_appointments SET appointment_date_time = ?2 WHERE id = ?1",
        params![id.to_string(), new_time.to_rfc3339()],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "TestAppointment".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

// ─── Row mapping ────────────────────────────────────────────

struct DoctorAppointmentRow {
    id: String,
    patient_id: String,
    doctor_id: String,
    appointment_date_time: String,
    status: String,
    reason: String,
    is_emergency: i32,
    created_at: String,
}

fn doctor_appointment_row(row: &rusqlite::Row<'_>) -> Result<DoctorAppointmentRow, rusqlite::Error> {
    Ok(DoctorAppointmentRow {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        doctor_id: row.get(2)?,
        appointment_date_time: row.get(3)?,
        status: row.get(4)?,
        reason: row.get(5)?,
        is_emergency: row.get(6)?,
        created_at: row.get(7)?,
    })
}

fn doctor_appointment_from_row(row: DoctorAppointmentRow) -> Result<DoctorAppointment, DatabaseError> {
    Ok(DoctorAppointment {
        id: parse_uuid(&row.id)?,
        patient_id: parse_uuid(&row.patient_id)?,
        doctor_id: parse_uuid(&row.doctor_id)?,
        appointment_date_time: parse_datetime(&row.appointment_date_time)?,
        status: AppointmentStatus::from_str(&row.status)?,
        reason: row.reason,
        is_emergency: row.is_emergency != 0,
        created_at: parse_datetime(&row.created_at)?,
    })
}

struct TestAppointmentRow {
    id: String,
    patient_id: String,
    lab_technician_id: String,
    medical_test_id: String,
    appointment_date_time: String,
    status: String,
    created_at: String,
}

fn test_appointment_row(row: &rusqlite::Row<'_>) -> Result<TestAppointmentRow, rusqlite::Error> {
    Ok(TestAppointmentRow {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        lab_technician_id: row.get(2)?,
        medical_test_id: row.get(3)?,
        appointment_date_time: row.get(4)?,
        status: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn test_appointment_from_row(row: TestAppointmentRow) -> Result<TestAppointment, DatabaseError> {
    Ok(TestAppointment {
        id: parse_uuid(&row.id)?,
        patient_id: parse_uuid(&row.patient_id)?,
        lab_technician_id: parse_uuid(&row.lab_technician_id)?,
        medical_test_id: parse_uuid(&row.medical_test_id)?,
        appointment_date_time: parse_datetime(&row.appointment_date_time)?,
        status: AppointmentStatus::from_str(&row.status)?,
        created_at: parse_datetime(&row.created_at)?,
    })
}
