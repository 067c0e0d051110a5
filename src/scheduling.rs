//! Appointment scheduling — doctor bookings and lab test slots.
//!
//! Booking a doctor appointment updates the doctor's workload counters in
//! the same transaction as the row insert, so a failed write never skews
//! the counts. Cancellation is a doctor action and only refunds the
//! appointment counter while the slot was still scheduled.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::repository::{self, parse_uuid};
use crate::db::DatabaseError;
use crate::models::enums::AppointmentStatus;
use crate::models::{DoctorAppointment, TestAppointment};
use crate::registry::{self, PatientSheet};

// ═══════════════════════════════════════════
// Payloads and view types
// ═══════════════════════════════════════════

/// Booking payload submitted by a patient.
#[derive(Debug, Clone, Deserialize)]
pub struct NewDoctorAppointment {
    pub doctor_id: Uuid,
    pub appointment_date_time: DateTime<Utc>,
    pub reason: String,
    #[serde(default)]
    pub is_emergency: bool,
}

/// One row in the patient's appointment history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentCard {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub doctor_name: String,
    pub specialty: String,
    pub appointment_date_time: DateTime<Utc>,
    pub status: String,
    pub reason: String,
    pub is_emergency: bool,
}

/// One row in the doctor's scheduled worklist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorklistItem {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub patient_name: String,
    pub appointment_date_time: DateTime<Utc>,
    pub reason: String,
    pub is_emergency: bool,
}

/// Administrative payload linking a patient, a technician and a test.
#[derive(Debug, Clone, Deserialize)]
pub struct NewTestAppointment {
    pub patient_id: Uuid,
    pub lab_technician_id: Uuid,
    pub medical_test_id: Uuid,
    pub appointment_date_time: DateTime<Utc>,
}

/// One row in the technician's schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestAppointmentCard {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub patient_name: String,
    pub test_name: String,
    pub appointment_date_time: DateTime<Utc>,
    pub status: String,
}

// ═══════════════════════════════════════════
// Doctor appointments
// ═══════════════════════════════════════════

/// Book a doctor appointment for `patient_id`. Rejects past slots, then
/// inserts the row and bumps the doctor's counters in one transaction.
pub fn book_appointment(
    conn: &Connection,
    patient_id: &Uuid,
    new: &NewDoctorAppointment,
) -> Result<DoctorAppointment, DatabaseError> {
    if new.appointment_date_time <= Utc::now() {
        return Err(DatabaseError::ConstraintViolation(
            "appointment time must be in the future".to_string(),
        ));
    }
    if new.reason.trim().is_empty() {
        return Err(DatabaseError::ConstraintViolation(
            "a reason for the visit is required".to_string(),
        ));
    }

    let tx = conn.unchecked_transaction()?;
    if repository::get_doctor(&tx, &new.doctor_id)?.is_none() {
        return Err(DatabaseError::NotFound {
            entity_type: "doctor".to_string(),
            id: new.doctor_id.to_string(),
        });
    }
    let first_visit = !repository::patient_has_seen_doctor(&tx, patient_id, &new.doctor_id)?;

    let appointment = DoctorAppointment {
        id: Uuid::new_v4(),
        patient_id: *patient_id,
        doctor_id: new.doctor_id,
        appointment_date_time: new.appointment_date_time,
        status: AppointmentStatus::Scheduled,
        reason: new.reason.trim().to_string(),
        is_emergency: new.is_emergency,
        created_at: Utc::now(),
    };
    repository::insert_doctor_appointment(&tx, &appointment)?;
    repository::adjust_doctor_counters(
        &tx,
        &new.doctor_id,
        1,
        if first_visit { 1 } else { 0 },
        0,
    )?;
    tx.commit()?;

    tracing::info!(
        appointment_id = %appointment.id,
        doctor_id = %new.doctor_id,
        first_visit,
        "doctor appointment booked"
    );
    Ok(appointment)
}

/// The patient's own appointments, newest first.
pub fn patient_appointments(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Vec<AppointmentCard>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT a.id, d.id, u.name, d.specialty, a.appointment_date_time,
                a.status, a.reason, a.is_emergency
         FROM doctor_appointments a
         JOIN doctors d ON a.doctor_id = d.id
         JOIN users u ON d.user_id = u.id
         WHERE a.patient_id = ?1
         ORDER BY a.appointment_date_time DESC",
    )?;
    let rows = stmt.query_map([patient_id.to_string()], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, DateTime<Utc>>(4)?,
            row.get::<_, String>(5)?,
            row.get::<_, String>(6)?,
            row.get::<_, bool>(7)?,
        ))
    })?;

    let mut cards = Vec::new();
    for row in rows {
        let (id, doctor_id, doctor_name, specialty, when, status, reason, is_emergency) = row?;
        cards.push(AppointmentCard {
            id: parse_uuid(&id)?,
            doctor_id: parse_uuid(&doctor_id)?,
            doctor_name,
            specialty,
            appointment_date_time: when,
            status,
            reason,
            is_emergency,
        });
    }
    Ok(cards)
}

/// The doctor's still-scheduled appointments, soonest first.
pub fn doctor_worklist(
    conn: &Connection,
    doctor_id: &Uuid,
) -> Result<Vec<WorklistItem>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT a.id, p.id, u.name, a.appointment_date_time, a.reason, a.is_emergency
         FROM doctor_appointments a
         JOIN patients p ON a.patient_id = p.id
         JOIN users u ON p.user_id = u.id
         WHERE a.doctor_id = ?1 AND a.status = 'scheduled'
         ORDER BY a.appointment_date_time ASC",
    )?;
    let rows = stmt.query_map([doctor_id.to_string()], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, DateTime<Utc>>(3)?,
            row.get::<_, String>(4)?,
            row.get::<_, bool>(5)?,
        ))
    })?;

    let mut items = Vec::new();
    for row in rows {
        let (id, patient_id, patient_name, when, reason, is_emergency) = row?;
        items.push(WorklistItem {
            id: parse_uuid(&id)?,
            patient_id: parse_uuid(&patient_id)?,
            patient_name,
            appointment_date_time: when,
            reason,
            is_emergency,
        });
    }
    Ok(items)
}

/// Doctor-initiated cancellation. Only a slot that was still scheduled
/// refunds the appointment counter; unknown or foreign ids are `NotFound`.
pub fn cancel_appointment(
    conn: &Connection,
    doctor_id: &Uuid,
    appointment_id: &Uuid,
) -> Result<(), DatabaseError> {
    let tx = conn.unchecked_transaction()?;

    let status: Option<String> = tx
        .query_row(
            "SELECT status FROM doctor_appointments WHERE id = ?1 AND doctor_id = ?2",
            params![appointment_id.to_string(), doctor_id.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    let Some(status) = status else {
        return Err(DatabaseError::NotFound {
            entity_type: "doctor_appointment".to_string(),
            id: appointment_id.to_string(),
        });
    };

    repository::delete_doctor_appointment(&tx, appointment_id)?;
    if status == "scheduled" {
        repository::adjust_doctor_counters(&tx, doctor_id, -1, 0, 0)?;
    }
    tx.commit()?;

    tracing::info!(appointment_id = %appointment_id, "doctor appointment cancelled");
    Ok(())
}

/// Patient information sheet behind one of the doctor's own appointments.
pub fn patient_for_appointment(
    conn: &Connection,
    doctor_id: &Uuid,
    appointment_id: &Uuid,
) -> Result<PatientSheet, DatabaseError> {
    let patient_id: Option<String> = conn
        .query_row(
            "SELECT patient_id FROM doctor_appointments WHERE id = ?1 AND doctor_id = ?2",
            params![appointment_id.to_string(), doctor_id.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    let Some(patient_id) = patient_id else {
        return Err(DatabaseError::NotFound {
            entity_type: "doctor_appointment".to_string(),
            id: appointment_id.to_string(),
        });
    };
    registry::patient_sheet(conn, &parse_uuid(&patient_id)?)
}

// ═══════════════════════════════════════════
// Test appointments
// ═══════════════════════════════════════════

/// Create a test appointment. The referenced patient, technician and
/// catalog test must all exist.
pub fn schedule_test(
    conn: &Connection,
    new: &NewTestAppointment,
) -> Result<TestAppointment, DatabaseError> {
    if new.appointment_date_time <= Utc::now() {
        return Err(DatabaseError::ConstraintViolation(
            "appointment time must be in the future".to_string(),
        ));
    }
    if repository::get_patient(conn, &new.patient_id)?.is_none() {
        return Err(DatabaseError::NotFound {
            entity_type: "patient".to_string(),
            id: new.patient_id.to_string(),
        });
    }
    if repository::get_lab_technician(conn, &new.lab_technician_id)?.is_none() {
        return Err(DatabaseError::NotFound {
            entity_type: "lab_technician".to_string(),
            id: new.lab_technician_id.to_string(),
        });
    }
    if repository::get_medical_test(conn, &new.medical_test_id)?.is_none() {
        return Err(DatabaseError::NotFound {
            entity_type: "medical_test".to_string(),
            id: new.medical_test_id.to_string(),
        });
    }

    let appointment = TestAppointment {
        id: Uuid::new_v4(),
        patient_id: new.patient_id,
        lab_technician_id: new.lab_technician_id,
        medical_test_id: new.medical_test_id,
        appointment_date_time: new.appointment_date_time,
        status: AppointmentStatus::Scheduled,
        created_at: Utc::now(),
    };
    repository::insert_test_appointment(conn, &appointment)?;
    Ok(appointment)
}

/// The technician's schedule, soonest first.
pub fn technician_schedule(
    conn: &Connection,
    lab_technician_id: &Uuid,
) -> Result<Vec<TestAppointmentCard>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT a.id, p.id, u.name, t.name, a.appointment_date_time, a.status
         FROM test_appointments a
         JOIN patients p ON a.patient_id = p.id
         JOIN users u ON p.user_id = u.id
         JOIN medical_tests t ON a.medical_test_id = t.id
         WHERE a.lab_technician_id = ?1
         ORDER BY a.appointment_date_time ASC",
    )?;
    let rows = stmt.query_map([lab_technician_id.to_string()], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, DateTime<Utc>>(4)?,
            row.get::<_, String>(5)?,
        ))
    })?;

    let mut cards = Vec::new();
    for row in rows {
        let (id, patient_id, patient_name, test_name, when, status) = row?;
        cards.push(TestAppointmentCard {
            id: parse_uuid(&id)?,
            patient_id: parse_uuid(&patient_id)?,
            patient_name,
            test_name,
            appointment_date_time: when,
            status,
        });
    }
    Ok(cards)
}

/// Move one of the technician's own slots to a new future time.
pub fn reschedule_test(
    conn: &Connection,
    lab_technician_id: &Uuid,
    appointment_id: &Uuid,
    new_time: &DateTime<Utc>,
) -> Result<(), DatabaseError> {
    if *new_time <= Utc::now() {
        return Err(DatabaseError::ConstraintViolation(
            "appointment time must be in the future".to_string(),
        ));
    }
    let changed = conn.execute(
        "UPDATE test_appointments SET appointment_date_time = ?3
         WHERE id = ?1 AND lab_technician_id = ?2",
        params![
            appointment_id.to_string(),
            lab_technician_id.to_string(),
            new_time.to_rfc3339()
        ],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "test_appointment".to_string(),
            id: appointment_id.to_string(),
        });
    }
    Ok(())
}
