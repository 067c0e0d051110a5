//! Prescription workflow — form preparation and the transactional save.
//!
//! Saving a prescription is the pivot of the clinical flow: the
//! prescription row, its medicine and test line items, the appointment
//! status flip and the doctor counter updates all commit or roll back as
//! one unit.

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::repository::{self, parse_uuid};
use crate::db::DatabaseError;
use crate::models::enums::{AppointmentStatus, DosageFrequency};
use crate::models::{
    MedicalTest, Medicine, PrescribedMedicine, PrescribedTest, Prescription, CLINICAL_TEXT_MAX,
};
use crate::registry::{self, DoctorListing, PatientSheet};

// ═══════════════════════════════════════════
// Payloads and view types
// ═══════════════════════════════════════════

/// One medicine line item in a prescription draft.
#[derive(Debug, Clone, Deserialize)]
pub struct MedicineLine {
    pub medicine_id: Uuid,
    #[serde(default)]
    pub duration: i64,
    pub instructions: String,
    pub dosage_frequency: DosageFrequency,
}

/// Draft submitted by the prescribing doctor.
#[derive(Debug, Clone, Deserialize)]
pub struct PrescriptionDraft {
    pub complains: String,
    pub vitals: String,
    pub diagnosis: String,
    #[serde(default)]
    pub referrals: String,
    #[serde(default)]
    pub next_checkup: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tests: Vec<Uuid>,
    #[serde(default)]
    pub medicines: Vec<MedicineLine>,
}

/// The appointment being prescribed against, trimmed to what the form shows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentSummary {
    pub id: Uuid,
    pub appointment_date_time: DateTime<Utc>,
    pub status: String,
    pub reason: String,
    pub is_emergency: bool,
}

/// Everything the prescription form needs in one response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrescriptionFormInfo {
    pub appointment: AppointmentSummary,
    pub patient: PatientSheet,
    pub doctor: DoctorListing,
    pub has_previous_visit: bool,
    pub frequencies: Vec<DosageFrequency>,
    pub medicines: Vec<Medicine>,
    pub tests: Vec<MedicalTest>,
}

// ═══════════════════════════════════════════
// Operations
// ═══════════════════════════════════════════

/// Assemble the form data for one of the doctor's own appointments:
/// patient sheet with detailed age, the doctor's profile, the medicine
/// and available-test catalogs, and the dosage frequency choices.
pub fn prescription_form_info(
    conn: &Connection,
    doctor_id: &Uuid,
    appointment_id: &Uuid,
) -> Result<PrescriptionFormInfo, DatabaseError> {
    let appointment = owned_appointment(conn, doctor_id, appointment_id)?;

    let patient = registry::patient_sheet(conn, &appointment.patient_id)?;
    let doctor = registry::doctor_listing(conn, doctor_id)?;
    let has_previous_visit =
        repository::patient_has_seen_doctor(conn, &appointment.patient_id, doctor_id)?;

    Ok(PrescriptionFormInfo {
        appointment: AppointmentSummary {
            id: appointment.id,
            appointment_date_time: appointment.appointment_date_time,
            status: appointment.status,
            reason: appointment.reason,
            is_emergency: appointment.is_emergency,
        },
        patient,
        doctor,
        has_previous_visit,
        frequencies: DosageFrequency::all().to_vec(),
        medicines: repository::list_medicines(conn)?,
        tests: repository::list_available_tests(conn)?,
    })
}

/// Save a prescription against one of the doctor's own scheduled
/// appointments. The prescription, its line items, the status flip to
/// `Completed` and the counter updates ride one transaction; any failure
/// leaves nothing behind.
pub fn save_prescription(
    conn: &Connection,
    doctor_id: &Uuid,
    appointment_id: &Uuid,
    draft: &PrescriptionDraft,
) -> Result<Prescription, DatabaseError> {
    validate_clinical_text("complains", &draft.complains)?;
    validate_clinical_text("vitals", &draft.vitals)?;
    validate_clinical_text("diagnosis", &draft.diagnosis)?;
    validate_clinical_text("referrals", &draft.referrals)?;

    let tx = conn.unchecked_transaction()?;

    let appointment = owned_appointment(&tx, doctor_id, appointment_id)?;
    if appointment.status != AppointmentStatus::Scheduled.as_str() {
        return Err(DatabaseError::ConstraintViolation(
            "appointment already has a prescription".to_string(),
        ));
    }

    let date_issued = Utc::now();
    let referrals = draft.referrals.trim().to_string();
    let prescription = Prescription {
        id: Uuid::new_v4(),
        doctor_appointment_id: *appointment_id,
        complains: draft.complains.trim().to_string(),
        vitals: draft.vitals.trim().to_string(),
        diagnosis: draft.diagnosis.trim().to_string(),
        is_referred: !referrals.is_empty(),
        referrals,
        date_issued,
        next_checkup: Some(
            draft
                .next_checkup
                .unwrap_or_else(|| date_issued + Duration::days(7)),
        ),
    };
    repository::insert_prescription(&tx, &prescription)?;

    for test_id in &draft.tests {
        if repository::get_medical_test(&tx, test_id)?.is_none() {
            return Err(DatabaseError::NotFound {
                entity_type: "medical_test".to_string(),
                id: test_id.to_string(),
            });
        }
        let line = PrescribedTest {
            id: Uuid::new_v4(),
            prescription_id: prescription.id,
            test_id: *test_id,
        };
        repository::insert_prescribed_test(&tx, &line)?;
    }

    for item in &draft.medicines {
        if repository::get_medicine(&tx, &item.medicine_id)?.is_none() {
            return Err(DatabaseError::NotFound {
                entity_type: "medicine".to_string(),
                id: item.medicine_id.to_string(),
            });
        }
        let line = PrescribedMedicine {
            id: Uuid::new_v4(),
            prescription_id: prescription.id,
            medicine_id: item.medicine_id,
            duration: item.duration,
            instructions: item.instructions.trim().to_string(),
            dosage_frequency: item.dosage_frequency,
        };
        repository::insert_prescribed_medicine(&tx, &line)?;
    }

    repository::set_doctor_appointment_status(&tx, appointment_id, AppointmentStatus::Completed)?;
    repository::adjust_doctor_counters(&tx, doctor_id, -1, 0, 1)?;
    tx.commit()?;

    tracing::info!(
        prescription_id = %prescription.id,
        appointment_id = %appointment_id,
        tests = draft.tests.len(),
        medicines = draft.medicines.len(),
        "prescription saved"
    );
    Ok(prescription)
}

fn validate_clinical_text(field: &str, text: &str) -> Result<(), DatabaseError> {
    if text.chars().count() > CLINICAL_TEXT_MAX {
        return Err(DatabaseError::ConstraintViolation(format!(
            "{field} exceeds {CLINICAL_TEXT_MAX} characters"
        )));
    }
    Ok(())
}

struct OwnedAppointment {
    id: Uuid,
    patient_id: Uuid,
    appointment_date_time: DateTime<Utc>,
    status: String,
    reason: String,
    is_emergency: bool,
}

fn owned_appointment(
    conn: &Connection,
    doctor_id: &Uuid,
    appointment_id: &Uuid,
) -> Result<OwnedAppointment, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT id, patient_id, appointment_date_time, status, reason, is_emergency
             FROM doctor_appointments
             WHERE id = ?1 AND doctor_id = ?2",
            params![appointment_id.to_string(), doctor_id.to_string()],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, DateTime<Utc>>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, bool>(5)?,
                ))
            },
        )
        .optional()?;
    let Some((id, patient_id, when, status, reason, is_emergency)) = row else {
        return Err(DatabaseError::NotFound {
            entity_type: "doctor_appointment".to_string(),
            id: appointment_id.to_string(),
        });
    };
    Ok(OwnedAppointment {
        id: parse_uuid(&id)?,
        patient_id: parse_uuid(&patient_id)?,
        appointment_date_time: when,
        status,
        reason,
        is_emergency,
    })
}
