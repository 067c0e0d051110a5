use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::DosageFrequency;

/// Longest accepted complaint/vitals/diagnosis text.
pub const CLINICAL_TEXT_MAX: usize = 600;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prescription {
    pub id: Uuid,
    pub doctor_appointment_id: Uuid,
    pub complains: String,
    pub vitals: String,
    pub diagnosis: String,
    pub referrals: String,
    pub date_issued: DateTime<Utc>,
    pub next_checkup: Option<DateTime<Utc>>,
    pub is_referred: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrescribedMedicine {
    pub id: Uuid,
    pub prescription_id: Uuid,
    pub medicine_id: Uuid,
    pub duration: i64,
    pub instructions: String,
    pub dosage_frequency: DosageFrequency,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrescribedTest {
    pub id: Uuid,
    pub prescription_id: Uuid,
    pub test_id: Uuid,
}
