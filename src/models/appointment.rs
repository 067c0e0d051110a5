use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::AppointmentStatus;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorAppointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub appointment_date_time: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub reason: String,
    pub is_emergency: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestAppointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub lab_technician_id: Uuid,
    pub medical_test_id: Uuid,
    pub appointment_date_time: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub created_at: DateTime<Utc>,
}
