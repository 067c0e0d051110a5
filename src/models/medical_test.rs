use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedicalTest {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub department: String,
    pub is_available: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestReport {
    pub id: Uuid,
    pub prescribed_test_id: Uuid,
    pub result: String,
    pub attached_file: Option<String>,
    pub notes: String,
    pub report_date: DateTime<Utc>,
}
