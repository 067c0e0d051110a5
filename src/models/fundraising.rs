use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundraisingRequest {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub disease_name: String,
    pub amount_needed: f64,
    pub details: String,
    pub is_approved: bool,
    pub serial_number: Option<String>,
    pub created_at: DateTime<Utc>,
}
