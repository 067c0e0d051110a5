use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Medicine {
    pub id: Uuid,
    pub name: String,
    pub generic_name: Option<String>,
    pub manufacturer: String,
    pub dosage_form: String,
    pub strength: String,
    pub description: Option<String>,
    pub price: f64,
    pub stock_quantity: i64,
    pub expiry_date: NaiveDate,
}

/// Catalog insert payload used by the storekeeper.
#[derive(Debug, Clone, Deserialize)]
pub struct NewMedicine {
    pub name: String,
    #[serde(default)]
    pub generic_name: Option<String>,
    pub manufacturer: String,
    pub dosage_form: String,
    pub strength: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: f64,
    pub stock_quantity: i64,
    pub expiry_date: NaiveDate,
}
