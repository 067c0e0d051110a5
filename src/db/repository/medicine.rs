use chrono::NaiveDate;
use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::repository::user::parse_uuid;
use crate::db::DatabaseError;
use crate::models::*;

pub fn insert_medicine(conn: &Connection, med: &Medicine) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO medicines (id, name, generic_name, manufacturer, dosage_form, strength,
         description, price, stock_quantity, expiry_date)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            med.id.to_string(),
            med.name,
            med.generic_name,
            med.manufacturer,
            med.dosage_form,
            med.strength,
            med.description,
            med.price,
            med.stock_quantity,
            med.expiry_date.to_string(),
        ],
    )?;
    Ok(())
}

pub fn get_medicine(conn: &Connection, id: &Uuid) -> Result<Option<Medicine>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, name, generic_name, manufacturer, dosage_form, strength, description,
         price, stock_quantity, expiry_date
         FROM medicines WHERE id = ?1",
    )?;

    let mut rows = stmt.query_map(params![id.to_string()], |row| Ok(medicine_row(row)))?;

    match rows.next() {
        Some(row) => Ok(Some(medicine_from_row(row??)?)),
        None => Ok(None),
    }
}

pub fn list_medicines(conn: &Connection) -> Result<Vec<Medicine>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, name, generic_name, manufacturer, dosage_form, strength, description,
         price, stock_quantity, expiry_date
         FROM medicines ORDER BY name",
    )?;

    let rows = stmt.query_map([], |row| Ok(medicine_row(row)))?;

    let mut meds = Vec::new();
    for row in rows {
        meds.push(medicine_from_row(row??)?);
    }
    Ok(meds)
}

/// Decrement stock, guarded so two dispensations cannot spend the same units.
/// Fails with `ConstraintViolation` when the remaining stock is short.
pub fn decrement_medicine_stock(
    conn: &Connection,
    id: &Uuid,
    quantity: i64,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE medicines SET stock_quantity = stock_quantity - ?2
         WHERE id = ?1 AND stock_quantity >= ?2",
        params![id.to_string(), quantity],
    )?;
    if changed == 0 {
        return Err(DatabaseError::ConstraintViolation(format!(
            "insufficient stock for medicine {id}"
        )));
    }
    Ok(())
}

// ─── Row mapping ────────────────────────────────────────────

struct MedicineRow {
    id: String,
    name: String,
    generic_name: Option<String>,
    manufacturer: String,
    dosage_form: String,
    strength: String,
    description: Option<String>,
    price: f64,
    stock_quantity: i64,
    expiry_date: String,
}

fn medicine_row(row: &rusqlite::Row<'_>) -> Result<MedicineRow, rusqlite::Error> {
    Ok(MedicineRow {
        id: row.get(0)?,
        name: row.get(1)?,
        generic_name: row.get(2)?,
        manufacturer: row.get(3)?,
        dosage_form: row.get(4)?,
        strength: row.get(5)?,
        description: row.get(6)?,
        price: row.get(7)?,
        stock_quantity: row.get(8)?,
        expiry_date: row.get(9)?,
    })
}

fn medicine_from_row(row: MedicineRow) -> Result<Medicine, DatabaseError> {
    Ok(Medicine {
        id: parse_uuid(&row.id)?,
        name: row.name,
        generic_name: row.generic_name,
        manufacturer: row.manufacturer,
        dosage_form: row.dosage_form,
        strength: row.strength,
        description: row.description,
        price: row.price,
        stock_quantity: row.stock_quantity,
        expiry_date: NaiveDate::parse_from_str(&row.expiry_date, "%Y-%m-%d")
            .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
    })
}
