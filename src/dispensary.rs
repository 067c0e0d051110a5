//! Dispensary — medicine catalog, prescription review and stock-aware
//! dispensation with a PDF receipt.
//!
//! Dispensation is all-or-nothing per line: a line whose stock covers the
//! required quantity is decremented and put on the receipt, an insufficient
//! line is left completely untouched. When no line can be covered the whole
//! operation fails and no stock moves.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config;
use crate::db::repository::{self, parse_uuid};
use crate::db::DatabaseError;
use crate::models::{Medicine, NewMedicine};
use crate::pdf::PageWriter;

// ═══════════════════════════════════════════
// View types — serialised to frontend
// ═══════════════════════════════════════════

/// One prescription row on the storekeeper's review list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrescriptionCard {
    pub id: Uuid,
    pub patient_name: String,
    pub doctor_name: String,
    pub date_issued: DateTime<Utc>,
    pub diagnosis: String,
    pub is_referred: bool,
}

/// One prescribed medicine with the stock math already done. The
/// required quantity is the prescribed duration in days.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispenseLine {
    pub medicine_id: Uuid,
    pub medicine_name: String,
    pub strength: String,
    pub required_quantity: i64,
    pub in_stock: i64,
    pub is_stock_sufficient: bool,
    pub frequency: String,
    pub instructions: String,
}

/// Full dispensation view of one prescription.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrescriptionDetails {
    pub id: Uuid,
    pub patient_name: String,
    pub doctor_name: String,
    pub date_issued: DateTime<Utc>,
    pub lines: Vec<DispenseLine>,
}

/// A generated receipt ready for download.
#[derive(Debug, Clone)]
pub struct DispenseReceipt {
    pub filename: String,
    pub bytes: Vec<u8>,
    pub dispensed: usize,
}

// ═══════════════════════════════════════════
// Catalog
// ═══════════════════════════════════════════

/// Insert a medicine into the catalog.
pub fn add_medicine(conn: &Connection, new: &NewMedicine) -> Result<Medicine, DatabaseError> {
    if new.name.trim().is_empty() {
        return Err(DatabaseError::ConstraintViolation(
            "medicine name must not be empty".to_string(),
        ));
    }
    if new.price < 0.0 {
        return Err(DatabaseError::ConstraintViolation(
            "price must not be negative".to_string(),
        ));
    }
    if new.stock_quantity < 0 {
        return Err(DatabaseError::ConstraintViolation(
            "stock quantity must not be negative".to_string(),
        ));
    }

    let medicine = Medicine {
        id: Uuid::new_v4(),
        name: new.name.trim().to_string(),
        generic_name: new.generic_name.clone(),
        manufacturer: new.manufacturer.clone(),
        dosage_form: new.dosage_form.clone(),
        strength: new.strength.clone(),
        description: new.description.clone(),
        price: new.price,
        stock_quantity: new.stock_quantity,
        expiry_date: new.expiry_date,
    };
    repository::insert_medicine(conn, &medicine)?;
    Ok(medicine)
}

/// The whole catalog, ordered by name.
pub fn medicines(conn: &Connection) -> Result<Vec<Medicine>, DatabaseError> {
    repository::list_medicines(conn)
}

// ═══════════════════════════════════════════
// Prescription review
// ═══════════════════════════════════════════

/// Every prescription with patient and doctor names, newest first.
pub fn list_prescriptions(conn: &Connection) -> Result<Vec<PrescriptionCard>, DatabaseError> {
    prescription_cards(conn, None)
}

/// Case-insensitive substring search on the patient name.
pub fn search_prescriptions(
    conn: &Connection,
    query: &str,
) -> Result<Vec<PrescriptionCard>, DatabaseError> {
    prescription_cards(conn, Some(query))
}

fn prescription_cards(
    conn: &Connection,
    query: Option<&str>,
) -> Result<Vec<PrescriptionCard>, DatabaseError> {
    let mut sql = String::from(
        "SELECT rx.id, pu.name, du.name, rx.date_issued, rx.diagnosis, rx.is_referred
         FROM prescriptions rx
         JOIN doctor_appointments a ON rx.doctor_appointment_id = a.id
         JOIN patients p ON a.patient_id = p.id
         JOIN users pu ON p.user_id = pu.id
         JOIN doctors d ON a.doctor_id = d.id
         JOIN users du ON d.user_id = du.id",
    );
    let mut params_vec: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();
    if let Some(q) = query {
        sql.push_str(" WHERE pu.name LIKE ?1 COLLATE NOCASE");
        params_vec.push(Box::new(format!("%{}%", q.trim())));
    }
    sql.push_str(" ORDER BY rx.date_issued DESC");

    let params_refs: Vec<&dyn rusqlite::types::ToSql> =
        params_vec.iter().map(|p| p.as_ref()).collect();

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_refs.as_slice(), |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, DateTime<Utc>>(3)?,
            row.get::<_, String>(4)?,
            row.get::<_, bool>(5)?,
        ))
    })?;

    let mut cards = Vec::new();
    for row in rows {
        let (id, patient_name, doctor_name, date_issued, diagnosis, is_referred) = row?;
        cards.push(PrescriptionCard {
            id: parse_uuid(&id)?,
            patient_name,
            doctor_name,
            date_issued,
            diagnosis,
            is_referred,
        });
    }
    Ok(cards)
}

/// The dispensation view: every prescribed medicine joined with its
/// catalog row and the stock sufficiency verdict. Zero-stock medicines
/// stay in the catalog and simply report as insufficient.
pub fn prescription_details(
    conn: &Connection,
    prescription_id: &Uuid,
) -> Result<PrescriptionDetails, DatabaseError> {
    let header = conn
        .query_row(
            "SELECT rx.id, pu.name, du.name, rx.date_issued
             FROM prescriptions rx
             JOIN doctor_appointments a ON rx.doctor_appointment_id = a.id
             JOIN patients p ON a.patient_id = p.id
             JOIN users pu ON p.user_id = pu.id
             JOIN doctors d ON a.doctor_id = d.id
             JOIN users du ON d.user_id = du.id
             WHERE rx.id = ?1",
            params![prescription_id.to_string()],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, DateTime<Utc>>(3)?,
                ))
            },
        )
        .optional()?;
    let Some((id, patient_name, doctor_name, date_issued)) = header else {
        return Err(DatabaseError::NotFound {
            entity_type: "prescription".to_string(),
            id: prescription_id.to_string(),
        });
    };

    let mut stmt = conn.prepare(
        "SELECT m.id, m.name, m.strength, pm.duration, m.stock_quantity,
                pm.dosage_frequency, pm.instructions
         FROM prescribed_medicines pm
         JOIN medicines m ON pm.medicine_id = m.id
         WHERE pm.prescription_id = ?1
         ORDER BY m.name",
    )?;
    let rows = stmt.query_map([prescription_id.to_string()], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, i64>(3)?,
            row.get::<_, i64>(4)?,
            row.get::<_, String>(5)?,
            row.get::<_, String>(6)?,
        ))
    })?;

    let mut lines = Vec::new();
    for row in rows {
        let (medicine_id, name, strength, duration, stock, frequency, instructions) = row?;
        lines.push(DispenseLine {
            medicine_id: parse_uuid(&medicine_id)?,
            medicine_name: name,
            strength,
            required_quantity: duration,
            in_stock: stock,
            is_stock_sufficient: stock >= duration,
            frequency,
            instructions,
        });
    }

    Ok(PrescriptionDetails {
        id: parse_uuid(&id)?,
        patient_name,
        doctor_name,
        date_issued,
        lines,
    })
}

// ═══════════════════════════════════════════
// Dispensation
// ═══════════════════════════════════════════

/// Dispense every coverable line of a prescription in one transaction and
/// return the receipt PDF. Fails with "Not enough stock." when no line
/// can be covered; insufficient lines never move stock and never appear
/// on the receipt.
pub fn dispense(
    conn: &Connection,
    prescription_id: &Uuid,
) -> Result<DispenseReceipt, DatabaseError> {
    let tx = conn.unchecked_transaction()?;

    let details = prescription_details(&tx, prescription_id)?;
    let covered: Vec<&DispenseLine> = details
        .lines
        .iter()
        .filter(|line| line.is_stock_sufficient)
        .collect();
    if covered.is_empty() {
        return Err(DatabaseError::ConstraintViolation(
            "Not enough stock.".to_string(),
        ));
    }

    for line in &covered {
        repository::decrement_medicine_stock(&tx, &line.medicine_id, line.required_quantity)?;
    }

    let bytes = render_receipt(&details, &covered)?;
    tx.commit()?;

    tracing::info!(
        prescription_id = %prescription_id,
        dispensed = covered.len(),
        skipped = details.lines.len() - covered.len(),
        "prescription dispensed"
    );
    Ok(DispenseReceipt {
        filename: format!("prescription_{prescription_id}.pdf"),
        bytes,
        dispensed: covered.len(),
    })
}

fn render_receipt(
    details: &PrescriptionDetails,
    covered: &[&DispenseLine],
) -> Result<Vec<u8>, DatabaseError> {
    let mut page = PageWriter::new("Dispense Receipt")?;
    page.heading("Dispense Receipt");
    page.meta(&format!("{} v{}", config::APP_NAME, config::APP_VERSION));
    page.meta(&format!("Prescription: {}", details.id));
    page.meta(&format!("Patient: {}", details.patient_name));
    page.meta(&format!("Prescribed by: {}", details.doctor_name));
    page.meta(&format!(
        "Dispensed: {}",
        Utc::now().format("%Y-%m-%d %H:%M UTC")
    ));
    page.gap(4.0);

    page.mono_row(&format!(
        "{:<24} {:>17} {:>9} {:<16} {}",
        "Medicine Name", "Required Quantity", "In Stock", "Frequency", "Instructions"
    ));
    page.mono_row(&"-".repeat(94));
    for line in covered {
        page.mono_row(&format!(
            "{:<24} {:>17} {:>9} {:<16} {}",
            clip(&line.medicine_name, 24),
            line.required_quantity,
            line.in_stock,
            clip(&line.frequency, 16),
            clip(&line.instructions, 24),
        ));
    }
    page.gap(6.0);
    page.line(&format!("{} item(s) dispensed.", covered.len()));

    page.finish()
}

fn clip(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};
    use crate::db::sqlite::open_memory_database;
    use crate::models::enums::{BloodGroup, DosageFrequency, Gender, UserRole};
    use crate::models::NewUser;
    use crate::prescribing::{self, MedicineLine, PrescriptionDraft};
    use crate::registry;
    use crate::scheduling::{self, NewDoctorAppointment};

    fn seed_user(conn: &Connection, email: &str, name: &str, role: UserRole) -> Uuid {
        let new = NewUser {
            email: email.to_string(),
            name: name.to_string(),
            role,
            blood_group: BloodGroup::ONegative,
            date_of_birth: NaiveDate::from_ymd_opt(1988, 7, 9).unwrap(),
            gender: Gender::Female,
            phone: "+8801812345678".to_string(),
            is_admin: false,
            qualifications: None,
            specialty: None,
            experience_years: None,
        };
        registry::create_user(conn, &new).unwrap().id
    }

    fn seed_medicine(conn: &Connection, name: &str, stock: i64) -> Uuid {
        add_medicine(
            conn,
            &NewMedicine {
                name: name.to_string(),
                generic_name: Some(format!("{name} generic")),
                manufacturer: "Beximco".to_string(),
                dosage_form: "tablet".to_string(),
                strength: "250mg".to_string(),
                description: None,
                price: 2.0,
                stock_quantity: stock,
                expiry_date: NaiveDate::from_ymd_opt(2031, 6, 1).unwrap(),
            },
        )
        .unwrap()
        .id
    }

    // Books an appointment and saves a prescription with the given
    // medicine lines; returns the prescription id.
    fn seed_prescription(
        conn: &Connection,
        tag: &str,
        patient_name: &str,
        lines: Vec<MedicineLine>,
    ) -> Uuid {
        let patient_user = seed_user(
            conn,
            &format!("p-{tag}@example.com"),
            patient_name,
            UserRole::Patient,
        );
        let doctor_user = seed_user(
            conn,
            &format!("d-{tag}@example.com"),
            &format!("Dr {tag}"),
            UserRole::Doctor,
        );
        let patient = crate::db::repository::get_patient_by_user(conn, &patient_user)
            .unwrap()
            .unwrap()
            .id;
        let doctor = crate::db::repository::get_doctor_by_user(conn, &doctor_user)
            .unwrap()
            .unwrap()
            .id;
        let appointment = scheduling::book_appointment(
            conn,
            &patient,
            &NewDoctorAppointment {
                doctor_id: doctor,
                appointment_date_time: Utc::now() + Duration::hours(12),
                reason: "checkup".to_string(),
                is_emergency: false,
            },
        )
        .unwrap();
        prescribing::save_prescription(
            conn,
            &doctor,
            &appointment.id,
            &PrescriptionDraft {
                complains: "fatigue".to_string(),
                vitals: "BP 110/70".to_string(),
                diagnosis: "anemia".to_string(),
                referrals: String::new(),
                next_checkup: None,
                tests: Vec::new(),
                medicines: lines,
            },
        )
        .unwrap()
        .id
    }

    fn line(medicine_id: Uuid, duration: i64) -> MedicineLine {
        MedicineLine {
            medicine_id,
            duration,
            instructions: "after meals".to_string(),
            dosage_frequency: DosageFrequency::TwiceDaily,
        }
    }

    #[test]
    fn add_medicine_rejects_bad_values() {
        let conn = open_memory_database().unwrap();
        let mut new = NewMedicine {
            name: "  ".to_string(),
            generic_name: None,
            manufacturer: "Acme".to_string(),
            dosage_form: "syrup".to_string(),
            strength: "100ml".to_string(),
            description: None,
            price: 12.0,
            stock_quantity: 5,
            expiry_date: NaiveDate::from_ymd_opt(2030, 1, 1).unwrap(),
        };
        assert!(matches!(
            add_medicine(&conn, &new),
            Err(DatabaseError::ConstraintViolation(_))
        ));

        new.name = "Syrup".to_string();
        new.price = -1.0;
        assert!(matches!(
            add_medicine(&conn, &new),
            Err(DatabaseError::ConstraintViolation(_))
        ));
    }

    #[test]
    fn prescription_list_carries_both_names() {
        let conn = open_memory_database().unwrap();
        let medicine = seed_medicine(&conn, "Napa", 30);
        seed_prescription(&conn, "list", "Farhana Akter", vec![line(medicine, 5)]);

        let cards = list_prescriptions(&conn).unwrap();
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].patient_name, "Farhana Akter");
        assert_eq!(cards[0].doctor_name, "Dr list");
        assert_eq!(cards[0].diagnosis, "anemia");
    }

    #[test]
    fn search_is_case_insensitive_substring() {
        let conn = open_memory_database().unwrap();
        let medicine = seed_medicine(&conn, "Seclo", 30);
        seed_prescription(&conn, "s1", "Farhana Akter", vec![line(medicine, 5)]);
        seed_prescription(&conn, "s2", "Rahim Uddin", vec![line(medicine, 5)]);

        let hits = search_prescriptions(&conn, "farha").unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].patient_name, "Farhana Akter");

        let none = search_prescriptions(&conn, "zzz").unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn details_report_stock_sufficiency_per_line() {
        let conn = open_memory_database().unwrap();
        let plenty = seed_medicine(&conn, "Amodis", 100);
        let scarce = seed_medicine(&conn, "Zimax", 3);
        let rx = seed_prescription(
            &conn,
            "details",
            "Nusrat Jahan",
            vec![line(plenty, 10), line(scarce, 10)],
        );

        let details = prescription_details(&conn, &rx).unwrap();
        assert_eq!(details.lines.len(), 2);

        let amodis = details.lines.iter().find(|l| l.medicine_name == "Amodis").unwrap();
        assert!(amodis.is_stock_sufficient);
        assert_eq!(amodis.required_quantity, 10);
        assert_eq!(amodis.in_stock, 100);

        let zimax = details.lines.iter().find(|l| l.medicine_name == "Zimax").unwrap();
        assert!(!zimax.is_stock_sufficient);
    }

    #[test]
    fn details_unknown_prescription_is_not_found() {
        let conn = open_memory_database().unwrap();
        let err = prescription_details(&conn, &Uuid::new_v4());
        assert!(matches!(err, Err(DatabaseError::NotFound { .. })));
    }

    #[test]
    fn dispense_decrements_only_covered_lines() {
        let conn = open_memory_database().unwrap();
        let plenty = seed_medicine(&conn, "Amodis", 100);
        let scarce = seed_medicine(&conn, "Zimax", 3);
        let rx = seed_prescription(
            &conn,
            "mix",
            "Tanvir Islam",
            vec![line(plenty, 10), line(scarce, 10)],
        );

        let receipt = dispense(&conn, &rx).unwrap();
        assert_eq!(receipt.dispensed, 1);
        assert_eq!(receipt.filename, format!("prescription_{rx}.pdf"));
        assert!(receipt.bytes.starts_with(b"%PDF"));

        let plenty_row = repository::get_medicine(&conn, &plenty).unwrap().unwrap();
        assert_eq!(plenty_row.stock_quantity, 90);
        let scarce_row = repository::get_medicine(&conn, &scarce).unwrap().unwrap();
        assert_eq!(scarce_row.stock_quantity, 3);
    }

    #[test]
    fn dispense_with_no_coverable_line_moves_nothing() {
        let conn = open_memory_database().unwrap();
        let scarce = seed_medicine(&conn, "Zimax", 3);
        let rx = seed_prescription(&conn, "dry", "Sadia Islam", vec![line(scarce, 10)]);

        let err = dispense(&conn, &rx);
        match err {
            Err(DatabaseError::ConstraintViolation(msg)) => {
                assert_eq!(msg, "Not enough stock.")
            }
            other => panic!("expected stock failure, got {other:?}"),
        }

        let row = repository::get_medicine(&conn, &scarce).unwrap().unwrap();
        assert_eq!(row.stock_quantity, 3);
    }

    #[test]
    fn dispense_can_drain_stock_to_zero() {
        let conn = open_memory_database().unwrap();
        let exact = seed_medicine(&conn, "Maxpro", 7);
        let rx = seed_prescription(&conn, "zero", "Hasan Mahmud", vec![line(exact, 7)]);

        dispense(&conn, &rx).unwrap();

        let row = repository::get_medicine(&conn, &exact).unwrap().unwrap();
        assert_eq!(row.stock_quantity, 0);
        // The catalog row survives at zero stock.
        assert_eq!(row.name, "Maxpro");
    }

    #[test]
    fn dispense_unknown_prescription_is_not_found() {
        let conn = open_memory_database().unwrap();
        let err = dispense(&conn, &Uuid::new_v4());
        assert!(matches!(err, Err(DatabaseError::NotFound { .. })));
    }
}
