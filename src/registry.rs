//! User registry — account creation, role profiles and directory views.
//!
//! Registration inserts the account row and its role profile row in one
//! transaction. Read-side views (doctor directory, patient sheet) join the
//! profile tables back onto `users`.

use std::sync::LazyLock;

use chrono::{Datelike, Months, NaiveDate, Utc};
use regex::Regex;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::repository::{self, parse_uuid};
use crate::db::DatabaseError;
use crate::models::enums::UserRole;
use crate::models::{Doctor, LabTechnician, NewUser, Patient, Storekeeper, User};

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid regex"));

/// Bangladeshi mobile format: +880 followed by exactly ten digits.
static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+880\d{10}$").expect("valid regex"));

// ═══════════════════════════════════════════
// View types — serialised to frontend
// ═══════════════════════════════════════════

/// A doctor directory entry shown to patients when booking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorListing {
    pub doctor_id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub specialty: String,
    pub qualifications: String,
    pub experience_years: i64,
    pub no_of_patients: i64,
}

/// Patient demographics shown to clinical staff, with the age broken
/// down to the day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientSheet {
    pub patient_id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub blood_group: String,
    pub gender: String,
    pub date_of_birth: NaiveDate,
    pub age: String,
}

// ═══════════════════════════════════════════
// Registration
// ═══════════════════════════════════════════

/// Create an account plus its role profile row. The whole registration
/// commits or rolls back as one unit.
pub fn create_user(conn: &Connection, new: &NewUser) -> Result<User, DatabaseError> {
    validate_registration(new)?;

    let email = new.email.trim().to_string();
    if repository::get_user_by_email(conn, &email)?.is_some() {
        return Err(DatabaseError::ConstraintViolation(format!(
            "email already registered: {email}"
        )));
    }

    let now = Utc::now();
    let user = User {
        id: Uuid::new_v4(),
        email,
        name: new.name.trim().to_string(),
        role: new.role,
        blood_group: new.blood_group,
        date_of_birth: new.date_of_birth,
        gender: new.gender,
        phone: new.phone.clone(),
        is_approved: true,
        is_admin: new.is_admin,
        created_at: now,
        updated_at: now,
    };

    let tx = conn.unchecked_transaction()?;
    repository::insert_user(&tx, &user)?;
    match new.role {
        UserRole::Doctor => {
            let doctor = Doctor {
                id: Uuid::new_v4(),
                user_id: user.id,
                no_of_appointments: 0,
                no_of_patients: 0,
                no_of_prescriptions: 0,
                qualifications: new.qualifications.clone().unwrap_or_default(),
                specialty: new.specialty.clone().unwrap_or_default(),
                experience_years: new.experience_years.unwrap_or(0),
            };
            repository::insert_doctor(&tx, &doctor)?;
        }
        UserRole::Patient => {
            let patient = Patient { id: Uuid::new_v4(), user_id: user.id };
            repository::insert_patient(&tx, &patient)?;
        }
        UserRole::Storekeeper => {
            let keeper = Storekeeper { id: Uuid::new_v4(), user_id: user.id };
            repository::insert_storekeeper(&tx, &keeper)?;
        }
        UserRole::LabTechnician => {
            let tech = LabTechnician { id: Uuid::new_v4(), user_id: user.id };
            repository::insert_lab_technician(&tx, &tech)?;
        }
    }
    tx.commit()?;

    Ok(user)
}

fn validate_registration(new: &NewUser) -> Result<(), DatabaseError> {
    let email = new.email.trim();
    if !EMAIL_RE.is_match(email) {
        return Err(DatabaseError::ConstraintViolation(format!(
            "invalid email address: {email}"
        )));
    }
    if new.name.trim().is_empty() {
        return Err(DatabaseError::ConstraintViolation(
            "name must not be empty".to_string(),
        ));
    }
    if !PHONE_RE.is_match(&new.phone) {
        return Err(DatabaseError::ConstraintViolation(format!(
            "invalid phone number: {}",
            new.phone
        )));
    }
    if new.date_of_birth > Utc::now().date_naive() {
        return Err(DatabaseError::ConstraintViolation(
            "date of birth is in the future".to_string(),
        ));
    }
    Ok(())
}

/// Look up an account by id, turning absence into `NotFound`.
pub fn user_account(conn: &Connection, id: &Uuid) -> Result<User, DatabaseError> {
    repository::get_user(conn, id)?.ok_or_else(|| DatabaseError::NotFound {
        entity_type: "user".to_string(),
        id: id.to_string(),
    })
}

// ═══════════════════════════════════════════
// Directory views
// ═══════════════════════════════════════════

/// All approved doctors, ordered by name.
pub fn list_doctors(conn: &Connection) -> Result<Vec<DoctorListing>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT d.id, u.id, u.name, u.email, d.specialty, d.qualifications,
                d.experience_years, d.no_of_patients
         FROM doctors d
         JOIN users u ON d.user_id = u.id
         WHERE u.is_approved = 1
         ORDER BY u.name",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, String>(4)?,
            row.get::<_, String>(5)?,
            row.get::<_, i64>(6)?,
            row.get::<_, i64>(7)?,
        ))
    })?;

    let mut listings = Vec::new();
    for row in rows {
        let (doctor_id, user_id, name, email, specialty, qualifications, experience, patients) =
            row?;
        listings.push(DoctorListing {
            doctor_id: parse_uuid(&doctor_id)?,
            user_id: parse_uuid(&user_id)?,
            name,
            email,
            specialty,
            qualifications,
            experience_years: experience,
            no_of_patients: patients,
        });
    }
    Ok(listings)
}

/// One directory entry, as [`list_doctors`] but for a single doctor.
pub fn doctor_listing(conn: &Connection, doctor_id: &Uuid) -> Result<DoctorListing, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT d.id, u.id, u.name, u.email, d.specialty, d.qualifications,
                d.experience_years, d.no_of_patients
         FROM doctors d
         JOIN users u ON d.user_id = u.id
         WHERE d.id = ?1",
    )?;
    stmt.query_row([doctor_id.to_string()], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, String>(4)?,
            row.get::<_, String>(5)?,
            row.get::<_, i64>(6)?,
            row.get::<_, i64>(7)?,
        ))
    })
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => DatabaseError::NotFound {
            entity_type: "doctor".to_string(),
            id: doctor_id.to_string(),
        },
        other => DatabaseError::from(other),
    })
    .and_then(|(doctor_id, user_id, name, email, specialty, qualifications, experience, patients)| {
        Ok(DoctorListing {
            doctor_id: parse_uuid(&doctor_id)?,
            user_id: parse_uuid(&user_id)?,
            name,
            email,
            specialty,
            qualifications,
            experience_years: experience,
            no_of_patients: patients,
        })
    })
}

/// Demographics sheet for one patient, age computed as of today.
pub fn patient_sheet(conn: &Connection, patient_id: &Uuid) -> Result<PatientSheet, DatabaseError> {
    patient_sheet_as_of(conn, patient_id, Utc::now().date_naive())
}

fn patient_sheet_as_of(
    conn: &Connection,
    patient_id: &Uuid,
    today: NaiveDate,
) -> Result<PatientSheet, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT p.id, u.id, u.name, u.email, u.phone, u.blood_group, u.gender,
                u.date_of_birth
         FROM patients p
         JOIN users u ON p.user_id = u.id
         WHERE p.id = ?1",
    )?;
    let row = stmt
        .query_row([patient_id.to_string()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
                row.get::<_, NaiveDate>(7)?,
            ))
        })
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => DatabaseError::NotFound {
                entity_type: "patient".to_string(),
                id: patient_id.to_string(),
            },
            other => DatabaseError::from(other),
        })?;

    let (pid, uid, name, email, phone, blood_group, gender, date_of_birth) = row;
    Ok(PatientSheet {
        patient_id: parse_uuid(&pid)?,
        user_id: parse_uuid(&uid)?,
        name,
        email,
        phone,
        blood_group,
        gender,
        date_of_birth,
        age: calculate_detailed_age(date_of_birth, today),
    })
}

// ═══════════════════════════════════════════
// Age arithmetic
// ═══════════════════════════════════════════

/// Break the span between `born` and `on` into calendar years, months and
/// days. Month lengths are respected by anchoring on whole-month addition;
/// a birth date after `on` collapses to all zeros.
pub fn calculate_detailed_age(born: NaiveDate, on: NaiveDate) -> String {
    if born > on {
        return "0 years, 0 months, 0 days".to_string();
    }

    let mut months = (on.year() - born.year()) * 12 + on.month() as i32 - born.month() as i32;
    let mut anchor = add_months(born, months);
    if anchor > on {
        months -= 1;
        anchor = add_months(born, months);
    }
    let days = (on - anchor).num_days();

    format!("{} years, {} months, {} days", months / 12, months % 12, days)
}

fn add_months(date: NaiveDate, months: i32) -> NaiveDate {
    if months <= 0 {
        return date;
    }
    date.checked_add_months(Months::new(months as u32)).unwrap_or(date)
}
