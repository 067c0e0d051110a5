use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::enums::*;
use crate::models::*;

pub fn insert_user(conn: &Connection, user: &User) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO users (id, email, name, role, blood_group, date_of_birth, gender,
         phone, is_approved, is_admin, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            user.id.to_string(),
            user.email,
            user.name,
            user.role.as_str(),
            user.blood_group.as_str(),
            user.date_of_birth.to_string(),
            user.gender.as_str(),
            user.phone,
            user.is_approved as i32,
            user.is_admin as i32,
            user.created_at.to_rfc3339(),
            user.updated_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

pub fn get_user(conn: &Connection, id: &Uuid) -> Result<Option<User>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, email, name, role, blood_group, date_of_birth, gender, phone,
         is_approved, is_admin, created_at, updated_at
         FROM users WHERE id = ?1",
    )?;

    let mut rows = stmt.query_map(params![id.to_string()], |row| Ok(user_row_from_rusqlite(row)))?;

    match rows.next() {
        Some(row) => Ok(Some(user_from_row(row??)?)),
        None => Ok(None),
    }
}

pub fn get_user_by_email(conn: &Connection, email: &str) -> Result<Option<User>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, email, name, role, blood_group, date_of_birth, gender, phone,
         is_approved, is_admin, created_at, updated_at
         FROM users WHERE email = ?1",
    )?;

    let mut rows = stmt.query_map(params![email], |row| Ok(user_row_from_rusqlite(row)))?;

    match rows.next() {
        Some(row) => Ok(Some(user_from_row(row??)?)),
        None => Ok(None),
    }
}

pub fn list_users_by_role(conn: &Connection, role: UserRole) -> Result<Vec<User>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, email, name, role, blood_group, date_of_birth, gender, phone,
         is_approved, is_admin, created_at, updated_at
         FROM users WHERE role = ?1 ORDER BY name",
    )?;

    let rows = stmt.query_map(params![role.as_str()], |row| Ok(user_row_from_rusqlite(row)))?;

    let mut users = Vec::new();
    for row in rows {
        users.push(user_from_row(row??)?);
    }
    Ok(users)
}

// ─── Role profile rows ──────────────────────────────────────

pub fn insert_doctor(conn: &Connection, doctor: &Doctor) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO doctors (id, user_id, no_of_appointments, no_of_patients,
         no_of_prescriptions, qualifications, specialty, experience_years)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            doctor.id.to_string(),
            doctor.user_id.to_string(),
            doctor.no_of_appointments,
            doctor.no_of_patients,
            doctor.no_of_prescriptions,
            doctor.qualifications,
            doctor.specialty,
            doctor.experience_years,
        ],
    )?;
    Ok(())
}

pub fn get_doctor(conn: &Connection, id: &Uuid) -> Result<Option<Doctor>, DatabaseError> {
    doctor_query(conn, "WHERE id = ?1", &id.to_string())
}

pub fn get_doctor_by_user(conn: &Connection, user_id: &Uuid) -> Result<Option<Doctor>, DatabaseError> {
    doctor_query(conn, "WHERE user_id = ?1", &user_id.to_string())
}

fn doctor_query(conn: &Connection, clause: &str, value: &str) -> Result<Option<Doctor>, DatabaseError> {
    let sql = format!(
        "SELECT id, user_id, no_of_appointments, no_of_patients, no_of_prescriptions,
         qualifications, specialty, experience_years
         FROM doctors {clause}"
    );
    let mut stmt = conn.prepare(&sql)?;

    let mut rows = stmt.query_map(params![value], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, i64>(2)?,
            row.get::<_, i64>(3)?,
            row.get::<_, i64>(4)?,
            row.get::<_, String>(5)?,
            row.get::<_, String>(6)?,
            row.get::<_, i64>(7)?,
        ))
    })?;

    match rows.next() {
        Some(row) => {
            let (id, user_id, appts, patients, prescriptions, quals, specialty, years) = row?;
            Ok(Some(Doctor {
                id: parse_uuid(&id)?,
                user_id: parse_uuid(&user_id)?,
                no_of_appointments: appts,
                no_of_patients: patients,
                no_of_prescriptions: prescriptions,
                qualifications: quals,
                specialty,
                experience_years: years,
            }))
        }
        None => Ok(None),
    }
}

/// Shift the doctor's workload counters. Deltas may be negative; counters
/// floor at zero.
pub fn adjust_doctor_counters(
    conn: &Connection,
    doctor_id: &Uuid,
    appointments_delta: i64,
    patients_delta: i64,
    prescriptions_delta: i64,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE doctors SET
         no_of_appointments = MAX(0, no_of_appointments + ?2),
         no_of_patients = MAX(0, no_of_patients + ?3),
         no_of_prescriptions = MAX(0, no_of_prescriptions + ?4)
         WHERE id = ?1",
        params![
            doctor_id.to_string(),
            appointments_delta,
            patients_delta,
            prescriptions_delta,
        ],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Doctor".into(),
            id: doctor_id.to_string(),
        });
    }
    Ok(())
}

pub fn insert_patient(conn: &Connection, patient: &Patient) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO patients (id, user_id) VALUES (?1, ?2)",
        params![patient.id.to_string(), patient.user_id.to_string()],
    )?;
    Ok(())
}

pub fn get_patient(conn: &Connection, id: &Uuid) -> Result<Option<Patient>, DatabaseError> {
    profile_row(conn, "patients", "id", id)
        .map(|opt| opt.map(|(id, user_id)| Patient { id, user_id }))
}

pub fn get_patient_by_user(conn: &Connection, user_id: &Uuid) -> Result<Option<Patient>, DatabaseError> {
    profile_row(conn, "patients", "user_id", user_id)
        .map(|opt| opt.map(|(id, user_id)| Patient { id, user_id }))
}

pub fn insert_storekeeper(conn: &Connection, keeper: &Storekeeper) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO storekeepers (id, user_id) VALUES (?1, ?2)",
        params![keeper.id.to_string(), keeper.user_id.to_string()],
    )?;
    Ok(())
}

pub fn get_storekeeper_by_user(
    conn: &Connection,
    user_id: &Uuid,
) -> Result<Option<Storekeeper>, DatabaseError> {
    profile_row(conn, "storekeepers", "user_id", user_id)
        .map(|opt| opt.map(|(id, user_id)| Storekeeper { id, user_id }))
}

pub fn insert_lab_technician(conn: &Connection, tech: &LabTechnician) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO lab_technicians (id, user_id) VALUES (?1, ?2)",
        params![tech.id.to_string(), tech.user_id.to_string()],
    )?;
    Ok(())
}

pub fn get_lab_technician(
    conn: &Connection,
    id: &Uuid,
) -> Result<Option<LabTechnician>, DatabaseError> {
    profile_row(conn, "lab_technicians", "id", id)
        .map(|opt| opt.map(|(id, user_id)| LabTechnician { id, user_id }))
}

pub fn get_lab_technician_by_user(
    conn: &Connection,
    user_id: &Uuid,
) -> Result<Option<LabTechnician>, DatabaseError> {
    profile_row(conn, "lab_technicians", "user_id", user_id)
        .map(|opt| opt.map(|(id, user_id)| LabTechnician { id, user_id }))
}

fn profile_row(
    conn: &Connection,
    table: &str,
    column: &str,
    value: &Uuid,
) -> Result<Option<(Uuid, Uuid)>, DatabaseError> {
    let sql = format!("SELECT id, user_id FROM {table} WHERE {column} = ?1");
    let mut stmt = conn.prepare(&sql)?;

    let mut rows = stmt.query_map(params![value.to_string()], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;

    match rows.next() {
        Some(row) => {
            let (id, user_id) = row?;
            Ok(Some((parse_uuid(&id)?, parse_uuid(&user_id)?)))
        }
        None => Ok(None),
    }
}

// ─── Row mapping ────────────────────────────────────────────

struct UserRow {
    id: String,
    email: String,
    name: String,
    role: String,
    blood_group: String,
    date_of_birth: String,
    gender: String,
    phone: String,
    is_approved: i32,
    is_admin: i32,
    created_at: String,
    updated_at: String,
}

fn user_row_from_rusqlite(row: &rusqlite::Row<'_>) -> Result<UserRow, rusqlite::Error> {
    Ok(UserRow {
        id: row.get(0)?,
        email: row.get(1)?,
        name: row.get(2)?,
        role: row.get(3)?,
        blood_group: row.get(4)?,
        date_of_birth: row.get(5)?,
        gender: row.get(6)?,
        phone: row.get(7)?,
        is_approved: row.get(8)?,
        is_admin: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

fn user_from_row(row: UserRow) -> Result<User, DatabaseError> {
    Ok(User {
        id: parse_uuid(&row.id)?,
        email: row.email,
        name: row.name,
        role: UserRole::from_str(&row.role)?,
        blood_group: BloodGroup::from_str(&row.blood_group)?,
        date_of_birth: NaiveDate::parse_from_str(&row.date_of_birth, "%Y-%m-%d")
            .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
        gender: Gender::from_str(&row.gender)?,
        phone: row.phone,
        is_approved: row.is_approved != 0,
        is_admin: row.is_admin != 0,
        created_at: parse_datetime(&row.created_at)?,
        updated_at: parse_datetime(&row.updated_at)?,
    })
}

pub(crate) fn parse_uuid(value: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(value).map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))
}

pub(crate) fn parse_datetime(value: &str) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))
}
