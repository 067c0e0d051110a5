//! Repository layer — entity-scoped database operations.
//!
//! Free functions over a borrowed `Connection`. Workflow modules
//! compose them inside transactions; nothing here starts one.

mod appointment;
mod audit;
mod fundraising;
mod medical_test;
mod medicine;
mod prescription;
mod user;

// Re-export all public items from sub-modules
pub use appointment::*;
pub use audit::*;
pub use fundraising::*;
pub use medical_test::*;
pub use medicine::*;
pub use prescription::*;
pub use user::*;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate, Utc};
    use rusqlite::Connection;
    use uuid::Uuid;

    use crate::db::sqlite::open_memory_database;
    use crate::db::DatabaseError;
    use crate::models::enums::*;
    use crate::models::*;

    fn test_db() -> Connection {
        open_memory_database().unwrap()
    }

    fn make_user(conn: &Connection, role: UserRole) -> Uuid {
        let id = Uuid::new_v4();
        insert_user(
            conn,
            &User {
                id,
                email: format!("{id}@example.com"),
                name: "Ayesha Rahman".into(),
                role,
                blood_group: BloodGroup::OPositive,
                date_of_birth: NaiveDate::from_ymd_opt(1998, 11, 2).unwrap(),
                gender: Gender::Female,
                phone: "+8801712345678".into(),
                is_approved: true,
                is_admin: false,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
        )
        .unwrap();
        id
    }

    fn make_patient(conn: &Connection) -> Uuid {
        let user_id = make_user(conn, UserRole::Patient);
        let id = Uuid::new_v4();
        insert_patient(conn, &Patient { id, user_id }).unwrap();
        id
    }

    fn make_doctor(conn: &Connection) -> Uuid {
        let user_id = make_user(conn, UserRole::Doctor);
        let id = Uuid::new_v4();
        insert_doctor(
            conn,
            &Doctor {
                id,
                user_id,
                no_of_appointments: 0,
                no_of_patients: 0,
                no_of_prescriptions: 0,
                qualifications: "MBBS, FCPS".into(),
                specialty: "Cardiology".into(),
                experience_years: 8,
            },
        )
        .unwrap();
        id
    }

    fn make_lab_technician(conn: &Connection) -> Uuid {
        let user_id = make_user(conn, UserRole::LabTechnician);
        let id = Uuid::new_v4();
        insert_lab_technician(conn, &LabTechnician { id, user_id }).unwrap();
        id
    }

    fn make_medicine(conn: &Connection, name: &str, stock: i64) -> Uuid {
        let id = Uuid::new_v4();
        insert_medicine(
            conn,
            &Medicine {
                id,
                name: name.into(),
                generic_name: None,
                manufacturer: "Square Pharmaceuticals".into(),
                dosage_form: "tablet".into(),
                strength: "500mg".into(),
                description: None,
                price: 12.5,
                stock_quantity: stock,
                expiry_date: NaiveDate::from_ymd_opt(2027, 6, 30).unwrap(),
            },
        )
        .unwrap();
        id
    }

    fn make_medical_test(conn: &Connection, name: &str, available: bool) -> Uuid {
        let id = Uuid::new_v4();
        insert_medical_test(
            conn,
            &MedicalTest {
                id,
                name: name.into(),
                description: "Routine panel".into(),
                department: "Pathology".into(),
                is_available: available,
            },
        )
        .unwrap();
        id
    }

    fn make_doctor_appointment(conn: &Connection, patient_id: &Uuid, doctor_id: &Uuid) -> Uuid {
        let id = Uuid::new_v4();
        insert_doctor_appointment(
            conn,
            &DoctorAppointment {
                id,
                patient_id: *patient_id,
                doctor_id: *doctor_id,
                appointment_date_time: Utc::now() + Duration::days(3),
                status: AppointmentStatus::Scheduled,
                reason: "Chest pain on exertion".into(),
                is_emergency: false,
                created_at: Utc::now(),
            },
        )
        .unwrap();
        id
    }

    fn make_prescription(conn: &Connection, appointment_id: &Uuid) -> Uuid {
        let id = Uuid::new_v4();
        insert_prescription(
            conn,
            &Prescription {
                id,
                doctor_appointment_id: *appointment_id,
                complains: "Fever for three days".into(),
                vitals: "BP 120/80, temp 101F".into(),
                diagnosis: "Viral fever".into(),
                referrals: String::new(),
                date_issued: Utc::now(),
                next_checkup: Some(Utc::now() + Duration::days(7)),
                is_referred: false,
            },
        )
        .unwrap();
        id
    }

    #[test]
    fn user_insert_and_retrieve() {
        let conn = test_db();
        let id = make_user(&conn, UserRole::Patient);
        let user = get_user(&conn, &id).unwrap().unwrap();
        assert_eq!(user.role, UserRole::Patient);
        assert_eq!(user.blood_group, BloodGroup::OPositive);
        assert_eq!(user.date_of_birth, NaiveDate::from_ymd_opt(1998, 11, 2).unwrap());
        assert!(user.is_approved);
    }

    #[test]
    fn user_lookup_by_email() {
        let conn = test_db();
        let id = make_user(&conn, UserRole::Doctor);
        let found = get_user_by_email(&conn, &format!("{id}@example.com")).unwrap();
        assert_eq!(found.unwrap().id, id);

        let missing = get_user_by_email(&conn, "nobody@example.com").unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn duplicate_email_rejected() {
        let conn = test_db();
        let id = make_user(&conn, UserRole::Patient);
        let result = insert_user(
            &conn,
            &User {
                id: Uuid::new_v4(),
                email: format!("{id}@example.com"),
                name: "Second Account".into(),
                role: UserRole::Patient,
                blood_group: BloodGroup::APositive,
                date_of_birth: NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(),
                gender: Gender::Male,
                phone: "+8801898765432".into(),
                is_approved: true,
                is_admin: false,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
        );
        assert!(result.is_err());
    }

    #[test]
    fn list_users_by_role_filters() {
        let conn = test_db();
        make_user(&conn, UserRole::Doctor);
        make_user(&conn, UserRole::Doctor);
        make_user(&conn, UserRole::Patient);

        assert_eq!(list_users_by_role(&conn, UserRole::Doctor).unwrap().len(), 2);
        assert_eq!(list_users_by_role(&conn, UserRole::Patient).unwrap().len(), 1);
        assert!(list_users_by_role(&conn, UserRole::Storekeeper).unwrap().is_empty());
    }

    #[test]
    fn doctor_profile_round_trip() {
        let conn = test_db();
        let user_id = make_user(&conn, UserRole::Doctor);
        let id = Uuid::new_v4();
        insert_doctor(
            &conn,
            &Doctor {
                id,
                user_id,
                no_of_appointments: 0,
                no_of_patients: 0,
                no_of_prescriptions: 0,
                qualifications: "MBBS".into(),
                specialty: "Neurology".into(),
                experience_years: 12,
            },
        )
        .unwrap();

        let by_id = get_doctor(&conn, &id).unwrap().unwrap();
        assert_eq!(by_id.specialty, "Neurology");

        let by_user = get_doctor_by_user(&conn, &user_id).unwrap().unwrap();
        assert_eq!(by_user.id, id);
    }

    #[test]
    fn doctor_counters_adjust_and_floor_at_zero() {
        let conn = test_db();
        let doctor_id = make_doctor(&conn);

        adjust_doctor_counters(&conn, &doctor_id, 2, 1, 0).unwrap();
        let doc = get_doctor(&conn, &doctor_id).unwrap().unwrap();
        assert_eq!(doc.no_of_appointments, 2);
        assert_eq!(doc.no_of_patients, 1);
        assert_eq!(doc.no_of_prescriptions, 0);

        adjust_doctor_counters(&conn, &doctor_id, -5, 0, 1).unwrap();
        let doc = get_doctor(&conn, &doctor_id).unwrap().unwrap();
        assert_eq!(doc.no_of_appointments, 0);
        assert_eq!(doc.no_of_prescriptions, 1);
    }

    #[test]
    fn adjust_counters_unknown_doctor() {
        let conn = test_db();
        let result = adjust_doctor_counters(&conn, &Uuid::new_v4(), 1, 0, 0);
        assert!(matches!(result, Err(DatabaseError::NotFound { .. })));
    }

    #[test]
    fn patient_profile_lookup_by_user() {
        let conn = test_db();
        let user_id = make_user(&conn, UserRole::Patient);
        let id = Uuid::new_v4();
        insert_patient(&conn, &Patient { id, user_id }).unwrap();

        let patient = get_patient_by_user(&conn, &user_id).unwrap().unwrap();
        assert_eq!(patient.id, id);

        let missing = get_patient_by_user(&conn, &Uuid::new_v4()).unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn doctor_appointment_insert_and_retrieve() {
        let conn = test_db();
        let patient = make_patient(&conn);
        let doctor = make_doctor(&conn);
        let id = make_doctor_appointment(&conn, &patient, &doctor);

        let appt = get_doctor_appointment(&conn, &id).unwrap().unwrap();
        assert_eq!(appt.status, AppointmentStatus::Scheduled);
        assert_eq!(appt.reason, "Chest pain on exertion");
        assert!(!appt.is_emergency);
    }

    #[test]
    fn patient_appointments_newest_first() {
        let conn = test_db();
        let patient = make_patient(&conn);
        let doctor = make_doctor(&conn);

        let early = Uuid::new_v4();
        insert_doctor_appointment(
            &conn,
            &DoctorAppointment {
                id: early,
                patient_id: patient,
                doctor_id: doctor,
                appointment_date_time: Utc::now() + Duration::days(1),
                status: AppointmentStatus::Scheduled,
                reason: "Follow-up".into(),
                is_emergency: false,
                created_at: Utc::now(),
            },
        )
        .unwrap();

        let late = Uuid::new_v4();
        insert_doctor_appointment(
            &conn,
            &DoctorAppointment {
                id: late,
                patient_id: patient,
                doctor_id: doctor,
                appointment_date_time: Utc::now() + Duration::days(5),
                status: AppointmentStatus::Scheduled,
                reason: "Second opinion".into(),
                is_emergency: false,
                created_at: Utc::now(),
            },
        )
        .unwrap();

        let list = list_doctor_appointments_for_patient(&conn, &patient).unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].id, late);
        assert_eq!(list[1].id, early);
    }

    #[test]
    fn doctor_worklist_excludes_completed() {
        let conn = test_db();
        let patient = make_patient(&conn);
        let doctor = make_doctor(&conn);
        let done = make_doctor_appointment(&conn, &patient, &doctor);
        let open = make_doctor_appointment(&conn, &patient, &doctor);

        set_doctor_appointment_status(&conn, &done, AppointmentStatus::Completed).unwrap();

        let scheduled = list_scheduled_appointments_for_doctor(&conn, &doctor).unwrap();
        assert_eq!(scheduled.len(), 1);
        assert_eq!(scheduled[0].id, open);
    }

    #[test]
    fn delete_doctor_appointment_not_found() {
        let conn = test_db();
        let result = delete_doctor_appointment(&conn, &Uuid::new_v4());
        assert!(matches!(result, Err(DatabaseError::NotFound { .. })));
    }

    #[test]
    fn patient_has_seen_doctor_reflects_history() {
        let conn = test_db();
        let patient = make_patient(&conn);
        let doctor = make_doctor(&conn);
        assert!(!patient_has_seen_doctor(&conn, &patient, &doctor).unwrap());

        make_doctor_appointment(&conn, &patient, &doctor);
        assert!(patient_has_seen_doctor(&conn, &patient, &doctor).unwrap());
    }

    #[test]
    fn test_appointment_reschedule_updates_time() {
        let conn = test_db();
        let patient = make_patient(&conn);
        let tech = make_lab_technician(&conn);
        let test = make_medical_test(&conn, "Complete Blood Count", true);

        let id = Uuid::new_v4();
        insert_test_appointment(
            &conn,
            &TestAppointment {
                id,
                patient_id: patient,
                lab_technician_id: tech,
                medical_test_id: test,
                appointment_date_time: Utc::now() + Duration::days(2),
                status: AppointmentStatus::Scheduled,
                created_at: Utc::now(),
            },
        )
        .unwrap();

        let new_time = Utc::now() + Duration::days(9);
        update_test_appointment_time(&conn, &id, &new_time).unwrap();

        let appt = get_test_appointment(&conn, &id).unwrap().unwrap();
        assert_eq!(appt.appointment_date_time, new_time);

        let worklist = list_test_appointments_for_technician(&conn, &tech).unwrap();
        assert_eq!(worklist.len(), 1);
    }

    #[test]
    fn medicines_listed_by_name() {
        let conn = test_db();
        make_medicine(&conn, "Paracetamol", 50);
        make_medicine(&conn, "Amoxicillin", 20);

        let list = list_medicines(&conn).unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].name, "Amoxicillin");
        assert_eq!(list[1].name, "Paracetamol");
    }

    #[test]
    fn decrement_stock_when_sufficient() {
        let conn = test_db();
        let id = make_medicine(&conn, "Napa", 10);
        decrement_medicine_stock(&conn, &id, 7).unwrap();
        assert_eq!(get_medicine(&conn, &id).unwrap().unwrap().stock_quantity, 3);
    }

    #[test]
    fn decrement_stock_rejected_when_insufficient() {
        let conn = test_db();
        let id = make_medicine(&conn, "Napa", 5);
        let result = decrement_medicine_stock(&conn, &id, 6);
        assert!(matches!(result, Err(DatabaseError::ConstraintViolation(_))));
        // Stock untouched after the rejected decrement
        assert_eq!(get_medicine(&conn, &id).unwrap().unwrap().stock_quantity, 5);
    }

    #[test]
    fn decrement_stock_to_exactly_zero() {
        let conn = test_db();
        let id = make_medicine(&conn, "Napa", 4);
        decrement_medicine_stock(&conn, &id, 4).unwrap();
        assert_eq!(get_medicine(&conn, &id).unwrap().unwrap().stock_quantity, 0);
    }

    #[test]
    fn one_prescription_per_appointment() {
        let conn = test_db();
        let patient = make_patient(&conn);
        let doctor = make_doctor(&conn);
        let appt = make_doctor_appointment(&conn, &patient, &doctor);
        make_prescription(&conn, &appt);

        let result = insert_prescription(
            &conn,
            &Prescription {
                id: Uuid::new_v4(),
                doctor_appointment_id: appt,
                complains: "Second visit".into(),
                vitals: "BP 130/85".into(),
                diagnosis: "Duplicate".into(),
                referrals: String::new(),
                date_issued: Utc::now(),
                next_checkup: None,
                is_referred: false,
            },
        );
        assert!(result.is_err());
    }

    #[test]
    fn prescription_lookup_by_appointment() {
        let conn = test_db();
        let patient = make_patient(&conn);
        let doctor = make_doctor(&conn);
        let appt = make_doctor_appointment(&conn, &patient, &doctor);
        let rx_id = make_prescription(&conn, &appt);

        let rx = get_prescription_by_appointment(&conn, &appt).unwrap().unwrap();
        assert_eq!(rx.id, rx_id);
        assert_eq!(rx.diagnosis, "Viral fever");
        assert!(rx.next_checkup.is_some());

        let missing = get_prescription_by_appointment(&conn, &Uuid::new_v4()).unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn prescribed_medicines_round_trip() {
        let conn = test_db();
        let patient = make_patient(&conn);
        let doctor = make_doctor(&conn);
        let appt = make_doctor_appointment(&conn, &patient, &doctor);
        let rx_id = make_prescription(&conn, &appt);
        let med = make_medicine(&conn, "Seclo", 30);

        insert_prescribed_medicine(
            &conn,
            &PrescribedMedicine {
                id: Uuid::new_v4(),
                prescription_id: rx_id,
                medicine_id: med,
                duration: 7,
                instructions: "After meals".into(),
                dosage_frequency: DosageFrequency::TwiceDaily,
            },
        )
        .unwrap();

        let items = list_prescribed_medicines(&conn, &rx_id).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].duration, 7);
        assert_eq!(items[0].dosage_frequency, DosageFrequency::TwiceDaily);
    }

    #[test]
    fn prescribed_tests_round_trip() {
        let conn = test_db();
        let patient = make_patient(&conn);
        let doctor = make_doctor(&conn);
        let appt = make_doctor_appointment(&conn, &patient, &doctor);
        let rx_id = make_prescription(&conn, &appt);
        let test = make_medical_test(&conn, "Lipid Profile", true);

        insert_prescribed_test(
            &conn,
            &PrescribedTest {
                id: Uuid::new_v4(),
                prescription_id: rx_id,
                test_id: test,
            },
        )
        .unwrap();

        let items = list_prescribed_tests(&conn, &rx_id).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].test_id, test);
    }

    #[test]
    fn available_tests_exclude_unavailable() {
        let conn = test_db();
        make_medical_test(&conn, "Complete Blood Count", true);
        make_medical_test(&conn, "Bone Density Scan", false);

        let tests = list_available_tests(&conn).unwrap();
        assert_eq!(tests.len(), 1);
        assert_eq!(tests[0].name, "Complete Blood Count");
    }

    #[test]
    fn one_report_per_prescribed_test() {
        let conn = test_db();
        let patient = make_patient(&conn);
        let doctor = make_doctor(&conn);
        let appt = make_doctor_appointment(&conn, &patient, &doctor);
        let rx_id = make_prescription(&conn, &appt);
        let test = make_medical_test(&conn, "Blood Glucose", true);

        let prescribed = Uuid::new_v4();
        insert_prescribed_test(
            &conn,
            &PrescribedTest {
                id: prescribed,
                prescription_id: rx_id,
                test_id: test,
            },
        )
        .unwrap();

        let report_id = Uuid::new_v4();
        insert_test_report(
            &conn,
            &TestReport {
                id: report_id,
                prescribed_test_id: prescribed,
                result: "Fasting glucose 5.4 mmol/L".into(),
                attached_file: None,
                notes: "Within range".into(),
                report_date: Utc::now(),
            },
        )
        .unwrap();

        let duplicate = insert_test_report(
            &conn,
            &TestReport {
                id: Uuid::new_v4(),
                prescribed_test_id: prescribed,
                result: "Repeat".into(),
                attached_file: None,
                notes: String::new(),
                report_date: Utc::now(),
            },
        );
        assert!(duplicate.is_err());

        let found = get_test_report_by_prescribed_test(&conn, &prescribed).unwrap();
        assert_eq!(found.unwrap().id, report_id);
    }

    #[test]
    fn fundraising_approval_sets_and_clears_serial() {
        let conn = test_db();
        let patient = make_patient(&conn);
        let id = Uuid::new_v4();
        insert_fundraising_request(
            &conn,
            &FundraisingRequest {
                id,
                patient_id: patient,
                disease_name: "Leukemia".into(),
                amount_needed: 500_000.0,
                details: "Six chemotherapy cycles at a specialist unit".into(),
                is_approved: false,
                serial_number: None,
                created_at: Utc::now(),
            },
        )
        .unwrap();

        update_fundraising_approval(&conn, &id, true, Some("AB12CD34EF56GH78IJ90")).unwrap();
        let req = get_fundraising_request(&conn, &id).unwrap().unwrap();
        assert!(req.is_approved);
        assert_eq!(req.serial_number.as_deref(), Some("AB12CD34EF56GH78IJ90"));

        update_fundraising_approval(&conn, &id, false, None).unwrap();
        let req = get_fundraising_request(&conn, &id).unwrap().unwrap();
        assert!(!req.is_approved);
        assert!(req.serial_number.is_none());
    }

    #[test]
    fn fundraising_approval_unknown_request() {
        let conn = test_db();
        let result = update_fundraising_approval(&conn, &Uuid::new_v4(), true, Some("X"));
        assert!(matches!(result, Err(DatabaseError::NotFound { .. })));
    }

    #[test]
    fn fundraising_requests_scoped_to_patient() {
        let conn = test_db();
        let first = make_patient(&conn);
        let second = make_patient(&conn);

        for patient in [first, second, second] {
            insert_fundraising_request(
                &conn,
                &FundraisingRequest {
                    id: Uuid::new_v4(),
                    patient_id: patient,
                    disease_name: "Thalassemia".into(),
                    amount_needed: 80_000.0,
                    details: "Monthly transfusion support".into(),
                    is_approved: false,
                    serial_number: None,
                    created_at: Utc::now(),
                },
            )
            .unwrap();
        }

        assert_eq!(list_fundraising_requests(&conn).unwrap().len(), 3);
        assert_eq!(list_fundraising_requests_for_patient(&conn, &first).unwrap().len(), 1);
        assert_eq!(list_fundraising_requests_for_patient(&conn, &second).unwrap().len(), 2);
    }

    #[test]
    fn foreign_key_constraint_enforced() {
        let conn = test_db();
        let doctor = make_doctor(&conn);
        let result = insert_doctor_appointment(
            &conn,
            &DoctorAppointment {
                id: Uuid::new_v4(),
                patient_id: Uuid::new_v4(), // no such patient
                doctor_id: doctor,
                appointment_date_time: Utc::now() + Duration::days(1),
                status: AppointmentStatus::Scheduled,
                reason: "Orphan".into(),
                is_emergency: false,
                created_at: Utc::now(),
            },
        );
        assert!(result.is_err());
    }
}
