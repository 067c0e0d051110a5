//! Appointment endpoints — doctor bookings and lab test slots.

use axum::extract::{Path, State};
use axum::Extension;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::endpoints::{require_admin, require_doctor, require_lab_technician, require_patient};
use crate::api::error::ApiError;
use crate::api::types::{ActorContext, ApiContext};
use crate::models::{DoctorAppointment, TestAppointment};
use crate::registry::PatientSheet;
use crate::scheduling::{
    self, AppointmentCard, NewDoctorAppointment, NewTestAppointment, TestAppointmentCard,
    WorklistItem,
};

#[derive(Serialize)]
pub struct BookedResponse {
    pub appointment: DoctorAppointment,
}

/// `POST /api/appointments/doctor` — patient books a slot.
pub async fn book(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<ActorContext>,
    Json(payload): Json<NewDoctorAppointment>,
) -> Result<Json<BookedResponse>, ApiError> {
    let conn = ctx.core.open_db()?;
    let patient = require_patient(&conn, &actor)?;
    let appointment =
        scheduling::book_appointment(&conn, &patient.id, &payload).map_err(ApiError::from)?;
    Ok(Json(BookedResponse { appointment }))
}

#[derive(Serialize)]
pub struct AppointmentsResponse {
    pub appointments: Vec<AppointmentCard>,
}

/// `GET /api/appointments/doctor` — the patient's own bookings.
pub async fn list_for_patient(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<ActorContext>,
) -> Result<Json<AppointmentsResponse>, ApiError> {
    let conn = ctx.core.open_db()?;
    let patient = require_patient(&conn, &actor)?;
    let appointments =
        scheduling::patient_appointments(&conn, &patient.id).map_err(ApiError::from)?;
    Ok(Json(AppointmentsResponse { appointments }))
}

#[derive(Serialize)]
pub struct WorklistResponse {
    pub appointments: Vec<WorklistItem>,
}

/// `GET /api/appointments/doctor/worklist` — the doctor's scheduled slots.
pub async fn worklist(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<ActorContext>,
) -> Result<Json<WorklistResponse>, ApiError> {
    let conn = ctx.core.open_db()?;
    let doctor = require_doctor(&conn, &actor)?;
    let appointments = scheduling::doctor_worklist(&conn, &doctor.id).map_err(ApiError::from)?;
    Ok(Json(WorklistResponse { appointments }))
}

#[derive(Serialize)]
pub struct CancelledResponse {
    pub cancelled: Uuid,
}

/// `DELETE /api/appointments/doctor/:id` — doctor cancels a slot.
pub async fn cancel(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<CancelledResponse>, ApiError> {
    let conn = ctx.core.open_db()?;
    let doctor = require_doctor(&conn, &actor)?;
    scheduling::cancel_appointment(&conn, &doctor.id, &id).map_err(ApiError::from)?;
    Ok(Json(CancelledResponse { cancelled: id }))
}

#[derive(Serialize)]
pub struct PatientSheetResponse {
    pub patient: PatientSheet,
}

/// `GET /api/appointments/doctor/:id/patient` — demographics behind a slot.
pub async fn patient_sheet(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<PatientSheetResponse>, ApiError> {
    let conn = ctx.core.open_db()?;
    let doctor = require_doctor(&conn, &actor)?;
    let patient =
        scheduling::patient_for_appointment(&conn, &doctor.id, &id).map_err(ApiError::from)?;
    Ok(Json(PatientSheetResponse { patient }))
}

#[derive(Serialize)]
pub struct TestScheduledResponse {
    pub appointment: TestAppointment,
}

/// `POST /api/appointments/test` — administrative test slot creation.
pub async fn schedule_test(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<ActorContext>,
    Json(payload): Json<NewTestAppointment>,
) -> Result<Json<TestScheduledResponse>, ApiError> {
    require_admin(&actor)?;
    let conn = ctx.core.open_db()?;
    let appointment = scheduling::schedule_test(&conn, &payload).map_err(ApiError::from)?;
    Ok(Json(TestScheduledResponse { appointment }))
}

#[derive(Serialize)]
pub struct TestScheduleResponse {
    pub appointments: Vec<TestAppointmentCard>,
}

/// `GET /api/appointments/test` — the technician's schedule.
pub async fn test_schedule(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<ActorContext>,
) -> Result<Json<TestScheduleResponse>, ApiError> {
    let conn = ctx.core.open_db()?;
    let tech = require_lab_technician(&conn, &actor)?;
    let appointments =
        scheduling::technician_schedule(&conn, &tech.id).map_err(ApiError::from)?;
    Ok(Json(TestScheduleResponse { appointments }))
}

#[derive(Deserialize)]
pub struct RescheduleRequest {
    pub appointment_date_time: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct RescheduledResponse {
    pub rescheduled: Uuid,
}

/// `PUT /api/appointments/test/:id/reschedule` — technician moves a slot.
pub async fn reschedule_test(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RescheduleRequest>,
) -> Result<Json<RescheduledResponse>, ApiError> {
    let conn = ctx.core.open_db()?;
    let tech = require_lab_technician(&conn, &actor)?;
    scheduling::reschedule_test(&conn, &tech.id, &id, &payload.appointment_date_time)
        .map_err(ApiError::from)?;
    Ok(Json(RescheduledResponse { rescheduled: id }))
}
