//! Medicine inventory endpoints.

use axum::extract::State;
use axum::Extension;
use axum::Json;
use serde::Serialize;

use crate::api::endpoints::require_storekeeper;
use crate::api::error::ApiError;
use crate::api::types::{ActorContext, ApiContext};
use crate::dispensary;
use crate::models::enums::UserRole;
use crate::models::{Medicine, NewMedicine};

#[derive(Serialize)]
pub struct MedicineResponse {
    pub medicine: Medicine,
}

/// `POST /api/medicines` — storekeeper adds a catalog entry.
pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<ActorContext>,
    Json(payload): Json<NewMedicine>,
) -> Result<Json<MedicineResponse>, ApiError> {
    let conn = ctx.core.open_db()?;
    require_storekeeper(&conn, &actor)?;
    let medicine = dispensary::add_medicine(&conn, &payload).map_err(ApiError::from)?;
    tracing::info!(medicine_id = %medicine.id, name = %medicine.name, "medicine added");
    Ok(Json(MedicineResponse { medicine }))
}

#[derive(Serialize)]
pub struct MedicinesResponse {
    pub medicines: Vec<Medicine>,
}

/// `GET /api/medicines` — the catalog, for storekeepers and doctors.
pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<ActorContext>,
) -> Result<Json<MedicinesResponse>, ApiError> {
    match actor.role {
        UserRole::Storekeeper | UserRole::Doctor => {}
        _ => {
            return Err(ApiError::Forbidden(
                "storekeeper or doctor role required".into(),
            ))
        }
    }
    let conn = ctx.core.open_db()?;
    let medicines = dispensary::medicines(&conn).map_err(ApiError::from)?;
    Ok(Json(MedicinesResponse { medicines }))
}
