//! API router.
//!
//! Returns a composable `Router` that can be mounted on any axum server.
//! Routes are nested under `/api/`.
//!
//! Middleware stack (outermost → innermost):
//! 1. Actor resolver → 2. Audit logger

use std::sync::Arc;

use axum::routing::{delete, get, post, put};
use axum::Router;

use crate::api::endpoints;
use crate::api::middleware;
use crate::api::types::ApiContext;
use crate::core_state::CoreState;

/// Build the API router.
///
/// Registration and the health probe are open; everything else requires
/// an `X-User-Id` header naming an approved account.
///
/// Middleware uses `Extension<ApiContext>` (injected as the outermost
/// layer). Endpoint handlers use `State<ApiContext>` (provided via
/// `with_state`).
pub fn api_router(core: Arc<CoreState>) -> Router {
    let ctx = ApiContext::new(core);
    build_router(ctx)
}

fn build_router(ctx: ApiContext) -> Router {
    // Layers are applied from bottom (innermost) to top (outermost):
    //   Extension (outermost) → Actor → Audit (innermost) → Handler
    //
    // Extension must be outermost so all middleware can access ApiContext.
    // Routes with state — .with_state() converts Router<ApiContext> → Router<()>
    // so middleware layers (which use from_fn with state=()) are compatible.
    //
    // NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).
    let protected = Router::new()
        .route("/users/:id", get(endpoints::users::get))
        .route("/doctors", get(endpoints::users::doctors))
        .route(
            "/appointments/doctor",
            post(endpoints::appointments::book).get(endpoints::appointments::list_for_patient),
        )
        .route(
            "/appointments/doctor/worklist",
            get(endpoints::appointments::worklist),
        )
        .route(
            "/appointments/doctor/:id",
            delete(endpoints::appointments::cancel),
        )
        .route(
            "/appointments/doctor/:id/patient",
            get(endpoints::appointments::patient_sheet),
        )
        .route(
            "/appointments/test",
            post(endpoints::appointments::schedule_test)
                .get(endpoints::appointments::test_schedule),
        )
        .route(
            "/appointments/test/:id/reschedule",
            put(endpoints::appointments::reschedule_test),
        )
        .route(
            "/prescriptions/form/:id",
            get(endpoints::prescriptions::form_info),
        )
        .route("/prescriptions/:id", post(endpoints::prescriptions::save))
        .route("/prescriptions", get(endpoints::prescriptions::list))
        .route("/prescriptions/search", get(endpoints::prescriptions::search))
        .route(
            "/prescriptions/:id/details",
            get(endpoints::prescriptions::details),
        )
        .route(
            "/prescriptions/:id/dispense",
            post(endpoints::prescriptions::dispense),
        )
        .route(
            "/medicines",
            post(endpoints::medicines::create).get(endpoints::medicines::list),
        )
        .route("/lab/prescribed-tests", get(endpoints::lab::pending_tests))
        .route("/lab/reports/:id", post(endpoints::lab::save_report))
        .route("/lab/reports", get(endpoints::lab::all_reports))
        .route("/lab/reports/mine", get(endpoints::lab::my_reports))
        .route("/lab/reports/:id/download", get(endpoints::lab::download))
        .route(
            "/fundraising",
            post(endpoints::fundraising::create).get(endpoints::fundraising::list),
        )
        .route(
            "/fundraising/:id/approve",
            post(endpoints::fundraising::toggle_approval),
        )
        .route(
            "/fundraising/:id/certificate",
            get(endpoints::fundraising::certificate),
        )
        .with_state(ctx.clone())
        // Middleware stack (innermost first, outermost last):
        .layer(axum::middleware::from_fn(middleware::audit::log_access))
        .layer(axum::middleware::from_fn(middleware::actor::resolve_actor))
        // Extension must be outermost so middleware can extract ApiContext
        .layer(axum::Extension(ctx.clone()));

    // Unprotected routes (audited, no actor required)
    let unprotected = Router::new()
        .route("/health", get(endpoints::health::check))
        .route("/users", post(endpoints::users::create))
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::audit::log_access))
        .layer(axum::Extension(ctx));

    Router::new()
        .nest("/api", protected)
        .nest("/api", unprotected)
}
