//! Audit logging middleware.
//!
//! Records every API request with method, path, actor and response
//! status. Runs innermost (after the actor middleware has injected
//! `ActorContext`); unauthenticated routes log with no actor.

use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;

use crate::api::types::{ActorContext, ApiContext};
use crate::core_state::AccessSource;

/// Log API access for the audit trail.
pub async fn log_access(req: Request<axum::body::Body>, next: Next) -> Response {
    let method = req.method().to_string();
    let path = req.uri().path().to_string();

    let ctx = req.extensions().get::<ApiContext>().cloned();
    let source = AccessSource::Api {
        actor_id: req
            .extensions()
            .get::<ActorContext>()
            .map(|a| a.user_id.to_string()),
    };

    let response = next.run(req).await;

    if let Some(ctx) = ctx {
        let status = response.status().as_u16();
        ctx.core
            .log_access(source, &format!("{method} {path}"), &format!("status:{status}"));
    }

    response
}
