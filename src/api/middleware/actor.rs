//! Actor resolution middleware.
//!
//! Extracts `X-User-Id`, loads the account, and injects `ActorContext`
//! into request extensions for downstream handlers. Missing or unknown
//! ids are 401, unapproved accounts 403.

use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::{ActorContext, ApiContext};
use crate::db::repository;

/// Require a resolvable, approved account behind `X-User-Id`.
pub async fn resolve_actor(req: Request<axum::body::Body>, next: Next) -> Response {
    match resolve_actor_inner(req, next).await {
        Ok(resp) => resp,
        Err(err) => err.into_response(),
    }
}

async fn resolve_actor_inner(
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let ctx: ApiContext = req
        .extensions()
        .get::<ApiContext>()
        .cloned()
        .ok_or(ApiError::Internal("missing API context".into()))?;

    let user_id: Uuid = req
        .headers()
        .get("X-User-Id")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .ok_or(ApiError::Unauthorized)?;

    let user = {
        let conn = ctx.core.open_db()?;
        repository::get_user(&conn, &user_id)?
    }
    .ok_or(ApiError::Unauthorized)?;

    if !user.is_approved {
        return Err(ApiError::Forbidden("account is not approved".into()));
    }

    req.extensions_mut().insert(ActorContext {
        user_id: user.id,
        name: user.name,
        role: user.role,
        is_admin: user.is_admin,
    });

    Ok(next.run(req).await)
}
