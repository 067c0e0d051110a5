//! HTTP API.
//!
//! Exposes the clinic workflows as JSON endpoints under `/api/`.
//! Requests are attributed through the `X-User-Id` header: the actor
//! middleware loads the account and injects an `ActorContext`, the audit
//! middleware records every request through the core audit buffer.

pub mod endpoints;
pub mod error;
pub mod middleware;
pub mod router;
pub mod server;
pub mod types;

pub use router::api_router;
pub use server::{start_api_server, ApiServer};
pub use types::ApiContext;
