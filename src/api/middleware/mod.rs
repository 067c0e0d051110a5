//! API middleware stack.
//!
//! Execution order (outermost → innermost):
//! 1. Actor resolver — `X-User-Id` lookup, injects `ActorContext`
//! 2. Audit logger — records the request with the resolved actor

pub mod actor;
pub mod audit;
