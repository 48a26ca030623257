//! HTTP API: routing, tenant context, and request/response mapping for the
//! allocation engine.

pub mod app;
pub mod context;
pub mod middleware;
