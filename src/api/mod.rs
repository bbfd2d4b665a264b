//! HTTP adapters: request middleware and the debug ingest/read endpoints.

pub mod handlers;
pub mod middleware;
