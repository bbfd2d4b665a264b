//! Request middleware: bearer auth, tenant binding, idempotent replay.

pub mod auth;
pub mod idempotency;
pub mod tenant;

pub use auth::auth_middleware;
pub use idempotency::idempotency_middleware;
pub use tenant::{TenantExtension, tenant_middleware};
