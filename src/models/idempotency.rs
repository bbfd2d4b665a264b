//! Idempotency cache entity model.

use sea_orm::entity::prelude::*;

/// Cached response per (tenant, endpoint, key hash). Replaced on conflict;
/// safe because the key uniquely identifies the deterministic request.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "idempotency")]
pub struct Model {
    /// Owning tenant
    #[sea_orm(primary_key, auto_increment = false)]
    pub tenant_id: i64,

    /// Request path the key applies to
    #[sea_orm(primary_key, auto_increment = false)]
    pub endpoint: String,

    /// SHA-256 hex of the client-supplied Idempotency-Key
    #[sea_orm(primary_key, auto_increment = false)]
    pub idem_key_hash: String,

    /// Cached response status code
    pub status_code: i32,

    /// Cached response body bytes (JSON)
    pub response_body: String,

    /// Timestamp when the record was stored
    pub created_at: DateTimeWithTimeZone,

    /// Timestamp after which the record is ignored
    pub expires_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
