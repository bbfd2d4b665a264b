//! ProductState entity model.
//!
//! Holds the canonical content hash per (tenant, product key). Created on
//! first enqueue, overwritten on enqueue or unchanged, never deleted by the
//! core.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "product_state")]
pub struct Model {
    /// Owning tenant
    #[sea_orm(primary_key, auto_increment = false)]
    pub tenant_id: i64,

    /// Tenant-scoped product key
    #[sea_orm(primary_key, auto_increment = false)]
    pub product_key: String,

    /// Canonical content hash (64 hex chars)
    pub normalized_hash: String,

    /// Timestamp of the last upsert
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
