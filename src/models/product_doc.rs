//! ProductDoc entity model.
//!
//! The accepted raw product JSON, kept so channel builders can read full
//! product fields without a re-ingest.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "product_docs")]
pub struct Model {
    /// Owning tenant
    #[sea_orm(primary_key, auto_increment = false)]
    pub tenant_id: i64,

    /// Tenant-scoped product key
    #[sea_orm(primary_key, auto_increment = false)]
    pub product_key: String,

    /// Accepted raw product JSON
    pub product_json: String,

    /// Timestamp when the doc was first stored
    pub created_at: DateTimeWithTimeZone,

    /// Timestamp of the last upsert
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
