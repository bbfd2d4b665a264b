//! Tenant entity model.

use sea_orm::entity::prelude::*;

/// A tenant; the top-level isolation boundary for every other table.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "tenants")]
pub struct Model {
    /// Tenant identifier (positive; 0 is reserved/invalid)
    #[sea_orm(primary_key, auto_increment = false)]
    pub tenant_id: i64,

    /// Display name
    pub name: String,

    /// Timestamp when the tenant was created
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
