//! RunProduct entity model.

use sea_orm::entity::prelude::*;

/// Per-product outcome recorded for one run.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "run_products")]
pub struct Model {
    /// Run the result belongs to
    #[sea_orm(primary_key, auto_increment = false)]
    pub run_id: String,

    /// Product key within the run (empty for unparseable bulk lines)
    #[sea_orm(primary_key, auto_increment = false)]
    pub product_key: String,

    /// Disposition (rejected, unchanged, enqueued)
    pub disposition: String,

    /// Reason code for the disposition
    pub reason: String,

    /// Canonical content hash; empty for rejected products
    pub normalized_hash: String,

    /// Validation issues as JSON
    #[sea_orm(column_type = "Json")]
    pub issues_json: Json,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
