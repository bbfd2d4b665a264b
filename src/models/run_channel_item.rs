//! RunChannelItem entity model.

use sea_orm::entity::prelude::*;

/// Per-product outcome of one channel build.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "run_channel_items")]
pub struct Model {
    /// Run the item belongs to
    #[sea_orm(primary_key, auto_increment = false)]
    pub run_id: String,

    /// Channel name
    #[sea_orm(primary_key, auto_increment = false)]
    pub channel: String,

    /// Product key the item was built from
    #[sea_orm(primary_key, auto_increment = false)]
    pub product_key: String,

    /// Item status (ok, skipped, error)
    pub status: String,

    /// Outcome message (e.g. google_item_built, missing_product_doc)
    pub message: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
