//! RunChannelResult entity model.

use sea_orm::entity::prelude::*;

/// Aggregate outcome of one channel build attempt for a run; upserted by
/// (run, channel).
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "run_channel_results")]
pub struct Model {
    /// Run the result belongs to
    #[sea_orm(primary_key, auto_increment = false)]
    pub run_id: String,

    /// Channel name (e.g. google)
    #[sea_orm(primary_key, auto_increment = false)]
    pub channel: String,

    /// Owning tenant
    pub tenant_id: i64,

    /// Build attempt number, starting at 1
    pub attempt: i32,

    /// Items built successfully
    pub ok_count: i32,

    /// Items that failed to build
    pub err_count: i32,

    /// Timestamp when the result was recorded
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
