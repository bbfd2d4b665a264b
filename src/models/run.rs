//! Run entity model.
//!
//! One row per ingest invocation. Immutable after insert except for
//! `status`, which the worker advances through the claim state machine.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "runs")]
pub struct Model {
    /// Opaque run identifier (`run_` + 32 hex chars)
    #[sea_orm(primary_key, auto_increment = false)]
    pub run_id: String,

    /// Owning tenant
    pub tenant_id: i64,

    /// Optional feed this run was submitted for
    pub feed_id: Option<i64>,

    /// Run status (completed, no_change_detected, has_changes, processing, failed)
    pub status: String,

    /// Whether any product was enqueued for push
    pub push_triggered: bool,

    /// Products received in the request
    pub received: i32,

    /// Products that passed validation
    pub valid: i32,

    /// Products rejected by validation
    pub rejected: i32,

    /// Valid products whose content did not change
    pub unchanged: i32,

    /// Valid products enqueued for push
    pub enqueued: i32,

    /// Unknown-key warnings as JSON
    #[sea_orm(column_type = "Json")]
    pub warnings_json: Json,

    /// Timestamp when the run was recorded
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
