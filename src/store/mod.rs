//! Multi-tenant persistence: product hash state, product docs, runs, run
//! products, run-channel results, the idempotency cache, and the run claim
//! queue.
//!
//! One capability trait, two implementations: the in-memory backend is the
//! canonical oracle for tests; the relational backend must satisfy the same
//! properties.

pub mod factory;
pub mod memory;
pub mod sql;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{RunStatus, TenantId};
use crate::ingest::{ProductProcessResult, UnknownKeyWarning};

pub use factory::{StoreHandle, new_store};
pub use memory::MemoryStore;
pub use sql::SqlStore;

/// Errors surfaced by store implementations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Db(#[from] sea_orm::DbErr),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("{0}")]
    Internal(String),
}

/// The record of one ingest invocation. Immutable after creation except for
/// `status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RunRecord {
    pub run_id: String,
    pub tenant_id: TenantId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feed_id: Option<u64>,
    pub status: RunStatus,
    pub push_triggered: bool,

    pub received: usize,
    pub valid: usize,
    pub rejected: usize,
    pub unchanged: usize,
    pub enqueued: usize,

    pub warnings: UnknownKeyWarning,
    pub created_at: DateTime<Utc>,
}

/// The accepted raw product JSON kept per (tenant, product key) so channel
/// builders can read full fields without a re-ingest.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductDocRecord {
    pub product_json: Vec<u8>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// A run handed to exactly one worker tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunClaim {
    pub run_id: String,
    pub tenant_id: TenantId,
}

/// Aggregate outcome of one channel build for a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RunChannelResultRecord {
    pub run_id: String,
    pub tenant_id: TenantId,
    pub channel: String,
    pub attempt: u32,
    pub ok_count: usize,
    pub err_count: usize,
    pub created_at: DateTime<Utc>,
}

/// Per-product outcome of one channel build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RunChannelItemRecord {
    pub run_id: String,
    pub channel: String,
    pub product_key: String,
    pub status: String,
    pub message: String,
}

/// Cached response for a replayed idempotent request.
#[derive(Debug, Clone, PartialEq)]
pub struct IdempotencyRecord {
    pub status_code: u16,
    pub body: Vec<u8>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// How long idempotency records are replayed before they lapse.
pub const IDEMPOTENCY_TTL_HOURS: i64 = 24;

#[async_trait]
pub trait Store: Send + Sync {
    // Canonical product state
    async fn get_product_hash(
        &self,
        tenant_id: TenantId,
        product_key: &str,
    ) -> Result<Option<String>, StoreError>;
    async fn upsert_product_hash(
        &self,
        tenant_id: TenantId,
        product_key: &str,
        hash: &str,
    ) -> Result<(), StoreError>;

    // Product docs
    async fn get_product_doc(
        &self,
        tenant_id: TenantId,
        product_key: &str,
    ) -> Result<Option<ProductDocRecord>, StoreError>;
    async fn upsert_product_doc(
        &self,
        tenant_id: TenantId,
        product_key: &str,
        doc: ProductDocRecord,
    ) -> Result<(), StoreError>;

    // Runs
    async fn insert_run(&self, run: RunRecord) -> Result<(), StoreError>;
    async fn get_run(
        &self,
        tenant_id: TenantId,
        run_id: &str,
    ) -> Result<Option<RunRecord>, StoreError>;
    async fn list_runs(
        &self,
        tenant_id: TenantId,
        limit: usize,
    ) -> Result<Vec<RunRecord>, StoreError>;
    async fn insert_run_products(
        &self,
        run_id: &str,
        products: &[ProductProcessResult],
    ) -> Result<(), StoreError>;
    async fn list_run_products(
        &self,
        run_id: &str,
        limit: usize,
    ) -> Result<Vec<ProductProcessResult>, StoreError>;

    // Run claim queue
    async fn claim_runs(&self, limit: usize) -> Result<Vec<RunClaim>, StoreError>;
    async fn complete_run(&self, tenant_id: TenantId, run_id: &str) -> Result<(), StoreError>;
    async fn fail_run(
        &self,
        tenant_id: TenantId,
        run_id: &str,
        message: &str,
    ) -> Result<(), StoreError>;

    // Run-channel results
    async fn insert_run_channel_result(
        &self,
        rec: RunChannelResultRecord,
    ) -> Result<(), StoreError>;
    async fn insert_run_channel_items(
        &self,
        run_id: &str,
        channel: &str,
        items: &[RunChannelItemRecord],
    ) -> Result<(), StoreError>;
    async fn list_run_channel_results(
        &self,
        tenant_id: TenantId,
        run_id: &str,
    ) -> Result<Vec<RunChannelResultRecord>, StoreError>;
    async fn list_run_channel_items(
        &self,
        run_id: &str,
        channel: &str,
        limit: usize,
    ) -> Result<Vec<RunChannelItemRecord>, StoreError>;

    // Idempotency cache
    async fn get_idempotency(
        &self,
        tenant_id: TenantId,
        endpoint: &str,
        idem_key_hash: &str,
    ) -> Result<Option<IdempotencyRecord>, StoreError>;
    async fn put_idempotency(
        &self,
        tenant_id: TenantId,
        endpoint: &str,
        idem_key_hash: &str,
        rec: IdempotencyRecord,
    ) -> Result<(), StoreError>;
}

/// Hashes an idempotency key for use in the cache key.
pub fn hash_idempotency_key(key: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hex::encode(hasher.finalize())
}
