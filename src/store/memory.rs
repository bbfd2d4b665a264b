//! In-memory store backend.
//!
//! A single readers-writer lock guards all state. Claiming runs happens
//! under the write lock, which gives the same at-most-once guarantee the
//! relational backend gets from its row locks.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;

use crate::domain::{RunStatus, TenantId};
use crate::ingest::ProductProcessResult;

use super::{
    IdempotencyRecord, ProductDocRecord, RunChannelItemRecord, RunChannelResultRecord, RunClaim,
    RunRecord, Store, StoreError,
};

#[derive(Default)]
struct Inner {
    product_hash: HashMap<TenantId, HashMap<String, String>>,
    product_docs: HashMap<TenantId, HashMap<String, ProductDocRecord>>,

    runs: HashMap<String, RunRecord>,
    run_products: HashMap<String, Vec<ProductProcessResult>>,

    run_channel_results: HashMap<String, Vec<RunChannelResultRecord>>,
    // run_id -> channel -> items
    run_channel_items: HashMap<String, HashMap<String, Vec<RunChannelItemRecord>>>,

    // tenant -> endpoint -> key hash -> record
    idem: HashMap<TenantId, HashMap<String, HashMap<String, IdempotencyRecord>>>,
}

/// The in-memory [`Store`] implementation.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_product_hash(
        &self,
        tenant_id: TenantId,
        product_key: &str,
    ) -> Result<Option<String>, StoreError> {
        let inner = self.read();
        Ok(inner
            .product_hash
            .get(&tenant_id)
            .and_then(|m| m.get(product_key))
            .cloned())
    }

    async fn upsert_product_hash(
        &self,
        tenant_id: TenantId,
        product_key: &str,
        hash: &str,
    ) -> Result<(), StoreError> {
        let mut inner = self.write();
        inner
            .product_hash
            .entry(tenant_id)
            .or_default()
            .insert(product_key.to_string(), hash.to_string());
        Ok(())
    }

    async fn get_product_doc(
        &self,
        tenant_id: TenantId,
        product_key: &str,
    ) -> Result<Option<ProductDocRecord>, StoreError> {
        let inner = self.read();
        Ok(inner
            .product_docs
            .get(&tenant_id)
            .and_then(|m| m.get(product_key))
            .cloned())
    }

    async fn upsert_product_doc(
        &self,
        tenant_id: TenantId,
        product_key: &str,
        mut doc: ProductDocRecord,
    ) -> Result<(), StoreError> {
        let now = Utc::now();
        let mut inner = self.write();
        let docs = inner.product_docs.entry(tenant_id).or_default();

        match docs.get(product_key) {
            Some(existing) => {
                doc.created_at = existing.created_at;
                doc.updated_at = Some(now);
            }
            None => {
                doc.created_at = Some(now);
                doc.updated_at = Some(now);
            }
        }

        docs.insert(product_key.to_string(), doc);
        Ok(())
    }

    async fn insert_run(&self, run: RunRecord) -> Result<(), StoreError> {
        let mut inner = self.write();
        inner.runs.insert(run.run_id.clone(), run);
        Ok(())
    }

    async fn get_run(
        &self,
        tenant_id: TenantId,
        run_id: &str,
    ) -> Result<Option<RunRecord>, StoreError> {
        let inner = self.read();
        Ok(inner
            .runs
            .get(run_id)
            .filter(|r| r.tenant_id == tenant_id)
            .cloned())
    }

    async fn list_runs(
        &self,
        tenant_id: TenantId,
        limit: usize,
    ) -> Result<Vec<RunRecord>, StoreError> {
        let inner = self.read();
        let mut out: Vec<RunRecord> = inner
            .runs
            .values()
            .filter(|r| r.tenant_id == tenant_id)
            .cloned()
            .collect();

        // Newest first
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        if limit > 0 && limit < out.len() {
            out.truncate(limit);
        }
        Ok(out)
    }

    async fn insert_run_products(
        &self,
        run_id: &str,
        products: &[ProductProcessResult],
    ) -> Result<(), StoreError> {
        let mut inner = self.write();
        inner
            .run_products
            .insert(run_id.to_string(), products.to_vec());
        Ok(())
    }

    async fn list_run_products(
        &self,
        run_id: &str,
        limit: usize,
    ) -> Result<Vec<ProductProcessResult>, StoreError> {
        let inner = self.read();
        let mut out = inner
            .run_products
            .get(run_id)
            .cloned()
            .unwrap_or_default();

        // Stable ordering for predictable responses
        out.sort_by(|a, b| a.product_key.cmp(&b.product_key));

        if limit > 0 && limit < out.len() {
            out.truncate(limit);
        }
        Ok(out)
    }

    async fn claim_runs(&self, limit: usize) -> Result<Vec<RunClaim>, StoreError> {
        let limit = if limit == 0 { 10 } else { limit };

        let mut inner = self.write();

        let mut candidates: Vec<(String, chrono::DateTime<Utc>, TenantId)> = inner
            .runs
            .values()
            .filter(|r| {
                r.status == RunStatus::HasChanges && r.push_triggered && r.tenant_id.is_valid()
            })
            .map(|r| (r.run_id.clone(), r.created_at, r.tenant_id))
            .collect();

        // Oldest first
        candidates.sort_by(|a, b| a.1.cmp(&b.1));
        candidates.truncate(limit);

        let mut claims = Vec::with_capacity(candidates.len());
        for (run_id, _, tenant_id) in candidates {
            if let Some(run) = inner.runs.get_mut(&run_id) {
                run.status = RunStatus::Processing;
            }
            claims.push(RunClaim { run_id, tenant_id });
        }

        Ok(claims)
    }

    async fn complete_run(&self, tenant_id: TenantId, run_id: &str) -> Result<(), StoreError> {
        let mut inner = self.write();
        if let Some(run) = inner.runs.get_mut(run_id) {
            if run.tenant_id == tenant_id {
                run.status = RunStatus::Completed;
            }
        }
        Ok(())
    }

    async fn fail_run(
        &self,
        tenant_id: TenantId,
        run_id: &str,
        _message: &str,
    ) -> Result<(), StoreError> {
        let mut inner = self.write();
        if let Some(run) = inner.runs.get_mut(run_id) {
            if run.tenant_id == tenant_id {
                run.status = RunStatus::Failed;
            }
        }
        Ok(())
    }

    async fn insert_run_channel_result(
        &self,
        rec: RunChannelResultRecord,
    ) -> Result<(), StoreError> {
        let mut inner = self.write();
        inner
            .run_channel_results
            .entry(rec.run_id.clone())
            .or_default()
            .push(rec);
        Ok(())
    }

    async fn insert_run_channel_items(
        &self,
        run_id: &str,
        channel: &str,
        items: &[RunChannelItemRecord],
    ) -> Result<(), StoreError> {
        let mut inner = self.write();
        inner
            .run_channel_items
            .entry(run_id.to_string())
            .or_default()
            .insert(channel.to_string(), items.to_vec());
        Ok(())
    }

    async fn list_run_channel_results(
        &self,
        tenant_id: TenantId,
        run_id: &str,
    ) -> Result<Vec<RunChannelResultRecord>, StoreError> {
        let inner = self.read();

        // Tenant ownership is enforced through the run row.
        let owned = inner
            .runs
            .get(run_id)
            .is_some_and(|r| r.tenant_id == tenant_id);
        if !owned {
            return Ok(Vec::new());
        }

        let mut out = inner
            .run_channel_results
            .get(run_id)
            .cloned()
            .unwrap_or_default();
        out.sort_by(|a, b| a.channel.cmp(&b.channel));
        Ok(out)
    }

    async fn list_run_channel_items(
        &self,
        run_id: &str,
        channel: &str,
        limit: usize,
    ) -> Result<Vec<RunChannelItemRecord>, StoreError> {
        let inner = self.read();
        let mut out = inner
            .run_channel_items
            .get(run_id)
            .and_then(|m| m.get(channel))
            .cloned()
            .unwrap_or_default();

        out.sort_by(|a, b| a.product_key.cmp(&b.product_key));

        if limit > 0 && limit < out.len() {
            out.truncate(limit);
        }
        Ok(out)
    }

    async fn get_idempotency(
        &self,
        tenant_id: TenantId,
        endpoint: &str,
        idem_key_hash: &str,
    ) -> Result<Option<IdempotencyRecord>, StoreError> {
        let inner = self.read();
        let rec = inner
            .idem
            .get(&tenant_id)
            .and_then(|eps| eps.get(endpoint))
            .and_then(|keys| keys.get(idem_key_hash));

        match rec {
            Some(rec) if Utc::now() <= rec.expires_at => Ok(Some(rec.clone())),
            _ => Ok(None),
        }
    }

    async fn put_idempotency(
        &self,
        tenant_id: TenantId,
        endpoint: &str,
        idem_key_hash: &str,
        rec: IdempotencyRecord,
    ) -> Result<(), StoreError> {
        let mut inner = self.write();
        inner
            .idem
            .entry(tenant_id)
            .or_default()
            .entry(endpoint.to_string())
            .or_default()
            .insert(idem_key_hash.to_string(), rec);
        Ok(())
    }
}
