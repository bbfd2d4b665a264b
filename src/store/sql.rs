//! Relational store backend on SeaORM.
//!
//! Works against whatever `DB_DSN` names (MySQL or Postgres). All writes are
//! portable upserts; the claim queue is the only place that takes explicit
//! row locks.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::{Expr, LockBehavior, LockType, OnConflict};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};

use crate::domain::{ProductDisposition, RunStatus, TenantId};
use crate::ingest::{ProductProcessResult, UnknownKeyWarning};
use crate::models::{
    idempotency, product_doc, product_state, run, run_channel_item, run_channel_result,
    run_product,
};

use super::{
    IdempotencyRecord, ProductDocRecord, RunChannelItemRecord, RunChannelResultRecord, RunClaim,
    RunRecord, Store, StoreError,
};

/// The SeaORM-backed [`Store`] implementation.
pub struct SqlStore {
    db: DatabaseConnection,
}

impl SqlStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn tenant_db(tenant_id: TenantId) -> i64 {
    tenant_id.0 as i64
}

fn run_record_from_model(model: run::Model) -> Result<RunRecord, StoreError> {
    let status = RunStatus::parse(&model.status).ok_or_else(|| {
        StoreError::Internal(format!("run {} has unknown status {}", model.run_id, model.status))
    })?;

    let warnings: UnknownKeyWarning =
        serde_json::from_value(model.warnings_json).unwrap_or_default();

    Ok(RunRecord {
        run_id: model.run_id,
        tenant_id: TenantId(model.tenant_id as u64),
        feed_id: model.feed_id.map(|v| v as u64),
        status,
        push_triggered: model.push_triggered,
        received: model.received as usize,
        valid: model.valid as usize,
        rejected: model.rejected as usize,
        unchanged: model.unchanged as usize,
        enqueued: model.enqueued as usize,
        warnings,
        created_at: model.created_at.with_timezone(&Utc),
    })
}

fn run_product_from_model(model: run_product::Model) -> Result<ProductProcessResult, StoreError> {
    let disposition = ProductDisposition::parse(&model.disposition).ok_or_else(|| {
        StoreError::Internal(format!(
            "run product {}/{} has unknown disposition {}",
            model.run_id, model.product_key, model.disposition
        ))
    })?;

    Ok(ProductProcessResult {
        product_key: model.product_key,
        hash: model.normalized_hash,
        disposition,
        reason: model.reason,
        issues: serde_json::from_value(model.issues_json).unwrap_or_default(),
    })
}

#[async_trait]
impl Store for SqlStore {
    async fn get_product_hash(
        &self,
        tenant_id: TenantId,
        product_key: &str,
    ) -> Result<Option<String>, StoreError> {
        let found = product_state::Entity::find_by_id((tenant_db(tenant_id), product_key.to_string()))
            .one(&self.db)
            .await?;
        Ok(found.map(|m| m.normalized_hash))
    }

    async fn upsert_product_hash(
        &self,
        tenant_id: TenantId,
        product_key: &str,
        hash: &str,
    ) -> Result<(), StoreError> {
        let now = Utc::now().fixed_offset();
        let model = product_state::ActiveModel {
            tenant_id: Set(tenant_db(tenant_id)),
            product_key: Set(product_key.to_string()),
            normalized_hash: Set(hash.to_string()),
            updated_at: Set(now),
        };

        product_state::Entity::insert(model)
            .on_conflict(
                OnConflict::columns([
                    product_state::Column::TenantId,
                    product_state::Column::ProductKey,
                ])
                .update_columns([
                    product_state::Column::NormalizedHash,
                    product_state::Column::UpdatedAt,
                ])
                .to_owned(),
            )
            .exec(&self.db)
            .await?;
        Ok(())
    }

    async fn get_product_doc(
        &self,
        tenant_id: TenantId,
        product_key: &str,
    ) -> Result<Option<ProductDocRecord>, StoreError> {
        let found = product_doc::Entity::find_by_id((tenant_db(tenant_id), product_key.to_string()))
            .one(&self.db)
            .await?;

        Ok(found.map(|m| ProductDocRecord {
            product_json: m.product_json.into_bytes(),
            created_at: Some(m.created_at.with_timezone(&Utc)),
            updated_at: Some(m.updated_at.with_timezone(&Utc)),
        }))
    }

    async fn upsert_product_doc(
        &self,
        tenant_id: TenantId,
        product_key: &str,
        doc: ProductDocRecord,
    ) -> Result<(), StoreError> {
        let now = Utc::now().fixed_offset();
        let model = product_doc::ActiveModel {
            tenant_id: Set(tenant_db(tenant_id)),
            product_key: Set(product_key.to_string()),
            product_json: Set(String::from_utf8_lossy(&doc.product_json).into_owned()),
            created_at: Set(now),
            updated_at: Set(now),
        };

        // created_at is kept from the existing row on conflict.
        product_doc::Entity::insert(model)
            .on_conflict(
                OnConflict::columns([
                    product_doc::Column::TenantId,
                    product_doc::Column::ProductKey,
                ])
                .update_columns([
                    product_doc::Column::ProductJson,
                    product_doc::Column::UpdatedAt,
                ])
                .to_owned(),
            )
            .exec(&self.db)
            .await?;
        Ok(())
    }

    async fn insert_run(&self, run: RunRecord) -> Result<(), StoreError> {
        let model = run::ActiveModel {
            run_id: Set(run.run_id),
            tenant_id: Set(tenant_db(run.tenant_id)),
            feed_id: Set(run.feed_id.map(|v| v as i64)),
            status: Set(run.status.as_str().to_string()),
            push_triggered: Set(run.push_triggered),
            received: Set(run.received as i32),
            valid: Set(run.valid as i32),
            rejected: Set(run.rejected as i32),
            unchanged: Set(run.unchanged as i32),
            enqueued: Set(run.enqueued as i32),
            warnings_json: Set(serde_json::to_value(&run.warnings)?),
            created_at: Set(run.created_at.fixed_offset()),
        };

        model.insert(&self.db).await?;
        Ok(())
    }

    async fn get_run(
        &self,
        tenant_id: TenantId,
        run_id: &str,
    ) -> Result<Option<RunRecord>, StoreError> {
        let found = run::Entity::find_by_id(run_id.to_string())
            .filter(run::Column::TenantId.eq(tenant_db(tenant_id)))
            .one(&self.db)
            .await?;

        found.map(run_record_from_model).transpose()
    }

    async fn list_runs(
        &self,
        tenant_id: TenantId,
        limit: usize,
    ) -> Result<Vec<RunRecord>, StoreError> {
        let mut query = run::Entity::find()
            .filter(run::Column::TenantId.eq(tenant_db(tenant_id)))
            .order_by_desc(run::Column::CreatedAt);

        if limit > 0 {
            query = query.limit(limit as u64);
        }

        query
            .all(&self.db)
            .await?
            .into_iter()
            .map(run_record_from_model)
            .collect()
    }

    async fn insert_run_products(
        &self,
        run_id: &str,
        products: &[ProductProcessResult],
    ) -> Result<(), StoreError> {
        // One batch can repeat a product key: every malformed bulk line is
        // recorded under the empty key. Upsert so the duplicate never aborts
        // the run.
        for product in products {
            let model = run_product::ActiveModel {
                run_id: Set(run_id.to_string()),
                product_key: Set(product.product_key.clone()),
                disposition: Set(product.disposition.as_str().to_string()),
                reason: Set(product.reason.clone()),
                normalized_hash: Set(product.hash.clone()),
                issues_json: Set(serde_json::to_value(&product.issues)?),
            };

            run_product::Entity::insert(model)
                .on_conflict(
                    OnConflict::columns([
                        run_product::Column::RunId,
                        run_product::Column::ProductKey,
                    ])
                    .update_columns([
                        run_product::Column::Disposition,
                        run_product::Column::Reason,
                        run_product::Column::NormalizedHash,
                        run_product::Column::IssuesJson,
                    ])
                    .to_owned(),
                )
                .exec(&self.db)
                .await?;
        }
        Ok(())
    }

    async fn list_run_products(
        &self,
        run_id: &str,
        limit: usize,
    ) -> Result<Vec<ProductProcessResult>, StoreError> {
        let mut query = run_product::Entity::find()
            .filter(run_product::Column::RunId.eq(run_id))
            .order_by_asc(run_product::Column::ProductKey);

        if limit > 0 {
            query = query.limit(limit as u64);
        }

        query
            .all(&self.db)
            .await?
            .into_iter()
            .map(run_product_from_model)
            .collect()
    }

    async fn claim_runs(&self, limit: usize) -> Result<Vec<RunClaim>, StoreError> {
        let limit = if limit == 0 { 10 } else { limit };

        // Select-for-update and the status flip commit together, so exactly
        // one worker observes each run as claimable.
        let txn = self.db.begin().await?;

        let rows = run::Entity::find()
            .filter(run::Column::Status.eq(RunStatus::HasChanges.as_str()))
            .filter(run::Column::PushTriggered.eq(true))
            .filter(run::Column::TenantId.gt(0))
            .order_by_asc(run::Column::CreatedAt)
            .limit(limit as u64)
            .lock_with_behavior(LockType::Update, LockBehavior::SkipLocked)
            .all(&txn)
            .await?;

        let mut claims = Vec::with_capacity(rows.len());
        for row in rows {
            let claim = RunClaim {
                run_id: row.run_id.clone(),
                tenant_id: TenantId(row.tenant_id as u64),
            };

            let mut active: run::ActiveModel = Default::default();
            active.run_id = Set(row.run_id);
            active.status = Set(RunStatus::Processing.as_str().to_string());
            active.update(&txn).await?;

            claims.push(claim);
        }

        txn.commit().await?;
        Ok(claims)
    }

    async fn complete_run(&self, tenant_id: TenantId, run_id: &str) -> Result<(), StoreError> {
        run::Entity::update_many()
            .col_expr(
                run::Column::Status,
                Expr::value(RunStatus::Completed.as_str()),
            )
            .filter(run::Column::RunId.eq(run_id))
            .filter(run::Column::TenantId.eq(tenant_db(tenant_id)))
            .exec(&self.db)
            .await?;
        Ok(())
    }

    async fn fail_run(
        &self,
        tenant_id: TenantId,
        run_id: &str,
        message: &str,
    ) -> Result<(), StoreError> {
        tracing::warn!(run_id, tenant_id = %tenant_id, message, "marking run failed");

        run::Entity::update_many()
            .col_expr(run::Column::Status, Expr::value(RunStatus::Failed.as_str()))
            .filter(run::Column::RunId.eq(run_id))
            .filter(run::Column::TenantId.eq(tenant_db(tenant_id)))
            .exec(&self.db)
            .await?;
        Ok(())
    }

    async fn insert_run_channel_result(
        &self,
        rec: RunChannelResultRecord,
    ) -> Result<(), StoreError> {
        let model = run_channel_result::ActiveModel {
            run_id: Set(rec.run_id),
            channel: Set(rec.channel),
            tenant_id: Set(tenant_db(rec.tenant_id)),
            attempt: Set(rec.attempt as i32),
            ok_count: Set(rec.ok_count as i32),
            err_count: Set(rec.err_count as i32),
            created_at: Set(rec.created_at.fixed_offset()),
        };

        run_channel_result::Entity::insert(model)
            .on_conflict(
                OnConflict::columns([
                    run_channel_result::Column::RunId,
                    run_channel_result::Column::Channel,
                ])
                .update_columns([
                    run_channel_result::Column::Attempt,
                    run_channel_result::Column::OkCount,
                    run_channel_result::Column::ErrCount,
                    run_channel_result::Column::CreatedAt,
                ])
                .to_owned(),
            )
            .exec(&self.db)
            .await?;
        Ok(())
    }

    async fn insert_run_channel_items(
        &self,
        run_id: &str,
        channel: &str,
        items: &[RunChannelItemRecord],
    ) -> Result<(), StoreError> {
        for item in items {
            let model = run_channel_item::ActiveModel {
                run_id: Set(run_id.to_string()),
                channel: Set(channel.to_string()),
                product_key: Set(item.product_key.clone()),
                status: Set(item.status.clone()),
                message: Set(item.message.clone()),
            };

            run_channel_item::Entity::insert(model)
                .on_conflict(
                    OnConflict::columns([
                        run_channel_item::Column::RunId,
                        run_channel_item::Column::Channel,
                        run_channel_item::Column::ProductKey,
                    ])
                    .update_columns([
                        run_channel_item::Column::Status,
                        run_channel_item::Column::Message,
                    ])
                    .to_owned(),
                )
                .exec(&self.db)
                .await?;
        }
        Ok(())
    }

    async fn list_run_channel_results(
        &self,
        tenant_id: TenantId,
        run_id: &str,
    ) -> Result<Vec<RunChannelResultRecord>, StoreError> {
        // Tenant ownership is enforced through the run row.
        if self.get_run(tenant_id, run_id).await?.is_none() {
            return Ok(Vec::new());
        }

        let rows = run_channel_result::Entity::find()
            .filter(run_channel_result::Column::RunId.eq(run_id))
            .order_by_asc(run_channel_result::Column::Channel)
            .all(&self.db)
            .await?;

        Ok(rows
            .into_iter()
            .map(|m| RunChannelResultRecord {
                run_id: m.run_id,
                tenant_id: TenantId(m.tenant_id as u64),
                channel: m.channel,
                attempt: m.attempt as u32,
                ok_count: m.ok_count as usize,
                err_count: m.err_count as usize,
                created_at: m.created_at.with_timezone(&Utc),
            })
            .collect())
    }

    async fn list_run_channel_items(
        &self,
        run_id: &str,
        channel: &str,
        limit: usize,
    ) -> Result<Vec<RunChannelItemRecord>, StoreError> {
        let mut query = run_channel_item::Entity::find()
            .filter(run_channel_item::Column::RunId.eq(run_id))
            .filter(run_channel_item::Column::Channel.eq(channel))
            .order_by_asc(run_channel_item::Column::ProductKey);

        if limit > 0 {
            query = query.limit(limit as u64);
        }

        Ok(query
            .all(&self.db)
            .await?
            .into_iter()
            .map(|m| RunChannelItemRecord {
                run_id: m.run_id,
                channel: m.channel,
                product_key: m.product_key,
                status: m.status,
                message: m.message,
            })
            .collect())
    }

    async fn get_idempotency(
        &self,
        tenant_id: TenantId,
        endpoint: &str,
        idem_key_hash: &str,
    ) -> Result<Option<IdempotencyRecord>, StoreError> {
        let found = idempotency::Entity::find_by_id((
            tenant_db(tenant_id),
            endpoint.to_string(),
            idem_key_hash.to_string(),
        ))
        .one(&self.db)
        .await?;

        let Some(model) = found else {
            return Ok(None);
        };

        let expires_at = model.expires_at.with_timezone(&Utc);
        if Utc::now() > expires_at {
            return Ok(None);
        }

        Ok(Some(IdempotencyRecord {
            status_code: model.status_code as u16,
            body: model.response_body.into_bytes(),
            created_at: model.created_at.with_timezone(&Utc),
            expires_at,
        }))
    }

    async fn put_idempotency(
        &self,
        tenant_id: TenantId,
        endpoint: &str,
        idem_key_hash: &str,
        rec: IdempotencyRecord,
    ) -> Result<(), StoreError> {
        let model = idempotency::ActiveModel {
            tenant_id: Set(tenant_db(tenant_id)),
            endpoint: Set(endpoint.to_string()),
            idem_key_hash: Set(idem_key_hash.to_string()),
            status_code: Set(rec.status_code as i32),
            response_body: Set(String::from_utf8_lossy(&rec.body).into_owned()),
            created_at: Set(rec.created_at.fixed_offset()),
            expires_at: Set(rec.expires_at.fixed_offset()),
        };

        idempotency::Entity::insert(model)
            .on_conflict(
                OnConflict::columns([
                    idempotency::Column::TenantId,
                    idempotency::Column::Endpoint,
                    idempotency::Column::IdemKeyHash,
                ])
                .update_columns([
                    idempotency::Column::StatusCode,
                    idempotency::Column::ResponseBody,
                    idempotency::Column::CreatedAt,
                    idempotency::Column::ExpiresAt,
                ])
                .to_owned(),
            )
            .exec(&self.db)
            .await?;
        Ok(())
    }
}
