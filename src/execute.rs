//! Run execution: loads a claimed run, filters its enqueued products, and
//! dispatches them to the configured channel builders.

use std::sync::Arc;

use chrono::Utc;

use crate::channels::{ChannelError, ProductRef, Registry};
use crate::domain::{ProductDisposition, TenantId};
use crate::store::{RunChannelItemRecord, RunChannelResultRecord, Store, StoreError};

const DEFAULT_PRODUCT_LIMIT: usize = 100_000;

/// Errors surfaced to the worker, which marks the run failed.
#[derive(Debug, thiserror::Error)]
pub enum ExecuteError {
    #[error("run not found")]
    RunNotFound,
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("channel build failed: {0}")]
    Channel(#[from] ChannelError),
}

/// Dispatches one claimed run to its channel builders.
pub struct Executor {
    store: Arc<dyn Store>,
    registry: Option<Registry>,
    enabled_channels: Vec<String>,
    product_limit: usize,
}

impl Executor {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            registry: None,
            enabled_channels: Vec::new(),
            product_limit: DEFAULT_PRODUCT_LIMIT,
        }
    }

    pub fn with_registry(mut self, registry: Registry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn with_enabled_channels(mut self, channels: Vec<String>) -> Self {
        self.enabled_channels = channels;
        self
    }

    /// Override how many run products are loaded per execution (primarily
    /// for tests).
    pub fn with_product_limit(mut self, limit: usize) -> Self {
        self.product_limit = limit.max(1);
        self
    }

    /// Executes one claimed run.
    ///
    /// Validates tenant ownership, loads the run products, retains the
    /// enqueued ones, and invokes every enabled channel present in the
    /// registry. Each build result is persisted before the next channel
    /// runs. Enabled names missing from the registry are skipped.
    pub async fn execute(&self, run_id: &str, tenant_id: TenantId) -> Result<(), ExecuteError> {
        let run = self
            .store
            .get_run(tenant_id, run_id)
            .await?
            .ok_or(ExecuteError::RunNotFound)?;

        let products = self
            .store
            .list_run_products(run_id, self.product_limit)
            .await?;

        let enqueued: Vec<ProductRef> = products
            .into_iter()
            .filter(|p| p.disposition == ProductDisposition::Enqueued)
            .map(|p| ProductRef {
                product_key: p.product_key,
                hash: p.hash,
            })
            .collect();

        let Some(registry) = &self.registry else {
            return Ok(());
        };

        for name in &self.enabled_channels {
            let Some(channel) = registry.get(name) else {
                continue;
            };

            let result = channel.build(tenant_id, &enqueued).await?;

            tracing::info!(
                run_id = %run.run_id,
                tenant_id = %tenant_id,
                channel = %result.channel,
                ok_count = result.ok_count,
                err_count = result.err_count,
                "channel build finished"
            );

            self.store
                .insert_run_channel_result(RunChannelResultRecord {
                    run_id: run.run_id.clone(),
                    tenant_id,
                    channel: result.channel.clone(),
                    attempt: result.attempt,
                    ok_count: result.ok_count,
                    err_count: result.err_count,
                    created_at: Utc::now(),
                })
                .await?;

            let items: Vec<RunChannelItemRecord> = result
                .items
                .iter()
                .map(|item| RunChannelItemRecord {
                    run_id: run.run_id.clone(),
                    channel: result.channel.clone(),
                    product_key: item.product_key.clone(),
                    status: item.status.clone(),
                    message: item.message.clone(),
                })
                .collect();

            self.store
                .insert_run_channel_items(&run.run_id, &result.channel, &items)
                .await?;
        }

        Ok(())
    }
}
