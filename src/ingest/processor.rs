//! Per-product processing pipeline: validate, hash, look up previous state,
//! classify.

use std::future::Future;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{Product, ProductDisposition};
use crate::ingest::delta::compute_disposition;
use crate::ingest::hash::hash_normalized;
use crate::ingest::validate::{ValidationIssue, validate_channel_controls, validate_product_base};
use crate::store::StoreError;

/// Why processing a batch had to stop.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("hash computation failed: {0}")]
    Hash(#[from] serde_json::Error),
    #[error("previous hash lookup failed: {0}")]
    Lookup(#[from] StoreError),
}

/// Outcome for a single product within a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ProductProcessResult {
    pub product_key: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub hash: String,

    pub disposition: ProductDisposition,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<ValidationIssue>,
}

/// Counters for one batch. `received = valid + rejected` and
/// `valid = unchanged + enqueued` hold by construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ProcessSummary {
    pub received: usize,
    pub valid: usize,
    pub rejected: usize,
    pub unchanged: usize,
    pub enqueued: usize,
}

impl ProcessSummary {
    /// Folds one per-product outcome into the counters.
    pub fn record(&mut self, result: &ProductProcessResult, valid: bool) {
        if !valid {
            self.rejected += 1;
            return;
        }

        self.valid += 1;
        match result.disposition {
            ProductDisposition::Unchanged => self.unchanged += 1,
            ProductDisposition::Enqueued => self.enqueued += 1,
            ProductDisposition::Rejected => {}
        }
    }
}

/// A processed batch: counters plus the per-product results in input order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ProcessOutput {
    pub summary: ProcessSummary,
    pub products: Vec<ProductProcessResult>,
}

/// Stateless processing pipeline.
#[derive(Debug, Clone, Copy, Default)]
pub struct Processor;

impl Processor {
    pub fn new() -> Self {
        Self
    }

    /// Processes one product.
    ///
    /// Returns the per-product result and whether the product was valid.
    /// Validation failures become rejected results; a hash or lookup failure
    /// is fatal for the batch and propagates as an error.
    pub async fn process_product<F, Fut>(
        &self,
        product: &Product,
        enabled_channels: &[String],
        lookup: &F,
    ) -> Result<(ProductProcessResult, bool), ProcessError>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<Option<String>, StoreError>>,
    {
        let mut result = ProductProcessResult {
            product_key: product.product_key.clone(),
            hash: String::new(),
            disposition: ProductDisposition::Rejected,
            reason: String::new(),
            issues: Vec::new(),
        };

        let base = validate_product_base(product);
        if !base.is_valid() {
            result.reason = "base_validation_failed".to_string();
            result.issues = base.issues;
            return Ok((result, false));
        }

        let channels = validate_channel_controls(product, enabled_channels);
        if !channels.is_valid() {
            result.reason = "channel_validation_failed".to_string();
            result.issues = channels.issues;
            return Ok((result, false));
        }

        let hash = hash_normalized(product)?;
        result.hash = hash.clone();

        let previous = lookup(product.product_key.clone())
            .await?
            .unwrap_or_default();

        let decision = compute_disposition(&previous, &hash);
        result.disposition = decision.disposition;
        result.reason = decision.reason;

        Ok((result, true))
    }

    /// Processes a batch, maintaining the summary counters.
    pub async fn process_products<F, Fut>(
        &self,
        products: &[Product],
        enabled_channels: &[String],
        lookup: &F,
    ) -> Result<ProcessOutput, ProcessError>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<Option<String>, StoreError>>,
    {
        let mut out = ProcessOutput {
            summary: ProcessSummary {
                received: products.len(),
                ..Default::default()
            },
            products: Vec::with_capacity(products.len()),
        };

        for product in products {
            let (result, valid) = self
                .process_product(product, enabled_channels, lookup)
                .await?;
            out.summary.record(&result, valid);
            out.products.push(result);
        }

        Ok(out)
    }
}
