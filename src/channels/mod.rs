//! Channel capability contract and registry.
//!
//! A channel turns a run's enqueued products into downstream items. The
//! executor looks channels up by name; names that are enabled but not
//! registered are silently skipped.

pub mod google;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::TenantId;
use crate::store::StoreError;

pub use google::GoogleChannel;

/// Reference to one enqueued product within a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductRef {
    pub product_key: String,
    pub hash: String,
}

/// Per-product outcome of a channel build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductOutcome {
    pub product_key: String,
    /// "ok" | "skipped" | "error"
    pub status: String,
    pub message: String,
}

/// Aggregate outcome of one build call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildResult {
    pub channel: String,
    pub attempt: u32,
    pub ok_count: usize,
    pub err_count: usize,
    pub items: Vec<ProductOutcome>,
}

/// Errors a channel build can fail with as a whole. Per-product problems are
/// item outcomes, not errors.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

#[async_trait]
pub trait Channel: Send + Sync {
    /// The name the registry and feed configuration use for this channel.
    fn name(&self) -> &'static str;

    /// Builds downstream items for the given product references.
    async fn build(
        &self,
        tenant_id: TenantId,
        products: &[ProductRef],
    ) -> Result<BuildResult, ChannelError>;
}

/// Name-keyed channel lookup.
#[derive(Clone, Default)]
pub struct Registry {
    by_name: HashMap<String, Arc<dyn Channel>>,
}

impl Registry {
    pub fn new(channels: impl IntoIterator<Item = Arc<dyn Channel>>) -> Self {
        let mut by_name = HashMap::new();
        for channel in channels {
            by_name.insert(channel.name().to_string(), channel);
        }
        Self { by_name }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Channel>> {
        self.by_name.get(name).cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}
