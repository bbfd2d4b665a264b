//! Google Shopping channel adapter.
//!
//! Reads each product's stored doc and assembles a feed item per reference.
//! Per-product problems become item outcomes so one bad product never sinks
//! the whole run.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{Money, TenantId};
use crate::store::Store;

use super::{BuildResult, Channel, ChannelError, ProductOutcome, ProductRef};

/// A Google Shopping feed item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoogleItem {
    pub id: String,
    pub title: String,
    pub description: String,
    pub link: String,
    pub image_link: String,
    pub availability: String,
    pub condition: String,
    /// e.g. "19.99 USD"
    pub price: String,
}

/// The subset of the stored product doc the item assembly needs.
#[derive(Debug, Default, Deserialize)]
struct DocFields {
    #[serde(default)]
    product_key: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    image_link: String,
    #[serde(default)]
    condition: String,
    #[serde(default)]
    availability: String,
    #[serde(default)]
    price: Money,
}

pub struct GoogleChannel {
    store: Arc<dyn Store>,
}

impl GoogleChannel {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Channel for GoogleChannel {
    fn name(&self) -> &'static str {
        "google"
    }

    async fn build(
        &self,
        tenant_id: TenantId,
        products: &[ProductRef],
    ) -> Result<BuildResult, ChannelError> {
        let mut out = BuildResult {
            channel: self.name().to_string(),
            attempt: 1,
            ok_count: 0,
            err_count: 0,
            items: Vec::with_capacity(products.len()),
        };

        for product_ref in products {
            let key = &product_ref.product_key;

            let doc = match self.store.get_product_doc(tenant_id, key).await {
                Ok(doc) => doc,
                Err(err) => {
                    tracing::warn!(tenant_id = %tenant_id, product_key = %key, error = %err, "product doc read failed");
                    out.push_error(key, "read_product_doc_failed");
                    continue;
                }
            };

            let Some(doc) = doc else {
                out.push_error(key, "missing_product_doc");
                continue;
            };

            let fields: DocFields = match serde_json::from_slice(&doc.product_json) {
                Ok(fields) => fields,
                Err(_) => {
                    out.push_error(key, "invalid_product_json");
                    continue;
                }
            };

            if fields.description.trim().is_empty() {
                out.push_error(key, "missing_description");
                continue;
            }

            if fields.title.trim().is_empty()
                || fields.link.trim().is_empty()
                || fields.image_link.trim().is_empty()
                || fields.condition.trim().is_empty()
                || fields.availability.trim().is_empty()
                || fields.price.amount_decimal.trim().is_empty()
                || fields.price.currency.trim().is_empty()
            {
                out.push_error(key, "missing_required_fields");
                continue;
            }

            // Item assembly; transport to the Merchant API is a later stage.
            let _item = GoogleItem {
                id: fields.product_key,
                title: fields.title,
                description: fields.description,
                link: fields.link,
                image_link: fields.image_link,
                availability: fields.availability,
                condition: fields.condition,
                price: format!("{} {}", fields.price.amount_decimal, fields.price.currency),
            };

            out.ok_count += 1;
            out.items.push(ProductOutcome {
                product_key: key.clone(),
                status: "ok".to_string(),
                message: "google_item_built".to_string(),
            });
        }

        Ok(out)
    }
}

impl BuildResult {
    fn push_error(&mut self, product_key: &str, message: &str) {
        self.err_count += 1;
        self.items.push(ProductOutcome {
            product_key: product_key.to_string(),
            status: "error".to_string(),
            message: message.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, ProductDocRecord};

    fn refs(keys: &[&str]) -> Vec<ProductRef> {
        keys.iter()
            .map(|k| ProductRef {
                product_key: k.to_string(),
                hash: "h".to_string(),
            })
            .collect()
    }

    async fn store_with_doc(key: &str, doc: &str) -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store
            .upsert_product_doc(
                TenantId(1),
                key,
                ProductDocRecord {
                    product_json: doc.as_bytes().to_vec(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        store
    }

    const FULL_DOC: &str = r#"{
        "product_key": "sku1",
        "title": "Test",
        "description": "Desc",
        "link": "https://example.com/p/sku1",
        "image_link": "https://example.com/p/sku1.jpg",
        "condition": "new",
        "availability": "in_stock",
        "price": {"amount_decimal": "19.99", "currency": "USD"}
    }"#;

    #[tokio::test]
    async fn builds_item_from_complete_doc() {
        let store = store_with_doc("sku1", FULL_DOC).await;
        let channel = GoogleChannel::new(store);

        let result = channel.build(TenantId(1), &refs(&["sku1"])).await.unwrap();

        assert_eq!(result.channel, "google");
        assert_eq!(result.attempt, 1);
        assert_eq!(result.ok_count, 1);
        assert_eq!(result.err_count, 0);
        assert_eq!(result.items[0].status, "ok");
        assert_eq!(result.items[0].message, "google_item_built");
    }

    #[tokio::test]
    async fn missing_doc_is_an_error_item() {
        let channel = GoogleChannel::new(Arc::new(MemoryStore::new()));

        let result = channel.build(TenantId(1), &refs(&["sku1"])).await.unwrap();

        assert_eq!(result.err_count, 1);
        assert_eq!(result.items[0].status, "error");
        assert_eq!(result.items[0].message, "missing_product_doc");
    }

    #[tokio::test]
    async fn invalid_json_doc_is_an_error_item() {
        let store = store_with_doc("sku1", "not json").await;
        let channel = GoogleChannel::new(store);

        let result = channel.build(TenantId(1), &refs(&["sku1"])).await.unwrap();
        assert_eq!(result.items[0].message, "invalid_product_json");
    }

    #[tokio::test]
    async fn missing_description_is_reported_first() {
        let store = store_with_doc(
            "sku1",
            r#"{"product_key": "sku1", "title": "Test"}"#,
        )
        .await;
        let channel = GoogleChannel::new(store);

        let result = channel.build(TenantId(1), &refs(&["sku1"])).await.unwrap();
        assert_eq!(result.items[0].message, "missing_description");
    }

    #[tokio::test]
    async fn missing_required_fields_is_reported() {
        let store = store_with_doc(
            "sku1",
            r#"{"product_key": "sku1", "title": "Test", "description": "Desc"}"#,
        )
        .await;
        let channel = GoogleChannel::new(store);

        let result = channel.build(TenantId(1), &refs(&["sku1"])).await.unwrap();
        assert_eq!(result.items[0].message, "missing_required_fields");
    }

    #[tokio::test]
    async fn mixed_batch_counts_both() {
        let store = store_with_doc("sku1", FULL_DOC).await;
        let channel = GoogleChannel::new(store);

        let result = channel
            .build(TenantId(1), &refs(&["sku1", "sku2"]))
            .await
            .unwrap();

        assert_eq!(result.ok_count, 1);
        assert_eq!(result.err_count, 1);
        assert_eq!(result.items.len(), 2);
    }

    #[tokio::test]
    async fn docs_are_tenant_scoped() {
        let store = store_with_doc("sku1", FULL_DOC).await;
        let channel = GoogleChannel::new(store);

        let result = channel.build(TenantId(2), &refs(&["sku1"])).await.unwrap();
        assert_eq!(result.items[0].message, "missing_product_doc");
    }
}
