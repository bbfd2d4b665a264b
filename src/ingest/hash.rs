//! Canonical content hashing.
//!
//! The hash must change iff a customer-visible canonical field or a channel
//! lifecycle state changes, and must be insensitive to the ordering of
//! unordered inputs. The canonical form is rebuilt from scratch on every
//! hash so the same bytes are produced by any future re-hash.

use serde_json::{Map, Value, json};
use sha2::{Digest, Sha256};

use crate::domain::{Money, Product};

/// Computes the canonical SHA-256 content hash of a product.
///
/// Canonicalization rules:
/// - mapping entries (`options`, `attributes`) are re-emitted as a sequence
///   of `{k, v}` pairs sorted lexicographically by key;
/// - `additional_image_links` is sorted ascending;
/// - `sale_price` is emitted as `null` when absent;
/// - each present channel block contributes only `control.state`;
/// - every envelope field is emitted even when empty, so the shape is stable.
pub fn hash_normalized(product: &Product) -> Result<String, serde_json::Error> {
    let canonical = canonicalize(normalize_for_hash(product));
    let bytes = serde_json::to_vec(&canonical)?;

    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(hex::encode(hasher.finalize()))
}

/// Rebuilds every object with its keys in lexicographic order.
///
/// Serialization order is made explicit here instead of depending on how the
/// JSON library happens to back its maps; attribute values may carry nested
/// objects in arbitrary submitted order.
fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|(a, _), (b, _)| a.cmp(b));

            let mut out = Map::new();
            for (k, v) in entries {
                out.insert(k, canonicalize(v));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

fn normalize_for_hash(p: &Product) -> Value {
    let mut additional = p.additional_image_links.clone();
    additional.sort();

    let mut channel = Map::new();
    for (name, block) in [
        ("google", p.channel.google.as_ref()),
        ("meta", p.channel.meta.as_ref()),
        ("yotpo", p.channel.yotpo.as_ref()),
    ] {
        if let Some(block) = block {
            channel.insert(
                name.to_string(),
                json!({ "control": { "state": block.control.state } }),
            );
        }
    }

    json!({
        "product_key": p.product_key,
        "group_key": p.group_key,

        "title": p.title,
        "description": p.description,

        "link": p.link,
        "image_link": p.image_link,

        "additional_image_links": additional,

        "brand": p.brand,
        "gtin": p.gtin,
        "mpn": p.mpn,

        "condition": p.condition,
        "availability": p.availability,

        "price": money_value(&p.price),
        "sale_price": p.sale_price.as_ref().map(money_value),

        "options": sorted_pairs(p.options.iter().map(|(k, v)| (k, json!(v)))),
        "attributes": sorted_pairs(p.attributes.iter().map(|(k, v)| (k, v.clone()))),

        "channel": Value::Object(channel),
    })
}

fn money_value(m: &Money) -> Value {
    json!({
        "amount_decimal": m.amount_decimal,
        "currency": m.currency,
    })
}

fn sorted_pairs<'a>(entries: impl Iterator<Item = (&'a String, Value)>) -> Value {
    // Callers iterate BTreeMaps, so entries arrive already key-sorted.
    Value::Array(
        entries
            .map(|(k, v)| json!({ "k": k, "v": v }))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ChannelBlock, ChannelControl, ChannelFields};
    use std::collections::BTreeMap;

    fn base_product() -> Product {
        Product {
            product_key: "sku1".to_string(),
            title: "Test".to_string(),
            description: "Desc".to_string(),
            link: "https://example.com/p/sku1".to_string(),
            image_link: "https://example.com/p/sku1.jpg".to_string(),
            condition: "new".to_string(),
            availability: "in_stock".to_string(),
            price: Money {
                amount_decimal: "19.99".to_string(),
                currency: "USD".to_string(),
            },
            channel: ChannelFields {
                google: Some(ChannelBlock {
                    control: ChannelControl {
                        state: "active".to_string(),
                    },
                }),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn hash_is_64_hex_chars() {
        let hash = hash_normalized(&base_product()).unwrap();
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn hash_is_deterministic() {
        let p = base_product();
        assert_eq!(hash_normalized(&p).unwrap(), hash_normalized(&p).unwrap());
    }

    #[test]
    fn additional_image_order_is_irrelevant() {
        let mut a = base_product();
        a.additional_image_links = vec!["https://x/2.jpg".to_string(), "https://x/1.jpg".to_string()];

        let mut b = base_product();
        b.additional_image_links = vec!["https://x/1.jpg".to_string(), "https://x/2.jpg".to_string()];

        assert_eq!(hash_normalized(&a).unwrap(), hash_normalized(&b).unwrap());
    }

    #[test]
    fn option_insertion_order_is_irrelevant() {
        let mut a = base_product();
        a.options = BTreeMap::from([
            ("size".to_string(), "M".to_string()),
            ("color".to_string(), "red".to_string()),
        ]);

        let mut b = base_product();
        b.options = BTreeMap::from([
            ("color".to_string(), "red".to_string()),
            ("size".to_string(), "M".to_string()),
        ]);

        assert_eq!(hash_normalized(&a).unwrap(), hash_normalized(&b).unwrap());
    }

    #[test]
    fn title_change_changes_hash() {
        let a = base_product();
        let mut b = base_product();
        b.title = "Other".to_string();
        assert_ne!(hash_normalized(&a).unwrap(), hash_normalized(&b).unwrap());
    }

    #[test]
    fn price_change_changes_hash() {
        let a = base_product();
        let mut b = base_product();
        b.price.amount_decimal = "24.99".to_string();
        assert_ne!(hash_normalized(&a).unwrap(), hash_normalized(&b).unwrap());
    }

    #[test]
    fn lifecycle_state_change_changes_hash() {
        let a = base_product();
        let mut b = base_product();
        b.channel.google = Some(ChannelBlock {
            control: ChannelControl {
                state: "inactive".to_string(),
            },
        });
        assert_ne!(hash_normalized(&a).unwrap(), hash_normalized(&b).unwrap());
    }

    #[test]
    fn sale_price_presence_changes_hash() {
        let a = base_product();
        let mut b = base_product();
        b.sale_price = Some(Money {
            amount_decimal: "9.99".to_string(),
            currency: "USD".to_string(),
        });
        assert_ne!(hash_normalized(&a).unwrap(), hash_normalized(&b).unwrap());
    }

    #[test]
    fn nested_attribute_object_order_is_irrelevant() {
        let mut a = base_product();
        a.attributes = BTreeMap::from([(
            "dimensions".to_string(),
            serde_json::from_str(r#"{"width": 10, "height": 20}"#).unwrap(),
        )]);

        let mut b = base_product();
        b.attributes = BTreeMap::from([(
            "dimensions".to_string(),
            serde_json::from_str(r#"{"height": 20, "width": 10}"#).unwrap(),
        )]);

        assert_eq!(hash_normalized(&a).unwrap(), hash_normalized(&b).unwrap());
    }

    #[test]
    fn attribute_value_change_changes_hash() {
        let mut a = base_product();
        a.attributes = BTreeMap::from([("material".to_string(), serde_json::json!("cotton"))]);

        let mut b = base_product();
        b.attributes = BTreeMap::from([("material".to_string(), serde_json::json!("wool"))]);

        assert_ne!(hash_normalized(&a).unwrap(), hash_normalized(&b).unwrap());
    }
}
