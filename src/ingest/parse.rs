//! Tolerant product decoding.
//!
//! Unknown top-level keys and unknown channel names are collected as
//! warnings, never rejected. Unknown keys inside recognised channel blocks
//! are ignored. Required-field enforcement is deferred to the validator, so
//! a field that fails to decode is simply left at its default.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

use crate::domain::{ChannelBlock, ChannelFields, Product};

/// Unknown keys observed while decoding a request, sorted and deduplicated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct UnknownKeyWarning {
    pub unknown_keys: Vec<String>,
}

impl UnknownKeyWarning {
    pub fn from_set(set: BTreeSet<String>) -> Self {
        Self {
            unknown_keys: set.into_iter().collect(),
        }
    }
}

/// Output of decoding a full JSON-array request body.
#[derive(Debug, Clone, Default)]
pub struct ParseResult {
    pub products: Vec<Product>,
    pub warnings: UnknownKeyWarning,
}

const KNOWN_TOP_LEVEL_KEYS: [&str; 17] = [
    "product_key",
    "group_key",
    "title",
    "description",
    "link",
    "image_link",
    "additional_image_links",
    "brand",
    "gtin",
    "mpn",
    "condition",
    "availability",
    "price",
    "sale_price",
    "options",
    "attributes",
    "channel",
];

/// Decodes a JSON array of product objects.
///
/// A document-level decode failure is an error; per-field problems are
/// tolerated and surface later as validation issues.
pub fn parse_products(body: &[u8]) -> Result<ParseResult, serde_json::Error> {
    let raw_items: Vec<Map<String, Value>> = serde_json::from_slice(body)?;

    let mut unknown = BTreeSet::new();
    let mut products = Vec::with_capacity(raw_items.len());

    for item in raw_items {
        let (product, item_unknown) = parse_single_product(item);
        unknown.extend(item_unknown);
        products.push(product);
    }

    Ok(ParseResult {
        products,
        warnings: UnknownKeyWarning::from_set(unknown),
    })
}

/// Decodes one product object (an NDJSON line).
pub fn parse_product_object(
    line: &[u8],
) -> Result<(Product, BTreeSet<String>), serde_json::Error> {
    let obj: Map<String, Value> = serde_json::from_slice(line)?;
    Ok(parse_single_product(obj))
}

fn parse_single_product(mut item: Map<String, Value>) -> (Product, BTreeSet<String>) {
    let mut unknown = BTreeSet::new();

    for key in item.keys() {
        if !KNOWN_TOP_LEVEL_KEYS.contains(&key.as_str()) {
            unknown.insert(key.clone());
        }
    }

    let mut product = Product::default();

    decode_if_present(&item, "product_key", &mut product.product_key);
    decode_if_present(&item, "group_key", &mut product.group_key);

    decode_if_present(&item, "title", &mut product.title);
    decode_if_present(&item, "description", &mut product.description);

    decode_if_present(&item, "link", &mut product.link);
    decode_if_present(&item, "image_link", &mut product.image_link);
    decode_if_present(&item, "additional_image_links", &mut product.additional_image_links);

    decode_if_present(&item, "brand", &mut product.brand);
    decode_if_present(&item, "gtin", &mut product.gtin);
    decode_if_present(&item, "mpn", &mut product.mpn);

    decode_if_present(&item, "condition", &mut product.condition);
    decode_if_present(&item, "availability", &mut product.availability);

    decode_if_present(&item, "price", &mut product.price);
    decode_if_present(&item, "sale_price", &mut product.sale_price);

    decode_if_present(&item, "options", &mut product.options);
    decode_if_present(&item, "attributes", &mut product.attributes);

    if let Some(raw) = item.remove("channel") {
        let channel_unknown = parse_channel(raw, &mut product.channel);
        for name in channel_unknown {
            unknown.insert(format!("channel.{name}"));
        }
    }

    // Normalize warnings: trim whitespace, drop empties. Original spelling is
    // kept so customers can locate the offending key.
    let normalized = unknown
        .into_iter()
        .filter_map(|k| {
            let trimmed = k.trim().to_string();
            (!trimmed.is_empty()).then_some(trimmed)
        })
        .collect();

    (product, normalized)
}

fn parse_channel(raw: Value, out: &mut ChannelFields) -> BTreeSet<String> {
    let mut unknown = BTreeSet::new();

    let Value::Object(obj) = raw else {
        return unknown;
    };

    for (name, value) in obj {
        if !ChannelFields::is_recognised(&name) {
            unknown.insert(name);
            continue;
        }

        // Unknown keys inside a recognised block are ignored; a block that
        // fails to decode still counts as present for validation.
        let block: ChannelBlock = serde_json::from_value(value).unwrap_or_default();
        match name.as_str() {
            "google" => out.google = Some(block),
            "meta" => out.meta = Some(block),
            "yotpo" => out.yotpo = Some(block),
            _ => unreachable!(),
        }
    }

    unknown
}

fn decode_if_present<T: serde::de::DeserializeOwned>(
    obj: &Map<String, Value>,
    key: &str,
    dst: &mut T,
) {
    if let Some(raw) = obj.get(key) {
        if let Ok(value) = serde_json::from_value(raw.clone()) {
            *dst = value;
        }
    }
}
