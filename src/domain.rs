//! Core domain types shared across ingest, storage, and channel dispatch.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use utoipa::ToSchema;

/// Tenant identifier. Positive; 0 is reserved/invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct TenantId(pub u64);

impl TenantId {
    /// Reserved default tenant used when no authenticated tenant is bound;
    /// keeps local development ergonomic.
    pub const DEFAULT: TenantId = TenantId(1);

    pub fn is_valid(self) -> bool {
        self.0 > 0
    }
}

impl std::fmt::Display for TenantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A monetary amount kept as the decimal string the tenant submitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Money {
    #[serde(default)]
    pub amount_decimal: String,
    #[serde(default)]
    pub currency: String,
}

/// Lifecycle states a tenant may assign to a product on a channel.
pub const CHANNEL_LIFECYCLE_STATES: [&str; 3] = ["active", "inactive", "delete"];

/// Per-channel control block; only `state` participates in hashing.
///
/// The state is kept as the raw submitted string so that decode never fails;
/// membership in [`CHANNEL_LIFECYCLE_STATES`] is the validator's concern.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelControl {
    #[serde(default)]
    pub state: String,
}

/// Channel-specific product fields. Unknown keys inside a recognised block
/// are ignored on decode.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelBlock {
    #[serde(default)]
    pub control: ChannelControl,
}

/// The recognised channel blocks a product may carry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub google: Option<ChannelBlock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<ChannelBlock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub yotpo: Option<ChannelBlock>,
}

impl ChannelFields {
    /// Returns the block for a recognised channel name, if present.
    pub fn get(&self, name: &str) -> Option<&ChannelBlock> {
        match name {
            "google" => self.google.as_ref(),
            "meta" => self.meta.as_ref(),
            "yotpo" => self.yotpo.as_ref(),
            _ => None,
        }
    }

    /// True when `name` is one of the channels this service version knows.
    pub fn is_recognised(name: &str) -> bool {
        matches!(name, "google" | "meta" | "yotpo")
    }
}

/// A tenant-submitted product in its accepted raw form.
///
/// Required-field enforcement is the validator's job; the parser leaves
/// missing or undecodable fields at their defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Product {
    #[serde(default)]
    pub product_key: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub group_key: String,

    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub image_link: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub additional_image_links: Vec<String>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub brand: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub gtin: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub mpn: String,

    #[serde(default)]
    pub condition: String,
    #[serde(default)]
    pub availability: String,

    #[serde(default)]
    pub price: Money,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sale_price: Option<Money>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub options: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, JsonValue>,

    #[serde(default)]
    pub channel: ChannelFields,
}

/// How a product fared within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ProductDisposition {
    Rejected,
    Unchanged,
    Enqueued,
}

impl ProductDisposition {
    pub fn as_str(self) -> &'static str {
        match self {
            ProductDisposition::Rejected => "rejected",
            ProductDisposition::Unchanged => "unchanged",
            ProductDisposition::Enqueued => "enqueued",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "rejected" => Some(ProductDisposition::Rejected),
            "unchanged" => Some(ProductDisposition::Unchanged),
            "enqueued" => Some(ProductDisposition::Enqueued),
            _ => None,
        }
    }
}

/// Lifecycle of a run record. `Processing` and `Failed` are worker-side;
/// the rest are assigned at ingest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    NoChangeDetected,
    HasChanges,
    Processing,
    Failed,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Completed => "completed",
            RunStatus::NoChangeDetected => "no_change_detected",
            RunStatus::HasChanges => "has_changes",
            RunStatus::Processing => "processing",
            RunStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "completed" => Some(RunStatus::Completed),
            "no_change_detected" => Some(RunStatus::NoChangeDetected),
            "has_changes" => Some(RunStatus::HasChanges),
            "processing" => Some(RunStatus::Processing),
            "failed" => Some(RunStatus::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tenant_zero_is_invalid() {
        assert!(!TenantId(0).is_valid());
        assert!(TenantId(1).is_valid());
        assert_eq!(TenantId::DEFAULT, TenantId(1));
    }

    #[test]
    fn run_status_round_trips_through_strings() {
        for status in [
            RunStatus::Completed,
            RunStatus::NoChangeDetected,
            RunStatus::HasChanges,
            RunStatus::Processing,
            RunStatus::Failed,
        ] {
            assert_eq!(RunStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(RunStatus::parse("queued"), None);
    }

    #[test]
    fn channel_block_ignores_unknown_subkeys() {
        let block: ChannelBlock = serde_json::from_value(serde_json::json!({
            "control": {"state": "active"},
            "merchant_id": "m-123"
        }))
        .unwrap();
        assert_eq!(block.control.state, "active");
    }

    #[test]
    fn channel_block_keeps_unrecognised_state_for_validation() {
        let block: ChannelBlock = serde_json::from_value(serde_json::json!({
            "control": {"state": "archived"}
        }))
        .unwrap();
        assert_eq!(block.control.state, "archived");
    }
}
