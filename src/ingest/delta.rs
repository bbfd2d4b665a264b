//! Change classification between the persisted and the current content hash.

use serde::{Deserialize, Serialize};

use crate::domain::ProductDisposition;

/// Outcome of comparing a product's previous and current hashes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeltaDecision {
    pub disposition: ProductDisposition,
    pub reason: String,
}

/// Maps (previous hash, current hash) to a disposition.
pub fn compute_disposition(previous_hash: &str, current_hash: &str) -> DeltaDecision {
    // No previous hash means we have never pushed this product.
    if previous_hash.is_empty() {
        return DeltaDecision {
            disposition: ProductDisposition::Enqueued,
            reason: "new_product".to_string(),
        };
    }

    if previous_hash == current_hash {
        return DeltaDecision {
            disposition: ProductDisposition::Unchanged,
            reason: "no_change_detected".to_string(),
        };
    }

    DeltaDecision {
        disposition: ProductDisposition::Enqueued,
        reason: "content_changed".to_string(),
    }
}
