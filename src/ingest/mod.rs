//! Delta-ingest pipeline: tolerant parsing, validation, canonical hashing,
//! and per-product change classification.

pub mod delta;
pub mod hash;
pub mod parse;
pub mod processor;
pub mod run_id;
pub mod validate;

pub use delta::{DeltaDecision, compute_disposition};
pub use hash::hash_normalized;
pub use parse::{ParseResult, UnknownKeyWarning, parse_product_object, parse_products};
pub use processor::{ProcessOutput, ProcessSummary, Processor, ProductProcessResult};
pub use run_id::new_run_id;
pub use validate::{ValidationIssue, ValidationResult, validate_channel_controls, validate_product_base};
