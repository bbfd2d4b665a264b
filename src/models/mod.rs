//! SeaORM entity models for the relational backend.

pub mod idempotency;
pub mod product_doc;
pub mod product_state;
pub mod run;
pub mod run_channel_item;
pub mod run_channel_result;
pub mod run_product;
pub mod tenant;
