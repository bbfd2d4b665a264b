//! Background worker: claims runs and drives them through the
//! `has_changes -> processing -> completed | failed` state machine.

pub mod ctx;
pub mod runner;

pub use ctx::{RunContext, current_run_id, current_tenant_id, with_run_context};
pub use runner::{Job, Runner, RunnerError};
