//! Task-local job context.
//!
//! The runner scopes each job's `{run_id, tenant_id}` into task-local
//! storage so processing code (and anything it logs) can read them without
//! threading the pair through every call.

use tokio::task_local;

use crate::domain::TenantId;

/// The identity of the job currently being processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    pub run_id: String,
    pub tenant_id: TenantId,
}

task_local! {
    static ACTIVE_RUN_CONTEXT: RunContext;
}

/// Executes `future` with the given run context bound for its duration.
pub async fn with_run_context<Fut, R>(context: RunContext, future: Fut) -> R
where
    Fut: std::future::Future<Output = R>,
{
    ACTIVE_RUN_CONTEXT.scope(context, future).await
}

/// The run id of the job currently being processed, if any.
pub fn current_run_id() -> Option<String> {
    ACTIVE_RUN_CONTEXT
        .try_with(|ctx| ctx.run_id.clone())
        .ok()
}

/// The tenant of the job currently being processed, if any.
pub fn current_tenant_id() -> Option<TenantId> {
    ACTIVE_RUN_CONTEXT.try_with(|ctx| ctx.tenant_id).ok()
}
