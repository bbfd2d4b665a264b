//! The polling runner.
//!
//! Each tick claims up to `max_per_claim` runs and processes them in order.
//! A processing error fails that run and moves on; the tick never aborts on
//! a single bad run. A claim error stops the runner, since it means the
//! store itself is unhealthy.

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, histogram};
use tokio::time::{Instant, MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::domain::TenantId;
use crate::store::{Store, StoreError};

use super::ctx::{RunContext, with_run_context};

const DEFAULT_POLL_EVERY: Duration = Duration::from_millis(500);
const DEFAULT_CLAIM_TTL: Duration = Duration::from_secs(30);
const DEFAULT_MAX_PER_CLAIM: usize = 10;

/// One claimed run handed to the process function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub run_id: String,
    pub tenant_id: TenantId,
}

type ProcessFuture = Pin<Box<dyn Future<Output = Result<(), anyhow::Error>> + Send>>;
type ProcessFn = Arc<dyn Fn(Job) -> ProcessFuture + Send + Sync>;

/// Why the runner stopped.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("runner cancelled")]
    Cancelled,
    #[error("claim failed: {0}")]
    Claim(#[from] StoreError),
}

/// Periodic claim-process-complete loop over runs.
pub struct Runner {
    store: Arc<dyn Store>,
    poll_every: Duration,
    /// Reserved for stale-claim recovery; not enforced in v1.
    #[allow(dead_code)]
    claim_ttl: Duration,
    max_per_claim: usize,
    process_fn: ProcessFn,
}

impl Runner {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            poll_every: DEFAULT_POLL_EVERY,
            claim_ttl: DEFAULT_CLAIM_TTL,
            max_per_claim: DEFAULT_MAX_PER_CLAIM,
            process_fn: Arc::new(|_job| Box::pin(async { Ok(()) })),
        }
    }

    pub fn with_poll_every(mut self, poll_every: Duration) -> Self {
        if poll_every > Duration::ZERO {
            self.poll_every = poll_every;
        }
        self
    }

    pub fn with_claim_ttl(mut self, claim_ttl: Duration) -> Self {
        if claim_ttl > Duration::ZERO {
            self.claim_ttl = claim_ttl;
        }
        self
    }

    pub fn with_max_per_claim(mut self, max_per_claim: usize) -> Self {
        if max_per_claim > 0 {
            self.max_per_claim = max_per_claim;
        }
        self
    }

    pub fn with_process_fn<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Job) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), anyhow::Error>> + Send + 'static,
    {
        self.process_fn = Arc::new(move |job| Box::pin(f(job)));
        self
    }

    /// Runs the loop until the token is cancelled.
    ///
    /// One tick runs immediately before the timer starts.
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), RunnerError> {
        info!(poll_every_ms = self.poll_every.as_millis() as u64, "worker runner starting");

        self.tick().await?;

        let mut ticker = interval(self.poll_every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first interval tick fires immediately; consume it so the loop
        // does not double-run the initial pass.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("worker runner shutdown requested");
                    return Err(RunnerError::Cancelled);
                }
                _ = ticker.tick() => {
                    let started = Instant::now();
                    self.tick().await?;
                    histogram!("worker_tick_duration_ms")
                        .record(started.elapsed().as_secs_f64() * 1_000.0);
                }
            }
        }
    }

    /// Runs a single claim-process-complete pass outside the loop.
    pub async fn tick_once(&self) -> Result<(), RunnerError> {
        self.tick().await
    }

    async fn tick(&self) -> Result<(), RunnerError> {
        let claims = self.store.claim_runs(self.max_per_claim).await?;

        if !claims.is_empty() {
            debug!(claimed = claims.len(), "claimed runs");
            counter!("worker_runs_claimed_total").increment(claims.len() as u64);
        }

        for claim in claims {
            let job = Job {
                run_id: claim.run_id.clone(),
                tenant_id: claim.tenant_id,
            };

            let context = RunContext {
                run_id: job.run_id.clone(),
                tenant_id: job.tenant_id,
            };

            let outcome = with_run_context(context, (self.process_fn)(job)).await;

            match outcome {
                Ok(()) => {
                    // Best effort; a missing or foreign run is a no-op.
                    if let Err(err) = self.store.complete_run(claim.tenant_id, &claim.run_id).await {
                        error!(run_id = %claim.run_id, error = %err, "complete_run failed");
                    }
                    counter!("worker_runs_completed_total").increment(1);
                }
                Err(err) => {
                    error!(run_id = %claim.run_id, tenant_id = %claim.tenant_id, error = %err, "run processing failed");
                    if let Err(store_err) = self
                        .store
                        .fail_run(claim.tenant_id, &claim.run_id, &err.to_string())
                        .await
                    {
                        error!(run_id = %claim.run_id, error = %store_err, "fail_run failed");
                    }
                    counter!("worker_runs_failed_total").increment(1);
                }
            }
        }

        Ok(())
    }
}
