use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use insight_core::config::WorkerConfig;
use insight_core::db::ActionFilter;
use insight_core::{ActionStatus, InsightDb, InsightError, RemediationAction};
use serde::Serialize;

use crate::executors::Executors;

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub executed: usize,
    pub failed: usize,
}

impl RunSummary {
    pub fn total(&self) -> usize {
        self.executed + self.failed
    }
}

/// Run a redb call off the async runtime.
async fn blocking<T, F>(db: &Arc<InsightDb>, f: F) -> insight_core::Result<T>
where
    F: FnOnce(&InsightDb) -> insight_core::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let db = Arc::clone(db);
    tokio::task::spawn_blocking(move || f(&db))
        .await
        .map_err(|e| InsightError::Db(format!("task join error: {e}")))?
}

/// Claim and execute one approved action.
///
/// Fails with `InvalidTransition` when the action is not `approved` (including
/// when another worker claimed it first). Once claimed, the action always ends
/// in `completed` or `failed`.
pub async fn run_action(
    db: &Arc<InsightDb>,
    executors: &Executors,
    id: &str,
) -> insight_core::Result<RemediationAction> {
    let claimed = {
        let id = id.to_string();
        blocking(db, move |db| db.begin_execution(&id)).await?
    };
    tracing::info!(id = %claimed.id, action_type = %claimed.action_type, "executing action");

    let outcome = executors.execute(&claimed).await;
    let id = claimed.id.clone();
    match outcome {
        Ok(result) => {
            let done = blocking(db, move |db| db.complete(&id, result)).await?;
            tracing::info!(id = %done.id, "action completed");
            Ok(done)
        }
        Err(e) => {
            let message = e.to_string();
            tracing::error!(id = %id, error = %message, "action failed");
            blocking(db, move |db| db.fail(&id, &message)).await
        }
    }
}

/// Execute every currently approved action, oldest proposal first.
pub async fn run_once(
    db: &Arc<InsightDb>,
    executors: &Executors,
) -> insight_core::Result<RunSummary> {
    let mut approved = blocking(db, |db| {
        db.list_actions(&ActionFilter {
            status: Some(ActionStatus::Approved),
            finding_id: None,
        })
    })
    .await?;
    approved.reverse();

    let mut summary = RunSummary::default();
    for action in approved {
        match run_action(db, executors, &action.id).await {
            Ok(done) if done.status == ActionStatus::Completed => summary.executed += 1,
            Ok(_) => summary.failed += 1,
            Err(InsightError::InvalidTransition { from, .. }) => {
                tracing::debug!(id = %action.id, status = %from, "skipping, no longer approved");
            }
            Err(e) => return Err(e),
        }
    }
    if summary.total() > 0 {
        tracing::info!(executed = summary.executed, failed = summary.failed, "worker pass finished");
    }
    Ok(summary)
}

/// Recover stale executions, then poll for approved actions until `shutdown`
/// resolves. Store errors are logged and retried on the next tick.
pub async fn run_loop<S>(
    db: Arc<InsightDb>,
    executors: Executors,
    cfg: WorkerConfig,
    shutdown: S,
) -> insight_core::Result<()>
where
    S: Future<Output = ()>,
{
    let max_age = Duration::from_secs(cfg.stale_after_minutes * 60);
    let recovered = blocking(&db, move |db| db.recover_stale(max_age)).await?;
    if recovered > 0 {
        tracing::warn!(recovered, "failed stale executing actions");
    }

    let mut ticker = tokio::time::interval(Duration::from_secs(cfg.poll_interval_secs.max(1)));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("worker stopping");
                return Ok(());
            }
            _ = ticker.tick() => {
                if let Err(e) = run_once(&db, &executors).await {
                    tracing::error!(error = %e, "worker pass failed");
                }
            }
        }
    }
}
