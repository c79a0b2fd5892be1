// src/ingest/scheduler.rs
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::ingest::Pipeline;

#[derive(Clone, Copy, Debug)]
pub struct RefreshSchedulerCfg {
    pub interval: Duration,
}

/// Spawn a background task that triggers a run every `interval`, starting immediately.
/// Failed runs are logged; the schedule keeps going.
pub fn spawn_refresh_scheduler(pipeline: Arc<Pipeline>, cfg: RefreshSchedulerCfg) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(cfg.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match pipeline.run().await {
                Ok(report) => {
                    tracing::info!(
                        target: "ingest",
                        returned = report.diagnostics.returned_count,
                        failed = report.diagnostics.failures(),
                        "scheduled refresh tick"
                    );
                }
                Err(e) => {
                    tracing::warn!(target: "ingest", error = %e, "scheduled refresh failed");
                }
            }
        }
    })
}
