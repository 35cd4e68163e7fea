//! Background drain loop for the intent queue

use super::Conductor;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

pub struct Scheduler {
    conductor: Arc<Conductor>,
    interval: Duration,
}

impl Scheduler {
    pub fn new(conductor: Arc<Conductor>, interval: Duration) -> Self {
        Self {
            conductor,
            interval,
        }
    }

    /// Start the loop on the current runtime. It wakes every `interval` and
    /// runs until [`SchedulerHandle::stop`] is called or the handle is
    /// dropped.
    pub fn spawn(self) -> SchedulerHandle {
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

        let join = tokio::spawn(async move {
            info!("Intent queue scheduler started (every {:?})", self.interval);

            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let report = self.conductor.drain_queue().await;
                        if !report.is_idle() {
                            debug!(
                                "Drain cycle: {} processed, {} requeued, {} dead-lettered",
                                report.processed, report.requeued, report.dead_lettered
                            );
                        }
                    }
                    _ = &mut stop_rx => break,
                }
            }

            info!("Intent queue scheduler stopped");
        });

        SchedulerHandle {
            stop_tx: Some(stop_tx),
            join,
        }
    }
}

pub struct SchedulerHandle {
    stop_tx: Option<oneshot::Sender<()>>,
    join: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Signal the loop and wait for it to exit. A drain already in progress
    /// finishes first.
    pub async fn stop(mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Err(e) = (&mut self.join).await {
            warn!("Scheduler task ended abnormally: {}", e);
        }
    }
}
