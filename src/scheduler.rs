//! Periodic collection scheduling and retention.
//!
//! One cycle collects every active device, then prunes runs and change
//! history past the retention window. The first cycle starts
//! immediately; later cycles keep the configured cadence even when a
//! cycle overruns.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::collector::Collector;
use crate::error::Result;
use crate::store::RouteStore;

pub struct Scheduler {
    collector: Arc<Collector>,
    store: Arc<dyn RouteStore>,
    collection_interval: Duration,
    retention_days: i64,
}

impl Scheduler {
    pub fn new(
        collector: Arc<Collector>,
        store: Arc<dyn RouteStore>,
        collection_interval: Duration,
        retention_days: i64,
    ) -> Self {
        Self {
            collector,
            store,
            collection_interval,
            retention_days,
        }
    }

    /// Runs collection cycles forever.
    pub async fn run(&self) -> Result<()> {
        info!(
            interval_secs = self.collection_interval.as_secs(),
            retention_days = self.retention_days,
            "scheduler started"
        );
        let mut ticker = interval(self.collection_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(err) = self.run_cycle().await {
                error!(error = %err, "collection cycle failed");
            }
        }
    }

    /// One full cycle: collect all active devices, then prune.
    pub async fn run_cycle(&self) -> Result<()> {
        let devices: Vec<_> = self
            .store
            .list_devices()?
            .into_iter()
            .filter(|d| d.is_active)
            .collect();
        if devices.is_empty() {
            warn!("no active devices to collect");
            return Ok(());
        }

        let total = devices.len();
        let outcomes = self.collector.collect_all(devices).await;
        let succeeded = outcomes.iter().filter(|(_, r)| r.is_ok()).count();
        for (hostname, outcome) in &outcomes {
            if let Err(err) = outcome {
                warn!(device = %hostname, error = %err, "device collection failed");
            }
        }
        info!(succeeded, total, "collection cycle finished");

        let cutoff = Utc::now() - chrono::Duration::days(self.retention_days);
        let removed = self.store.cleanup_older_than(cutoff)?;
        if removed > 0 {
            info!(removed, retention_days = self.retention_days, "pruned expired runs");
        }
        Ok(())
    }
}
