use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::cache::Sweep;

/// Periodically prunes expired entries from every registered cache.
pub struct ExpirySweeper {
    caches: Vec<Arc<dyn Sweep>>,
    interval: Duration,
}

impl ExpirySweeper {
    pub fn new(interval: Duration) -> Self {
        Self {
            caches: Vec::new(),
            interval,
        }
    }

    pub fn register(mut self, cache: Arc<dyn Sweep>) -> Self {
        self.caches.push(cache);
        self
    }

    /// One pass over all caches at `now`. Returns `(cache name, removed)` in
    /// registration order.
    pub fn sweep_once(&self, now: DateTime<Utc>) -> Vec<(String, usize)> {
        self.caches
            .iter()
            .map(|cache| {
                let removed = cache.sweep(now);
                if removed > 0 {
                    debug!("Swept {} expired entries from {} cache", removed, cache.name());
                }
                (cache.name().to_string(), removed)
            })
            .collect()
    }

    /// Run forever: sleep one interval, then sweep.
    pub fn spawn(self) -> JoinHandle<()> {
        info!(
            "Starting expiry sweeper for {} caches every {:?}",
            self.caches.len(),
            self.interval
        );
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(self.interval).await;
                let removed: usize = self
                    .sweep_once(Utc::now())
                    .iter()
                    .map(|(_, n)| n)
                    .sum();
                if removed > 0 {
                    info!("Expiry sweep removed {} entries", removed);
                }
            }
        })
    }
}
