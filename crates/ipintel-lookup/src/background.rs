//! A bounded, best-effort sink for fire-and-forget work (spec §5: "detached
//! through a background-best-effort sink that is itself bounded"). Used for
//! per-provider daily stats, which must never block the foreground response
//! (spec §4.5 step 5, §7 "Persistence errors ... logged, never affect the
//! response").
//!
//! Grounded on the same semaphore-bounded-concurrency shape as
//! `ipintel-bulkhead`, just applied to detached tasks instead of a Tower
//! service.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::warn;

#[derive(Clone)]
pub struct BackgroundSink {
    semaphore: Arc<Semaphore>,
}

impl BackgroundSink {
    pub fn new(max_concurrent: usize) -> Self {
        Self { semaphore: Arc::new(Semaphore::new(max_concurrent)) }
    }

    /// Spawns `work` if a slot is free; drops it on the floor (with a log
    /// line) if the sink is saturated, rather than growing unbounded.
    pub fn spawn<F>(&self, label: &'static str, work: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let semaphore = Arc::clone(&self.semaphore);
        match semaphore.try_acquire_owned() {
            Ok(permit) => {
                tokio::spawn(async move {
                    work.await;
                    drop(permit);
                });
            }
            Err(_) => warn!(label, "background sink saturated, dropping task"),
        }
    }
}
