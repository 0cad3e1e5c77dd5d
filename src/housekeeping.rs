//! Periodic cleanup of state that is otherwise only reclaimed lazily.

use actix_web::rt;
use std::sync::Arc;
use std::time::Duration;

use crate::admission::AdmissionController;
use crate::cache::EntityCache;

/// Drops expired cache entries and idle rate-limit buckets once.
pub fn sweep(cache: &EntityCache, admission: &AdmissionController, idle: Duration) {
    let purged = cache.purge_expired();
    let evicted = admission.evict_idle(idle);
    if purged > 0 || evicted > 0 {
        log::debug!(
            "housekeeping purged {} cache entries, evicted {} idle buckets",
            purged,
            evicted
        );
    }
}

/// Runs [`sweep`] every `every` until the runtime shuts down.
pub fn spawn(
    cache: Arc<EntityCache>,
    admission: Arc<AdmissionController>,
    every: Duration,
    idle: Duration,
) -> rt::task::JoinHandle<()> {
    rt::spawn(async move {
        let mut ticker = rt::time::interval(every);
        // the first tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            sweep(&cache, &admission, idle);
        }
    })
}
