//! Cache Sweeper Background Job
//!
//! Periodically removes state that can no longer affect a decision:
//! - expired first-page entries in the in-memory feed cache (Redis expires
//!   its own keys)
//! - posting windows of authors idle for longer than the limiter window

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;

use crate::cache::FeedCache;
use crate::metrics;
use crate::services::PostingLimiter;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSweeperConfig {
    pub enabled: bool,
    pub sweep_interval: Duration,
}

impl CacheSweeperConfig {
    /// Enabled sweeper running every `secs` seconds, at least once a second.
    pub fn from_interval_secs(secs: u64) -> Self {
        Self {
            enabled: true,
            sweep_interval: Duration::from_secs(secs.max(1)),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub cache_entries_removed: usize,
    pub posting_windows_removed: usize,
}

pub async fn start_cache_sweeper(
    cache: FeedCache,
    limiter: Arc<PostingLimiter>,
    config: CacheSweeperConfig,
) {
    if !config.enabled {
        tracing::info!("Cache sweeper disabled by configuration");
        return;
    }

    tracing::info!(
        interval_secs = config.sweep_interval.as_secs(),
        "Starting cache sweeper background job"
    );

    loop {
        sleep(config.sweep_interval).await;
        run_sweep_cycle(&cache, &limiter).await;
    }
}

/// One sweep pass. Cache failures are logged; the limiter purge always runs.
pub async fn run_sweep_cycle(cache: &FeedCache, limiter: &PostingLimiter) -> SweepReport {
    let cycle_start = Instant::now();
    let mut report = SweepReport::default();

    match cache.sweep().await {
        Ok(removed) => {
            report.cache_entries_removed = removed;
            metrics::record_cache_swept(removed);
        }
        Err(e) => tracing::warn!(error = %e, "Feed cache sweep failed"),
    }

    report.posting_windows_removed = limiter.purge_idle();
    metrics::set_posting_windows_tracked(limiter.tracked_authors());

    tracing::debug!(
        cache_entries_removed = report.cache_entries_removed,
        posting_windows_removed = report.posting_windows_removed,
        elapsed_ms = cycle_start.elapsed().as_millis() as u64,
        "Sweep cycle completed"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{FeedCacheKey, InMemoryFeedStore};
    use crate::clock::ManualClock;
    use crate::models::{FeedPage, FeedType};
    use crate::services::PostingPolicy;
    use chrono::Utc;
    use uuid::Uuid;

    #[test]
    fn test_config_from_interval_secs() {
        let config = CacheSweeperConfig::from_interval_secs(45);
        assert!(config.enabled);
        assert_eq!(config.sweep_interval, Duration::from_secs(45));
        assert_eq!(
            CacheSweeperConfig::from_interval_secs(0).sweep_interval,
            Duration::from_secs(1)
        );
    }

    #[tokio::test]
    async fn test_sweep_cycle_purges_expired_state() {
        let clock = ManualClock::new(Utc::now());
        let cache = FeedCache::new(Arc::new(InMemoryFeedStore::new()), Arc::new(clock.clone()));
        let limiter = PostingLimiter::new(
            PostingPolicy {
                max_posts: 5,
                window: chrono::Duration::seconds(60),
                min_gap: chrono::Duration::seconds(5),
            },
            Arc::new(clock.clone()),
        );

        let key = FeedCacheKey::first_page(Uuid::new_v4(), FeedType::Global, 20);
        cache
            .set(&key, FeedPage::empty(), chrono::Duration::seconds(30))
            .await;
        limiter.try_accept_post(Uuid::new_v4());

        assert_eq!(run_sweep_cycle(&cache, &limiter).await, SweepReport::default());

        clock.advance(chrono::Duration::seconds(61));
        let report = run_sweep_cycle(&cache, &limiter).await;
        assert_eq!(report.cache_entries_removed, 1);
        assert_eq!(report.posting_windows_removed, 1);
    }
}
