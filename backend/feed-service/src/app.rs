use std::sync::Arc;
use std::time::Duration;

use crate::cache::{FeedCache, FeedCacheStore};
use crate::clients::{ContentStore, FollowGraph};
use crate::clock::Clock;
use crate::config::RankingPolicy;
use crate::error::Result;
use crate::services::{
    DropPublisher, FeedAssembler, InterestTracker, InterestWeights, PostingLimiter, PostingPolicy,
};
use crate::utils::with_upstream_timeout;

/// Shared service graph, built once and handed to every worker.
#[derive(Clone)]
pub struct AppServices {
    pub assembler: Arc<FeedAssembler>,
    pub publisher: Arc<DropPublisher>,
    pub limiter: Arc<PostingLimiter>,
    pub interests: Arc<InterestTracker>,
    pub content_store: Arc<dyn ContentStore>,
    pub cache: FeedCache,
    pub upstream_timeout: Duration,
}

impl AppServices {
    pub fn new(
        policy: RankingPolicy,
        upstream_timeout: Duration,
        content_store: Arc<dyn ContentStore>,
        follow_graph: Arc<dyn FollowGraph>,
        cache_store: Arc<dyn FeedCacheStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let cache = FeedCache::new(cache_store, clock.clone()).with_op_timeout(upstream_timeout);
        let interests = Arc::new(InterestTracker::new(InterestWeights::from_policy(&policy)));
        let limiter = Arc::new(PostingLimiter::new(
            PostingPolicy::from_policy(&policy),
            clock.clone(),
        ));

        let publisher = Arc::new(DropPublisher::new(
            content_store.clone(),
            limiter.clone(),
            upstream_timeout,
        ));
        let assembler = Arc::new(FeedAssembler::new(
            content_store.clone(),
            follow_graph,
            interests.clone(),
            cache.clone(),
            clock,
            policy,
            upstream_timeout,
        ));

        Self {
            assembler,
            publisher,
            limiter,
            interests,
            content_store,
            cache,
            upstream_timeout,
        }
    }

    /// Rebuild posting windows from the content store's posting log so limits
    /// survive a restart. Returns how many acceptances were restored.
    pub async fn restore_posting_windows(&self) -> Result<usize> {
        let since = self.limiter.lookback_start();
        let accepted = with_upstream_timeout(
            "content_store",
            self.upstream_timeout,
            self.content_store.recent_posts(since),
        )
        .await?;
        Ok(self.limiter.restore(accepted))
    }
}
