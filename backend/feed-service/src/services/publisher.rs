use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use crate::clients::ContentStore;
use crate::error::{AppError, Result};
use crate::models::{DropRecord, NewDrop};
use crate::services::posting_limiter::PostingLimiter;
use crate::utils::with_upstream_timeout;

pub const MAX_CONTENT_CHARS: usize = 2000;
pub const MAX_TAGS: usize = 10;

/// Create path for drops. Every accepted drop passes the posting limiter.
pub struct DropPublisher {
    content_store: Arc<dyn ContentStore>,
    limiter: Arc<PostingLimiter>,
    upstream_timeout: Duration,
}

impl DropPublisher {
    pub fn new(
        content_store: Arc<dyn ContentStore>,
        limiter: Arc<PostingLimiter>,
        upstream_timeout: Duration,
    ) -> Self {
        Self {
            content_store,
            limiter,
            upstream_timeout,
        }
    }

    pub async fn publish(&self, author_id: Uuid, new_drop: NewDrop) -> Result<DropRecord> {
        let new_drop = validate(new_drop)?;

        let (decision, accepted_at) = self.limiter.try_accept_post(author_id);
        if !decision.can_post {
            return Err(AppError::RateLimited {
                wait_time_secs: decision.wait_time_secs(),
                message: decision.message,
            });
        }

        let created = with_upstream_timeout(
            "content_store",
            self.upstream_timeout,
            self.content_store
                .create_drop(author_id, &new_drop, accepted_at),
        )
        .await;

        let record = match created {
            Ok(record) => record,
            Err(e) => {
                self.limiter.release_post(author_id, accepted_at);
                return Err(e);
            }
        };

        // The drop exists at this point. A missing log row only means this
        // post is not counted when windows are restored after a restart.
        if let Err(e) = self
            .content_store
            .record_post_accepted(author_id, accepted_at)
            .await
        {
            warn!(author_id = %author_id, error = %e, "Failed to persist posting log entry");
        }

        info!(
            author_id = %author_id,
            drop_id = %record.id,
            tags = record.tags.len(),
            "Drop published"
        );
        Ok(record)
    }
}

fn validate(mut new_drop: NewDrop) -> Result<NewDrop> {
    let content = new_drop.content.trim().to_string();
    if content.is_empty() {
        return Err(AppError::ValidationError("Drop content must not be empty".to_string()));
    }
    if content.chars().count() > MAX_CONTENT_CHARS {
        return Err(AppError::ValidationError(format!(
            "Drop content exceeds {} characters",
            MAX_CONTENT_CHARS
        )));
    }
    new_drop.content = content;

    new_drop.tags.retain(|tag| !tag.trim().is_empty());
    if new_drop.tags.len() > MAX_TAGS {
        return Err(AppError::ValidationError(format!(
            "At most {} tags per drop",
            MAX_TAGS
        )));
    }
    Ok(new_drop)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::{CandidateFilter, InMemoryContentStore};
    use crate::clock::{Clock, ManualClock};
    use crate::models::{Candidate, Reaction, Visibility};
    use crate::services::posting_limiter::PostingPolicy;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use std::collections::HashMap;

    struct RejectingStore;

    #[async_trait]
    impl ContentStore for RejectingStore {
        async fn fetch_candidate_pool(
            &self,
            _filter: &CandidateFilter,
            _min_recency: DateTime<Utc>,
            _pool_size: usize,
        ) -> Result<Vec<Candidate>> {
            Ok(vec![])
        }

        async fn record_post_accepted(&self, _author_id: Uuid, _at: DateTime<Utc>) -> Result<()> {
            Ok(())
        }

        async fn recent_posts(&self, _since: DateTime<Utc>) -> Result<Vec<(Uuid, DateTime<Utc>)>> {
            Ok(vec![])
        }

        async fn create_drop(
            &self,
            _author_id: Uuid,
            _new_drop: &NewDrop,
            _created_at: DateTime<Utc>,
        ) -> Result<DropRecord> {
            Err(AppError::Database("disk full".to_string()))
        }

        async fn get_drop(&self, _drop_id: Uuid) -> Result<Option<DropRecord>> {
            Ok(None)
        }

        async fn viewer_reactions(
            &self,
            _viewer_id: Uuid,
            _drop_ids: &[Uuid],
        ) -> Result<HashMap<Uuid, Reaction>> {
            Ok(HashMap::new())
        }
    }

    fn limiter(clock: &ManualClock) -> Arc<PostingLimiter> {
        let policy = PostingPolicy {
            max_posts: 10,
            window: chrono::Duration::hours(1),
            min_gap: chrono::Duration::seconds(5),
        };
        Arc::new(PostingLimiter::new(policy, Arc::new(clock.clone())))
    }

    fn new_drop(content: &str) -> NewDrop {
        NewDrop {
            content: content.to_string(),
            tags: vec!["music".to_string()],
            visibility: Visibility::Global,
        }
    }

    #[tokio::test]
    async fn test_publish_records_acceptance() {
        let clock = ManualClock::new(Utc::now());
        let store = Arc::new(InMemoryContentStore::new());
        let publisher = DropPublisher::new(store.clone(), limiter(&clock), Duration::from_secs(1));
        let author = Uuid::new_v4();

        let record = publisher.publish(author, new_drop("  hello  ")).await.unwrap();

        assert_eq!(record.content, "hello");
        assert_eq!(record.created_at, clock.now());
        assert_eq!(store.accepted_posts(author).len(), 1);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_second_post_inside_gap_is_rate_limited() {
        let clock = ManualClock::new(Utc::now());
        let store = Arc::new(InMemoryContentStore::new());
        let publisher = DropPublisher::new(store.clone(), limiter(&clock), Duration::from_secs(1));
        let author = Uuid::new_v4();

        publisher.publish(author, new_drop("one")).await.unwrap();
        clock.advance(chrono::Duration::seconds(2));

        match publisher.publish(author, new_drop("two")).await {
            Err(AppError::RateLimited { wait_time_secs, .. }) => assert_eq!(wait_time_secs, 3),
            other => panic!("expected RateLimited, got {:?}", other.map(|r| r.id)),
        }
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_write_releases_slot() {
        let clock = ManualClock::new(Utc::now());
        let limiter = limiter(&clock);
        let publisher = DropPublisher::new(Arc::new(RejectingStore), limiter.clone(), Duration::from_secs(1));
        let author = Uuid::new_v4();

        let result = publisher.publish(author, new_drop("hello")).await;
        assert!(matches!(result, Err(AppError::UpstreamUnavailable(_))));
        assert!(limiter.check_posting_limits(author).can_post);
    }

    #[tokio::test]
    async fn test_invalid_body_does_not_consume_slot() {
        let clock = ManualClock::new(Utc::now());
        let limiter = limiter(&clock);
        let publisher = DropPublisher::new(
            Arc::new(InMemoryContentStore::new()),
            limiter.clone(),
            Duration::from_secs(1),
        );
        let author = Uuid::new_v4();

        let result = publisher.publish(author, new_drop("   ")).await;
        assert!(matches!(result, Err(AppError::ValidationError(_))));

        let too_long = "x".repeat(MAX_CONTENT_CHARS + 1);
        let result = publisher.publish(author, new_drop(&too_long)).await;
        assert!(matches!(result, Err(AppError::ValidationError(_))));

        assert_eq!(limiter.tracked_authors(), 0);
    }
}
