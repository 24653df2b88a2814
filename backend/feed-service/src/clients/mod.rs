//! Upstream collaborators of the ranking engine
//!
//! The content store owns drops, counters and reactions; the follow graph
//! owns who-follows-whom. Both are consumed through the traits below so the
//! engine runs against PostgreSQL in production and in-memory fakes in
//! development and tests.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{Candidate, DropRecord, NewDrop, Reaction, Visibility};

pub use memory::{InMemoryContentStore, InMemoryFollowGraph};
pub use postgres::{PgContentStore, PgFollowGraph};

/// Store-side narrowing of the candidate pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateFilter {
    /// Restrict to these authors; `None` admits everyone.
    pub authors: Option<Vec<Uuid>>,
    pub visibilities: Vec<Visibility>,
}

impl CandidateFilter {
    pub fn global() -> Self {
        Self {
            authors: None,
            visibilities: vec![Visibility::Global],
        }
    }

    pub fn following(authors: Vec<Uuid>) -> Self {
        Self {
            authors: Some(authors),
            visibilities: vec![Visibility::Global, Visibility::Following],
        }
    }

    pub fn admits(&self, author_id: Uuid, visibility: Visibility) -> bool {
        let author_ok = self
            .authors
            .as_ref()
            .map_or(true, |authors| authors.contains(&author_id));
        author_ok && self.visibilities.contains(&visibility)
    }
}

#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Newest `pool_size` drops created at or after `min_recency` that match
    /// `filter`, newest first.
    async fn fetch_candidate_pool(
        &self,
        filter: &CandidateFilter,
        min_recency: DateTime<Utc>,
        pool_size: usize,
    ) -> Result<Vec<Candidate>>;

    /// Durable log of posts accepted by the posting limiter.
    async fn record_post_accepted(&self, author_id: Uuid, accepted_at: DateTime<Utc>) -> Result<()>;

    /// Logged acceptances at or after `since`, oldest first.
    async fn recent_posts(&self, since: DateTime<Utc>) -> Result<Vec<(Uuid, DateTime<Utc>)>>;

    async fn create_drop(
        &self,
        author_id: Uuid,
        new_drop: &NewDrop,
        created_at: DateTime<Utc>,
    ) -> Result<DropRecord>;

    async fn get_drop(&self, drop_id: Uuid) -> Result<Option<DropRecord>>;

    /// The viewer's like/dislike on each of `drop_ids`; drops without a
    /// reaction are absent from the map.
    async fn viewer_reactions(
        &self,
        viewer_id: Uuid,
        drop_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Reaction>>;
}

#[async_trait]
pub trait FollowGraph: Send + Sync {
    async fn get_following(&self, user_id: Uuid) -> Result<Vec<Uuid>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_filter_rejects_following_only() {
        let filter = CandidateFilter::global();
        assert!(filter.admits(Uuid::new_v4(), Visibility::Global));
        assert!(!filter.admits(Uuid::new_v4(), Visibility::Following));
    }

    #[test]
    fn test_following_filter_requires_followed_author() {
        let followed = Uuid::new_v4();
        let filter = CandidateFilter::following(vec![followed]);
        assert!(filter.admits(followed, Visibility::Global));
        assert!(filter.admits(followed, Visibility::Following));
        assert!(!filter.admits(Uuid::new_v4(), Visibility::Global));
    }
}
