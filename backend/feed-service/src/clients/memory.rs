use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use uuid::Uuid;

use super::{CandidateFilter, ContentStore, FollowGraph};
use crate::error::Result;
use crate::models::{Candidate, DropRecord, EngagementCounts, NewDrop, Reaction};

/// Process-local content store for development and tests.
#[derive(Default)]
pub struct InMemoryContentStore {
    drops: DashMap<Uuid, DropRecord>,
    reactions: DashMap<(Uuid, Uuid), Reaction>,
    posting_log: Mutex<Vec<(Uuid, DateTime<Utc>)>>,
}

impl InMemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_drop(&self, record: DropRecord) {
        self.drops.insert(record.id, record);
    }

    pub fn remove_drop(&self, drop_id: Uuid) -> Option<DropRecord> {
        self.drops.remove(&drop_id).map(|(_, record)| record)
    }

    pub fn set_engagement(&self, drop_id: Uuid, engagement: EngagementCounts) {
        if let Some(mut record) = self.drops.get_mut(&drop_id) {
            record.engagement = engagement;
        }
    }

    pub fn set_reaction(&self, viewer_id: Uuid, drop_id: Uuid, reaction: Reaction) {
        self.reactions.insert((viewer_id, drop_id), reaction);
    }

    pub fn accepted_posts(&self, author_id: Uuid) -> Vec<DateTime<Utc>> {
        self.posting_log
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|(author, _)| *author == author_id)
            .map(|(_, at)| *at)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.drops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drops.is_empty()
    }
}

#[async_trait]
impl ContentStore for InMemoryContentStore {
    async fn fetch_candidate_pool(
        &self,
        filter: &CandidateFilter,
        min_recency: DateTime<Utc>,
        pool_size: usize,
    ) -> Result<Vec<Candidate>> {
        let mut matching: Vec<DropRecord> = self
            .drops
            .iter()
            .filter(|entry| {
                let record = entry.value();
                record.created_at >= min_recency && filter.admits(record.author_id, record.visibility)
            })
            .map(|entry| entry.value().clone())
            .collect();

        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        matching.truncate(pool_size);

        Ok(matching.iter().map(DropRecord::to_candidate).collect())
    }

    async fn record_post_accepted(&self, author_id: Uuid, accepted_at: DateTime<Utc>) -> Result<()> {
        self.posting_log
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((author_id, accepted_at));
        Ok(())
    }

    async fn recent_posts(&self, since: DateTime<Utc>) -> Result<Vec<(Uuid, DateTime<Utc>)>> {
        let mut posts: Vec<(Uuid, DateTime<Utc>)> = self
            .posting_log
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|(_, at)| *at >= since)
            .copied()
            .collect();
        posts.sort_by_key(|(_, at)| *at);
        Ok(posts)
    }

    async fn create_drop(
        &self,
        author_id: Uuid,
        new_drop: &NewDrop,
        created_at: DateTime<Utc>,
    ) -> Result<DropRecord> {
        let record = DropRecord {
            id: Uuid::new_v4(),
            author_id,
            content: new_drop.content.clone(),
            tags: new_drop.tags.clone(),
            visibility: new_drop.visibility,
            created_at,
            engagement: EngagementCounts::default(),
        };
        self.drops.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get_drop(&self, drop_id: Uuid) -> Result<Option<DropRecord>> {
        Ok(self.drops.get(&drop_id).map(|r| r.value().clone()))
    }

    async fn viewer_reactions(
        &self,
        viewer_id: Uuid,
        drop_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Reaction>> {
        Ok(drop_ids
            .iter()
            .filter_map(|id| {
                self.reactions
                    .get(&(viewer_id, *id))
                    .map(|reaction| (*id, *reaction.value()))
            })
            .collect())
    }
}

#[derive(Default)]
pub struct InMemoryFollowGraph {
    following: DashMap<Uuid, HashSet<Uuid>>,
}

impl InMemoryFollowGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn follow(&self, follower_id: Uuid, followee_id: Uuid) {
        self.following
            .entry(follower_id)
            .or_default()
            .insert(followee_id);
    }

    pub fn unfollow(&self, follower_id: Uuid, followee_id: Uuid) {
        if let Some(mut set) = self.following.get_mut(&follower_id) {
            set.remove(&followee_id);
        }
    }
}

#[async_trait]
impl FollowGraph for InMemoryFollowGraph {
    async fn get_following(&self, user_id: Uuid) -> Result<Vec<Uuid>> {
        Ok(self
            .following
            .get(&user_id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default())
    }
}
