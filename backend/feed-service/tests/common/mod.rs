#![allow(dead_code)]

use actix_web::web;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

use drops_feed::cache::InMemoryFeedStore;
use drops_feed::clients::{InMemoryContentStore, InMemoryFollowGraph};
use drops_feed::clock::{Clock, ManualClock};
use drops_feed::config::RankingPolicy;
use drops_feed::handlers::configure_api;
use drops_feed::middleware::{issue_token, JwtAuthMiddleware};
use drops_feed::models::{DropRecord, EngagementCounts, Visibility};
use drops_feed::AppServices;

pub const JWT_SECRET: &str = "integration-test-secret";

/// Fully wired service graph over in-memory upstreams and a manual clock.
pub struct TestContext {
    pub services: AppServices,
    pub store: Arc<InMemoryContentStore>,
    pub graph: Arc<InMemoryFollowGraph>,
    pub clock: ManualClock,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_policy(RankingPolicy::default())
    }

    pub fn with_policy(policy: RankingPolicy) -> Self {
        let clock = ManualClock::new(Utc::now());
        let store = Arc::new(InMemoryContentStore::new());
        let graph = Arc::new(InMemoryFollowGraph::new());

        let services = AppServices::new(
            policy,
            std::time::Duration::from_secs(1),
            store.clone(),
            graph.clone(),
            Arc::new(InMemoryFeedStore::new()),
            Arc::new(clock.clone()),
        );

        Self {
            services,
            store,
            graph,
            clock,
        }
    }

    pub fn configure(&self, cfg: &mut web::ServiceConfig) {
        configure_api(cfg, &self.services, JwtAuthMiddleware::new(JWT_SECRET));
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Insert a global drop `hours_old` hours old with `likes` likes.
    pub fn seed_drop(&self, author_id: Uuid, hours_old: i64, likes: u32, tags: &[&str]) -> Uuid {
        self.seed_drop_with_visibility(author_id, hours_old, likes, tags, Visibility::Global)
    }

    pub fn seed_drop_with_visibility(
        &self,
        author_id: Uuid,
        hours_old: i64,
        likes: u32,
        tags: &[&str],
        visibility: Visibility,
    ) -> Uuid {
        let record = DropRecord {
            id: Uuid::new_v4(),
            author_id,
            content: format!("drop by {}", author_id),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            visibility,
            created_at: self.now() - Duration::hours(hours_old),
            engagement: EngagementCounts {
                likes,
                ..Default::default()
            },
        };
        let id = record.id;
        self.store.insert_drop(record);
        id
    }
}

pub fn bearer(user_id: Uuid) -> (&'static str, String) {
    let token = issue_token(JWT_SECRET, user_id, 3600).expect("token signing");
    ("Authorization", format!("Bearer {}", token))
}
