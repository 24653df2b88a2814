//! Ranked feed assembly
//!
//! One request runs: cache lookup (first page only), follow graph lookup
//! (following feed only), candidate pool fetch, visibility filter, scoring,
//! total ordering, cursor slicing and a cache write-through.
//!
//! The pool is read newest-first and cut into fixed-size segments. Each
//! segment is ranked on its own and segments are concatenated in order, so
//! growing the pool for a deeper page only appends older segments behind the
//! ones already served; it never inserts a drop ahead of the cursor.
//!
//! The cursor carries the last served drop id, the number of items served and
//! the segment size of the session. The id locates the next slice, the count
//! sizes the pool so deeper pages still have candidates.

use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::cache::{FeedCache, FeedCacheKey};
use crate::clients::{CandidateFilter, ContentStore, FollowGraph};
use crate::clock::Clock;
use crate::config::RankingPolicy;
use crate::error::Result;
use crate::metrics;
use crate::models::{
    Candidate, DropView, EngagementCounts, FeedPage, FeedResponse, FeedType, ScoredCandidate,
    Visibility,
};
use crate::services::cursor::FeedCursor;
use crate::services::decay::DecayCalculator;
use crate::services::interests::{calculate_interest_boost, InterestProfile, InterestTracker};
use crate::utils::with_upstream_timeout;

#[derive(Debug, Clone, Copy)]
pub struct EngagementWeights {
    pub like: f64,
    pub dislike: f64,
    pub reply: f64,
    pub share: f64,
}

impl EngagementWeights {
    pub fn from_policy(policy: &RankingPolicy) -> Self {
        Self {
            like: policy.engagement_like_weight,
            dislike: policy.engagement_dislike_weight,
            reply: policy.engagement_reply_weight,
            share: policy.engagement_share_weight,
        }
    }

    pub fn base_engagement(&self, counts: &EngagementCounts) -> f64 {
        counts.likes as f64 * self.like - counts.dislikes as f64 * self.dislike
            + counts.replies as f64 * self.reply
            + counts.shares as f64 * self.share
    }
}

/// Segment size for a session that starts with pages of `limit` items.
pub fn segment_size(policy: &RankingPolicy, limit: usize) -> usize {
    limit
        .saturating_mul(policy.pool_multiplier)
        .max(policy.pool_floor)
        .min(policy.pool_cap)
        .max(1)
}

/// Candidates to fetch for a request that has already served `served` items.
///
/// Whole segments covering the next page plus one look-ahead item, capped at
/// `pool_cap`.
pub fn pool_size(policy: &RankingPolicy, segment: usize, served: usize, limit: usize) -> usize {
    let segment = segment.max(1);
    served
        .saturating_add(limit)
        .saturating_add(1)
        .div_ceil(segment)
        .saturating_mul(segment)
        .min(policy.pool_cap)
}

/// Whether `candidate` may appear in a feed of `feed_type`.
///
/// `following` is the viewer's followed-author set and is only consulted for
/// the following feed.
pub fn visible_in_feed(
    feed_type: FeedType,
    following: Option<&HashSet<Uuid>>,
    candidate: &Candidate,
) -> bool {
    match feed_type {
        FeedType::Global => candidate.visibility == Visibility::Global,
        FeedType::Following => {
            following.is_some_and(|authors| authors.contains(&candidate.author_id))
        }
    }
}

pub fn score_candidate(
    candidate: Candidate,
    profile: &InterestProfile,
    weights: &EngagementWeights,
    decay: &DecayCalculator,
    now: DateTime<Utc>,
) -> ScoredCandidate {
    let base_engagement = weights.base_engagement(&candidate.engagement);
    let interest_boost = calculate_interest_boost(&candidate.topics, profile);
    let time_decay = decay.time_decay(candidate.created_at, now);
    let engagement_decay = decay.engagement_decay(base_engagement, candidate.created_at, now);

    // Clamped so heavily disliked drops cannot invert the recency ordering.
    let final_score = (base_engagement + interest_boost).max(0.0) * time_decay * engagement_decay;

    ScoredCandidate {
        candidate,
        base_engagement,
        interest_boost,
        time_decay,
        engagement_decay,
        final_score,
    }
}

/// Descending score, then newer first, then by id.
pub fn rank_order(a: &ScoredCandidate, b: &ScoredCandidate) -> Ordering {
    b.final_score
        .total_cmp(&a.final_score)
        .then_with(|| b.candidate.created_at.cmp(&a.candidate.created_at))
        .then_with(|| b.candidate.id.cmp(&a.candidate.id))
}

/// Rank a newest-first pool segment by segment.
///
/// The pool position, not the post-filter position, decides a candidate's
/// segment, so a longer fetch of the same pool keeps earlier segments intact.
pub fn rank_segmented<F>(pool: Vec<Candidate>, segment: usize, mut score: F) -> Vec<ScoredCandidate>
where
    F: FnMut(Candidate) -> Option<ScoredCandidate>,
{
    let segment = segment.max(1);
    let mut ranked: Vec<(usize, ScoredCandidate)> = pool
        .into_iter()
        .enumerate()
        .filter_map(|(pos, candidate)| score(candidate).map(|scored| (pos / segment, scored)))
        .collect();
    ranked.sort_by(|(sa, a), (sb, b)| sa.cmp(sb).then_with(|| rank_order(a, b)));
    ranked.into_iter().map(|(_, scored)| scored).collect()
}

/// Slice a ranked list after `cursor`.
///
/// A cursor whose drop is no longer in the ranking restarts from the top.
pub fn paginate(
    ranked: Vec<ScoredCandidate>,
    cursor: Option<&FeedCursor>,
    limit: usize,
    segment: usize,
) -> FeedPage {
    let start = match cursor {
        None => 0,
        Some(cursor) => match ranked.iter().position(|s| s.candidate.id == cursor.drop_id) {
            Some(pos) => pos + 1,
            None => {
                metrics::record_pagination_restart();
                debug!(
                    drop_id = %cursor.drop_id,
                    "Cursor drop no longer ranked, restarting from top"
                );
                0
            }
        },
    };
    // Restarted pages count from zero again.
    let served_before = if start == 0 { 0 } else { cursor.map_or(0, |c| c.served) };

    let end = start.saturating_add(limit).min(ranked.len());
    let has_more = end < ranked.len();
    let items: Vec<ScoredCandidate> = ranked
        .into_iter()
        .skip(start)
        .take(end.saturating_sub(start))
        .collect();

    let next_cursor = items
        .last()
        .map(|last| FeedCursor::new(served_before + items.len(), segment, last.candidate.id).encode());

    FeedPage {
        items,
        next_cursor,
        has_more,
    }
}

pub struct FeedAssembler {
    content_store: Arc<dyn ContentStore>,
    follow_graph: Arc<dyn FollowGraph>,
    interests: Arc<InterestTracker>,
    cache: FeedCache,
    clock: Arc<dyn Clock>,
    policy: RankingPolicy,
    decay: DecayCalculator,
    weights: EngagementWeights,
    upstream_timeout: Duration,
}

impl FeedAssembler {
    pub fn new(
        content_store: Arc<dyn ContentStore>,
        follow_graph: Arc<dyn FollowGraph>,
        interests: Arc<InterestTracker>,
        cache: FeedCache,
        clock: Arc<dyn Clock>,
        policy: RankingPolicy,
        upstream_timeout: Duration,
    ) -> Self {
        Self {
            content_store,
            follow_graph,
            interests,
            cache,
            clock,
            decay: DecayCalculator::new(&policy),
            weights: EngagementWeights::from_policy(&policy),
            policy,
            upstream_timeout,
        }
    }

    pub fn policy(&self) -> &RankingPolicy {
        &self.policy
    }

    /// Assemble one page of `user_id`'s feed.
    ///
    /// A cursor that does not decode is treated as absent. Upstream failures
    /// return `UpstreamUnavailable`; no cached page is served in their place.
    pub async fn get_feed(
        &self,
        user_id: Uuid,
        cursor: Option<&str>,
        limit: usize,
        feed_type: FeedType,
    ) -> Result<FeedPage> {
        let started = Instant::now();
        let limit = limit.clamp(1, self.policy.max_page_size.max(1));

        let cursor = match cursor.map(str::trim).filter(|raw| !raw.is_empty()) {
            None => None,
            Some(raw) => {
                let decoded = FeedCursor::decode(raw);
                if decoded.is_none() {
                    debug!(user_id = %user_id, "Malformed feed cursor, serving first page");
                }
                decoded
            }
        };

        let cache_key = cursor
            .is_none()
            .then(|| FeedCacheKey::first_page(user_id, feed_type, limit));

        if let Some(key) = &cache_key {
            if let Some(page) = self.cache.get(key).await {
                metrics::observe_feed_assembly(feed_type.as_str(), "cache", started.elapsed());
                return Ok(page);
            }
        }

        let now = self.clock.now();

        let (filter, following) = match feed_type {
            FeedType::Global => (CandidateFilter::global(), None),
            FeedType::Following => {
                let authors = with_upstream_timeout(
                    "follow_graph",
                    self.upstream_timeout,
                    self.follow_graph.get_following(user_id),
                )
                .await?;
                let set: HashSet<Uuid> = authors.iter().copied().collect();
                (CandidateFilter::following(authors), Some(set))
            }
        };

        let served = cursor.map_or(0, |c| c.served);
        let segment = cursor.map_or_else(
            || segment_size(&self.policy, limit),
            |c| c.segment.clamp(1, self.policy.pool_cap.max(1)),
        );
        let pool_size = pool_size(&self.policy, segment, served, limit);
        let min_recency = now - chrono::Duration::hours(self.policy.max_candidate_age_hours);

        let pool = with_upstream_timeout(
            "content_store",
            self.upstream_timeout,
            self.content_store
                .fetch_candidate_pool(&filter, min_recency, pool_size),
        )
        .await?;

        let profile = self.interests.get_user_interests(user_id);
        let ranked = rank_segmented(pool, segment, |c| {
            visible_in_feed(feed_type, following.as_ref(), &c)
                .then(|| score_candidate(c, &profile, &self.weights, &self.decay, now))
        });

        metrics::observe_candidates_scored(feed_type.as_str(), ranked.len());
        debug!(
            user_id = %user_id,
            feed_type = feed_type.as_str(),
            pool_size,
            segment,
            ranked = ranked.len(),
            "Ranked candidate pool"
        );

        let page = paginate(ranked, cursor.as_ref(), limit, segment);

        if let Some(key) = cache_key {
            self.write_through(key, page.clone()).await;
        }

        metrics::observe_feed_assembly(feed_type.as_str(), "ranked", started.elapsed());
        Ok(page)
    }

    /// Attach the viewer's reactions. Reaction lookup failures degrade to
    /// "no reaction" instead of failing the feed.
    pub async fn enrich(&self, viewer_id: Uuid, page: FeedPage) -> FeedResponse {
        let ids: Vec<Uuid> = page.items.iter().map(|s| s.candidate.id).collect();

        let reactions = if ids.is_empty() {
            HashMap::new()
        } else {
            with_upstream_timeout(
                "content_store",
                self.upstream_timeout,
                self.content_store.viewer_reactions(viewer_id, &ids),
            )
            .await
            .unwrap_or_else(|e| {
                warn!(viewer_id = %viewer_id, error = %e, "Viewer reactions unavailable");
                HashMap::new()
            })
        };

        FeedResponse {
            drops: page
                .items
                .iter()
                .map(|s| DropView::from_candidate(&s.candidate, reactions.get(&s.candidate.id).copied()))
                .collect(),
            next_cursor: page.next_cursor,
            has_more: page.has_more,
        }
    }

    async fn write_through(&self, key: FeedCacheKey, page: FeedPage) {
        let ttl = chrono::Duration::seconds(self.policy.feed_cache_ttl_secs);
        let cache = self.cache.clone();

        let wait = cache.op_timeout();

        // Spawned so the write completes even if this request is dropped.
        // The response waits at most one cache timeout for it.
        let handle = tokio::spawn(async move { cache.set(&key, page, ttl).await });
        match tokio::time::timeout(wait, handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "Feed cache write task failed"),
            Err(_) => debug!("Feed cache write still pending, continuing in background"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{FeedCacheStore, InMemoryFeedStore, StalledFeedStore};
    use crate::clients::{InMemoryContentStore, InMemoryFollowGraph};
    use crate::clock::ManualClock;
    use crate::error::AppError;
    use crate::models::{DropRecord, NewDrop, Reaction};
    use crate::services::interests::{InteractionKind, InterestWeights};
    use crate::services::topics::Topic;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};

    /// In-memory store that can be switched into failure or slow mode.
    struct FlakyContentStore {
        inner: Arc<InMemoryContentStore>,
        failing: AtomicBool,
        slow: AtomicBool,
    }

    impl FlakyContentStore {
        async fn gate(&self) -> Result<()> {
            if self.slow.load(AtomicOrdering::SeqCst) {
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
            if self.failing.load(AtomicOrdering::SeqCst) {
                return Err(AppError::Database("connection reset".to_string()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl ContentStore for FlakyContentStore {
        async fn fetch_candidate_pool(
            &self,
            filter: &CandidateFilter,
            min_recency: DateTime<Utc>,
            pool_size: usize,
        ) -> Result<Vec<Candidate>> {
            self.gate().await?;
            self.inner
                .fetch_candidate_pool(filter, min_recency, pool_size)
                .await
        }

        async fn record_post_accepted(&self, author_id: Uuid, at: DateTime<Utc>) -> Result<()> {
            self.inner.record_post_accepted(author_id, at).await
        }

        async fn recent_posts(&self, since: DateTime<Utc>) -> Result<Vec<(Uuid, DateTime<Utc>)>> {
            self.inner.recent_posts(since).await
        }

        async fn create_drop(
            &self,
            author_id: Uuid,
            new_drop: &NewDrop,
            created_at: DateTime<Utc>,
        ) -> Result<DropRecord> {
            self.inner.create_drop(author_id, new_drop, created_at).await
        }

        async fn get_drop(&self, drop_id: Uuid) -> Result<Option<DropRecord>> {
            self.inner.get_drop(drop_id).await
        }

        async fn viewer_reactions(
            &self,
            viewer_id: Uuid,
            drop_ids: &[Uuid],
        ) -> Result<HashMap<Uuid, Reaction>> {
            self.gate().await?;
            self.inner.viewer_reactions(viewer_id, drop_ids).await
        }
    }

    struct Harness {
        assembler: FeedAssembler,
        store: Arc<InMemoryContentStore>,
        flaky: Arc<FlakyContentStore>,
        graph: Arc<InMemoryFollowGraph>,
        interests: Arc<InterestTracker>,
        clock: ManualClock,
        now: DateTime<Utc>,
    }

    fn harness() -> Harness {
        harness_with_cache(Arc::new(InMemoryFeedStore::new()))
    }

    fn harness_with_cache(cache_store: Arc<dyn FeedCacheStore>) -> Harness {
        let policy = RankingPolicy::default();
        let now = Utc::now();
        let clock = ManualClock::new(now);
        let store = Arc::new(InMemoryContentStore::new());
        let flaky = Arc::new(FlakyContentStore {
            inner: store.clone(),
            failing: AtomicBool::new(false),
            slow: AtomicBool::new(false),
        });
        let graph = Arc::new(InMemoryFollowGraph::new());
        let interests = Arc::new(InterestTracker::new(InterestWeights::from_policy(&policy)));
        let cache = FeedCache::new(cache_store, Arc::new(clock.clone()))
            .with_op_timeout(Duration::from_millis(200));

        let assembler = FeedAssembler::new(
            flaky.clone(),
            graph.clone(),
            interests.clone(),
            cache,
            Arc::new(clock.clone()),
            policy,
            Duration::from_millis(200),
        );

        Harness {
            assembler,
            store,
            flaky,
            graph,
            interests,
            clock,
            now,
        }
    }

    fn drop_record(
        author_id: Uuid,
        created_at: DateTime<Utc>,
        likes: u32,
        tags: &[&str],
        visibility: Visibility,
    ) -> DropRecord {
        DropRecord {
            id: Uuid::new_v4(),
            author_id,
            content: "drop".to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            visibility,
            created_at,
            engagement: EngagementCounts {
                likes,
                ..Default::default()
            },
        }
    }

    fn ids(page: &FeedPage) -> Vec<Uuid> {
        page.items.iter().map(|s| s.candidate.id).collect()
    }

    #[test]
    fn test_base_engagement_weights() {
        let weights = EngagementWeights::from_policy(&RankingPolicy::default());
        let counts = EngagementCounts {
            likes: 10,
            dislikes: 4,
            shares: 2,
            replies: 3,
        };
        assert!((weights.base_engagement(&counts) - 9.5).abs() < 1e-9);
    }

    #[test]
    fn test_pool_size_scales_with_depth_and_is_capped() {
        let policy = RankingPolicy::default();
        assert_eq!(segment_size(&policy, 10), 50);
        assert_eq!(segment_size(&policy, 20), 60);
        assert_eq!(pool_size(&policy, 50, 0, 10), 50);
        assert_eq!(pool_size(&policy, 50, 40, 10), 100);
        assert_eq!(pool_size(&policy, 60, 40, 20), 120);
        assert_eq!(pool_size(&policy, 60, 10_000, 20), 500);
    }

    #[test]
    fn test_older_segments_rank_behind_newer_ones() {
        let now = Utc::now();
        let policy = RankingPolicy::default();
        let decay = DecayCalculator::new(&policy);
        let weights = EngagementWeights::from_policy(&policy);
        let author = Uuid::new_v4();

        // Newest-first pool: two quiet drops, then two popular older ones.
        let pool: Vec<Candidate> = [(0, 0), (1, 0), (2, 500), (3, 500)]
            .into_iter()
            .map(|(hours, likes)| {
                drop_record(author, now - chrono::Duration::hours(hours), likes, &[], Visibility::Global)
                    .to_candidate()
            })
            .collect();
        let newest_first: Vec<Uuid> = pool.iter().map(|c| c.id).collect();
        let profile = InterestProfile::default();

        let ranked = rank_segmented(pool, 2, |c| {
            Some(score_candidate(c, &profile, &weights, &decay, now))
        });
        let order: Vec<Uuid> = ranked.iter().map(|s| s.candidate.id).collect();

        assert_eq!(order[..2], newest_first[..2]);
        assert!(order[2..].contains(&newest_first[2]));
        assert!(order[2..].contains(&newest_first[3]));
    }

    #[test]
    fn test_interest_boost_outranks_freshness() {
        let policy = RankingPolicy::default();
        let decay = DecayCalculator::new(&policy);
        let weights = EngagementWeights::from_policy(&policy);
        let now = Utc::now();
        let author = Uuid::new_v4();

        let a = drop_record(author, now - chrono::Duration::hours(1), 10, &[], Visibility::Global)
            .to_candidate();
        let b = drop_record(
            author,
            now - chrono::Duration::hours(100),
            10,
            &["music"],
            Visibility::Global,
        )
        .to_candidate();

        let mut profile = InterestProfile::default();
        profile.weights.insert(Topic::Music, 50.0);

        let a = score_candidate(a, &profile, &weights, &decay, now);
        let b = score_candidate(b, &profile, &weights, &decay, now);

        assert!((a.final_score - 9.82).abs() < 0.05, "A = {}", a.final_score);
        assert!((b.final_score - 12.50).abs() < 0.05, "B = {}", b.final_score);
        assert_eq!(rank_order(&b, &a), Ordering::Less, "B ranks ahead of A");
    }

    #[test]
    fn test_newer_never_scores_below_older() {
        let policy = RankingPolicy::default();
        let decay = DecayCalculator::new(&policy);
        let weights = EngagementWeights::from_policy(&policy);
        let now = Utc::now();
        let author = Uuid::new_v4();

        for likes in [0, 1, 10, 1000] {
            let mut previous = f64::INFINITY;
            for hours in [0, 1, 12, 48, 200, 700] {
                let c = drop_record(
                    author,
                    now - chrono::Duration::hours(hours),
                    likes,
                    &["tech"],
                    Visibility::Global,
                )
                .to_candidate();
                let score =
                    score_candidate(c, &InterestProfile::default(), &weights, &decay, now).final_score;
                assert!(score <= previous, "likes={} hours={}", likes, hours);
                previous = score;
            }
        }
    }

    #[test]
    fn test_negative_engagement_clamps_to_zero() {
        let policy = RankingPolicy::default();
        let mut candidate =
            drop_record(Uuid::new_v4(), Utc::now(), 0, &[], Visibility::Global).to_candidate();
        candidate.engagement.dislikes = 50;

        let scored = score_candidate(
            candidate,
            &InterestProfile::default(),
            &EngagementWeights::from_policy(&policy),
            &DecayCalculator::new(&policy),
            Utc::now(),
        );
        assert_eq!(scored.final_score, 0.0);
        assert!(scored.base_engagement < 0.0);
    }

    #[test]
    fn test_visibility_rules() {
        let me_follow = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        let following: HashSet<Uuid> = [me_follow].into_iter().collect();
        let now = Utc::now();

        let followed_private =
            drop_record(me_follow, now, 0, &[], Visibility::Following).to_candidate();
        let stranger_global = drop_record(stranger, now, 0, &[], Visibility::Global).to_candidate();

        assert!(!visible_in_feed(FeedType::Global, None, &followed_private));
        assert!(visible_in_feed(FeedType::Global, None, &stranger_global));
        assert!(visible_in_feed(FeedType::Following, Some(&following), &followed_private));
        assert!(!visible_in_feed(FeedType::Following, Some(&following), &stranger_global));
    }

    #[test]
    fn test_ties_break_by_recency_then_id() {
        let now = Utc::now();
        let policy = RankingPolicy::default();
        let make = |created_at| ScoredCandidate {
            candidate: drop_record(Uuid::new_v4(), created_at, 0, &[], Visibility::Global)
                .to_candidate(),
            base_engagement: 0.0,
            interest_boost: 0.0,
            time_decay: policy.time_decay_floor,
            engagement_decay: 1.0,
            final_score: 1.0,
        };
        let older = make(now - chrono::Duration::hours(1));
        let newer = make(now);
        assert_eq!(rank_order(&newer, &older), Ordering::Less);

        let twin = ScoredCandidate {
            candidate: Candidate {
                id: Uuid::new_v4(),
                ..newer.candidate.clone()
            },
            ..newer.clone()
        };
        assert_ne!(rank_order(&newer, &twin), Ordering::Equal);
    }

    #[tokio::test]
    async fn test_pagination_is_exhaustive_and_disjoint() {
        let h = harness();
        let author = Uuid::new_v4();
        for i in 0..45u32 {
            h.store.insert_drop(drop_record(
                author,
                h.now - chrono::Duration::hours(i as i64),
                (i * 7) % 13,
                &["music"],
                Visibility::Global,
            ));
        }

        let user = Uuid::new_v4();
        let mut seen = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let page = h
                .assembler
                .get_feed(user, cursor.as_deref(), 10, FeedType::Global)
                .await
                .unwrap();
            seen.extend(ids(&page));
            if !page.has_more {
                break;
            }
            cursor = page.next_cursor.clone();
            assert!(cursor.is_some());
        }

        let unique: HashSet<Uuid> = seen.iter().copied().collect();
        assert_eq!(seen.len(), 45);
        assert_eq!(unique.len(), 45);
    }

    #[tokio::test]
    async fn test_pagination_beyond_pool_floor_serves_every_drop() {
        let h = harness();
        let author = Uuid::new_v4();
        // Newest 50 have no likes; the 70 behind them are popular.
        for i in 0..120i64 {
            let likes = if i < 50 { 0 } else { 200 };
            h.store.insert_drop(drop_record(
                author,
                h.now - chrono::Duration::minutes(i),
                likes,
                &[],
                Visibility::Global,
            ));
        }

        let user = Uuid::new_v4();
        let mut seen = Vec::new();
        let mut cursor: Option<String> = None;
        for _ in 0..20 {
            let page = h
                .assembler
                .get_feed(user, cursor.as_deref(), 10, FeedType::Global)
                .await
                .unwrap();
            seen.extend(ids(&page));
            if !page.has_more {
                break;
            }
            cursor = page.next_cursor.clone();
        }

        let unique: HashSet<Uuid> = seen.iter().copied().collect();
        assert_eq!(seen.len(), 120);
        assert_eq!(unique.len(), 120);
    }

    #[tokio::test]
    async fn test_stalled_cache_does_not_block_feed() {
        let h = harness_with_cache(Arc::new(StalledFeedStore));
        h.store
            .insert_drop(drop_record(Uuid::new_v4(), h.now, 1, &[], Visibility::Global));

        let started = Instant::now();
        let page = h
            .assembler
            .get_feed(Uuid::new_v4(), None, 10, FeedType::Global)
            .await
            .unwrap();

        assert_eq!(page.items.len(), 1);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_unknown_cursor_restarts_from_top() {
        let h = harness();
        for i in 0..5 {
            h.store.insert_drop(drop_record(
                Uuid::new_v4(),
                h.now - chrono::Duration::hours(i),
                3,
                &[],
                Visibility::Global,
            ));
        }
        let user = Uuid::new_v4();

        let first = h
            .assembler
            .get_feed(user, None, 3, FeedType::Global)
            .await
            .unwrap();
        let stale = FeedCursor::new(3, 50, Uuid::new_v4()).encode();
        let restarted = h
            .assembler
            .get_feed(user, Some(&stale), 3, FeedType::Global)
            .await
            .unwrap();

        assert_eq!(ids(&first), ids(&restarted));
    }

    #[tokio::test]
    async fn test_malformed_cursor_is_ignored() {
        let h = harness();
        h.store
            .insert_drop(drop_record(Uuid::new_v4(), h.now, 1, &[], Visibility::Global));

        let page = h
            .assembler
            .get_feed(Uuid::new_v4(), Some("%%%not-a-cursor"), 10, FeedType::Global)
            .await
            .unwrap();
        assert_eq!(page.items.len(), 1);
    }

    #[tokio::test]
    async fn test_first_page_is_sticky_within_ttl() {
        let h = harness();
        let author = Uuid::new_v4();
        let low = drop_record(author, h.now, 1, &[], Visibility::Global);
        let high = drop_record(author, h.now, 5, &[], Visibility::Global);
        let low_id = low.id;
        h.store.insert_drop(low);
        h.store.insert_drop(high);
        let user = Uuid::new_v4();

        let first = h
            .assembler
            .get_feed(user, None, 10, FeedType::Global)
            .await
            .unwrap();

        // Re-ranking inputs change, but the cached page must not.
        h.store.set_engagement(
            low_id,
            EngagementCounts {
                likes: 100,
                ..Default::default()
            },
        );
        h.store
            .insert_drop(drop_record(author, h.now, 50, &[], Visibility::Global));
        h.clock.advance(chrono::Duration::seconds(10));

        let second = h
            .assembler
            .get_feed(user, None, 10, FeedType::Global)
            .await
            .unwrap();
        assert_eq!(first, second);

        h.clock.advance(chrono::Duration::seconds(30));
        let third = h
            .assembler
            .get_feed(user, None, 10, FeedType::Global)
            .await
            .unwrap();
        assert_ne!(first, third);
        assert_eq!(third.items.len(), 3);
        assert_eq!(third.items[0].candidate.id, low_id);
    }

    #[tokio::test]
    async fn test_upstream_failure_is_not_masked_by_cache() {
        let h = harness();
        h.store
            .insert_drop(drop_record(Uuid::new_v4(), h.now, 1, &[], Visibility::Global));
        let user = Uuid::new_v4();

        h.assembler
            .get_feed(user, None, 10, FeedType::Global)
            .await
            .unwrap();
        h.clock.advance(chrono::Duration::seconds(60));
        h.flaky.failing.store(true, AtomicOrdering::SeqCst);

        let result = h.assembler.get_feed(user, None, 10, FeedType::Global).await;
        assert!(matches!(result, Err(AppError::UpstreamUnavailable(_))));
    }

    #[tokio::test]
    async fn test_slow_content_store_times_out() {
        let h = harness();
        h.flaky.slow.store(true, AtomicOrdering::SeqCst);

        let result = h
            .assembler
            .get_feed(Uuid::new_v4(), None, 10, FeedType::Global)
            .await;
        assert!(matches!(result, Err(AppError::UpstreamUnavailable(_))));
    }

    #[tokio::test]
    async fn test_following_feed_only_shows_followed_authors() {
        let h = harness();
        let user = Uuid::new_v4();
        let friend = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        h.graph.follow(user, friend);

        h.store
            .insert_drop(drop_record(friend, h.now, 1, &[], Visibility::Global));
        h.store
            .insert_drop(drop_record(friend, h.now, 1, &[], Visibility::Following));
        h.store
            .insert_drop(drop_record(stranger, h.now, 1, &[], Visibility::Global));
        h.store
            .insert_drop(drop_record(stranger, h.now, 1, &[], Visibility::Following));

        let following = h
            .assembler
            .get_feed(user, None, 10, FeedType::Following)
            .await
            .unwrap();
        assert_eq!(following.items.len(), 2);
        assert!(following
            .items
            .iter()
            .all(|s| s.candidate.author_id == friend));

        let global = h
            .assembler
            .get_feed(user, None, 10, FeedType::Global)
            .await
            .unwrap();
        assert_eq!(global.items.len(), 2);
        assert!(global
            .items
            .iter()
            .all(|s| s.candidate.visibility == Visibility::Global));
    }

    #[tokio::test]
    async fn test_tracked_interest_lifts_matching_drop() {
        let h = harness();
        let user = Uuid::new_v4();
        let author = Uuid::new_v4();
        let fresh = drop_record(author, h.now - chrono::Duration::hours(1), 10, &[], Visibility::Global);
        let old_music = drop_record(
            author,
            h.now - chrono::Duration::hours(100),
            10,
            &["music"],
            Visibility::Global,
        );
        let old_id = old_music.id;
        h.store.insert_drop(fresh);
        h.store.insert_drop(old_music);

        for _ in 0..10 {
            h.interests
                .track_interest(user, &[Topic::Music], InteractionKind::Save);
        }

        let page = h
            .assembler
            .get_feed(user, None, 10, FeedType::Global)
            .await
            .unwrap();
        assert_eq!(page.items[0].candidate.id, old_id);
    }

    #[tokio::test]
    async fn test_enrich_marks_viewer_reactions() {
        let h = harness();
        let viewer = Uuid::new_v4();
        let mut liked = drop_record(Uuid::new_v4(), h.now, 4, &[], Visibility::Global);
        liked.engagement.dislikes = 1;
        let liked_id = liked.id;
        h.store.insert_drop(liked);
        h.store.set_reaction(viewer, liked_id, Reaction::Like);

        let page = h
            .assembler
            .get_feed(viewer, None, 10, FeedType::Global)
            .await
            .unwrap();
        let response = h.assembler.enrich(viewer, page).await;

        assert_eq!(response.drops.len(), 1);
        assert!(response.drops[0].is_liked);
        assert!(!response.drops[0].is_disliked);
        assert_eq!(response.drops[0].aura, 3);
    }

    #[tokio::test]
    async fn test_enrich_degrades_when_reactions_fail() {
        let h = harness();
        h.store
            .insert_drop(drop_record(Uuid::new_v4(), h.now, 1, &[], Visibility::Global));
        let viewer = Uuid::new_v4();

        let page = h
            .assembler
            .get_feed(viewer, None, 10, FeedType::Global)
            .await
            .unwrap();
        h.flaky.failing.store(true, AtomicOrdering::SeqCst);
        let response = h.assembler.enrich(viewer, page).await;

        assert_eq!(response.drops.len(), 1);
        assert!(!response.drops[0].is_liked);
    }
}
