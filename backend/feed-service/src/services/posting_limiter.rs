//! Per-author posting throttle
//!
//! Two rules guard the ranking pool from spam:
//! - minimum gap: no post before `last_post + min_gap`
//! - rate ceiling: at most `max_posts` inside a rolling `window`
//!
//! `try_accept_post` evaluates both rules and records the accepted timestamp
//! inside one critical section (the author's map entry lock), so concurrent
//! requests from the same author cannot both slip through.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::clock::Clock;
use crate::config::RankingPolicy;
use crate::metrics;

#[derive(Debug, Clone, Copy)]
pub struct PostingPolicy {
    pub max_posts: usize,
    pub window: Duration,
    pub min_gap: Duration,
}

impl PostingPolicy {
    pub fn from_policy(policy: &RankingPolicy) -> Self {
        Self {
            max_posts: policy.posting_max_posts,
            window: Duration::seconds(policy.posting_window_secs),
            min_gap: Duration::seconds(policy.posting_min_gap_secs),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostingDecision {
    pub can_post: bool,
    pub wait_time: Duration,
    pub message: String,
}

impl PostingDecision {
    fn allowed() -> Self {
        Self {
            can_post: true,
            wait_time: Duration::zero(),
            message: "You can post now".to_string(),
        }
    }

    /// Wait time rounded up to whole seconds.
    pub fn wait_time_secs(&self) -> u64 {
        let millis = self.wait_time.num_milliseconds().max(0) as u64;
        millis.div_ceil(1000)
    }
}

/// Recent accepted post timestamps of one author, oldest first.
#[derive(Debug, Clone, Default)]
pub struct PostingWindow {
    accepted: VecDeque<DateTime<Utc>>,
}

impl PostingWindow {
    fn prune(&mut self, now: DateTime<Utc>, window: Duration) {
        let horizon = now - window;
        while self.accepted.front().is_some_and(|ts| *ts <= horizon) {
            self.accepted.pop_front();
        }
    }

    fn is_idle(&self, now: DateTime<Utc>, policy: &PostingPolicy) -> bool {
        match self.accepted.back() {
            None => true,
            Some(last) => *last + policy.window.max(policy.min_gap) <= now,
        }
    }

    pub fn len(&self) -> usize {
        self.accepted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accepted.is_empty()
    }
}

/// Evaluate both rules against an already pruned window.
fn evaluate(window: &PostingWindow, now: DateTime<Utc>, policy: &PostingPolicy) -> PostingDecision {
    let gap_wait = window
        .accepted
        .back()
        .map(|last| *last + policy.min_gap - now)
        .filter(|wait| *wait > Duration::zero());

    let rate_wait = if window.accepted.len() >= policy.max_posts {
        window
            .accepted
            .front()
            .map(|oldest| *oldest + policy.window - now)
            .filter(|wait| *wait > Duration::zero())
    } else {
        None
    };

    let (wait, rate_bound) = match (gap_wait, rate_wait) {
        (None, None) => return PostingDecision::allowed(),
        (Some(gap), None) => (gap, false),
        (None, Some(rate)) => (rate, true),
        (Some(gap), Some(rate)) if rate >= gap => (rate, true),
        (Some(gap), Some(_)) => (gap, false),
    };

    let mut decision = PostingDecision {
        can_post: false,
        wait_time: wait,
        message: String::new(),
    };
    let secs = decision.wait_time_secs();
    decision.message = if rate_bound {
        rate_message(secs, policy)
    } else {
        gap_message(secs)
    };
    decision
}

fn gap_message(secs: u64) -> String {
    format!("Please wait {} seconds before posting again", secs)
}

fn rate_message(secs: u64, policy: &PostingPolicy) -> String {
    format!(
        "Posting limit reached ({} posts per {} minutes). Try again in {} seconds",
        policy.max_posts,
        policy.window.num_minutes().max(1),
        secs
    )
}

pub struct PostingLimiter {
    windows: DashMap<Uuid, PostingWindow>,
    policy: PostingPolicy,
    clock: Arc<dyn Clock>,
}

impl PostingLimiter {
    pub fn new(policy: PostingPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            windows: DashMap::new(),
            policy,
            clock,
        }
    }

    pub fn policy(&self) -> &PostingPolicy {
        &self.policy
    }

    /// Read-only pre-check. Does not reserve a slot.
    pub fn check_posting_limits(&self, author_id: Uuid) -> PostingDecision {
        let now = self.clock.now();
        match self.windows.get(&author_id) {
            Some(window) => {
                let mut snapshot = window.value().clone();
                drop(window);
                snapshot.prune(now, self.policy.window);
                evaluate(&snapshot, now, &self.policy)
            }
            None => PostingDecision::allowed(),
        }
    }

    /// Check both rules and, when they pass, record the post. Atomic per author.
    pub fn try_accept_post(&self, author_id: Uuid) -> (PostingDecision, DateTime<Utc>) {
        let now = self.clock.now();
        let mut window = self.windows.entry(author_id).or_default();
        window.prune(now, self.policy.window);

        let mut decision = evaluate(&window, now, &self.policy);
        if decision.can_post {
            window.accepted.push_back(now);
            decision.message = "Post accepted".to_string();
            metrics::record_posting_decision("accepted");
            debug!(author_id = %author_id, in_window = window.len(), "Post accepted by limiter");
        } else {
            metrics::record_posting_decision("rejected");
            info!(
                author_id = %author_id,
                wait_secs = decision.wait_time_secs(),
                "Post rejected by limiter"
            );
        }

        (decision, now)
    }

    /// Undo an acceptance whose content write failed afterwards.
    pub fn release_post(&self, author_id: Uuid, accepted_at: DateTime<Utc>) {
        if let Some(mut window) = self.windows.get_mut(&author_id) {
            if let Some(pos) = window.accepted.iter().rposition(|ts| *ts == accepted_at) {
                window.accepted.remove(pos);
                debug!(author_id = %author_id, "Released posting slot");
            }
        }
    }

    /// Earliest acceptance that can still influence a decision.
    pub fn lookback_start(&self) -> DateTime<Utc> {
        self.clock.now() - self.policy.window.max(self.policy.min_gap)
    }

    /// Seed windows from persisted acceptances, e.g. the posting log after a
    /// restart. Returns how many timestamps were added.
    pub fn restore<I>(&self, accepted: I) -> usize
    where
        I: IntoIterator<Item = (Uuid, DateTime<Utc>)>,
    {
        let mut restored = 0;
        for (author_id, at) in accepted {
            let mut window = self.windows.entry(author_id).or_default();
            let pos = window.accepted.partition_point(|ts| *ts < at);
            if window.accepted.get(pos) == Some(&at) {
                continue;
            }
            window.accepted.insert(pos, at);
            restored += 1;
        }

        let now = self.clock.now();
        self.windows
            .retain(|_, window| !window.is_idle(now, &self.policy));
        metrics::set_posting_windows_tracked(self.windows.len());
        restored
    }

    /// Drop windows that can no longer influence a decision. Returns removed count.
    pub fn purge_idle(&self) -> usize {
        let now = self.clock.now();
        let before = self.windows.len();
        self.windows
            .retain(|_, window| !window.is_idle(now, &self.policy));
        before.saturating_sub(self.windows.len())
    }

    pub fn tracked_authors(&self) -> usize {
        self.windows.len()
    }
}
