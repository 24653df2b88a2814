//! Per-user topic affinity
//!
//! Interaction events add a kind-dependent weight to each topic of the drop
//! the user interacted with. Weights accumulate and are clamped at zero, so a
//! dislike can cancel affinity but never produce a negative profile.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;
use uuid::Uuid;

use crate::config::RankingPolicy;
use crate::services::topics::Topic;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionKind {
    Like,
    Dislike,
    Share,
    Save,
    Follow,
}

impl InteractionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionKind::Like => "like",
            InteractionKind::Dislike => "dislike",
            InteractionKind::Share => "share",
            InteractionKind::Save => "save",
            InteractionKind::Follow => "follow",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct InterestWeights {
    pub like: f64,
    pub dislike: f64,
    pub share: f64,
    pub save: f64,
    pub follow: f64,
}

impl InterestWeights {
    pub fn from_policy(policy: &RankingPolicy) -> Self {
        Self {
            like: policy.interest_like_weight,
            dislike: policy.interest_dislike_weight,
            share: policy.interest_share_weight,
            save: policy.interest_save_weight,
            follow: policy.interest_follow_weight,
        }
    }

    pub fn weight(&self, kind: InteractionKind) -> f64 {
        match kind {
            InteractionKind::Like => self.like,
            InteractionKind::Dislike => self.dislike,
            InteractionKind::Share => self.share,
            InteractionKind::Save => self.save,
            InteractionKind::Follow => self.follow,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InterestProfile {
    pub weights: BTreeMap<Topic, f64>,
}

impl InterestProfile {
    pub fn weight(&self, topic: Topic) -> f64 {
        self.weights.get(&topic).copied().unwrap_or(0.0)
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    fn apply(&mut self, topic: Topic, delta: f64) {
        let entry = self.weights.entry(topic).or_insert(0.0);
        *entry = (*entry + delta).max(0.0);
    }
}

/// Sum of the profile weight of every topic the candidate carries.
pub fn calculate_interest_boost(topics: &[Topic], profile: &InterestProfile) -> f64 {
    topics.iter().map(|topic| profile.weight(*topic)).sum()
}

pub struct InterestTracker {
    profiles: DashMap<Uuid, InterestProfile>,
    weights: InterestWeights,
}

impl InterestTracker {
    pub fn new(weights: InterestWeights) -> Self {
        Self {
            profiles: DashMap::new(),
            weights,
        }
    }

    /// Record one interaction. Creates the profile on first use.
    pub fn track_interest(&self, user_id: Uuid, topics: &[Topic], kind: InteractionKind) {
        if topics.is_empty() {
            return;
        }

        let delta = self.weights.weight(kind);
        let mut profile = self.profiles.entry(user_id).or_default();
        for topic in topics {
            profile.apply(*topic, delta);
        }

        debug!(
            user_id = %user_id,
            kind = kind.as_str(),
            topics = topics.len(),
            delta,
            "Interest tracked"
        );
    }

    /// Snapshot of a user's profile; unknown users get an empty profile.
    pub fn get_user_interests(&self, user_id: Uuid) -> InterestProfile {
        self.profiles
            .get(&user_id)
            .map(|p| p.value().clone())
            .unwrap_or_default()
    }

    pub fn tracked_users(&self) -> usize {
        self.profiles.len()
    }
}
