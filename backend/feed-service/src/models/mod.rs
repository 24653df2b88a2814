use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::services::topics::{map_tags_to_topics, Topic};

/// Who may see a drop in ranked feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Global,
    Following,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Global => "global",
            Visibility::Following => "following",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedType {
    Global,
    Following,
}

impl FeedType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedType::Global => "global",
            FeedType::Following => "following",
        }
    }

    /// Lenient parse used by the HTTP layer; unknown values yield `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "global" => Some(FeedType::Global),
            "following" => Some(FeedType::Following),
            _ => None,
        }
    }
}

/// Raw engagement counters as stored by the content store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngagementCounts {
    pub likes: u32,
    pub dislikes: u32,
    pub shares: u32,
    pub replies: u32,
}

impl EngagementCounts {
    /// Public, undecayed counter shown to users.
    pub fn aura(&self) -> i64 {
        self.likes as i64 - self.dislikes as i64
    }
}

/// A drop eligible for ranking. Immutable for the duration of a scoring pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: Uuid,
    pub author_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub engagement: EngagementCounts,
    pub topics: Vec<Topic>,
    pub visibility: Visibility,
}

/// A candidate with every component of its score, kept for one ranking pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub candidate: Candidate,
    pub base_engagement: f64,
    pub interest_boost: f64,
    pub time_decay: f64,
    pub engagement_decay: f64,
    pub final_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedPage {
    pub items: Vec<ScoredCandidate>,
    pub next_cursor: Option<String>,
    pub has_more: bool,
}

impl FeedPage {
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            next_cursor: None,
            has_more: false,
        }
    }
}

/// The requesting user's reaction to a drop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reaction {
    Like,
    Dislike,
}

/// Body of `POST /drops`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDrop {
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "default_visibility")]
    pub visibility: Visibility,
}

fn default_visibility() -> Visibility {
    Visibility::Global
}

/// A stored drop as returned by the content store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DropRecord {
    pub id: Uuid,
    pub author_id: Uuid,
    pub content: String,
    pub tags: Vec<String>,
    pub visibility: Visibility,
    pub created_at: DateTime<Utc>,
    pub engagement: EngagementCounts,
}

impl DropRecord {
    /// Ranking view of the drop; free-form tags become taxonomy topics here.
    pub fn to_candidate(&self) -> Candidate {
        Candidate {
            id: self.id,
            author_id: self.author_id,
            content: self.content.clone(),
            created_at: self.created_at,
            engagement: self.engagement,
            topics: map_tags_to_topics(&self.tags),
            visibility: self.visibility,
        }
    }
}

/// Feed entry as seen by clients. The ranking score stays internal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DropView {
    pub id: Uuid,
    pub author_id: Uuid,
    pub content: String,
    pub topics: Vec<Topic>,
    pub visibility: Visibility,
    pub created_at: DateTime<Utc>,
    pub aura: i64,
    pub like_count: u32,
    pub dislike_count: u32,
    pub share_count: u32,
    pub reply_count: u32,
    pub is_liked: bool,
    pub is_disliked: bool,
}

impl DropView {
    pub fn from_candidate(candidate: &Candidate, reaction: Option<Reaction>) -> Self {
        Self {
            id: candidate.id,
            author_id: candidate.author_id,
            content: candidate.content.clone(),
            topics: candidate.topics.clone(),
            visibility: candidate.visibility,
            created_at: candidate.created_at,
            aura: candidate.engagement.aura(),
            like_count: candidate.engagement.likes,
            dislike_count: candidate.engagement.dislikes,
            share_count: candidate.engagement.shares,
            reply_count: candidate.engagement.replies,
            is_liked: reaction == Some(Reaction::Like),
            is_disliked: reaction == Some(Reaction::Dislike),
        }
    }
}

/// `GET /feed` response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedResponse {
    pub drops: Vec<DropView>,
    pub next_cursor: Option<String>,
    pub has_more: bool,
}
