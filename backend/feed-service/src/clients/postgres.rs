use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::collections::HashMap;
use tracing::{error, warn};
use uuid::Uuid;

use super::{CandidateFilter, ContentStore, FollowGraph};
use crate::error::{AppError, Result};
use crate::models::{Candidate, DropRecord, EngagementCounts, NewDrop, Reaction, Visibility};

#[derive(Debug, sqlx::FromRow)]
struct DropRow {
    id: Uuid,
    author_id: Uuid,
    content: String,
    tags: Vec<String>,
    visibility: String,
    like_count: i32,
    dislike_count: i32,
    share_count: i32,
    reply_count: i32,
    created_at: DateTime<Utc>,
}

impl DropRow {
    fn into_record(self) -> DropRecord {
        let visibility = match self.visibility.as_str() {
            "following" => Visibility::Following,
            "global" => Visibility::Global,
            other => {
                warn!(drop_id = %self.id, visibility = other, "Unknown visibility, treating as global");
                Visibility::Global
            }
        };

        DropRecord {
            id: self.id,
            author_id: self.author_id,
            content: self.content,
            tags: self.tags,
            visibility,
            created_at: self.created_at,
            engagement: EngagementCounts {
                likes: self.like_count.max(0) as u32,
                dislikes: self.dislike_count.max(0) as u32,
                shares: self.share_count.max(0) as u32,
                replies: self.reply_count.max(0) as u32,
            },
        }
    }
}

const DROP_COLUMNS: &str = "id, author_id, content, tags, visibility, \
     like_count, dislike_count, share_count, reply_count, created_at";

pub struct PgContentStore {
    pool: PgPool,
}

impl PgContentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ContentStore for PgContentStore {
    async fn fetch_candidate_pool(
        &self,
        filter: &CandidateFilter,
        min_recency: DateTime<Utc>,
        pool_size: usize,
    ) -> Result<Vec<Candidate>> {
        let visibilities: Vec<String> = filter
            .visibilities
            .iter()
            .map(|v| v.as_str().to_string())
            .collect();

        let sql = format!(
            r#"
            SELECT {DROP_COLUMNS}
            FROM drops
            WHERE deleted_at IS NULL
                AND created_at >= $1
                AND visibility = ANY($2)
                AND ($3::UUID[] IS NULL OR author_id = ANY($3))
            ORDER BY created_at DESC, id DESC
            LIMIT $4
            "#
        );

        let rows = sqlx::query_as::<_, DropRow>(&sql)
            .bind(min_recency)
            .bind(&visibilities)
            .bind(filter.authors.as_deref())
            .bind(pool_size as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                error!("Failed to fetch candidate pool: {}", e);
                AppError::Database(e.to_string())
            })?;

        Ok(rows
            .into_iter()
            .map(|row| row.into_record().to_candidate())
            .collect())
    }

    async fn record_post_accepted(&self, author_id: Uuid, accepted_at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO author_posting_log (author_id, accepted_at)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(author_id)
        .bind(accepted_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to record accepted post: {}", e);
            AppError::Database(e.to_string())
        })?;
        Ok(())
    }

    async fn recent_posts(&self, since: DateTime<Utc>) -> Result<Vec<(Uuid, DateTime<Utc>)>> {
        sqlx::query_as::<_, (Uuid, DateTime<Utc>)>(
            r#"
            SELECT author_id, accepted_at
            FROM author_posting_log
            WHERE accepted_at >= $1
            ORDER BY accepted_at ASC
            "#,
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to load posting log: {}", e);
            AppError::Database(e.to_string())
        })
    }

    async fn create_drop(
        &self,
        author_id: Uuid,
        new_drop: &NewDrop,
        created_at: DateTime<Utc>,
    ) -> Result<DropRecord> {
        let sql = format!(
            r#"
            INSERT INTO drops (id, author_id, content, tags, visibility, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {DROP_COLUMNS}
            "#
        );

        let row = sqlx::query_as::<_, DropRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(author_id)
            .bind(&new_drop.content)
            .bind(&new_drop.tags)
            .bind(new_drop.visibility.as_str())
            .bind(created_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                error!("Failed to create drop: {}", e);
                AppError::Database(e.to_string())
            })?;

        Ok(row.into_record())
    }

    async fn get_drop(&self, drop_id: Uuid) -> Result<Option<DropRecord>> {
        let sql = format!("SELECT {DROP_COLUMNS} FROM drops WHERE id = $1 AND deleted_at IS NULL");

        let row = sqlx::query_as::<_, DropRow>(&sql)
            .bind(drop_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                error!("Failed to load drop {}: {}", drop_id, e);
                AppError::Database(e.to_string())
            })?;

        Ok(row.map(DropRow::into_record))
    }

    async fn viewer_reactions(
        &self,
        viewer_id: Uuid,
        drop_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Reaction>> {
        if drop_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query_as::<_, (Uuid, String)>(
            r#"
            SELECT drop_id, reaction
            FROM drop_reactions
            WHERE user_id = $1 AND drop_id = ANY($2)
            "#,
        )
        .bind(viewer_id)
        .bind(drop_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to load viewer reactions: {}", e);
            AppError::Database(e.to_string())
        })?;

        Ok(rows
            .into_iter()
            .filter_map(|(drop_id, reaction)| match reaction.as_str() {
                "like" => Some((drop_id, Reaction::Like)),
                "dislike" => Some((drop_id, Reaction::Dislike)),
                _ => None,
            })
            .collect())
    }
}

pub struct PgFollowGraph {
    pool: PgPool,
}

impl PgFollowGraph {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FollowGraph for PgFollowGraph {
    async fn get_following(&self, user_id: Uuid) -> Result<Vec<Uuid>> {
        sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT followee_id
            FROM follows
            WHERE follower_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to load follow graph for {}: {}", user_id, e);
            AppError::Database(e.to_string())
        })
    }
}
