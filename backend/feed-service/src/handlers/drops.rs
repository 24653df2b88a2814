use actix_web::{get, post, web, HttpResponse};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::clients::ContentStore;
use crate::error::{AppError, Result};
use crate::metrics;
use crate::middleware::jwt_auth::UserId;
use crate::models::NewDrop;
use crate::services::{
    map_tags_to_topics, DropPublisher, InteractionKind, InterestTracker, PostingLimiter,
};
use crate::utils::with_upstream_timeout;

pub struct DropHandlerState {
    pub publisher: Arc<DropPublisher>,
    pub limiter: Arc<PostingLimiter>,
    pub content_store: Arc<dyn ContentStore>,
    pub interests: Arc<InterestTracker>,
    pub upstream_timeout: Duration,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostingLimitsResponse {
    pub can_post: bool,
    pub wait_time: u64,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct InteractionRequest {
    pub kind: InteractionKind,
}

/// POST /api/v1/drops
#[post("/drops")]
pub async fn create_drop(
    user: UserId,
    body: web::Json<NewDrop>,
    state: web::Data<DropHandlerState>,
) -> Result<HttpResponse> {
    let record = state.publisher.publish(user.0, body.into_inner()).await?;
    Ok(HttpResponse::Created().json(record))
}

/// GET /api/v1/drops/limits
#[get("/drops/limits")]
pub async fn get_posting_limits(
    user: UserId,
    state: web::Data<DropHandlerState>,
) -> Result<HttpResponse> {
    let decision = state.limiter.check_posting_limits(user.0);
    Ok(HttpResponse::Ok().json(PostingLimitsResponse {
        can_post: decision.can_post,
        wait_time: decision.wait_time_secs(),
        message: decision.message,
    }))
}

/// POST /api/v1/drops/{drop_id}/interactions
#[post("/drops/{drop_id}/interactions")]
pub async fn record_interaction(
    user: UserId,
    path: web::Path<Uuid>,
    body: web::Json<InteractionRequest>,
    state: web::Data<DropHandlerState>,
) -> Result<HttpResponse> {
    let drop_id = path.into_inner();
    let record = with_upstream_timeout(
        "content_store",
        state.upstream_timeout,
        state.content_store.get_drop(drop_id),
    )
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Drop {} not found", drop_id)))?;

    let topics = map_tags_to_topics(&record.tags);
    state.interests.track_interest(user.0, &topics, body.kind);
    metrics::record_interaction(body.kind.as_str());

    Ok(HttpResponse::NoContent().finish())
}
