use actix_web::{get, web, HttpResponse};
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

use crate::config::RankingPolicy;
use crate::error::Result;
use crate::middleware::jwt_auth::UserId;
use crate::models::FeedType;
use crate::services::FeedAssembler;

/// Raw query of `GET /feed`. Everything is parsed leniently: malformed
/// values fall back to defaults instead of failing the request.
#[derive(Debug, Default, Deserialize)]
pub struct FeedQueryParams {
    pub cursor: Option<String>,
    pub limit: Option<String>,
    #[serde(rename = "feedType")]
    pub feed_type: Option<String>,
}

impl FeedQueryParams {
    pub fn resolve_limit(&self, policy: &RankingPolicy) -> usize {
        match self.limit.as_deref().map(str::trim) {
            None | Some("") => policy.default_page_size,
            Some(raw) => match raw.parse::<usize>() {
                Ok(0) | Err(_) => {
                    debug!(limit = raw, "Invalid feed limit, using default");
                    policy.default_page_size
                }
                Ok(n) => n.min(policy.max_page_size),
            },
        }
    }

    pub fn resolve_feed_type(&self) -> FeedType {
        self.feed_type
            .as_deref()
            .and_then(FeedType::parse)
            .unwrap_or(FeedType::Global)
    }
}

pub struct FeedHandlerState {
    pub assembler: Arc<FeedAssembler>,
}

/// GET /api/v1/feed?cursor=&limit=&feedType=global|following
#[get("/feed")]
pub async fn get_feed(
    user: UserId,
    query: web::Query<FeedQueryParams>,
    state: web::Data<FeedHandlerState>,
) -> Result<HttpResponse> {
    let limit = query.resolve_limit(state.assembler.policy());
    let feed_type = query.resolve_feed_type();

    let page = state
        .assembler
        .get_feed(user.0, query.cursor.as_deref(), limit, feed_type)
        .await?;
    let response = state.assembler.enrich(user.0, page).await;

    Ok(HttpResponse::Ok().json(response))
}
