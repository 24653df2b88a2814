use actix_web::{get, web, HttpResponse};
use serde::Serialize;
use std::sync::Arc;

use crate::error::Result;
use crate::middleware::jwt_auth::UserId;
use crate::services::{InterestTracker, Topic};

pub struct InterestHandlerState {
    pub interests: Arc<InterestTracker>,
}

#[derive(Debug, Serialize)]
pub struct TopicWeight {
    pub topic: Topic,
    pub weight: f64,
}

#[derive(Debug, Serialize)]
pub struct InterestsResponse {
    pub topics: Vec<TopicWeight>,
}

/// GET /api/v1/interests: strongest topics first.
#[get("/interests")]
pub async fn get_interests(
    user: UserId,
    state: web::Data<InterestHandlerState>,
) -> Result<HttpResponse> {
    let profile = state.interests.get_user_interests(user.0);

    let mut topics: Vec<TopicWeight> = profile
        .weights
        .into_iter()
        .filter(|(_, weight)| *weight > 0.0)
        .map(|(topic, weight)| TopicWeight { topic, weight })
        .collect();
    topics.sort_by(|a, b| b.weight.total_cmp(&a.weight).then(a.topic.cmp(&b.topic)));

    Ok(HttpResponse::Ok().json(InterestsResponse { topics }))
}
