pub mod drops;
pub mod feed;
pub mod interests;

use actix_web::{error::JsonPayloadError, web, HttpRequest};

use crate::app::AppServices;
use crate::error::AppError;
use crate::middleware::JwtAuthMiddleware;

pub use drops::{create_drop, get_posting_limits, record_interaction, DropHandlerState};
pub use feed::{get_feed, FeedHandlerState, FeedQueryParams};
pub use interests::{get_interests, InterestHandlerState};

fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    AppError::ValidationError(format!("Invalid request body: {}", err)).into()
}

/// Register the authenticated `/api/v1` surface.
pub fn configure_api(cfg: &mut web::ServiceConfig, services: &AppServices, auth: JwtAuthMiddleware) {
    cfg.app_data(web::JsonConfig::default().error_handler(json_error_handler))
        .app_data(web::Data::new(FeedHandlerState {
            assembler: services.assembler.clone(),
        }))
        .app_data(web::Data::new(DropHandlerState {
            publisher: services.publisher.clone(),
            limiter: services.limiter.clone(),
            content_store: services.content_store.clone(),
            interests: services.interests.clone(),
            upstream_timeout: services.upstream_timeout,
        }))
        .app_data(web::Data::new(InterestHandlerState {
            interests: services.interests.clone(),
        }))
        .service(
            web::scope("/api/v1")
                .wrap(auth)
                .service(get_feed)
                .service(get_posting_limits)
                .service(create_drop)
                .service(record_interaction)
                .service(get_interests),
        );
}
