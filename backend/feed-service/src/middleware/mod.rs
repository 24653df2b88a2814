pub mod jwt_auth;

pub use jwt_auth::{issue_token, JwtAuthMiddleware, JwtValidator, UserId};
