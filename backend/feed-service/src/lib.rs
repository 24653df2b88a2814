pub mod app;
pub mod cache;
pub mod clients;
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod jobs;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

pub use app::AppServices;
pub use config::Config;
pub use error::{AppError, Result};
