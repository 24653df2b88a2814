use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub backends: BackendConfig,
    pub auth: AuthConfig,
    pub upstream: UpstreamConfig,
    pub ranking: RankingPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub env: String,
    pub port: u16,
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    pub url: String,
    /// Seconds between in-memory cache sweeps
    pub sweep_interval_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentBackend {
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    Memory,
    Redis,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub content: ContentBackend,
    pub cache: CacheBackend,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Timeout for content store and follow graph calls
    pub timeout_ms: u64,
}

/// Every numeric knob of the ranking engine.
///
/// Loaded from `RANKING_*` environment variables; unset fields fall back to
/// the defaults below.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingPolicy {
    #[serde(default = "default_time_decay_half_life_hours")]
    pub time_decay_half_life_hours: f64,
    #[serde(default = "default_decay_floor")]
    pub time_decay_floor: f64,
    #[serde(default = "default_engagement_decay_rate_per_day")]
    pub engagement_decay_rate_per_day: f64,
    #[serde(default = "default_decay_floor")]
    pub engagement_decay_floor: f64,

    // base engagement = likes*l - dislikes*d + replies*r + shares*s
    #[serde(default = "default_one")]
    pub engagement_like_weight: f64,
    #[serde(default = "default_one")]
    pub engagement_dislike_weight: f64,
    #[serde(default = "default_engagement_reply_weight")]
    pub engagement_reply_weight: f64,
    #[serde(default = "default_one")]
    pub engagement_share_weight: f64,

    #[serde(default = "default_one")]
    pub interest_like_weight: f64,
    #[serde(default = "default_interest_follow_weight")]
    pub interest_follow_weight: f64,
    #[serde(default = "default_interest_share_weight")]
    pub interest_share_weight: f64,
    #[serde(default = "default_interest_save_weight")]
    pub interest_save_weight: f64,
    #[serde(default = "default_interest_dislike_weight")]
    pub interest_dislike_weight: f64,

    #[serde(default = "default_pool_multiplier")]
    pub pool_multiplier: usize,
    #[serde(default = "default_pool_floor")]
    pub pool_floor: usize,
    #[serde(default = "default_pool_cap")]
    pub pool_cap: usize,
    #[serde(default = "default_max_candidate_age_hours")]
    pub max_candidate_age_hours: i64,

    #[serde(default = "default_feed_cache_ttl_secs")]
    pub feed_cache_ttl_secs: i64,

    #[serde(default = "default_posting_max_posts")]
    pub posting_max_posts: usize,
    #[serde(default = "default_posting_window_secs")]
    pub posting_window_secs: i64,
    #[serde(default = "default_posting_min_gap_secs")]
    pub posting_min_gap_secs: i64,

    #[serde(default = "default_page_size")]
    pub default_page_size: usize,
    #[serde(default = "default_max_page_size")]
    pub max_page_size: usize,
}

impl Default for RankingPolicy {
    fn default() -> Self {
        Self {
            time_decay_half_life_hours: default_time_decay_half_life_hours(),
            time_decay_floor: default_decay_floor(),
            engagement_decay_rate_per_day: default_engagement_decay_rate_per_day(),
            engagement_decay_floor: default_decay_floor(),
            engagement_like_weight: default_one(),
            engagement_dislike_weight: default_one(),
            engagement_reply_weight: default_engagement_reply_weight(),
            engagement_share_weight: default_one(),
            interest_like_weight: default_one(),
            interest_follow_weight: default_interest_follow_weight(),
            interest_share_weight: default_interest_share_weight(),
            interest_save_weight: default_interest_save_weight(),
            interest_dislike_weight: default_interest_dislike_weight(),
            pool_multiplier: default_pool_multiplier(),
            pool_floor: default_pool_floor(),
            pool_cap: default_pool_cap(),
            max_candidate_age_hours: default_max_candidate_age_hours(),
            feed_cache_ttl_secs: default_feed_cache_ttl_secs(),
            posting_max_posts: default_posting_max_posts(),
            posting_window_secs: default_posting_window_secs(),
            posting_min_gap_secs: default_posting_min_gap_secs(),
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
        }
    }
}

impl RankingPolicy {
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::prefixed("RANKING_").from_env::<RankingPolicy>()
    }

    /// Reject combinations that would break the decay or pagination invariants.
    pub fn validate(&self) -> Result<(), String> {
        let in_unit = |v: f64| v > 0.0 && v <= 1.0;

        if !in_unit(self.time_decay_floor) {
            return Err(format!(
                "time_decay_floor must be in (0, 1], got {}",
                self.time_decay_floor
            ));
        }
        if !in_unit(self.engagement_decay_floor) {
            return Err(format!(
                "engagement_decay_floor must be in (0, 1], got {}",
                self.engagement_decay_floor
            ));
        }
        if self.time_decay_half_life_hours <= 0.0 {
            return Err("time_decay_half_life_hours must be positive".to_string());
        }
        if self.engagement_decay_rate_per_day < 0.0 {
            return Err("engagement_decay_rate_per_day must not be negative".to_string());
        }
        if self.pool_multiplier == 0 || self.pool_floor == 0 {
            return Err("pool_multiplier and pool_floor must be positive".to_string());
        }
        if self.pool_cap < self.pool_floor {
            return Err("pool_cap must be at least pool_floor".to_string());
        }
        if self.default_page_size == 0 || self.default_page_size > self.max_page_size {
            return Err("default_page_size must be in 1..=max_page_size".to_string());
        }
        if self.posting_max_posts == 0 || self.posting_window_secs <= 0 {
            return Err("posting_max_posts and posting_window_secs must be positive".to_string());
        }
        if self.posting_min_gap_secs < 0 || self.feed_cache_ttl_secs < 0 {
            return Err("posting_min_gap_secs and feed_cache_ttl_secs must not be negative".to_string());
        }
        Ok(())
    }
}

impl Config {
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        dotenvy::dotenv().ok();

        let ranking = RankingPolicy::from_env()?;
        ranking.validate()?;

        Ok(Config {
            app: AppConfig {
                env: std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
                port: std::env::var("APP_PORT")
                    .unwrap_or_else(|_| "8000".to_string())
                    .parse()?,
                log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            },
            database: DatabaseConfig {
                url: std::env::var("DATABASE_URL").unwrap_or_default(),
                max_connections: std::env::var("DATABASE_MAX_CONNECTIONS")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()?,
            },
            redis: RedisConfig {
                url: std::env::var("REDIS_URL")
                    .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
                sweep_interval_secs: std::env::var("CACHE_SWEEP_INTERVAL_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or_else(default_sweep_interval_secs),
            },
            backends: BackendConfig {
                content: parse_backend(
                    "CONTENT_STORE_BACKEND",
                    &std::env::var("CONTENT_STORE_BACKEND").unwrap_or_else(|_| "memory".into()),
                )?,
                cache: parse_backend(
                    "FEED_CACHE_BACKEND",
                    &std::env::var("FEED_CACHE_BACKEND").unwrap_or_else(|_| "memory".into()),
                )?,
            },
            auth: AuthConfig {
                jwt_secret: std::env::var("JWT_SECRET")?,
            },
            upstream: UpstreamConfig {
                timeout_ms: std::env::var("UPSTREAM_TIMEOUT_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or_else(default_upstream_timeout_ms),
            },
            ranking,
        })
    }
}

fn parse_backend<T: serde::de::DeserializeOwned>(
    var: &str,
    raw: &str,
) -> Result<T, Box<dyn std::error::Error>> {
    serde_json::from_value(serde_json::Value::String(raw.to_ascii_lowercase()))
        .map_err(|_| format!("{} has unsupported value '{}'", var, raw).into())
}

fn default_sweep_interval_secs() -> u64 {
    60
}

fn default_upstream_timeout_ms() -> u64 {
    2_000
}

fn default_time_decay_half_life_hours() -> f64 {
    48.0
}

fn default_decay_floor() -> f64 {
    0.1
}

fn default_engagement_decay_rate_per_day() -> f64 {
    0.05
}

fn default_one() -> f64 {
    1.0
}

fn default_engagement_reply_weight() -> f64 {
    0.5
}

fn default_interest_follow_weight() -> f64 {
    2.0
}

fn default_interest_share_weight() -> f64 {
    3.0
}

fn default_interest_save_weight() -> f64 {
    5.0
}

fn default_interest_dislike_weight() -> f64 {
    -1.0
}

fn default_pool_multiplier() -> usize {
    3
}

fn default_pool_floor() -> usize {
    50
}

fn default_pool_cap() -> usize {
    500
}

fn default_max_candidate_age_hours() -> i64 {
    24 * 30
}

fn default_feed_cache_ttl_secs() -> i64 {
    30
}

fn default_posting_max_posts() -> usize {
    10
}

fn default_posting_window_secs() -> i64 {
    3600
}

fn default_posting_min_gap_secs() -> i64 {
    30
}

fn default_page_size() -> usize {
    20
}

fn default_max_page_size() -> usize {
    100
}
