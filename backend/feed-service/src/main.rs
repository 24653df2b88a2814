use actix_web::{dev::Service, web, App, HttpServer};
use anyhow::Context;
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use drops_feed::cache::{FeedCacheStore, InMemoryFeedStore, RedisFeedStore};
use drops_feed::clients::{
    ContentStore, FollowGraph, InMemoryContentStore, InMemoryFollowGraph, PgContentStore,
    PgFollowGraph,
};
use drops_feed::clock::SystemClock;
use drops_feed::config::{CacheBackend, Config, ContentBackend};
use drops_feed::handlers::configure_api;
use drops_feed::jobs::{start_cache_sweeper, CacheSweeperConfig};
use drops_feed::middleware::JwtAuthMiddleware;
use drops_feed::{db, metrics, AppServices};

async fn build_services(config: &Config) -> anyhow::Result<AppServices> {
    let (content_store, follow_graph): (Arc<dyn ContentStore>, Arc<dyn FollowGraph>) =
        match config.backends.content {
            ContentBackend::Postgres => {
                let pool = db::init_pool(&config.database)
                    .await
                    .context("failed to initialise PostgreSQL pool")?;
                (
                    Arc::new(PgContentStore::new(pool.clone())),
                    Arc::new(PgFollowGraph::new(pool)),
                )
            }
            ContentBackend::Memory => {
                tracing::warn!("Using in-memory content store; drops are lost on restart");
                (
                    Arc::new(InMemoryContentStore::new()),
                    Arc::new(InMemoryFollowGraph::new()),
                )
            }
        };

    let cache_store: Arc<dyn FeedCacheStore> = match config.backends.cache {
        CacheBackend::Redis => {
            let store = RedisFeedStore::new(&config.redis.url)
                .await
                .context("failed to connect feed cache to Redis")?;
            store.ping().await.context("Redis health check failed")?;
            Arc::new(store)
        }
        CacheBackend::Memory => Arc::new(InMemoryFeedStore::new()),
    };

    Ok(AppServices::new(
        config.ranking.clone(),
        Duration::from_millis(config.upstream.timeout_ms),
        content_store,
        follow_graph,
        cache_store,
        Arc::new(SystemClock),
    ))
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,actix_web=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_thread_ids(true)
                .with_line_number(true)
                .with_target(true),
        )
        .init();

    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!("Configuration loading failed: {:#}", e);
            eprintln!("ERROR: Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    info!("Starting drops-feed-service v{}", env!("CARGO_PKG_VERSION"));
    info!(
        env = %config.app.env,
        content_backend = ?config.backends.content,
        cache_backend = ?config.backends.cache,
        "Configuration loaded"
    );

    let services = match build_services(&config).await {
        Ok(services) => services,
        Err(e) => {
            tracing::error!("Service initialisation failed: {:#}", e);
            eprintln!("ERROR: {:#}", e);
            std::process::exit(1);
        }
    };

    match services.restore_posting_windows().await {
        Ok(restored) => info!(restored, "Posting windows restored from posting log"),
        Err(e) => tracing::warn!(error = %e, "Posting log unavailable, limiter starts empty"),
    }

    let sweeper_config = CacheSweeperConfig::from_interval_secs(config.redis.sweep_interval_secs);
    tokio::spawn(start_cache_sweeper(
        services.cache.clone(),
        services.limiter.clone(),
        sweeper_config,
    ));

    let auth = JwtAuthMiddleware::new(&config.auth.jwt_secret);
    let bind_addr = format!("0.0.0.0:{}", config.app.port);
    info!("HTTP server listening on {}", bind_addr);

    HttpServer::new(move || {
        let services = services.clone();
        let auth = auth.clone();

        App::new()
            .route("/health", web::get().to(|| async { "OK" }))
            .route("/metrics", web::get().to(metrics::serve_metrics))
            .wrap_fn(|req, srv| {
                let method = req.method().to_string();
                let path = req
                    .match_pattern()
                    .unwrap_or_else(|| req.path().to_string());
                let start = Instant::now();

                let fut = srv.call(req);
                async move {
                    match fut.await {
                        Ok(res) => {
                            metrics::observe_http_request(
                                &method,
                                &path,
                                res.status().as_u16(),
                                start.elapsed(),
                            );
                            Ok(res)
                        }
                        Err(err) => {
                            metrics::observe_http_request(&method, &path, 500, start.elapsed());
                            Err(err)
                        }
                    }
                }
            })
            .configure(|cfg| configure_api(cfg, &services, auth))
    })
    .bind(bind_addr)?
    .run()
    .await
}
