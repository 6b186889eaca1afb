use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use lingo_gate::{
    AppState,
    config::{Config, CounterBackend},
    rate_limit::{
        CounterStore, MemoryCounterStore, PgCounterStore, RateLimiter, RedisCounterStore,
        SystemClock, spawn_reaper,
    },
    router::build_router,
};
use sqlx::Executor;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // 初始化日志
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 加载配置
    let config = Config::from_env().expect("Failed to load configuration");

    // 设置计数存储
    let store: Arc<dyn CounterStore> = match config.counter_backend {
        CounterBackend::Postgres => {
            let database_url = config.database_url.as_deref().unwrap_or_default();
            let pool = PgPoolOptions::new()
                .max_connections(10)
                .after_connect(|conn, _meta| {
                    Box::pin(async move {
                        conn.execute("SET application_name = 'lingo_gate';").await?;
                        Ok(())
                    })
                })
                .connect(database_url)
                .await
                .expect("Failed to connect to Postgres");
            let store = PgCounterStore::new(pool);
            store
                .ensure_schema()
                .await
                .expect("Failed to create rate_limits table");
            Arc::new(store)
        }
        CounterBackend::Redis => {
            let redis_url = config.redis_url.clone().unwrap_or_default();
            let redis_client =
                redis::Client::open(redis_url).expect("Failed to create Redis client");
            Arc::new(RedisCounterStore::new(Arc::new(redis_client)))
        }
        CounterBackend::Memory => {
            tracing::warn!("Using in-memory rate limit counters; do not run multiple instances");
            Arc::new(MemoryCounterStore::new())
        }
    };
    tracing::info!("Rate limit counters backed by {:?}", config.counter_backend);

    // 设置限流器
    let limiter = RateLimiter::new(store.clone()).with_overflow(config.overflow);

    // 过期计数清理，Redis 后端不启动
    if let Some(interval) = config.gc_interval() {
        spawn_reaper(store, Arc::new(SystemClock), interval);
    }

    let addr = SocketAddr::new(
        config.server_host.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid server_host, falling back to dual-stack default");
            IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED)
        }),
        config.server_port,
    );

    let router = build_router(AppState::new(config, limiter));

    // 根据编译模式决定是否添加CORS
    #[cfg(debug_assertions)]
    let router = {
        tracing::debug!("Adding CORS layer for development mode");
        router.layer(tower_http::cors::CorsLayer::permissive())
    };

    tracing::info!("Server listening on {}", addr);
    axum::serve(
        tokio::net::TcpListener::bind(&addr)
            .await
            .expect("Failed to bind"),
        router,
    )
    .await
    .expect("Failed to start server");
}
