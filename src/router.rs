use axum::{
    Router,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
};

use crate::{
    AppState,
    middleware::{RouteLimit, log_errors, rate_limit, resolve_identity},
    routes::{self, AI_RESOURCE},
};

pub fn build_router(state: AppState) -> Router {
    let config = state.config.clone();
    let limit = |policy| {
        RouteLimit::new(state.limiter.clone(), policy).on_store_failure(config.store_failure)
    };

    // 默认配额
    let account_routes = Router::new()
        .route("/me", get(routes::session::whoami))
        .route_layer(from_fn_with_state(limit(config.default_limit), rate_limit));

    // 配额查询本身不计数
    let quota_routes = Router::new().route("/quota", get(routes::session::quota));

    // 课程生成单独计数
    let lesson_routes = Router::new()
        .route("/lessons/generate", post(routes::practice::generate_lesson))
        .route_layer(from_fn_with_state(limit(config.generation_limit), rate_limit));

    // 语音评分与对话共用 "ai" 计数
    let ai_routes = Router::new()
        .route(
            "/pronunciation/score",
            post(routes::practice::score_pronunciation),
        )
        .route(
            "/conversation/reply",
            post(routes::practice::conversation_reply),
        )
        .route_layer(from_fn_with_state(
            limit(config.generation_limit).shared(AI_RESOURCE),
            rate_limit,
        ));

    let api_routes = Router::new()
        .merge(account_routes)
        .merge(quota_routes)
        .merge(lesson_routes)
        .merge(ai_routes)
        .layer(from_fn_with_state(state.clone(), resolve_identity));

    Router::new()
        .route("/health", get(routes::health::health))
        .nest(&config.api_base_uri, api_routes)
        .layer(from_fn(log_errors))
        .with_state(state)
}
