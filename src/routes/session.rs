use axum::{extract::State, response::IntoResponse};
use serde::Serialize;

use super::AI_RESOURCE;
use crate::{
    AppState, middleware::Identity, rate_limit::RateLimitPolicy, utils::success_to_api_response,
};

#[derive(Debug, Serialize)]
pub struct WhoAmIResponse {
    pub user_id: String,
}

#[derive(Debug, Serialize)]
pub struct RouteQuota {
    pub resource: &'static str,
    pub routes: Vec<&'static str>,
    pub max: u32,
    pub window_ms: u64,
}

#[derive(Debug, Serialize)]
pub struct QuotaResponse {
    pub user_id: String,
    pub limits: Vec<RouteQuota>,
}

fn route_quota(
    resource: &'static str,
    routes: Vec<&'static str>,
    policy: &RateLimitPolicy,
) -> RouteQuota {
    RouteQuota {
        resource,
        routes,
        max: policy.max(),
        window_ms: policy.window_ms(),
    }
}

#[axum::debug_handler]
pub async fn whoami(identity: Identity) -> impl IntoResponse {
    success_to_api_response(WhoAmIResponse {
        user_id: identity.0,
    })
}

// 只报告配置，不读取计数，避免查询本身消耗配额
#[axum::debug_handler]
pub async fn quota(State(state): State<AppState>, identity: Identity) -> impl IntoResponse {
    let config = &state.config;
    success_to_api_response(QuotaResponse {
        user_id: identity.0,
        limits: vec![
            route_quota("/me", vec!["/me"], &config.default_limit),
            route_quota(
                "/lessons/generate",
                vec!["/lessons/generate"],
                &config.generation_limit,
            ),
            route_quota(
                AI_RESOURCE,
                vec!["/pronunciation/score", "/conversation/reply"],
                &config.generation_limit,
            ),
        ],
    })
}
