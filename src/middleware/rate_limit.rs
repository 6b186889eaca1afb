use std::sync::Arc;

use axum::{
    body::Body,
    extract::{MatchedPath, State},
    http::{HeaderMap, HeaderValue, Request},
    middleware::Next,
    response::Response,
};

use super::{Identity, headers};
use crate::{
    error::AppError,
    rate_limit::{
        Decision, LimitKey, RateLimitPolicy, RateLimiter, StoreFailurePolicy, window::ceil_secs,
    },
};

/// 挂在一组路由上的限流配置
#[derive(Clone)]
pub struct RouteLimit {
    limiter: Arc<RateLimiter>,
    policy: RateLimitPolicy,
    resource: Option<Arc<str>>,
    store_failure: StoreFailurePolicy,
}

impl RouteLimit {
    pub fn new(limiter: Arc<RateLimiter>, policy: RateLimitPolicy) -> Self {
        Self {
            limiter,
            policy,
            resource: None,
            store_failure: StoreFailurePolicy::default(),
        }
    }

    /// 固定资源名，多条路由共用同一个计数
    pub fn shared(mut self, resource: impl Into<Arc<str>>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    pub fn on_store_failure(mut self, policy: StoreFailurePolicy) -> Self {
        self.store_failure = policy;
        self
    }

    fn resource_for(&self, req: &Request<Body>) -> String {
        if let Some(resource) = &self.resource {
            return resource.to_string();
        }
        req.extensions()
            .get::<MatchedPath>()
            .map(|p| p.as_str().to_string())
            .unwrap_or_else(|| req.uri().path().to_string())
    }
}

pub async fn rate_limit(
    State(route): State<RouteLimit>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    // 匿名请求不计数，也不访问计数存储
    let Some(identity) = req.extensions().get::<Identity>().cloned() else {
        tracing::debug!("Rejecting unauthenticated request to {}", req.uri().path());
        return Err(AppError::Unauthorized);
    };

    let key = LimitKey::new(identity.0, route.resource_for(&req));

    let decision = match route.limiter.check(&key, &route.policy).await {
        Ok(decision) => decision,
        Err(e) => {
            tracing::error!("Rate limit store failure for {}: {}", key.resource(), e);
            return match route.store_failure {
                StoreFailurePolicy::FailClosed => Err(AppError::StoreUnavailable(e)),
                StoreFailurePolicy::FailOpen => Ok(next.run(req).await),
            };
        }
    };

    if let Some(retry_after_ms) = decision.retry_after_ms {
        tracing::info!(
            "Rate limit exceeded: key={} resource={} count={} limit={}",
            key.storage_key(),
            key.resource(),
            decision.count,
            decision.limit
        );
        return Err(AppError::RateLimitExceeded {
            limit: decision.limit,
            retry_after_ms,
            reset_ms: decision.reset_ms,
        });
    }

    let mut response = next.run(req).await;
    set_quota_headers(response.headers_mut(), &decision);
    Ok(response)
}

fn set_quota_headers(map: &mut HeaderMap, decision: &Decision) {
    map.insert(headers::LIMIT, HeaderValue::from(decision.limit));
    map.insert(headers::REMAINING, HeaderValue::from(decision.remaining));
    map.insert(headers::RESET, HeaderValue::from(ceil_secs(decision.reset_ms)));
}
