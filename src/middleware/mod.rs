mod auth;
mod error_handler;
mod rate_limit;

pub use auth::{Identity, resolve_identity};
pub use error_handler::log_errors;
pub use rate_limit::{RouteLimit, rate_limit};

/// 限流相关响应头
pub mod headers {
    use axum::http::HeaderName;

    pub const LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
    pub const REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
    pub const RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");
}
