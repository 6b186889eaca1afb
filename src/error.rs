use axum::Json;
use axum::{
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::middleware::headers;
use crate::rate_limit::StoreError;
use crate::rate_limit::window::ceil_secs;
use crate::utils::error_codes;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("未授权访问")]
    Unauthorized,
    #[error("请求过于频繁")]
    RateLimitExceeded {
        limit: u32,
        retry_after_ms: u64,
        reset_ms: u64,
    },
    // 具体的存储错误只写日志，不返回给客户端
    #[error("计数存储不可用")]
    StoreUnavailable(#[from] StoreError),
    #[error("请求参数无效: {0}")]
    Validation(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    code: i32,
    error_message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_after_ms: Option<u64>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, retry_after_ms) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, error_codes::AUTH_FAILED, None),
            AppError::RateLimitExceeded { retry_after_ms, .. } => (
                StatusCode::TOO_MANY_REQUESTS,
                error_codes::RATE_LIMIT,
                Some(*retry_after_ms),
            ),
            AppError::StoreUnavailable(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                error_codes::STORE_UNAVAILABLE,
                None,
            ),
            AppError::Validation(_) => (
                StatusCode::BAD_REQUEST,
                error_codes::VALIDATION_ERROR,
                None,
            ),
        };

        let error_message = match &self {
            AppError::RateLimitExceeded { retry_after_ms, .. } => {
                format!("请求过于频繁，请在{}秒后重试", ceil_secs(*retry_after_ms).max(1))
            }
            other => other.to_string(),
        };

        let body = Json(ErrorResponse {
            code,
            error_message,
            retry_after_ms,
        });
        let mut response = (status, body).into_response();

        if let AppError::RateLimitExceeded {
            limit,
            retry_after_ms,
            reset_ms,
        } = self
        {
            let headers = response.headers_mut();
            headers.insert(headers::LIMIT, HeaderValue::from(limit));
            headers.insert(headers::REMAINING, HeaderValue::from(0u32));
            headers.insert(headers::RESET, HeaderValue::from(ceil_secs(reset_ms)));
            headers.insert(
                axum::http::header::RETRY_AFTER,
                HeaderValue::from(ceil_secs(retry_after_ms).max(1)),
            );
        }

        response
    }
}
