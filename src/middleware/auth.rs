use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{Request, request::Parts},
    middleware::Next,
    response::Response,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};

use crate::{AppState, error::AppError, utils::verify_token};

/// 已认证的调用者身份
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity(pub String);

/// 解析 Bearer token 并写入请求扩展；本身不拒绝请求，匿名请求由限流中间件或处理函数拒绝
pub async fn resolve_identity(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let (mut parts, body) = req.into_parts();

    let bearer = TypedHeader::<Authorization<Bearer>>::from_request_parts(&mut parts, &state)
        .await
        .ok();

    if let Some(TypedHeader(Authorization(bearer))) = bearer {
        match verify_token(bearer.token(), &state.config.jwt_secret) {
            Ok(claims) => {
                parts.extensions.insert(Identity(claims.sub));
            }
            Err(e) => {
                // 无效或过期的 token 视同未携带
                tracing::debug!("Ignoring invalid bearer token: {}", e);
            }
        }
    }

    next.run(Request::from_parts(parts, body)).await
}

impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .ok_or(AppError::Unauthorized)
    }
}
