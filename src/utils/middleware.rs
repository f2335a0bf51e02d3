use crate::{config::Config, error::AppError, models::user::UserProfile, state::AppState};
use anyhow::Context;
use axum::{
    async_trait,
    body::Body,
    extract::{ConnectInfo, FromRequestParts, State},
    http::{request::Parts, HeaderMap, HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use governor::{clock::DefaultClock, state::keyed::DashMapStateStore, Quota, RateLimiter};
use std::{net::SocketAddr, num::NonZeroU32, sync::Arc};
use tracing::{debug, info, warn};

pub type KeyedRateLimiter = RateLimiter<String, DashMapStateStore<String>, DefaultClock>;

/// 按客户端IP的限流器
pub fn build_rate_limiter(config: &Config) -> anyhow::Result<KeyedRateLimiter> {
    let per_minute = NonZeroU32::new(config.rate_limit_requests)
        .context("RATE_LIMIT_REQUESTS must be greater than zero")?;
    let burst = NonZeroU32::new(config.rate_limit_burst)
        .context("RATE_LIMIT_BURST must be greater than zero")?;

    Ok(RateLimiter::dashmap(Quota::per_minute(per_minute).allow_burst(burst)))
}

/// 从 `Authorization: Bearer <token>` 中取出令牌
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// 认证中间件
///
/// 令牌有效时把用户资料放入请求扩展；无令牌或令牌无效时按匿名请求继续。
pub async fn auth_middleware(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut request: Request<Body>,
    next: Next<Body>,
) -> Result<Response, AppError> {
    if let Some(token) = bearer_token(&headers) {
        match app_state.auth_service.resolve_user(token).await {
            Ok(user) => {
                debug!("Authenticated user: {} ({})", user.id, user.full_name);
                request.extensions_mut().insert(user);
            }
            Err(e) => {
                // 不返回错误，让请求继续处理（作为未认证请求）
                debug!("Bearer token rejected: {}", e);
            }
        }
    }

    Ok(next.run(request).await)
}

/// 速率限制中间件
pub async fn rate_limit_middleware(
    State(app_state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next<Body>,
) -> Result<Response, AppError> {
    let client_ip = get_client_ip(&request, app_state.config.trust_proxy_headers);

    match app_state.rate_limiter.check_key(&client_ip) {
        Ok(_) => Ok(next.run(request).await),
        Err(_) => {
            warn!("Rate limit exceeded for IP: {}", client_ip);
            Err(AppError::RateLimitExceeded)
        }
    }
}

/// 请求日志中间件
pub async fn request_logging_middleware(
    State(app_state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next<Body>,
) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let client_ip = get_client_ip(&request, app_state.config.trust_proxy_headers);

    let start_time = std::time::Instant::now();

    debug!("Incoming request: {} {} from {}", method, uri, client_ip);

    let response = next.run(request).await;

    info!(
        "Request completed: {} {} {} - {}ms",
        method,
        uri,
        response.status().as_u16(),
        start_time.elapsed().as_millis()
    );

    response
}

/// 请求 ID 中间件
pub async fn request_id_middleware(mut request: Request<Body>, next: Next<Body>) -> Response {
    let request_id = uuid::Uuid::new_v4().to_string();

    request.extensions_mut().insert(RequestId(request_id.clone()));

    let mut response = next.run(request).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert("x-request-id", value);
    }

    response
}

/// 获取客户端 IP 地址
///
/// 只有部署在可信反向代理之后（`trust_proxy` 为真）才读取转发头，
/// 否则客户端可以伪造 `X-Forwarded-For` 绕过限流。
fn get_client_ip(request: &Request<Body>, trust_proxy: bool) -> String {
    if trust_proxy {
        if let Some(ip) = forwarded_ip(request.headers()) {
            return ip;
        }
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn forwarded_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.split(',').next())
        .or_else(|| headers.get("x-real-ip").and_then(|h| h.to_str().ok()))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// 请求 ID 包装器
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// 可选认证提取器
pub struct OptionalAuth(pub Option<UserProfile>);

impl OptionalAuth {
    /// 需要登录的接口使用
    pub fn require(self) -> Result<UserProfile, AppError> {
        self.0
            .ok_or_else(|| AppError::unauthorized("Authentication required"))
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for OptionalAuth
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(OptionalAuth(parts.extensions.get::<UserProfile>().cloned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert("authorization", HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(bearer_token(&headers), Some("abc.def.ghi"));

        headers.insert("authorization", HeaderValue::from_static("Basic dXNlcjpwYXNz"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert("authorization", HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);
    }

    fn forwarded_request() -> Request<Body> {
        let mut request = Request::builder()
            .header("x-forwarded-for", "10.0.0.7, 172.16.0.1")
            .body(Body::empty())
            .unwrap();
        let peer: SocketAddr = "192.168.1.20:50000".parse().unwrap();
        request.extensions_mut().insert(ConnectInfo(peer));
        request
    }

    #[test]
    fn test_forwarded_header_ignored_without_trusted_proxy() {
        assert_eq!(get_client_ip(&forwarded_request(), false), "192.168.1.20");

        let request = Request::builder()
            .header("x-real-ip", "10.0.0.9")
            .body(Body::empty())
            .unwrap();
        assert_eq!(get_client_ip(&request, false), "unknown");
    }

    #[test]
    fn test_forwarded_header_used_behind_trusted_proxy() {
        assert_eq!(get_client_ip(&forwarded_request(), true), "10.0.0.7");

        let request = Request::builder()
            .header("x-real-ip", "10.0.0.9")
            .body(Body::empty())
            .unwrap();
        assert_eq!(get_client_ip(&request, true), "10.0.0.9");

        // 没有转发头时退回到连接地址
        let mut request = Request::builder().body(Body::empty()).unwrap();
        let peer: SocketAddr = "192.168.1.21:50000".parse().unwrap();
        request.extensions_mut().insert(ConnectInfo(peer));
        assert_eq!(get_client_ip(&request, true), "192.168.1.21");
    }

    #[test]
    fn test_rate_limiter_rejects_after_burst() {
        let mut config = Config::default();
        config.rate_limit_requests = 1;
        config.rate_limit_burst = 2;
        let limiter = build_rate_limiter(&config).unwrap();

        let key = "10.0.0.1".to_string();
        assert!(limiter.check_key(&key).is_ok());
        assert!(limiter.check_key(&key).is_ok());
        assert!(limiter.check_key(&key).is_err());
        // 其他IP不受影响
        assert!(limiter.check_key(&"10.0.0.2".to_string()).is_ok());
    }

    #[test]
    fn test_zero_quota_is_rejected() {
        let mut config = Config::default();
        config.rate_limit_requests = 0;
        assert!(build_rate_limiter(&config).is_err());
    }
}
