/* src/middleware.rs */

//! axum middleware: `429 Too Many Requests` on denial, `X-RateLimit-*` headers otherwise.
//!
//! ```rust,ignore
//! let limiter = Arc::new(RateLimiter::start(PolicyTable::from_env())?);
//! let app = Router::new()
//!     .route("/api/lead", post(create_lead))
//!     .layer(axum::middleware::from_fn_with_state(limiter, middleware::rate_limit));
//! ```

use crate::config::Category;
use crate::ip::RequestLike;
use crate::limiter::{Outcome, RateLimiter};
use crate::types::RateLimitResult;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

pub const X_RATELIMIT_LIMIT: &str = "x-ratelimit-limit";
pub const X_RATELIMIT_REMAINING: &str = "x-ratelimit-remaining";
pub const X_RATELIMIT_RESET: &str = "x-ratelimit-reset";

/// Headers plus the peer address, when the server was built with connect info.
pub struct RequestParts<'a> {
    headers: &'a HeaderMap,
    peer: Option<IpAddr>,
}

impl<'a> RequestParts<'a> {
    pub fn new(request: &'a Request) -> Self {
        Self {
            headers: request.headers(),
            peer: request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip()),
        }
    }
}

impl RequestLike for RequestParts<'_> {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers.header(name)
    }

    fn ip(&self) -> Option<String> {
        self.peer.map(|ip| ip.to_string())
    }
}

impl RequestLike for HeaderMap {
    fn header(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(|value| value.to_str().ok())
    }
}

/// Limits every `/api` route by its path category.
pub async fn rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let outcome = limiter.check_path(&RequestParts::new(&request), request.uri().path());
    respond(outcome, request, next).await
}

/// Limits a router with one fixed category.
pub async fn rate_limit_category(
    State((limiter, category)): State<(Arc<RateLimiter>, Category)>,
    request: Request,
    next: Next,
) -> Response {
    let outcome = limiter.check_request(&RequestParts::new(&request), category);
    respond(outcome, request, next).await
}

async fn respond(outcome: Outcome, request: Request, next: Next) -> Response {
    match outcome {
        Outcome::Checked(result) if !result.allowed => too_many_requests(&result),
        Outcome::Checked(result) => {
            let mut response = next.run(request).await;
            stamp_headers(response.headers_mut(), &result);
            response
        }
        Outcome::Disabled | Outcome::SafeListed | Outcome::Unmatched => next.run(request).await,
    }
}

pub fn stamp_headers(headers: &mut HeaderMap, result: &RateLimitResult) {
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(result.limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(result.remaining));
    if let Ok(reset) = HeaderValue::from_str(&result.reset_iso8601()) {
        headers.insert(X_RATELIMIT_RESET, reset);
    }
}

pub fn too_many_requests(result: &RateLimitResult) -> Response {
    let retry_after = result.retry_after.unwrap_or(1);
    let body = serde_json::json!({
        "error": "Too many requests",
        "message": format!("Rate limit exceeded. Try again in {retry_after} seconds."),
        "retryAfter": retry_after,
    });

    let mut response = (
        StatusCode::TOO_MANY_REQUESTS,
        [(header::CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
        .into_response();
    stamp_headers(response.headers_mut(), result);
    response
        .headers_mut()
        .insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PolicyTable;
    use crate::gate::Gate;
    use crate::types::{Duration, RateLimitConfig};
    use axum::Router;
    use axum::body::Body;
    use axum::routing::get;
    use tower::ServiceExt;

    fn app(limiter: Arc<RateLimiter>) -> Router {
        Router::new()
            .route("/api/lead", get(|| async { "ok" }))
            .route("/home", get(|| async { "home" }))
            .layer(axum::middleware::from_fn_with_state(limiter, rate_limit))
    }

    fn lead_limiter(gate: Gate) -> Arc<RateLimiter> {
        let policy = PolicyTable::new(gate).with_rule(
            Category::Lead,
            RateLimitConfig::new(Duration::seconds(60), 1).with_burst(1),
        );
        Arc::new(RateLimiter::new(policy))
    }

    fn request(path: &str, ip: &str) -> Request {
        Request::builder()
            .uri(path)
            .header("x-forwarded-for", ip)
            .body(Body::empty())
            .expect("valid request")
    }

    #[tokio::test]
    async fn test_allowed_requests_carry_headers() {
        let app = app(lead_limiter(Gate::default()));

        let response = app
            .clone()
            .oneshot(request("/api/lead", "1.1.1.1"))
            .await
            .expect("infallible");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[X_RATELIMIT_LIMIT], "2");
        assert_eq!(response.headers()[X_RATELIMIT_REMAINING], "1");
        assert!(response.headers().contains_key(X_RATELIMIT_RESET));
        assert!(!response.headers().contains_key(header::RETRY_AFTER));
    }

    #[tokio::test]
    async fn test_denied_request_gets_429() {
        let app = app(lead_limiter(Gate::default()));

        for _ in 0..2 {
            let response = app
                .clone()
                .oneshot(request("/api/lead", "1.1.1.1"))
                .await
                .expect("infallible");
            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = app
            .clone()
            .oneshot(request("/api/lead", "1.1.1.1"))
            .await
            .expect("infallible");
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[X_RATELIMIT_LIMIT], "2");
        assert_eq!(response.headers()[X_RATELIMIT_REMAINING], "0");
        assert!(response.headers().contains_key(header::RETRY_AFTER));

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let body: serde_json::Value = serde_json::from_slice(&body).expect("json body");
        assert_eq!(body["error"], "Too many requests");
        assert!(body["retryAfter"].as_u64().is_some_and(|secs| secs >= 1));

        let other = app
            .oneshot(request("/api/lead", "2.2.2.2"))
            .await
            .expect("infallible");
        assert_eq!(other.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_bypassed_requests_are_untouched() {
        let app = app(lead_limiter(Gate::default().with_safe_list("1.1.1.1")));
        for _ in 0..5 {
            let response = app
                .clone()
                .oneshot(request("/api/lead", "1.1.1.1"))
                .await
                .expect("infallible");
            assert_eq!(response.status(), StatusCode::OK);
            assert!(!response.headers().contains_key(X_RATELIMIT_LIMIT));
        }

        let response = app
            .oneshot(request("/home", "3.3.3.3"))
            .await
            .expect("infallible");
        assert_eq!(response.status(), StatusCode::OK);
        assert!(!response.headers().contains_key(X_RATELIMIT_LIMIT));
    }

    #[tokio::test]
    async fn test_fixed_category_layer() {
        let limiter = lead_limiter(Gate::default());
        let app = Router::new()
            .route("/anything", get(|| async { "ok" }))
            .layer(axum::middleware::from_fn_with_state(
                (limiter.clone(), Category::Lead),
                rate_limit_category,
            ));

        let response = app
            .oneshot(request("/anything", "4.4.4.4"))
            .await
            .expect("infallible");
        assert_eq!(response.headers()[X_RATELIMIT_REMAINING], "1");
        assert!(limiter.store().get("lead:4.4.4.4").is_some());
    }
}
