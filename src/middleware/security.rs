// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Transport security middleware: HTTPS redirect and response headers.

use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

/// Scheme the client used, honouring a TLS-terminating proxy.
fn request_scheme(req: &Request) -> &str {
    req.headers()
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .or_else(|| req.uri().scheme_str())
        .unwrap_or("http")
}

/// Permanently redirect plain-HTTP requests to their `https://` equivalent
/// when `ENFORCE_HTTPS` is on. `/health` is exempt for load-balancer probes.
pub async fn enforce_https(State(state): State<Arc<AppState>>, req: Request, next: Next) -> Response {
    if !state.config.enforce_https
        || req.uri().path() == "/health"
        || request_scheme(&req).eq_ignore_ascii_case("https")
    {
        return next.run(req).await;
    }

    let Some(host) = req.headers().get(header::HOST).and_then(|h| h.to_str().ok()) else {
        return (StatusCode::BAD_REQUEST, "Missing Host header").into_response();
    };
    let path_and_query = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let location = format!("https://{host}{path_and_query}");

    match HeaderValue::from_str(&location) {
        Ok(location) => (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, location)]).into_response(),
        Err(_) => (StatusCode::BAD_REQUEST, "Invalid Host header").into_response(),
    }
}

/// Add security headers to all responses.
pub async fn add_security_headers(req: Request, next: Next) -> Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();

    headers.insert(
        "X-Content-Type-Options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert("X-Frame-Options", HeaderValue::from_static("DENY"));
    headers.insert(
        "Strict-Transport-Security",
        HeaderValue::from_static("max-age=31536000; includeSubDomains"),
    );
    headers.insert("Referrer-Policy", HeaderValue::from_static("no-referrer"));

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::services::NftContract;
    use crate::store::MemoryStore;
    use crate::time_utils::SystemClock;
    use axum::body::Body;
    use axum::{routing::get, Router};
    use tower::ServiceExt; // for oneshot

    struct NoContract;

    #[async_trait::async_trait]
    impl NftContract for NoContract {
        async fn balance_of(
            &self,
            _owner: alloy_primitives::Address,
        ) -> Result<u64, crate::services::ContractError> {
            Ok(0)
        }
        async fn owner_of(
            &self,
            _token_id: u64,
        ) -> Result<alloy_primitives::Address, crate::services::ContractError> {
            Err(crate::services::ContractError::Reverted("unused".into()))
        }
        async fn token_uri(&self, _token_id: u64) -> Result<String, crate::services::ContractError> {
            Err(crate::services::ContractError::Reverted("unused".into()))
        }
    }

    fn app(enforce: bool) -> Router {
        let mut config = Config::test_default();
        config.enforce_https = enforce;
        let state = Arc::new(AppState::new(
            config,
            Arc::new(MemoryStore::new()),
            Arc::new(NoContract),
            Arc::new(SystemClock),
        ));

        Router::new()
            .route("/", get(|| async { "Hello" }))
            .route("/health", get(|| async { "ok" }))
            .layer(axum::middleware::from_fn_with_state(state, enforce_https))
            .layer(axum::middleware::from_fn(add_security_headers))
    }

    fn get_req(uri: &str, proto: Option<&str>) -> Request {
        let mut builder = Request::builder().uri(uri).header(header::HOST, "fit.example");
        if let Some(proto) = proto {
            builder = builder.header("x-forwarded-proto", proto);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_security_headers() {
        let response = app(false).oneshot(get_req("/", None)).await.unwrap();
        let headers = response.headers();

        assert_eq!(headers.get("X-Content-Type-Options").unwrap(), "nosniff");
        assert_eq!(headers.get("X-Frame-Options").unwrap(), "DENY");
        assert_eq!(
            headers.get("Strict-Transport-Security").unwrap(),
            "max-age=31536000; includeSubDomains"
        );
        assert_eq!(headers.get("Referrer-Policy").unwrap(), "no-referrer");
    }

    #[tokio::test]
    async fn plain_http_is_redirected_when_enforced() {
        let response = app(true)
            .oneshot(get_req("/dashboard?tab=sleep", Some("http")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            "https://fit.example/dashboard?tab=sleep"
        );
    }

    #[tokio::test]
    async fn https_and_health_pass_through() {
        let response = app(true).oneshot(get_req("/", Some("https"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app(true).oneshot(get_req("/health", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn not_enforced_by_default() {
        let response = app(false).oneshot(get_req("/", Some("http"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
