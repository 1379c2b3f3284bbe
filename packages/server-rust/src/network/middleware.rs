//! HTTP middleware stack applied to every route.
//!
//! Layers are listed outermost first: the first one sees the request
//! first on the way in and the response last on the way out.

use axum::http::header::HeaderName;
use axum::http::{Method, StatusCode};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use super::config::NetworkConfig;

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Wraps `router` in the transport middleware stack.
///
/// 1. `SetRequestId` assigns a UUID `X-Request-Id` when the client sent none
/// 2. `Trace` logs each request/response in a span carrying that id
/// 3. `RequestBodyLimit` answers 413 for bodies over `max_body_bytes`
/// 4. `CORS` from the configured origins
/// 5. `Timeout` answers 408 when a request exceeds the configured time
/// 6. `PropagateRequestId` echoes `X-Request-Id` on the response
pub fn with_http_layers<S>(router: Router<S>, config: &NetworkConfig) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    router.layer(
        ServiceBuilder::new()
            .layer(SetRequestIdLayer::new(request_id.clone(), MakeRequestUuid))
            .layer(TraceLayer::new_for_http())
            // Outside CORS: preflight responses need a `Default` inner body.
            .layer(RequestBodyLimitLayer::new(config.max_body_bytes))
            .layer(build_cors_layer(&config.cors_origins))
            .layer(TimeoutLayer::with_status_code(
                StatusCode::REQUEST_TIMEOUT,
                config.request_timeout,
            ))
            .layer(PropagateRequestIdLayer::new(request_id)),
    )
}

/// Builds the CORS layer. A `"*"` entry allows any origin; otherwise only
/// origins that parse as header values are allowed.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(origins.iter().filter_map(|o| o.parse().ok()))
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any)
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{header, Request};
    use axum::routing::get;
    use tower::ServiceExt;

    use super::*;

    fn app(config: &NetworkConfig) -> Router {
        with_http_layers(Router::new().route("/", get(|| async { "ok" })), config)
    }

    #[tokio::test]
    async fn assigns_request_id() {
        let response = app(&NetworkConfig::default())
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));
    }

    #[tokio::test]
    async fn keeps_client_request_id() {
        let response = app(&NetworkConfig::default())
            .oneshot(
                Request::get("/")
                    .header(REQUEST_ID_HEADER, "req-42")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.headers()[REQUEST_ID_HEADER], "req-42");
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let config = NetworkConfig::default();
        let app = with_http_layers(
            Router::new().route("/", axum::routing::post(|| async { "ok" })),
            &config,
        );
        let body = vec![b'x'; config.max_body_bytes + 1];

        let response = app
            .oneshot(
                Request::post("/")
                    .header(header::CONTENT_LENGTH, body.len())
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    fn preflight(origin: &str) -> Request<Body> {
        Request::builder()
            .method(Method::OPTIONS)
            .uri("/")
            .header(header::ORIGIN, origin)
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn cors_allows_only_listed_origins() {
        let config = NetworkConfig {
            cors_origins: vec![
                "http://localhost:3000".to_string(),
                "https://example.com".to_string(),
            ],
            ..NetworkConfig::default()
        };

        let allowed = app(&config)
            .oneshot(preflight("https://example.com"))
            .await
            .unwrap();
        assert_eq!(
            allowed.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "https://example.com"
        );

        let denied = app(&config)
            .oneshot(preflight("https://evil.test"))
            .await
            .unwrap();
        assert!(!denied
            .headers()
            .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
    }

    #[tokio::test]
    async fn cors_wildcard_allows_any_origin() {
        let response = app(&NetworkConfig::default())
            .oneshot(preflight("https://anywhere.test"))
            .await
            .unwrap();
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    }
}
