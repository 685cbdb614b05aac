use axum::{
    extract::Request,
    http::{header, HeaderName, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use uuid::Uuid;

const POLICY_HEADERS: [(HeaderName, &str); 7] = [
    (header::CACHE_CONTROL, "no-cache, no-store, must-revalidate"),
    (header::PRAGMA, "no-cache"),
    (header::EXPIRES, "0"),
    // cross origin isolation, needed for SharedArrayBuffer in the browser
    (
        HeaderName::from_static("cross-origin-embedder-policy"),
        "require-corp",
    ),
    (
        HeaderName::from_static("cross-origin-opener-policy"),
        "same-origin",
    ),
    (
        HeaderName::from_static("cross-origin-resource-policy"),
        "same-origin",
    ),
    (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
];

/// Disable caching and enable cross origin isolation on every response.
/// `OPTIONS` requests are answered directly with 204.
pub async fn response_policy(req: Request, next: Next) -> Response {
    let mut response = if req.method() == Method::OPTIONS {
        let mut preflight = StatusCode::NO_CONTENT.into_response();
        let headers = preflight.headers_mut();
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static("GET, POST, OPTIONS"),
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static("*"),
        );
        preflight
    } else {
        next.run(req).await
    };

    let headers = response.headers_mut();
    for (name, value) in POLICY_HEADERS {
        headers.insert(name, HeaderValue::from_static(value));
    }
    response
}

pub async fn request_id_middleware(mut req: Request, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let Ok(value) = HeaderValue::from_str(&request_id) else {
        return next.run(req).await;
    };
    req.headers_mut().insert("x-request-id", value.clone());

    let mut response = next.run(req).await;
    response.headers_mut().insert("x-request-id", value);
    response
}
