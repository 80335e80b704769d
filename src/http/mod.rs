mod error;
mod routes;
mod state;

use axum::body::Body;
use axum::http::{HeaderName, HeaderValue, Request};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::Router;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

pub use state::AppState;

/// Dumb request/response carrier over `Broker`'s operations (spec.md §1,
/// §4.E). No state-machine decision is made here.
pub fn build_router(state: AppState) -> Router {
    routes::router(state)
        .layer(middleware::from_fn(ensure_request_id))
        .layer(TraceLayer::new_for_http())
}

const REQUEST_ID_HEADER: &str = "x-request-id";

async fn ensure_request_id(mut req: Request<Body>, next: Next) -> Response {
    let header = HeaderName::from_static(REQUEST_ID_HEADER);
    let request_id = req
        .headers()
        .get(&header)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        req.headers_mut().insert(header.clone(), value);
    }

    let mut res = next.run(req).await;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        res.headers_mut().insert(header, value);
    }
    res
}
