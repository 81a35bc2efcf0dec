//! Request id propagation and completion logging.
//!
//! Every response carries an `X-Request-ID` header, echoing the client's
//! value or a generated UUID. The id is stored in request extensions so the
//! translation handlers can key the token cache with it.

use std::time::Instant;

use axum::{extract::Request, middleware::Next, response::Response};
use http::HeaderValue;

const X_REQUEST_ID: &str = "x-request-id";

pub(crate) async fn propagate_request_id(mut request: Request, next: Next) -> Response {
    let started = Instant::now();

    let request_id = request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let method = request.method().clone();
    let path = request.uri().path().to_string();

    request
        .extensions_mut()
        .insert(translator::RequestId(request_id.clone()));

    let mut response = next.run(request).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(X_REQUEST_ID, value);
    }

    log::info!(
        "{method} {path} -> {} in {}ms [{request_id}]",
        response.status(),
        started.elapsed().as_millis()
    );

    response
}
