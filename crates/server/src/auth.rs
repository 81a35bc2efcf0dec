//! Inbound API key check.
//!
//! When `api_key` is configured, clients must present it either as the
//! Anthropic-style `x-api-key` header or as a bearer token. Without a
//! configured key the layer waves everything through.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use http::header::AUTHORIZATION;
use secrecy::ExposeSecret;

const X_API_KEY: &str = "x-api-key";

pub(crate) async fn require_api_key(
    State(config): State<config::ConfigReceiver>,
    request: Request,
    next: Next,
) -> Response {
    let expected = config.borrow().api_key.clone();

    let Some(expected) = expected else {
        return next.run(request).await;
    };

    let headers = request.headers();

    let provided = headers
        .get(X_API_KEY)
        .and_then(|value| value.to_str().ok())
        .or_else(|| {
            headers
                .get(AUTHORIZATION)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.strip_prefix("Bearer "))
        });

    if provided == Some(expected.expose_secret()) {
        next.run(request).await
    } else {
        log::warn!("Rejecting request with invalid or missing api key");

        translator::Error::Authentication("invalid or missing api key".to_string()).into_response()
    }
}
