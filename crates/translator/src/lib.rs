//! The translation core: accepts Anthropic Messages requests, rewrites them
//! into OpenAI Chat Completions, forwards them upstream, and translates the
//! response (streaming or not) back into Anthropic format.

use std::{convert::Infallible, sync::Arc, time::Duration};

use axum::{
    Json, Router,
    extract::{Extension, State, rejection::JsonRejection},
    response::{
        IntoResponse, Response, Sse,
        sse::Event,
    },
    routing::post,
};
use futures::StreamExt;

pub mod assemble;
pub mod messages;
pub mod rewrite;
pub mod stream;
pub mod token;

mod error;
mod upstream;

pub use error::{Error, Result};

use messages::anthropic;
use token::TokenCache;

/// Inbound request correlation id, inserted by the HTTP layer's middleware
/// and echoed on the `X-Request-ID` response header.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// Shared per-process state threaded into every handler: the configuration
/// snapshot channel, the prompt-token cache, and the upstream HTTP client.
#[derive(Clone)]
pub struct ProxyState {
    config: config::ConfigReceiver,
    token_cache: Arc<TokenCache>,
    http: reqwest::Client,
}

impl ProxyState {
    /// State backed by the given configuration channel.
    pub fn new(config: config::ConfigReceiver) -> Self {
        Self {
            config,
            token_cache: Arc::new(TokenCache::default()),
            http: upstream::http_client(),
        }
    }

    /// A consistent configuration snapshot for one request.
    pub fn config(&self) -> Arc<config::Config> {
        self.config.borrow().clone()
    }

    /// Handle to the shared prompt-token cache.
    pub fn token_cache(&self) -> &Arc<TokenCache> {
        &self.token_cache
    }
}

/// Creates the axum router for the translation endpoint.
pub fn router(state: ProxyState) -> Router {
    Router::new()
        .route("/v1/messages", post(anthropic_messages))
        .with_state(state)
}

/// Handle Anthropic Messages requests.
///
/// Supports both streaming and non-streaming responses. When `stream: true`
/// is set in the request, the response is sent as Server-Sent Events;
/// otherwise a standard JSON body is returned.
async fn anthropic_messages(
    State(state): State<ProxyState>,
    request_id: Option<Extension<RequestId>>,
    payload: std::result::Result<Json<anthropic::MessagesRequest>, JsonRejection>,
) -> Result<Response> {
    let Json(request) = payload.map_err(|rejection| Error::Validation(rejection.body_text()))?;

    let request_id = request_id
        .map(|Extension(RequestId(id))| id)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    log::debug!(
        "Messages handler called for model {} with {} messages, streaming: {}",
        request.model,
        request.messages.len(),
        request.stream.unwrap_or(false)
    );

    let config = state.config();

    rewrite::validate(&request)?;

    let mut upstream_request = rewrite::rewrite(&request, &request_id, &config, state.token_cache());

    let timeout = Duration::from_secs(config.request_timeout_seconds);

    if request.stream.unwrap_or(false) {
        upstream_request.stream = Some(true);

        let bytes = upstream::send_streaming(&state.http, &config, &upstream_request, timeout).await?;

        let events = stream::convert_stream(
            bytes,
            request.model.clone(),
            request_id,
            state.token_cache().clone(),
        );

        let sse_stream = events.map(|event| {
            let data = serde_json::to_string(&event).unwrap_or_else(|error| {
                log::error!("Failed to serialize stream event: {error}");
                r#"{"type":"error","message":{"type":"api_error","message":"serialization failed"}}"#
                    .to_string()
            });

            Ok::<_, Infallible>(Event::default().event(event.name()).data(data))
        });

        Ok(Sse::new(sse_stream).into_response())
    } else {
        upstream_request.stream = Some(false);

        let upstream_response = upstream::send(&state.http, &config, &upstream_request, timeout).await?;

        let response = assemble::assemble(
            upstream_response,
            Some(&request.model),
            &request_id,
            state.token_cache(),
        )?;

        log::debug!("Messages completion successful, {} content blocks", response.content.len());

        Ok(Json(response).into_response())
    }
}
