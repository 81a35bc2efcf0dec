//! Upstream OpenAI-compatible HTTP client.

use std::{sync::OnceLock, time::Duration};

use futures::Stream;
use reqwest::Client;
use secrecy::ExposeSecret;

use crate::{
    error::{Error, Result},
    messages::openai,
};

/// Common HTTP client to re-use connections across requests. Per-request
/// deadlines are applied via `RequestBuilder::timeout`, so the builder-level
/// timeout stays off.
pub(crate) fn http_client() -> Client {
    static CLIENT: OnceLock<Client> = OnceLock::new();

    CLIENT
        .get_or_init(|| {
            Client::builder()
                .pool_idle_timeout(Some(Duration::from_secs(5)))
                .tcp_nodelay(true)
                .tcp_keepalive(Some(Duration::from_secs(60)))
                .build()
                .expect("Failed to build default HTTP client")
        })
        .clone()
}

fn chat_completions_url(base_url: &str) -> String {
    format!("{}/chat/completions", base_url.trim_end_matches('/'))
}

fn request_builder(
    client: &Client,
    config: &config::Config,
    request: &openai::ChatCompletionRequest,
    timeout: Duration,
) -> reqwest::RequestBuilder {
    let url = chat_completions_url(&config.openai.base_url);

    let mut builder = client.post(url).timeout(timeout).json(request);

    if let Some(api_key) = &config.openai.api_key {
        builder = builder.bearer_auth(api_key.expose_secret());
    }

    builder
}

/// Sends a non-streaming chat completion and parses the response body.
pub(crate) async fn send(
    client: &Client,
    config: &config::Config,
    request: &openai::ChatCompletionRequest,
    timeout: Duration,
) -> Result<openai::ChatCompletionResponse> {
    let response = request_builder(client, config, request, timeout)
        .send()
        .await
        .map_err(Error::from_reqwest)?;

    let status = response.status();

    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        log::error!("Upstream API error ({status}): {body}");

        return Err(Error::from_upstream_status(status.as_u16(), body));
    }

    let body = response.text().await.map_err(|error| {
        log::error!("Failed to read upstream response body: {error}");
        Error::from_reqwest(error)
    })?;

    serde_json::from_str(&body).map_err(|error| {
        log::error!("Failed to parse upstream chat completion response: {error}");
        log::debug!("Response parsing failed, length: {} bytes", body.len());

        Error::InvalidUpstream(error.to_string())
    })
}

/// Sends a streaming chat completion and returns the raw SSE byte stream.
///
/// The deadline covers the whole body: when it elapses mid-stream the byte
/// stream yields an error, which the converter turns into an in-band `error`
/// event.
pub(crate) async fn send_streaming(
    client: &Client,
    config: &config::Config,
    request: &openai::ChatCompletionRequest,
    timeout: Duration,
) -> Result<impl Stream<Item = reqwest::Result<bytes::Bytes>> + Send + use<>> {
    let response = request_builder(client, config, request, timeout)
        .send()
        .await
        .map_err(Error::from_reqwest)?;

    let status = response.status();

    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        log::error!("Upstream streaming API error ({status}): {body}");

        return Err(Error::from_upstream_status(status.as_u16(), body));
    }

    Ok(response.bytes_stream())
}
