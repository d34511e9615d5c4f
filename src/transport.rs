//! Transport seam: POST a request, get back a line-delimited stream.

use std::sync::OnceLock;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use tracing::debug;

use crate::config::EngineConfig;
use crate::error::VolleyError;

/// Lines of a streamed response, already split on newlines and trimmed.
pub type LineStream = BoxStream<'static, Result<String, VolleyError>>;

/// The engine's only view of the network: dispatch a request body and
/// consume the resulting line stream until it ends or fails.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post_stream(&self, body: serde_json::Value) -> Result<LineStream, VolleyError>;
}

static SHARED_CLIENT: OnceLock<reqwest::Client> = OnceLock::new();

/// Get (or create) the shared reqwest client. No whole-request timeout is
/// set here; the turn controller owns the exchange timeout.
pub fn shared_client() -> &'static reqwest::Client {
    SHARED_CLIENT.get_or_init(|| {
        reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .pool_max_idle_per_host(10)
            .build()
            .expect("Failed to build HTTP client")
    })
}

/// Build default headers for a Bearer-token API.
fn bearer_headers(api_key: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Ok(val) = HeaderValue::from_str(&format!("Bearer {api_key}")) {
        headers.insert(AUTHORIZATION, val);
    }
    headers
}

fn status_to_error(status: u16, body: &str) -> VolleyError {
    match status {
        401 | 403 => VolleyError::Configuration(format!("authentication rejected: {body}")),
        _ => VolleyError::api(status, body),
    }
}

/// HTTP transport for an OpenAI-compatible chat-completions endpoint.
pub struct HttpTransport {
    base_url: String,
    api_key: String,
}

impl HttpTransport {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post_stream(&self, body: serde_json::Value) -> Result<LineStream, VolleyError> {
        if self.api_key.is_empty() {
            return Err(VolleyError::Configuration(
                "API key is empty; configure it first".to_string(),
            ));
        }

        let url = format!("{}/chat/completions", self.base_url);
        debug!(%url, "dispatching chat completion request");

        let resp = shared_client()
            .post(&url)
            .headers(bearer_headers(&self.api_key))
            .json(&body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if status != 200 {
            let body_text = resp.text().await.unwrap_or_default();
            return Err(status_to_error(status, &body_text));
        }

        let byte_stream = resp.bytes_stream();

        let stream = async_stream::stream! {
            let mut buffer = String::new();
            futures::pin_mut!(byte_stream);

            while let Some(chunk_result) = byte_stream.next().await {
                let chunk = match chunk_result {
                    Ok(c) => c,
                    Err(e) => {
                        yield Err(VolleyError::Network(e));
                        break;
                    }
                };

                buffer.push_str(&String::from_utf8_lossy(&chunk));

                while let Some(line_end) = buffer.find('\n') {
                    let line = buffer[..line_end].trim().to_string();
                    buffer = buffer[line_end + 1..].to_string();
                    if !line.is_empty() {
                        yield Ok(line);
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }
}
