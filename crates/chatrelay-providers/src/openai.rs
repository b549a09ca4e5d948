//! OpenAI provider implementation.
//!
//! Talks to `/chat/completions`, `/completions`, and `/images/generations` of
//! the OpenAI API or any server that mirrors it.

use crate::{
    CompletionOptions, GeneratedImage, ImageRequest, Increment, IncrementStream, Message,
    Provider, ProviderError, Result,
};
use async_trait::async_trait;
use chatrelay_core::SecretString;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use reqwest::{Client, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;
use tokio::time;
use tracing::{debug, warn};

/// Default OpenAI API base URL.
const DEFAULT_API_BASE: &str = chatrelay_core::config::DEFAULT_API_BASE;

/// Time allowed to establish the TCP/TLS connection.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Whole-request bound for the non-streaming image call.
const IMAGE_TIMEOUT: Duration = Duration::from_secs(300);

/// Longest gap tolerated between two events of an open stream.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(120);

/// OpenAI provider.
pub struct OpenAIProvider {
    /// HTTP client.
    client: Client,

    /// API key.
    api_key: SecretString,

    /// API base URL.
    api_base: String,

    /// Idle bound applied to every streamed read.
    idle_timeout: Duration,
}

impl OpenAIProvider {
    /// Create a new OpenAI provider with an API key.
    pub fn new(api_key: impl Into<SecretString>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(ProviderError::config("API key is required"));
        }

        // No whole-request timeout: replies may stream for a long time.
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| ProviderError::config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            api_base: DEFAULT_API_BASE.to_string(),
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        })
    }

    /// Build a provider from the loaded configuration.
    pub fn from_config(config: &chatrelay_core::Config) -> Result<Self> {
        Ok(Self::new(config.api_key.clone())?.with_base_url(&config.api_base))
    }

    /// Set the API base URL (for compatible APIs).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the longest silence tolerated inside an open stream.
    pub fn with_idle_timeout(mut self, idle: Duration) -> Self {
        self.idle_timeout = idle;
        self
    }

    async fn post<B: Serialize>(
        &self,
        endpoint: &str,
        body: &B,
        timeout: Option<Duration>,
    ) -> Result<Response> {
        let mut request = self
            .client
            .post(format!("{}/{}", self.api_base, endpoint))
            .bearer_auth(self.api_key.expose_secret())
            .json(body);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }
        let response = request.send().await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = match response.json::<OpenAIError>().await {
            Ok(body) => body.error.message,
            Err(_) => "Unknown error".to_string(),
        };
        Err(ProviderError::from_status(status.as_u16(), message))
    }
}

/// What one SSE event contributes to the increment stream.
enum SseItem {
    Done,
    Skip,
    Item(Result<Increment>),
}

/// Classify one event body. An upstream `error` object wins over chunk
/// parsing, since chunks tolerate missing `choices`.
fn parse_event<C, F>(data: &str, extract: F) -> SseItem
where
    C: DeserializeOwned,
    F: Fn(C) -> Vec<String>,
{
    let data = data.trim();
    if data == "[DONE]" {
        return SseItem::Done;
    }
    if data.is_empty() {
        return SseItem::Skip;
    }
    if let Ok(err) = serde_json::from_str::<OpenAIError>(data) {
        return SseItem::Item(Err(ProviderError::stream(err.error.message)));
    }

    match serde_json::from_str::<C>(data) {
        Ok(chunk) => {
            let fragments = extract(chunk);
            if fragments.is_empty() {
                SseItem::Skip
            } else {
                SseItem::Item(Ok(Increment::new(fragments)))
            }
        }
        Err(e) => {
            warn!("Failed to parse SSE event: {}", e);
            SseItem::Skip
        }
    }
}

/// Turn an SSE response into an increment stream.
///
/// `extract` pulls the text fragments out of one parsed chunk; chunks with no
/// choices produce no increment. A `[DONE]` sentinel or the body ending both
/// end the stream normally. The stream ends after its first error, and a gap
/// longer than `idle` between events is an error.
fn increment_stream<C, F>(response: Response, idle: Duration, extract: F) -> IncrementStream
where
    C: DeserializeOwned + 'static,
    F: Fn(C) -> Vec<String> + Copy + Send + Sync + 'static,
{
    let events = Box::pin(response.bytes_stream().eventsource());

    let stream = futures::stream::unfold(Some(events), move |events| async move {
        let mut events = events?;
        loop {
            let event = match time::timeout(idle, events.next()).await {
                Err(_) => {
                    let err = ProviderError::stream(format!("no data received for {:?}", idle));
                    return Some((Err(err), None));
                }
                Ok(None) => return None,
                Ok(Some(Err(e))) => {
                    return Some((Err(ProviderError::stream(e.to_string())), None));
                }
                Ok(Some(Ok(event))) => event,
            };

            match parse_event::<C, F>(&event.data, extract) {
                SseItem::Done => return None,
                SseItem::Skip => continue,
                SseItem::Item(Ok(increment)) => return Some((Ok(increment), Some(events))),
                SseItem::Item(Err(e)) => return Some((Err(e), None)),
            }
        }
    });

    Box::pin(stream)
}

#[async_trait]
impl Provider for OpenAIProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn chat_stream(
        &self,
        model: &str,
        messages: &[Message],
        options: CompletionOptions,
    ) -> Result<IncrementStream> {
        let request = ChatRequest {
            model,
            messages: messages
                .iter()
                .map(|m| ChatMessage {
                    role: m.role.as_str(),
                    content: &m.content,
                })
                .collect(),
            options,
            stream: true,
        };

        debug!(
            "Opening chat stream: model={} turns={}",
            model,
            messages.len()
        );
        let response = self.post("chat/completions", &request, None).await?;

        Ok(increment_stream(response, self.idle_timeout, |chunk: ChatStreamChunk| {
            chunk
                .choices
                .into_iter()
                .map(|c| c.delta.content.unwrap_or_default())
                .collect()
        }))
    }

    async fn completion_stream(
        &self,
        model: &str,
        prompt: &str,
        options: CompletionOptions,
    ) -> Result<IncrementStream> {
        let request = CompletionRequest {
            model,
            prompt,
            options,
            stream: true,
        };

        debug!("Opening completion stream: model={}", model);
        let response = self.post("completions", &request, None).await?;

        Ok(increment_stream(response, self.idle_timeout, |chunk: CompletionStreamChunk| {
            chunk.choices.into_iter().map(|c| c.text).collect()
        }))
    }

    async fn generate_image(&self, request: &ImageRequest) -> Result<Vec<GeneratedImage>> {
        let body = ImageGenerationRequest {
            prompt: &request.prompt,
            n: request.n,
            size: request.size.as_str(),
            response_format: "b64_json",
        };

        debug!("Requesting image: size={}", request.size.as_str());
        let response = self
            .post("images/generations", &body, Some(IMAGE_TIMEOUT))
            .await?;
        let result: ImageGenerationResponse = response.json().await?;
        Ok(result.data)
    }
}

// Internal types for the OpenAI API

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(flatten)]
    options: CompletionOptions,
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(flatten)]
    options: CompletionOptions,
    stream: bool,
}

#[derive(Serialize)]
struct ImageGenerationRequest<'a> {
    prompt: &'a str,
    n: u8,
    size: &'a str,
    response_format: &'a str,
}

#[derive(Deserialize)]
struct ImageGenerationResponse {
    #[serde(default)]
    data: Vec<GeneratedImage>,
}

#[derive(Deserialize)]
struct OpenAIError {
    error: OpenAIErrorDetail,
}

#[derive(Deserialize)]
struct OpenAIErrorDetail {
    message: String,
}

// Streaming types

#[derive(Deserialize)]
struct ChatStreamChunk {
    #[serde(default)]
    choices: Vec<ChatStreamChoice>,
}

#[derive(Deserialize)]
struct ChatStreamChoice {
    delta: ChatStreamDelta,
}

#[derive(Deserialize)]
struct ChatStreamDelta {
    content: Option<String>,
}

#[derive(Deserialize)]
struct CompletionStreamChunk {
    #[serde(default)]
    choices: Vec<CompletionStreamChoice>,
}

#[derive(Deserialize)]
struct CompletionStreamChoice {
    #[serde(default)]
    text: String,
}
