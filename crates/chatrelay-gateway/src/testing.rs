//! Test doubles shared by the gateway's unit tests.

use async_trait::async_trait;
use axum::extract::ws::Message as WsMessage;
use chatrelay_core::ModelSpec;
use chatrelay_providers::{
    CompletionOptions, GeneratedImage, ImageRequest, Increment, IncrementStream, Message,
    Provider, ProviderError, Result,
};
use futures::{stream, Sink};
use std::pin::Pin;
use std::sync::Mutex;
use std::task::{Context, Poll};
use std::time::Duration;

/// A call the scripted provider received.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Chat {
        model: String,
        messages: Vec<Message>,
        options: CompletionOptions,
    },
    Completion {
        model: String,
        prompt: String,
        options: CompletionOptions,
    },
    Image(ImageRequest),
}

/// Provider that replays a fixed script for every call.
#[derive(Default)]
pub struct ScriptedProvider {
    increments: Vec<Increment>,
    establish_error: Option<String>,
    stream_error: Option<String>,
    image: Option<std::result::Result<Vec<GeneratedImage>, String>>,
    delay: Option<Duration>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedProvider {
    /// Stream one single-fragment increment per item.
    pub fn replying(fragments: &[&str]) -> Self {
        Self {
            increments: fragments.iter().map(|f| Increment::text(*f)).collect(),
            ..Default::default()
        }
    }

    pub fn failing_to_connect(message: &str) -> Self {
        Self {
            establish_error: Some(message.to_string()),
            ..Default::default()
        }
    }

    /// Break the stream off after the scripted increments.
    pub fn with_stream_error(mut self, message: &str) -> Self {
        self.stream_error = Some(message.to_string());
        self
    }

    pub fn with_images(mut self, images: Vec<GeneratedImage>) -> Self {
        self.image = Some(Ok(images));
        self
    }

    pub fn with_image_error(mut self, message: &str) -> Self {
        self.image = Some(Err(message.to_string()));
        self
    }

    /// Pause before each increment.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn script(&self) -> Result<IncrementStream> {
        if let Some(message) = &self.establish_error {
            return Err(ProviderError::stream(message.clone()));
        }

        let mut items: Vec<Result<Increment>> =
            self.increments.iter().cloned().map(Ok).collect();
        if let Some(message) = &self.stream_error {
            items.push(Err(ProviderError::stream(message.clone())));
        }

        let delay = self.delay;
        Ok(Box::pin(stream::unfold(
            items.into_iter(),
            move |mut items| async move {
                let item = items.next()?;
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                Some((item, items))
            },
        )))
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn chat_stream(
        &self,
        model: &str,
        messages: &[Message],
        options: CompletionOptions,
    ) -> Result<IncrementStream> {
        self.record(Call::Chat {
            model: model.to_string(),
            messages: messages.to_vec(),
            options,
        });
        self.script()
    }

    async fn completion_stream(
        &self,
        model: &str,
        prompt: &str,
        options: CompletionOptions,
    ) -> Result<IncrementStream> {
        self.record(Call::Completion {
            model: model.to_string(),
            prompt: prompt.to_string(),
            options,
        });
        self.script()
    }

    async fn generate_image(&self, request: &ImageRequest) -> Result<Vec<GeneratedImage>> {
        self.record(Call::Image(request.clone()));
        match &self.image {
            Some(Ok(images)) => Ok(images.clone()),
            Some(Err(message)) => Err(ProviderError::ServerError {
                status: 500,
                message: message.clone(),
            }),
            None => Ok(Vec::new()),
        }
    }
}

pub fn chat_model() -> &'static ModelSpec {
    ModelSpec::lookup("gpt-3.5-turbo").unwrap()
}

pub fn legacy_model() -> &'static ModelSpec {
    ModelSpec::lookup("text-davinci-003").unwrap()
}

/// Base64 of a 1x1 transparent PNG.
pub const TINY_PNG_B64: &str =
    "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAQAAAC1HAwCAAAAC0lEQVR42mNkYAAAAAYAAjCB0C8AAAAASUVORK5CYII=";

/// Sink of a peer that stopped reading: nothing is ever accepted or closed.
pub struct StalledSink;

impl Sink<WsMessage> for StalledSink {
    type Error = std::io::Error;

    fn poll_ready(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Pending
    }

    fn start_send(self: Pin<&mut Self>, _item: WsMessage) -> std::io::Result<()> {
        Ok(())
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Pending
    }
}
