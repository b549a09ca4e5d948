//! Upstream provider implementations for ChatRelay.
//!
//! The gateway consumes a provider through three capabilities:
//! - a chat-style streaming completion over the whole conversation,
//! - a legacy streaming completion over a single prompt,
//! - a batch image generation.
//!
//! # Example
//!
//! ```rust,ignore
//! use chatrelay_providers::{openai::OpenAIProvider, CompletionOptions, Message, Provider};
//! use futures::StreamExt;
//!
//! let provider = OpenAIProvider::new("your-api-key")?;
//! let spec = chatrelay_core::ModelSpec::lookup("gpt-3.5-turbo").unwrap();
//! let mut stream = provider
//!     .chat_stream(spec.id, &[Message::user("Hello!")], CompletionOptions::new(256, &spec.sampling))
//!     .await?;
//! while let Some(increment) = stream.next().await {
//!     print!("{}", increment?.concat());
//! }
//! ```

mod error;
mod types;

#[cfg(feature = "openai")]
pub mod openai;

pub use error::{ProviderError, Result};
pub use types::*;

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

/// Stream of increments for streaming responses.
///
/// The stream ending (`None`) is the normal end of a reply; an `Err` item
/// means the reply broke off.
pub type IncrementStream = Pin<Box<dyn Stream<Item = Result<Increment>> + Send>>;

/// An upstream service that generates text and images.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Get provider name.
    fn name(&self) -> &str;

    /// Start a chat-style streaming completion over `messages`.
    ///
    /// An `Err` means the stream could not be established.
    async fn chat_stream(
        &self,
        model: &str,
        messages: &[Message],
        options: CompletionOptions,
    ) -> Result<IncrementStream>;

    /// Start a single-prompt streaming completion.
    async fn completion_stream(
        &self,
        model: &str,
        prompt: &str,
        options: CompletionOptions,
    ) -> Result<IncrementStream>;

    /// Generate images for a prompt.
    async fn generate_image(&self, request: &ImageRequest) -> Result<Vec<GeneratedImage>>;
}
