//! Common types for upstream providers.

use chatrelay_core::SamplingParams;
use serde::{Deserialize, Serialize};

/// Message role in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// User message.
    User,
    /// Assistant message.
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One role-tagged turn of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// Options sent with a streaming completion request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CompletionOptions {
    /// Maximum tokens to generate.
    pub max_tokens: usize,
    pub temperature: f32,
    pub top_p: f32,
    pub frequency_penalty: f32,
    pub presence_penalty: f32,
}

impl CompletionOptions {
    /// Build options from a catalog entry's sampling parameters.
    pub fn new(max_tokens: usize, sampling: &SamplingParams) -> Self {
        Self {
            max_tokens,
            temperature: sampling.temperature,
            top_p: sampling.top_p,
            frequency_penalty: sampling.frequency_penalty,
            presence_penalty: sampling.presence_penalty,
        }
    }
}

/// One partial unit of streamed output.
///
/// An increment carries one text fragment per choice in the upstream chunk.
/// Chunks without any choice never become increments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Increment {
    pub fragments: Vec<String>,
}

impl Increment {
    pub fn new(fragments: Vec<String>) -> Self {
        Self { fragments }
    }

    /// Single-fragment increment.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            fragments: vec![text.into()],
        }
    }

    /// All fragments joined in order.
    pub fn concat(&self) -> String {
        self.fragments.concat()
    }
}

/// Image dimensions supported by the image endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageSize {
    #[default]
    #[serde(rename = "256x256")]
    Small,
}

impl ImageSize {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Small => "256x256",
        }
    }
}

/// Request for a batch image generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRequest {
    pub prompt: String,
    pub size: ImageSize,
    /// Number of images requested.
    pub n: u8,
}

impl ImageRequest {
    /// A request for exactly one image of the given size.
    pub fn single(prompt: impl Into<String>, size: ImageSize) -> Self {
        Self {
            prompt: prompt.into(),
            size,
            n: 1,
        }
    }
}

/// One generated image as returned upstream, still base64 encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedImage {
    pub b64_json: String,
}
