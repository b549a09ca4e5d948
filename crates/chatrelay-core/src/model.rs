//! Catalog of supported model identifiers.
//!
//! The catalog is a static table: each identifier maps to the request shape it
//! needs upstream (chat history vs. a single prompt) and the sampling
//! parameters sent with it. It is consulted once when the configuration is
//! validated and read-only afterwards.

use serde::Serialize;

/// Request shape a model expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelFamily {
    /// Chat-completion models; they receive the whole conversation history.
    Chat,
    /// Single-turn completion models; they receive only the latest prompt.
    Legacy,
}

impl ModelFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::Legacy => "legacy",
        }
    }
}

impl std::fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sampling parameters sent with every request for a model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SamplingParams {
    pub temperature: f32,
    pub top_p: f32,
    pub frequency_penalty: f32,
    pub presence_penalty: f32,
}

const CHAT_SAMPLING: SamplingParams = SamplingParams {
    temperature: 1.0,
    top_p: 1.0,
    frequency_penalty: 0.1,
    presence_penalty: 0.1,
};

const LEGACY_SAMPLING: SamplingParams = SamplingParams {
    temperature: 0.6,
    top_p: 1.0,
    frequency_penalty: 0.1,
    presence_penalty: 0.1,
};

/// One entry of the model catalog.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ModelSpec {
    pub id: &'static str,
    pub family: ModelFamily,
    pub sampling: SamplingParams,
}

const fn chat(id: &'static str) -> ModelSpec {
    ModelSpec {
        id,
        family: ModelFamily::Chat,
        sampling: CHAT_SAMPLING,
    }
}

const fn legacy(id: &'static str) -> ModelSpec {
    ModelSpec {
        id,
        family: ModelFamily::Legacy,
        sampling: LEGACY_SAMPLING,
    }
}

/// Every model the gateway accepts in its configuration.
pub const MODELS: &[ModelSpec] = &[
    chat("gpt-4-32k-0314"),
    chat("gpt-4-32k"),
    chat("gpt-4-0314"),
    chat("gpt-4"),
    chat("gpt-3.5-turbo-0301"),
    chat("gpt-3.5-turbo"),
    legacy("text-davinci-003"),
    legacy("text-davinci-002"),
    legacy("text-curie-001"),
    legacy("text-babbage-001"),
    legacy("text-ada-001"),
    legacy("text-davinci-001"),
    legacy("davinci-instruct-beta"),
    legacy("davinci"),
    legacy("curie-instruct-beta"),
    legacy("curie"),
    legacy("ada"),
    legacy("babbage"),
];

impl ModelSpec {
    /// Look up a model by its exact identifier.
    pub fn lookup(id: &str) -> Option<&'static ModelSpec> {
        MODELS.iter().find(|m| m.id == id)
    }

    /// Whether requests carry the full conversation history.
    pub fn uses_history(&self) -> bool {
        self.family == ModelFamily::Chat
    }
}
