//! Upstream relays.
//!
//! A relay drives one accepted request against the provider and turns what
//! comes back into frames. Streaming replies follow a small state machine:
//! the first increment is prefixed with an echo of the prompt, every
//! increment becomes one `chat` frame, and the stream is closed off by
//! exactly one terminal frame (end marker, retry, or error). Image requests
//! produce a single `image` or `error` frame.
//!
//! Every frame a relay writes carries the relay's own id, and each write is
//! awaited before the next increment is pulled, so a reply reaches the client
//! in production order.

use crate::dispatcher::Dispatcher;
use crate::frame::{Frame, FrameKind};
use crate::{GatewayError, Result};
use base64::Engine;
use chatrelay_core::{id, ModelSpec};
use chatrelay_providers::{
    CompletionOptions, ImageRequest, ImageSize, IncrementStream, Message, Provider,
    ProviderError,
};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Payload prefix that routes a request to image generation.
pub const IMAGE_PREFIX: &str = "/image ";

/// Final `chat` frame of a reply that produced output.
pub const END_MARKER: &str = "\n\n###### [END] ######";

/// Payload of the `retry` frame sent when a stream produced nothing.
pub const NO_RESPONSE: &str = "[ERROR] NO RESPONSE, PLEASE RETRY";

/// Route prefix generated images are served under.
pub const ASSET_ROUTE: &str = "api/assets";

/// Layout of the per-day image directory.
const DATE_DIR_FORMAT: &str = "%Y-%m-%d";

/// Length of generated image file names, without extension.
const IMAGE_NAME_LEN: usize = 16;

/// Process-wide inputs shared by every relay.
pub struct RelayContext {
    pub provider: Arc<dyn Provider>,
    pub model: &'static ModelSpec,
    /// Upper bound on generated tokens per reply.
    pub max_length: usize,
    pub assets_dir: PathBuf,
    /// Cancelled on hard shutdown; relays stop writing once it fires.
    pub shutdown: CancellationToken,
}

impl RelayContext {
    fn options(&self) -> CompletionOptions {
        CompletionOptions::new(self.max_length, &self.model.sampling)
    }
}

/// One accepted request, shaped for the upstream call it needs.
#[derive(Debug, Clone, PartialEq)]
pub enum RelayRequest {
    /// Chat completion over the conversation, latest turn last.
    Chat {
        prompt: String,
        history: Vec<Message>,
    },
    /// Single-turn completion of the latest prompt.
    Completion { prompt: String },
    /// Image generation; `request_text` is the payload as received.
    Image {
        request_text: String,
        prompt: String,
    },
}

impl RelayRequest {
    /// Route a payload by prefix and model family.
    ///
    /// Chat-family requests are appended to `history` before the snapshot
    /// is taken; image and single-turn requests leave it untouched.
    pub fn classify(payload: &str, model: &ModelSpec, history: &mut Vec<Message>) -> Self {
        if let Some(prompt) = payload.strip_prefix(IMAGE_PREFIX) {
            return Self::Image {
                request_text: payload.to_string(),
                prompt: prompt.to_string(),
            };
        }

        if model.uses_history() {
            history.push(Message::user(payload));
            Self::Chat {
                prompt: payload.to_string(),
                history: history.clone(),
            }
        } else {
            Self::Completion {
                prompt: payload.to_string(),
            }
        }
    }
}

/// How a relay ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    /// The stream finished with output; `reply` is the generated text alone.
    Completed { reply: String },
    /// The stream finished without any increment.
    Retry,
    /// An error frame was sent.
    Failed,
    /// A write failed or the gateway is shutting down; output was cut short.
    Aborted,
    /// An image was stored at `file` and announced as `url`.
    Image { file: PathBuf, url: String },
}

/// Failures on the image path. The display text goes to the client.
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("generate image error: {0}")]
    Generate(#[source] ProviderError),

    #[error("generate image error: result is empty")]
    Empty,

    #[error("image base64 decode error: {0}")]
    Decode(#[source] base64::DecodeError),

    #[error("create image directory error: {0}")]
    CreateDir(#[source] std::io::Error),

    #[error("write png image error: {0}")]
    Write(#[source] std::io::Error),
}

/// Driver for one request.
pub struct Relay {
    ctx: Arc<RelayContext>,
    dispatcher: Dispatcher,
    id: String,
}

impl Relay {
    /// Create a relay with a fresh frame id.
    pub fn new(ctx: Arc<RelayContext>, dispatcher: Dispatcher) -> Self {
        Self {
            ctx,
            dispatcher,
            id: id::uuid(),
        }
    }

    /// Run the request to its terminal frame.
    pub async fn run(self, request: RelayRequest) -> RelayOutcome {
        let provider = &self.ctx.provider;
        let model = self.ctx.model.id;
        match request {
            RelayRequest::Chat { prompt, history } => {
                let opened = provider
                    .chat_stream(model, &history, self.ctx.options())
                    .await;
                self.stream(&prompt, opened).await
            }
            RelayRequest::Completion { prompt } => {
                let opened = provider
                    .completion_stream(model, &prompt, self.ctx.options())
                    .await;
                self.stream(&prompt, opened).await
            }
            RelayRequest::Image {
                request_text,
                prompt,
            } => self.image(&request_text, &prompt).await,
        }
    }

    async fn emit(&self, kind: FrameKind, msg: impl Into<String>) -> Result<()> {
        if self.ctx.shutdown.is_cancelled() {
            return Err(GatewayError::Cancelled);
        }
        self.dispatcher
            .send_frame(Frame::new(kind, msg, self.id.clone()))
            .await
    }

    /// Send the terminal frame and report `outcome` if it was written.
    async fn finish(&self, kind: FrameKind, msg: String, outcome: RelayOutcome) -> RelayOutcome {
        match self.emit(kind, msg).await {
            Ok(()) => outcome,
            Err(e) => {
                debug!("Relay {} dropped its final frame: {}", self.id, e);
                RelayOutcome::Aborted
            }
        }
    }

    async fn stream(
        &self,
        prompt: &str,
        opened: chatrelay_providers::Result<IncrementStream>,
    ) -> RelayOutcome {
        let mut increments = match opened {
            Ok(stream) => stream,
            Err(e) => {
                let msg = format!(
                    "[ERROR] create stream model={} error: {}",
                    self.ctx.model.id, e
                );
                error!("{}", msg);
                return self.finish(FrameKind::Error, msg, RelayOutcome::Failed).await;
            }
        };

        let mut received = 0usize;
        let mut reply = String::new();
        let mut transcript = String::new();
        let mut broken = None;

        while let Some(item) = increments.next().await {
            let increment = match item {
                Ok(increment) => increment,
                Err(e) => {
                    broken = Some(e);
                    break;
                }
            };

            let text = increment.concat();
            let msg = if received == 0 {
                format!("# {}\n\n{}", prompt, text)
            } else {
                text.clone()
            };
            received += 1;
            reply.push_str(&text);
            transcript.push_str(&msg);

            if let Err(e) = self.emit(FrameKind::Chat, msg).await {
                debug!("Relay {} stopped after {} increments: {}", self.id, received, e);
                return RelayOutcome::Aborted;
            }
        }

        if !transcript.is_empty() {
            info!("[RESPONSE] {}", transcript);
        }

        match broken {
            Some(e) => {
                let msg = format!("[ERROR] {}", e);
                error!("{}", msg);
                self.finish(FrameKind::Error, msg, RelayOutcome::Failed).await
            }
            None if received == 0 => {
                error!("{}", NO_RESPONSE);
                self.finish(FrameKind::Retry, NO_RESPONSE.to_string(), RelayOutcome::Retry)
                    .await
            }
            None => {
                self.finish(
                    FrameKind::Chat,
                    END_MARKER.to_string(),
                    RelayOutcome::Completed { reply },
                )
                .await
            }
        }
    }

    async fn image(&self, request_text: &str, prompt: &str) -> RelayOutcome {
        match self.generate_image(prompt).await {
            Ok((file, url)) => {
                info!("[IMAGE] # {}\n{}", request_text, url);
                self.finish(FrameKind::Image, url.clone(), RelayOutcome::Image { file, url })
                    .await
            }
            Err(e) => {
                let msg = format!("[ERROR] {}", e);
                error!("{}", msg);
                self.finish(FrameKind::Error, msg, RelayOutcome::Failed).await
            }
        }
    }

    /// Generate, decode and store one image. Returns the file and its URL.
    async fn generate_image(&self, prompt: &str) -> std::result::Result<(PathBuf, String), ImageError> {
        let request = ImageRequest::single(prompt, ImageSize::Small);
        let images = self
            .ctx
            .provider
            .generate_image(&request)
            .await
            .map_err(ImageError::Generate)?;
        let image = images.into_iter().next().ok_or(ImageError::Empty)?;

        let bytes = base64::engine::general_purpose::STANDARD
            .decode(image.b64_json.as_bytes())
            .map_err(ImageError::Decode)?;

        let date = chrono::Local::now().format(DATE_DIR_FORMAT).to_string();
        let dir = self.ctx.assets_dir.join("images").join(&date);
        create_private_dir(&dir)
            .await
            .map_err(ImageError::CreateDir)?;

        let name = format!("{}.png", id::random_name(IMAGE_NAME_LEN));
        let file = dir.join(&name);
        write_private_file(&file, &bytes)
            .await
            .map_err(ImageError::Write)?;

        let url = format!("{}/images/{}/{}", ASSET_ROUTE, date, name);
        Ok((file, url))
    }
}

async fn create_private_dir(dir: &Path) -> std::io::Result<()> {
    let mut builder = tokio::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    builder.mode(0o700);
    builder.create(dir).await
}

async fn write_private_file(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o600);
    let mut file = options.open(path).await?;
    file.write_all(bytes).await?;
    file.flush().await
}
