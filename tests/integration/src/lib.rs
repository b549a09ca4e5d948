//! Shared harness for end-to-end tests: a gateway on an ephemeral port, a
//! scripted upstream, and a WebSocket client that speaks frames.

use async_trait::async_trait;
use chatrelay_core::Config;
use chatrelay_gateway::{Frame, Gateway};
use chatrelay_providers::{
    CompletionOptions, GeneratedImage, ImageRequest, Increment, IncrementStream, Message,
    Provider, Result,
};
use futures::{stream, SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

/// How long a test waits for any single frame.
const FRAME_TIMEOUT: Duration = Duration::from_secs(5);

/// Upstream double that answers every completion with the same increments
/// and every image request with the same images.
#[derive(Default)]
pub struct ScriptedProvider {
    fragments: Vec<String>,
    images: Vec<GeneratedImage>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    pub fn replying(fragments: &[&str]) -> Self {
        Self {
            fragments: fragments.iter().map(|f| f.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn with_image(mut self, b64_json: &str) -> Self {
        self.images.push(GeneratedImage {
            b64_json: b64_json.to_string(),
        });
        self
    }

    /// Prompts received so far, in arrival order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    fn replay(&self, prompt: &str) -> IncrementStream {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let items: Vec<Result<Increment>> = self
            .fragments
            .iter()
            .map(|f| Ok(Increment::text(f.clone())))
            .collect();
        Box::pin(stream::iter(items))
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn chat_stream(
        &self,
        _model: &str,
        messages: &[Message],
        _options: CompletionOptions,
    ) -> Result<IncrementStream> {
        let prompt = messages.last().map(|m| m.content.as_str()).unwrap_or_default();
        Ok(self.replay(prompt))
    }

    async fn completion_stream(
        &self,
        _model: &str,
        prompt: &str,
        _options: CompletionOptions,
    ) -> Result<IncrementStream> {
        Ok(self.replay(prompt))
    }

    async fn generate_image(&self, request: &ImageRequest) -> Result<Vec<GeneratedImage>> {
        self.prompts.lock().unwrap().push(request.prompt.clone());
        Ok(self.images.clone())
    }
}

/// A running gateway bound to 127.0.0.1 on an ephemeral port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub assets: TempDir,
    pub provider: Arc<ScriptedProvider>,
    shutdown: CancellationToken,
    task: JoinHandle<chatrelay_gateway::Result<()>>,
}

impl TestServer {
    pub async fn start(provider: ScriptedProvider, interval_seconds: u64) -> Self {
        let assets = TempDir::new().unwrap();
        let config = Config {
            api_key: "test-key".into(),
            interval_seconds,
            assets_dir: assets.path().to_path_buf(),
            ..Default::default()
        };
        config.validate().unwrap();

        let provider = Arc::new(provider);
        let gateway = Gateway::new(&config, provider.clone()).unwrap();
        let shutdown = gateway.shutdown_token();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let task = tokio::spawn(async move { gateway.serve(listener).await });

        Self {
            addr,
            assets,
            provider,
            shutdown,
            task,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}/{}", self.addr, path.trim_start_matches('/'))
    }

    pub async fn connect(&self) -> Client {
        let url = format!("ws://{}/api/ws/chat", self.addr);
        let (ws, _) = tokio_tungstenite::connect_async(url).await.unwrap();
        Client { ws }
    }

    pub async fn stop(self) {
        self.shutdown.cancel();
        self.task.await.unwrap().unwrap();
    }
}

/// WebSocket client speaking the gateway's frame protocol.
pub struct Client {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl Client {
    pub async fn say(&mut self, text: &str) {
        self.ws.send(WsMessage::Text(text.to_string())).await.unwrap();
    }

    pub async fn send(&mut self, message: WsMessage) {
        self.ws.send(message).await.unwrap();
    }

    /// Next frame, skipping control messages.
    pub async fn frame(&mut self) -> Frame {
        loop {
            let message = tokio::time::timeout(FRAME_TIMEOUT, self.ws.next())
                .await
                .expect("timed out waiting for a frame")
                .expect("connection closed")
                .unwrap();
            match message {
                WsMessage::Text(text) => return serde_json::from_str(&text).unwrap(),
                WsMessage::Close(_) => panic!("server closed the connection"),
                _ => continue,
            }
        }
    }

    pub async fn frames(&mut self, count: usize) -> Vec<Frame> {
        let mut frames = Vec::with_capacity(count);
        for _ in 0..count {
            frames.push(self.frame().await);
        }
        frames
    }

    /// Wait for the server to end the connection.
    pub async fn closed(&mut self) -> bool {
        loop {
            match tokio::time::timeout(FRAME_TIMEOUT, self.ws.next()).await {
                Ok(None) | Ok(Some(Err(_))) | Ok(Some(Ok(WsMessage::Close(_)))) => return true,
                Ok(Some(Ok(_))) => continue,
                Err(_) => return false,
            }
        }
    }

    pub async fn close(mut self) {
        let _ = self.ws.close(None).await;
    }
}
