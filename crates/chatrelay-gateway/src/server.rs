//! HTTP surface of the gateway.

use crate::relay::RelayContext;
use crate::session::{Session, SessionSettings};
use crate::Result;
use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, WebSocket, WebSocketUpgrade},
        State,
    },
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chatrelay_core::Config;
use chatrelay_providers::Provider;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Status reported by a failed HTTP call.
pub const STATUS_FAIL: &str = "FAIL";

/// JSON envelope for plain HTTP replies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse {
    pub status: String,
    pub msg: String,
    /// Time spent handling the request.
    pub duration: String,
    pub data: serde_json::Value,
}

impl ApiResponse {
    /// Failure envelope timed from `started`.
    pub fn fail(msg: impl Into<String>, started: Instant) -> Self {
        Self {
            status: STATUS_FAIL.to_string(),
            msg: msg.into(),
            duration: format!("{:?}", started.elapsed()),
            data: serde_json::json!({}),
        }
    }
}

/// State shared by every handler.
struct GatewayState {
    relay: Arc<RelayContext>,
    settings: SessionSettings,
    sessions: AtomicUsize,
}

/// The chat gateway server.
pub struct Gateway {
    state: Arc<GatewayState>,
    port: u16,
    cors: bool,
    assets_dir: PathBuf,
    shutdown: CancellationToken,
}

impl Gateway {
    /// Build a gateway from a validated configuration.
    ///
    /// Fails when the configured model is not in the catalog.
    pub fn new(config: &Config, provider: Arc<dyn Provider>) -> Result<Self> {
        let model = config.model_spec()?;
        let shutdown = CancellationToken::new();

        let relay = Arc::new(RelayContext {
            provider,
            model,
            max_length: config.max_length,
            assets_dir: config.assets_dir.clone(),
            shutdown: shutdown.clone(),
        });

        let state = Arc::new(GatewayState {
            relay,
            settings: SessionSettings::from(config),
            sessions: AtomicUsize::new(0),
        });

        Ok(Self {
            state,
            port: config.port,
            cors: config.cors,
            assets_dir: config.assets_dir.clone(),
            shutdown,
        })
    }

    /// Token that stops the server and silences relays when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Number of open sessions.
    pub fn session_count(&self) -> usize {
        self.state.sessions.load(Ordering::Relaxed)
    }

    /// Create the Axum router.
    pub fn router(&self) -> Router {
        let mut router = Router::new()
            .route("/api/ws/chat", get(ws_handler))
            .route("/api/health", get(health_handler))
            .nest_service("/api/assets", ServeDir::new(&self.assets_dir))
            .with_state(self.state.clone());

        if self.cors {
            router = router.layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers([header::CONTENT_TYPE]),
            );
        }

        router.layer(TraceLayer::new_for_http())
    }

    /// Bind the configured port on all interfaces and serve.
    pub async fn run(&self) -> Result<()> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr).await?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener until the shutdown token fires.
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        info!(
            "Starting gateway server on {} (model {})",
            listener.local_addr()?,
            self.state.relay.model.id
        );

        let shutdown = self.shutdown.clone();
        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;

        info!("Gateway server stopped");
        Ok(())
    }
}

/// WebSocket upgrade handler.
async fn ws_handler(
    State(state): State<Arc<GatewayState>>,
    upgrade: std::result::Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let started = Instant::now();
    match upgrade {
        Ok(ws) => ws.on_upgrade(move |socket| handle_socket(socket, state)),
        Err(rejection) => {
            let msg = format!(
                "[ERROR] failed to upgrade websocket {}",
                rejection.body_text()
            );
            error!("{}", msg);
            (StatusCode::FORBIDDEN, Json(ApiResponse::fail(msg, started))).into_response()
        }
    }
}

async fn handle_socket(socket: WebSocket, state: Arc<GatewayState>) {
    let (sink, stream) = socket.split();
    let session = Session::new(state.settings, state.relay.clone());
    let id = session.id().to_string();

    state.sessions.fetch_add(1, Ordering::Relaxed);
    let reason = session.run(sink, stream).await;
    state.sessions.fetch_sub(1, Ordering::Relaxed);

    info!("Session {} closed: {:?}", id, reason);
}

/// Health check handler.
async fn health_handler(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "sessions": state.sessions.load(Ordering::Relaxed),
    }))
}
