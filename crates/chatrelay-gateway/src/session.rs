//! Per-connection session management.
//!
//! A session owns one upgraded connection: the read loop, the conversation
//! history, the rate limiter and the read deadline. Writes go through the
//! connection's [`Dispatcher`]; liveness probing runs in a
//! [`KeepaliveMonitor`] beside the read loop; every accepted request gets its
//! own relay task so a slow upstream never stalls reading.

use crate::dispatcher::Dispatcher;
use crate::frame::Frame;
use crate::GatewayError;
use crate::keepalive::{close_within, KeepaliveMonitor, ReadDeadline};
use crate::rate_limit::RateLimiter;
use crate::relay::{Relay, RelayContext, RelayOutcome, RelayRequest};
use axum::extract::ws::Message as WsMessage;
use chatrelay_core::{id, Config};
use chatrelay_providers::Message;
use futures::{Sink, Stream, StreamExt};
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Error sent before dropping a connection that sent a non-text data frame.
pub const UNSUPPORTED_FRAME: &str = "[ERROR] websocket receive message type not text";

/// Timing policy of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    /// Minimum spacing between accepted requests.
    pub request_interval: Duration,
    pub ping_period: Duration,
    /// Read deadline window; refreshed by ping and pong.
    pub pong_wait: Duration,
    pub write_wait: Duration,
}

impl From<&Config> for SessionSettings {
    fn from(config: &Config) -> Self {
        Self {
            request_interval: config.request_interval(),
            ping_period: config.keepalive.ping_period(),
            pong_wait: config.keepalive.pong_wait(),
            write_wait: config.keepalive.write_wait(),
        }
    }
}

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The peer sent a close frame.
    PeerClosed,
    /// Reading from the connection failed.
    ReadError(String),
    /// Nothing arrived before the read deadline.
    ReadTimeout,
    /// The keepalive monitor stopped after a failed probe.
    KeepaliveFailed,
    /// The peer sent a binary frame.
    UnsupportedFrame,
    /// The inbound stream ended without a close frame.
    StreamEnded,
}

/// One connection's state.
pub struct Session {
    id: String,
    settings: SessionSettings,
    relay: Arc<RelayContext>,
    history: Vec<Message>,
    limiter: RateLimiter,
}

impl Session {
    pub fn new(settings: SessionSettings, relay: Arc<RelayContext>) -> Self {
        Self {
            id: id::uuid(),
            limiter: RateLimiter::new(settings.request_interval),
            settings,
            relay,
            history: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Drive the connection until it ends.
    ///
    /// `sink` is handed to the writer task; `stream` is read here. When the
    /// loop exits the keepalive monitor is shut down, which closes the
    /// connection; a peer that never drains the close is dropped after the
    /// write wait. Relays still in flight are left to fail their next write.
    pub async fn run<W, R, E>(mut self, sink: W, mut stream: R) -> CloseReason
    where
        W: Sink<WsMessage> + Unpin + Send + 'static,
        W::Error: Display,
        R: Stream<Item = Result<WsMessage, E>> + Unpin,
        E: Display,
    {
        info!("websocket connection open: {}", self.id);

        let (dispatcher, mut writer) = Dispatcher::spawn(sink);
        let closed = CancellationToken::new();
        let keepalive = KeepaliveMonitor::new(
            dispatcher.clone(),
            self.settings.ping_period,
            self.settings.write_wait,
            closed.clone(),
        )
        .spawn();
        let mut deadline = ReadDeadline::new(self.settings.pong_wait);
        let (reply_tx, mut reply_rx) = mpsc::unbounded_channel::<String>();

        let reason = loop {
            if closed.is_cancelled() {
                break CloseReason::KeepaliveFailed;
            }

            tokio::select! {
                biased;

                _ = closed.cancelled() => break CloseReason::KeepaliveFailed,

                Some(reply) = reply_rx.recv() => {
                    self.history.push(Message::assistant(reply));
                }

                read = time::timeout_at(deadline.instant(), stream.next()) => {
                    let message = match read {
                        Err(_) => {
                            error!("[ERROR] read message error: no traffic within {:?}", self.settings.pong_wait);
                            break CloseReason::ReadTimeout;
                        }
                        Ok(None) => break CloseReason::StreamEnded,
                        Ok(Some(Err(e))) => {
                            error!("[ERROR] read message error: {}", e);
                            break CloseReason::ReadError(e.to_string());
                        }
                        Ok(Some(Ok(message))) => message,
                    };

                    match message {
                        WsMessage::Text(text) => self.handle_text(text, &dispatcher, &reply_tx).await,
                        WsMessage::Close(_) => {
                            info!("[CLOSED] websocket receive closed message");
                            break CloseReason::PeerClosed;
                        }
                        WsMessage::Ping(_) => {
                            deadline.refresh();
                            info!("[PING] websocket receive ping message");
                        }
                        WsMessage::Pong(_) => {
                            deadline.refresh();
                            info!("[PONG] websocket receive pong message");
                        }
                        WsMessage::Binary(_) => {
                            error!("{}", UNSUPPORTED_FRAME);
                            let _ = self.write(&dispatcher, Frame::error(UNSUPPORTED_FRAME)).await;
                            break CloseReason::UnsupportedFrame;
                        }
                    }
                }
            }
        };

        debug!("Session {} ending: {:?}", self.id, reason);
        let write_wait = self.settings.write_wait;
        if !keepalive.shutdown().await {
            close_within(&dispatcher, write_wait).await;
        }
        if time::timeout(write_wait, &mut writer).await.is_err() {
            warn!("Writer for session {} did not stop, aborting it", self.id);
            dispatcher.abort();
            writer.abort();
        }

        reason
    }

    /// Write a frame from the read loop, giving up after the write wait.
    async fn write(&self, dispatcher: &Dispatcher, frame: Frame) -> crate::Result<()> {
        match time::timeout(self.settings.write_wait, dispatcher.send_frame(frame)).await {
            Ok(result) => result,
            Err(_) => Err(GatewayError::Transport(format!(
                "frame not written within {:?}",
                self.settings.write_wait
            ))),
        }
    }

    async fn handle_text(
        &mut self,
        text: String,
        dispatcher: &Dispatcher,
        replies: &mpsc::UnboundedSender<String>,
    ) {
        info!("[REQUEST] {}", text);

        if let Err(rejection) = self.limiter.admit(Instant::now(), &text) {
            let msg = rejection.to_string();
            error!("{}", msg);
            if let Err(e) = self.write(dispatcher, Frame::error(msg)).await {
                debug!("Rejection not delivered: {}", e);
            }
            return;
        }

        if let Err(e) = self.write(dispatcher, Frame::receive(text.clone())).await {
            debug!("Acknowledgment not delivered: {}", e);
        }

        let request = RelayRequest::classify(&text, self.relay.model, &mut self.history);
        let keeps_reply = matches!(request, RelayRequest::Chat { .. });
        let relay = Relay::new(self.relay.clone(), dispatcher.clone());
        let replies = replies.clone();

        tokio::spawn(async move {
            if let RelayOutcome::Completed { reply } = relay.run(request).await {
                if keeps_reply {
                    let _ = replies.send(reply);
                }
            }
        });
    }
}
