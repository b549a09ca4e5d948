//! Single-writer dispatch onto one connection.
//!
//! The write half of a socket is owned by one writer task. Every producer
//! (the read loop's acknowledgments, keepalive probes, any number of relays)
//! holds a cloneable [`Dispatcher`] and submits one message at a time; the
//! writer performs exactly one socket write per submission and reports the
//! outcome back. A frame is therefore never interleaved with another, and no
//! producer can hold the connection across more than one write.
//!
//! A peer that stops draining can leave the writer parked inside a write.
//! [`Dispatcher::abort`] stops it from any handle without touching the socket.

use crate::frame::Frame;
use crate::{GatewayError, Result};
use axum::extract::ws::Message;
use futures::{Sink, SinkExt};
use std::fmt::Display;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Pending submissions before producers start waiting.
const QUEUE_DEPTH: usize = 64;

/// What a producer asks the writer to put on the wire.
#[derive(Debug)]
enum Outbound {
    Frame(Frame),
    Ping,
    Close,
}

struct WriteRequest {
    message: Outbound,
    done: oneshot::Sender<Result<()>>,
}

/// Handle for submitting writes to a connection's writer task.
#[derive(Clone)]
pub struct Dispatcher {
    tx: mpsc::Sender<WriteRequest>,
    stop: CancellationToken,
}

impl Dispatcher {
    /// Take ownership of `sink` and start the writer task.
    ///
    /// The task ends after a close request, after the first failed write,
    /// after [`abort`](Self::abort), or once every handle is dropped.
    pub fn spawn<S>(sink: S) -> (Self, JoinHandle<()>)
    where
        S: Sink<Message> + Unpin + Send + 'static,
        S::Error: Display,
    {
        let (tx, rx) = mpsc::channel(QUEUE_DEPTH);
        let stop = CancellationToken::new();
        let task = tokio::spawn(write_loop(sink, rx, stop.clone()));
        (Self { tx, stop }, task)
    }

    /// Write one frame as a JSON text message.
    pub async fn send_frame(&self, frame: Frame) -> Result<()> {
        self.submit(Outbound::Frame(frame)).await
    }

    /// Write one liveness probe.
    pub async fn ping(&self) -> Result<()> {
        self.submit(Outbound::Ping).await
    }

    /// Send a close frame and shut the connection.
    ///
    /// Only the first close reaches the socket; later calls return
    /// [`GatewayError::Closed`].
    pub async fn close(&self) -> Result<()> {
        self.submit(Outbound::Close).await
    }

    /// Stop the writer now, abandoning any write in progress.
    ///
    /// Pending and later submissions fail with [`GatewayError::Closed`].
    pub fn abort(&self) {
        self.stop.cancel();
    }

    /// Whether the writer task has stopped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    async fn submit(&self, message: Outbound) -> Result<()> {
        let (done, result) = oneshot::channel();
        self.tx
            .send(WriteRequest { message, done })
            .await
            .map_err(|_| GatewayError::Closed)?;
        result.await.map_err(|_| GatewayError::Closed)?
    }
}

async fn write_loop<S>(
    mut sink: S,
    mut rx: mpsc::Receiver<WriteRequest>,
    stop: CancellationToken,
)
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    loop {
        let WriteRequest { message, done } = tokio::select! {
            biased;
            _ = stop.cancelled() => break,
            request = rx.recv() => match request {
                Some(request) => request,
                None => break,
            },
        };

        let closing = matches!(message, Outbound::Close);
        let wire = match message {
            Outbound::Frame(frame) => match frame.to_json() {
                Ok(json) => Message::Text(json),
                Err(e) => {
                    let _ = done.send(Err(e.into()));
                    continue;
                }
            },
            Outbound::Ping => Message::Ping(Vec::new()),
            Outbound::Close => Message::Close(None),
        };

        let result = tokio::select! {
            sent = sink.send(wire) => sent.map_err(|e| GatewayError::Transport(e.to_string())),
            _ = stop.cancelled() => Err(GatewayError::Closed),
        };
        let failed = result.is_err();
        let _ = done.send(result);

        if failed || closing {
            break;
        }
    }

    // Dropping the receiver fails every queued and future submission.
    rx.close();
    tokio::select! {
        _ = sink.close() => {}
        _ = stop.cancelled() => {}
    }
    debug!("Connection writer stopped");
}
