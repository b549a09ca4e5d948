//! Liveness supervision for one connection.
//!
//! Two halves cooperate here. The [`KeepaliveMonitor`] task pings the peer on
//! a fixed period through the dispatcher; if a probe cannot be written it
//! marks the session closed and shuts the connection. The [`ReadDeadline`]
//! lives in the read loop: every ping or pong from the peer pushes it out,
//! and a read that outlasts it ends the session.
//!
//! Shutdown is a handshake. The session sends a request carrying an ack
//! channel, the monitor acknowledges, stops ticking, and closes the
//! connection. Whichever side ends first, the connection is closed once, and
//! a close the peer never drains is cut off after the write wait.

use crate::dispatcher::Dispatcher;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Read deadline refreshed by liveness traffic from the peer.
#[derive(Debug, Clone)]
pub struct ReadDeadline {
    window: Duration,
    deadline: Instant,
}

impl ReadDeadline {
    /// Start a deadline `window` from now.
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            deadline: Instant::now() + window,
        }
    }

    /// Push the deadline a full window past now.
    pub fn refresh(&mut self) {
        self.deadline = Instant::now() + self.window;
    }

    /// The instant the next read must complete by.
    pub fn instant(&self) -> Instant {
        self.deadline
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }
}

/// Periodic prober for one connection.
pub struct KeepaliveMonitor {
    dispatcher: Dispatcher,
    period: Duration,
    write_wait: Duration,
    closed: CancellationToken,
}

impl KeepaliveMonitor {
    /// `closed` is cancelled when the monitor stops for any reason.
    pub fn new(
        dispatcher: Dispatcher,
        period: Duration,
        write_wait: Duration,
        closed: CancellationToken,
    ) -> Self {
        Self {
            dispatcher,
            period,
            write_wait,
            closed,
        }
    }

    /// Start the monitor task.
    pub fn spawn(self) -> KeepaliveHandle {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(self.run(shutdown_rx));
        KeepaliveHandle { shutdown_tx, task }
    }

    async fn run(self, mut shutdown_rx: oneshot::Receiver<oneshot::Sender<()>>) {
        let mut ticker = time::interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match time::timeout(self.write_wait, self.dispatcher.ping()).await {
                        Ok(Ok(())) => debug!("Liveness probe sent"),
                        Ok(Err(e)) => {
                            warn!("Liveness probe failed: {}", e);
                            break;
                        }
                        Err(_) => {
                            warn!("Liveness probe not written within {:?}", self.write_wait);
                            break;
                        }
                    }
                }
                request = &mut shutdown_rx => {
                    info!("# websocket connection closed");
                    if let Ok(ack) = request {
                        let _ = ack.send(());
                    }
                    break;
                }
            }
        }

        self.closed.cancel();
        close_within(&self.dispatcher, self.write_wait).await;
    }
}

/// Close the connection, dropping it outright if the close frame is not
/// written within `write_wait`.
pub(crate) async fn close_within(dispatcher: &Dispatcher, write_wait: Duration) {
    // An error means the writer already stopped.
    if time::timeout(write_wait, dispatcher.close()).await.is_err() {
        warn!("Close not written within {:?}, dropping connection", write_wait);
        dispatcher.abort();
    }
}

/// Owner side of a running monitor.
pub struct KeepaliveHandle {
    shutdown_tx: oneshot::Sender<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl KeepaliveHandle {
    /// Ask the monitor to stop and wait until it has closed the connection.
    ///
    /// Returns `false` when the monitor had already stopped on its own.
    pub async fn shutdown(self) -> bool {
        let (ack_tx, ack_rx) = oneshot::channel();
        let acknowledged = match self.shutdown_tx.send(ack_tx) {
            Ok(()) => ack_rx.await.is_ok(),
            Err(_) => false,
        };
        let _ = self.task.await;
        acknowledged
    }
}
