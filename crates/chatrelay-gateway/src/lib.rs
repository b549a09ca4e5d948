//! WebSocket session gateway for ChatRelay.
//!
//! This crate provides:
//! - the `/api/ws/chat` upgrade endpoint and its HTTP surface
//! - per-connection sessions with rate limiting and keepalive supervision
//! - a single-writer dispatcher shared by every producer on a connection
//! - relays that stream upstream completions back as frames

pub mod dispatcher;
pub mod error;
pub mod frame;
pub mod keepalive;
pub mod rate_limit;
pub mod relay;
pub mod server;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

pub use dispatcher::Dispatcher;
pub use error::GatewayError;
pub use frame::{Frame, FrameKind};
pub use rate_limit::{RateLimiter, Rejection};
pub use relay::{Relay, RelayContext, RelayOutcome, RelayRequest};
pub use server::{ApiResponse, Gateway};
pub use session::{CloseReason, Session, SessionSettings};

/// Result type for gateway operations.
pub type Result<T> = std::result::Result<T, GatewayError>;
