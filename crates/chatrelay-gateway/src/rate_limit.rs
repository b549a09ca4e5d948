//! Per-session admission control.

use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

/// Shortest accepted payload, counted in characters after trimming.
pub const MIN_PAYLOAD_CHARS: usize = 2;

/// Why a request was not admitted. The display text is sent to the client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("[ERROR] please wait {0} seconds for next query")]
    TooSoon(u64),

    #[error("[ERROR] message too short")]
    TooShort,
}

/// Minimum-interval gate for one session.
///
/// Holds nothing but the time of the last accepted request; rejected
/// requests are dropped, never queued.
#[derive(Debug)]
pub struct RateLimiter {
    interval: Duration,
    last_accepted: Option<Instant>,
}

impl RateLimiter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_accepted: None,
        }
    }

    /// Admit or reject a request arriving at `now`.
    ///
    /// The first request always passes. Acceptance moves the timestamp.
    pub fn check(&mut self, now: Instant) -> Result<(), Rejection> {
        if let Some(last) = self.last_accepted {
            if now.saturating_duration_since(last) < self.interval {
                return Err(Rejection::TooSoon(self.interval.as_secs()));
            }
        }
        self.last_accepted = Some(now);
        Ok(())
    }

    /// Full admission: pacing first, then the content rule.
    ///
    /// A too-short payload still consumes the slot it was admitted into.
    pub fn admit(&mut self, now: Instant, payload: &str) -> Result<(), Rejection> {
        self.check(now)?;
        check_payload(payload)
    }

    pub fn last_accepted(&self) -> Option<Instant> {
        self.last_accepted
    }
}

/// Reject payloads shorter than [`MIN_PAYLOAD_CHARS`] once trimmed.
pub fn check_payload(payload: &str) -> Result<(), Rejection> {
    if payload.trim().chars().count() < MIN_PAYLOAD_CHARS {
        Err(Rejection::TooShort)
    } else {
        Ok(())
    }
}
