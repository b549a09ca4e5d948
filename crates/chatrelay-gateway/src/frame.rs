//! Wire frames exchanged with the client.

use chatrelay_core::id;
use serde::{Deserialize, Serialize};

/// Timestamp layout of `createTime`.
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Kind tag of a frame produced by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameKind {
    /// Echo acknowledging an accepted request.
    Receive,
    /// A piece of a streamed reply, or its end marker.
    Chat,
    /// A user-visible failure.
    Error,
    /// The upstream produced nothing; the user should resend.
    Retry,
    /// Path of a generated image.
    Image,
}

impl FrameKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Receive => "receive",
            Self::Chat => "chat",
            Self::Error => "error",
            Self::Retry => "retry",
            Self::Image => "image",
        }
    }
}

/// One structured message sent to the client.
///
/// All frames of a single relay share `msg_id`, so the client can stitch the
/// increments of one reply together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Frame {
    msg: String,
    msg_id: String,
    kind: FrameKind,
    create_time: String,
}

impl Frame {
    /// Build a frame stamped with the current local time.
    pub fn new(kind: FrameKind, msg: impl Into<String>, msg_id: impl Into<String>) -> Self {
        Self {
            msg: msg.into(),
            msg_id: msg_id.into(),
            kind,
            create_time: chrono::Local::now().format(TIME_FORMAT).to_string(),
        }
    }

    /// Acknowledgment echo with a fresh id.
    pub fn receive(msg: impl Into<String>) -> Self {
        Self::new(FrameKind::Receive, msg, id::uuid())
    }

    /// Standalone error with a fresh id.
    pub fn error(msg: impl Into<String>) -> Self {
        Self::new(FrameKind::Error, msg, id::uuid())
    }

    pub fn msg(&self) -> &str {
        &self.msg
    }

    pub fn msg_id(&self) -> &str {
        &self.msg_id
    }

    pub fn kind(&self) -> FrameKind {
        self.kind
    }

    pub fn create_time(&self) -> &str {
        &self.create_time
    }

    /// Encode as the JSON text payload sent over the socket.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
