//! Protocol Messages
//!
//! Wire format for the game extension channel. Every message is a JSON
//! object whose `type` field selects the payload. The tag space is flat:
//! game messages use bare tags (`update-state`), session messages use a
//! `session.` prefix (`session.play`).

use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::game::session::SessionState;

// =============================================================================
// ENVELOPE
// =============================================================================

/// A typed protocol message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Envelope {
    /// Identity assignment from the remote peer.
    #[serde(rename = "connected")]
    Connected {
        /// Identity assigned to this client.
        id: String,
    },

    /// Opaque application message relayed between clients.
    #[serde(rename = "opcode")]
    Opcode(OpcodeMessage),

    /// Application command.
    #[serde(rename = "command")]
    Command {
        /// Command name.
        command: String,
        /// Free-form argument.
        #[serde(default)]
        argument: String,
    },

    /// Ask the peer to push its current game state.
    #[serde(rename = "request-state")]
    RequestState,

    /// Game state push.
    #[serde(rename = "update-state")]
    UpdateState {
        /// Serialized application state.
        state: String,
    },

    /// Game state push that must be applied within `timeout` seconds.
    #[serde(rename = "update-state-with-timeout")]
    UpdateStateWithTimeout {
        /// Serialized application state.
        state: String,
        /// Seconds; zero or negative means no deadline.
        #[serde(default = "no_timeout")]
        timeout: f32,
    },

    /// Switch to another scene.
    #[serde(rename = "load-scene")]
    LoadScene {
        /// Scene to load.
        scene: String,
    },

    /// Error report.
    #[serde(rename = "error")]
    Error {
        /// Numeric [`GameErrorCode`].
        code: i32,
        /// Human-readable detail.
        #[serde(default)]
        info: String,
    },

    /// Ask for the current session state.
    #[serde(rename = "session.request-state")]
    SessionRequestState,

    /// Session state snapshot.
    #[serde(rename = "session.update-state")]
    SessionUpdateState(SessionState),

    /// Update streaming bitrate bounds.
    #[serde(rename = "session.configure")]
    SessionConfigure {
        /// Lower bitrate bound.
        min_bitrate: u32,
        /// Initial bitrate.
        start_bitrate: u32,
        /// Upper bitrate bound.
        max_bitrate: u32,
    },

    /// Ask the backend whether named session data exists.
    #[serde(rename = "session.check-session-data")]
    SessionCheckSessionData {
        /// Session data to look up.
        #[serde(default)]
        session_data_name: String,
    },

    /// Start streaming.
    #[serde(rename = "session.play")]
    SessionPlay {
        /// Optional session data to stream with.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session_data_name: Option<String>,
    },

    /// Stop streaming.
    #[serde(rename = "session.stop")]
    SessionStop,

    /// Start profiling.
    #[serde(rename = "session.start-profile")]
    SessionStartProfile {
        /// Name for the profiling session.
        session_name: String,
        /// Optional session data to profile with.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session_data_name: Option<String>,
    },

    /// Stop profiling.
    #[serde(rename = "session.stop-profile")]
    SessionStopProfile,

    /// Profiling summary produced by the backend.
    #[serde(rename = "session.profile-report")]
    SessionProfileReport {
        /// Backend report text.
        report: String,
    },
}

fn no_timeout() -> f32 {
    -1.0
}

/// Relayed application message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpcodeMessage {
    /// Sender identity.
    pub source: String,
    /// Receiver identity; `None` addresses every client.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// Application-defined opcode.
    pub opcode: i32,
    /// Optional payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

/// Error codes carried by [`Envelope::Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameErrorCode {
    /// Unclassified.
    Unknown = 0,
    /// Peer state could not be reconciled.
    InconsistentState = 1,
    /// A timed state update was not applied in time.
    UpdateStateTimeout = 2,
}

impl GameErrorCode {
    /// Decode a wire value; unrecognized values map to `Unknown`.
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => GameErrorCode::InconsistentState,
            2 => GameErrorCode::UpdateStateTimeout,
            _ => GameErrorCode::Unknown,
        }
    }

    /// Wire value.
    pub fn code(self) -> i32 {
        self as i32
    }
}

/// Codec errors.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Not valid JSON, or fields do not match the tag.
    #[error("malformed envelope: {0}")]
    Malformed(#[from] serde_json::Error),

    /// JSON object without a string `type` field.
    #[error("envelope has no type tag")]
    MissingTag,

    /// Tag outside the known vocabulary.
    #[error("unknown tag: {0}")]
    UnknownTag(String),

    /// Text payload is not UTF-8.
    #[error("payload is not valid UTF-8")]
    InvalidUtf8,

    /// Binary frame ended early.
    #[error("truncated binary frame ({0} bytes)")]
    Truncated(usize),

    /// Filename does not fit the u16 length prefix.
    #[error("filename too long: {0} bytes")]
    FilenameTooLong(usize),
}

// =============================================================================
// TAGS & SERIALIZATION HELPERS
// =============================================================================

impl Envelope {
    /// Every tag this codec understands, one per variant.
    pub const TAGS: &'static [&'static str] = &[
        "connected",
        "opcode",
        "command",
        "request-state",
        "update-state",
        "update-state-with-timeout",
        "load-scene",
        "error",
        "session.request-state",
        "session.update-state",
        "session.configure",
        "session.check-session-data",
        "session.play",
        "session.stop",
        "session.start-profile",
        "session.stop-profile",
        "session.profile-report",
    ];

    /// Tag this envelope is serialized under.
    pub fn tag(&self) -> &'static str {
        match self {
            Envelope::Connected { .. } => "connected",
            Envelope::Opcode(_) => "opcode",
            Envelope::Command { .. } => "command",
            Envelope::RequestState => "request-state",
            Envelope::UpdateState { .. } => "update-state",
            Envelope::UpdateStateWithTimeout { .. } => "update-state-with-timeout",
            Envelope::LoadScene { .. } => "load-scene",
            Envelope::Error { .. } => "error",
            Envelope::SessionRequestState => "session.request-state",
            Envelope::SessionUpdateState(_) => "session.update-state",
            Envelope::SessionConfigure { .. } => "session.configure",
            Envelope::SessionCheckSessionData { .. } => "session.check-session-data",
            Envelope::SessionPlay { .. } => "session.play",
            Envelope::SessionStop => "session.stop",
            Envelope::SessionStartProfile { .. } => "session.start-profile",
            Envelope::SessionStopProfile => "session.stop-profile",
            Envelope::SessionProfileReport { .. } => "session.profile-report",
        }
    }

    /// Build an error envelope.
    pub fn error(code: GameErrorCode, info: impl Into<String>) -> Self {
        Envelope::Error {
            code: code.code(),
            info: info.into(),
        }
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    ///
    /// Unknown tags are reported as [`CodecError::UnknownTag`] so callers can
    /// ignore them without treating them as corruption.
    pub fn from_json(s: &str) -> Result<Self, CodecError> {
        let value: serde_json::Value = serde_json::from_str(s)?;
        let tag = value
            .get("type")
            .and_then(serde_json::Value::as_str)
            .ok_or(CodecError::MissingTag)?;

        if !Self::TAGS.contains(&tag) {
            return Err(CodecError::UnknownTag(tag.to_string()));
        }

        Ok(serde_json::from_value(value)?)
    }
}
