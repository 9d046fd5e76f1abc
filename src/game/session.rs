//! Streaming Session State
//!
//! Tracks the player's streaming session and executes session commands
//! against the streaming backend.
//!
//! ## Phases
//!
//! ```text
//! Disconnected ──connect──> Stopped ──play──> Playing ──stop──> Stopped
//!                           Stopped ──start_profile──> Profiling ──stop_profile──> Stopped
//! ```
//!
//! The phase is never stored on its own; it is derived from the backend's
//! `(connected, streaming, profiling)` flags whenever a snapshot is taken.
//! Every handled command produces exactly one state broadcast.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Serialize, Deserialize};
use tracing::{debug, info};

use crate::config::ClientConfig;
use crate::network::dispatch::SessionCommand;
use crate::network::transfer::ImportSink;

/// Query prefix for session data lookups.
pub const CHECK_SESSION_DATA: &str = "check-session-data";

// =============================================================================
// STATE
// =============================================================================

/// Session phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    /// No backend session.
    #[default]
    Disconnected,
    /// Backend session exists, nothing running.
    Stopped,
    /// Streaming.
    Playing,
    /// Profiling.
    Profiling,
}

impl SessionPhase {
    /// Derive the phase from backend flags. Without a connection the other
    /// flags are ignored; profiling wins over streaming.
    pub fn derive(connected: bool, streaming: bool, profiling: bool) -> Self {
        if !connected {
            SessionPhase::Disconnected
        } else if profiling {
            SessionPhase::Profiling
        } else if streaming {
            SessionPhase::Playing
        } else {
            SessionPhase::Stopped
        }
    }
}

/// Session state as broadcast to the controller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    /// Derived phase.
    pub phase: SessionPhase,
    /// Backend user id; empty without a session.
    pub user_id: String,
    /// `"stereo"`, `"mono"` or empty.
    pub display_kind: String,
    /// Video width in pixels.
    pub video_width: u32,
    /// Video height in pixels.
    pub video_height: u32,
    /// Name of the last profiling session started.
    pub session_name: String,
    /// Lower bitrate bound.
    pub min_bitrate: u32,
    /// Initial bitrate.
    pub start_bitrate: u32,
    /// Upper bitrate bound.
    pub max_bitrate: u32,
    /// Last session data name confirmed by the backend.
    pub session_data_name: String,
}

// =============================================================================
// BACKEND
// =============================================================================

/// Properties of the connected streaming client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerConfig {
    /// Backend user id.
    pub user_id: String,
    /// Stereoscopic display.
    pub stereo: bool,
    /// Video width in pixels.
    pub video_width: u32,
    /// Video height in pixels.
    pub video_height: u32,
}

/// Streaming backend the session commands act on.
pub trait StreamingBackend: ImportSink {
    /// A streaming client is connected.
    fn is_connected(&self) -> bool;
    /// Config of the connected client.
    fn config(&self) -> Option<PlayerConfig>;
    /// Streaming is running.
    fn is_streaming(&self) -> bool;
    /// Profiling is running.
    fn is_profiling(&self) -> bool;

    /// Apply bitrate bounds.
    fn request_configure_session(&mut self, min_bitrate: u32, start_bitrate: u32, max_bitrate: u32);
    /// Issue a backend query; the answer arrives through `on_query_response`.
    fn request_query(&mut self, statement: &str);
    /// Start streaming.
    fn request_play(&mut self, session_data_name: Option<&str>);
    /// Stop streaming.
    fn request_stop(&mut self);
    /// Start profiling, writing output under `output_dir`.
    fn request_start_profile(&mut self, output_dir: &Path, session_name: &str, session_data_name: Option<&str>);
    /// Stop profiling.
    fn request_stop_profile(&mut self);
}

// =============================================================================
// CONTROLLER
// =============================================================================

/// When the state produced by a command should be sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Broadcast {
    /// Send now.
    Now,
    /// Send once the backend has had time to settle.
    After(Duration),
}

/// Executes session commands and produces state snapshots.
#[derive(Debug)]
pub struct SessionController {
    state: SessionState,
    staging_dir: PathBuf,
    play_settle: Duration,
    stop_settle: Duration,
}

impl SessionController {
    /// Create a controller using `config`'s staging directory and delays.
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            state: SessionState::default(),
            staging_dir: config.staging_dir.clone(),
            play_settle: config.play_settle,
            stop_settle: config.stop_settle,
        }
    }

    /// Last snapshot taken.
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Execute `command`. The caller must broadcast a snapshot as indicated.
    pub fn handle(&mut self, command: SessionCommand, backend: &mut dyn StreamingBackend) -> Broadcast {
        match command {
            SessionCommand::RequestState => Broadcast::Now,

            SessionCommand::Configure { min_bitrate, start_bitrate, max_bitrate } => {
                if backend.is_connected() {
                    self.state.min_bitrate = min_bitrate;
                    self.state.start_bitrate = start_bitrate;
                    self.state.max_bitrate = max_bitrate;
                    backend.request_configure_session(min_bitrate, start_bitrate, max_bitrate);
                }
                Broadcast::Now
            }

            SessionCommand::CheckSessionData { name } => {
                if backend.is_connected() && !name.is_empty() {
                    backend.request_query(&format!("{} {}", CHECK_SESSION_DATA, name));
                }
                Broadcast::Now
            }

            SessionCommand::Play { session_data_name } => {
                if backend.is_streaming() || !backend.is_connected() {
                    debug!("Ignoring play (streaming: {})", backend.is_streaming());
                    return Broadcast::Now;
                }
                info!("Starting stream");
                backend.request_play(session_data_name.as_deref());
                Broadcast::After(self.play_settle)
            }

            SessionCommand::Stop => {
                if !backend.is_streaming() {
                    return Broadcast::Now;
                }
                info!("Stopping stream");
                backend.request_stop();
                Broadcast::After(self.stop_settle)
            }

            SessionCommand::StartProfile { session_name, session_data_name } => {
                if !backend.is_profiling() {
                    info!("Starting profile {}", session_name);
                    backend.request_start_profile(&self.staging_dir, &session_name, session_data_name.as_deref());
                    self.state.session_name = session_name;
                }
                Broadcast::Now
            }

            SessionCommand::StopProfile => {
                if backend.is_profiling() {
                    backend.request_stop_profile();
                }
                Broadcast::Now
            }
        }
    }

    /// Record a backend query answer. Returns `true` if the state changed
    /// and should be broadcast.
    pub fn on_query_response(&mut self, statement: &str, body: &str) -> bool {
        let Some(rest) = statement.strip_prefix(CHECK_SESSION_DATA) else {
            return false;
        };
        if !rest.starts_with(' ') {
            return false;
        }

        self.state.session_data_name = body.to_string();
        true
    }

    /// Refresh backend-derived fields and return the current state.
    pub fn snapshot(&mut self, backend: &dyn StreamingBackend) -> SessionState {
        let config = if backend.is_connected() { backend.config() } else { None };

        match config {
            Some(config) => {
                self.state.user_id = config.user_id;
                self.state.display_kind = if config.stereo { "stereo" } else { "mono" }.to_string();
                self.state.video_width = config.video_width;
                self.state.video_height = config.video_height;
            }
            None => {
                self.state.user_id.clear();
                self.state.display_kind.clear();
                self.state.video_width = 0;
                self.state.video_height = 0;
            }
        }

        self.state.phase = SessionPhase::derive(
            backend.is_connected(),
            backend.is_streaming(),
            backend.is_profiling(),
        );
        self.state.clone()
    }
}
