//! Role Dispatch
//!
//! Maps decoded packets onto the handler table of the configured role.
//! The director and player tables are separate enums; a packet that has no
//! entry in the active table is logged and dropped.

use std::time::Duration;

use tracing::debug;

use crate::network::frame::{ChunkFrame, FourCc, Packet};
use crate::network::protocol::{Envelope, GameErrorCode, OpcodeMessage};
use crate::network::transport::Role;

/// Session control command addressed to a player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    /// Report current session state.
    RequestState,
    /// Update bitrate bounds.
    Configure {
        /// Lower bound.
        min_bitrate: u32,
        /// Initial value.
        start_bitrate: u32,
        /// Upper bound.
        max_bitrate: u32,
    },
    /// Look up named session data on the backend.
    CheckSessionData {
        /// Data name; may be empty.
        name: String,
    },
    /// Start streaming.
    Play {
        /// Session data to stream with.
        session_data_name: Option<String>,
    },
    /// Stop streaming.
    Stop,
    /// Start profiling.
    StartProfile {
        /// Profiling session name.
        session_name: String,
        /// Session data to profile with.
        session_data_name: Option<String>,
    },
    /// Stop profiling.
    StopProfile,
}

/// Director handler table.
#[derive(Debug, Clone, PartialEq)]
pub enum DirectorInbound {
    /// Peer asks for our state.
    RequestState,
    /// Peer pushes its state.
    UpdateState(String),
    /// Application command.
    Command {
        /// Command name.
        command: String,
        /// Argument.
        argument: String,
    },
    /// Relayed opcode message.
    Message(OpcodeMessage),
    /// Error reported by the peer.
    Error(GameErrorCode, String),
}

/// Player handler table.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerInbound {
    /// Director pushes its state, optionally with an apply deadline.
    UpdateState {
        /// Serialized state.
        state: String,
        /// Apply deadline.
        timeout: Option<Duration>,
    },
    /// Director switches scene.
    LoadScene(String),
    /// Application command.
    Command {
        /// Command name.
        command: String,
        /// Argument.
        argument: String,
    },
    /// Relayed opcode message.
    Message(OpcodeMessage),
    /// Error reported by the peer.
    Error(GameErrorCode, String),
    /// Session control.
    Session(SessionCommand),
    /// Session data chunk.
    SessionData(ChunkFrame),
}

/// Routed packet.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Handled by the director table.
    Director(DirectorInbound),
    /// Handled by the player table.
    Player(PlayerInbound),
}

/// Route `packet` by `role`. Returns `None` when the role has no handler.
pub fn route(role: Role, packet: Packet) -> Option<Inbound> {
    match role {
        Role::Director => route_director(packet).map(Inbound::Director),
        Role::Player => route_player(packet).map(Inbound::Player),
    }
}

fn route_director(packet: Packet) -> Option<DirectorInbound> {
    let envelope = match packet {
        Packet::Envelope(envelope) => envelope,
        Packet::Chunk(frame) => {
            debug!("Director ignores {} chunk for {}", frame.format, frame.filename);
            return None;
        }
    };

    let tag = envelope.tag();
    let routed = match envelope {
        Envelope::RequestState => Some(DirectorInbound::RequestState),
        Envelope::UpdateState { state } => Some(DirectorInbound::UpdateState(state)),
        Envelope::Command { command, argument } => Some(DirectorInbound::Command { command, argument }),
        Envelope::Opcode(msg) => Some(DirectorInbound::Message(msg)),
        Envelope::Error { code, info } => Some(DirectorInbound::Error(GameErrorCode::from_code(code), info)),
        Envelope::Connected { .. }
        | Envelope::UpdateStateWithTimeout { .. }
        | Envelope::LoadScene { .. }
        | Envelope::SessionRequestState
        | Envelope::SessionUpdateState(_)
        | Envelope::SessionConfigure { .. }
        | Envelope::SessionCheckSessionData { .. }
        | Envelope::SessionPlay { .. }
        | Envelope::SessionStop
        | Envelope::SessionStartProfile { .. }
        | Envelope::SessionStopProfile
        | Envelope::SessionProfileReport { .. } => None,
    };

    if routed.is_none() {
        debug!("Director has no handler for {}", tag);
    }
    routed
}

fn route_player(packet: Packet) -> Option<PlayerInbound> {
    let envelope = match packet {
        Packet::Envelope(envelope) => envelope,
        Packet::Chunk(frame) if frame.format == FourCc::SESSION_DATA => {
            return Some(PlayerInbound::SessionData(frame));
        }
        Packet::Chunk(frame) => {
            debug!("Player ignores {} chunk for {}", frame.format, frame.filename);
            return None;
        }
    };

    let tag = envelope.tag();
    let routed = match envelope {
        Envelope::UpdateState { state } => Some(PlayerInbound::UpdateState { state, timeout: None }),
        Envelope::UpdateStateWithTimeout { state, timeout } => Some(PlayerInbound::UpdateState {
            state,
            timeout: deadline(timeout),
        }),
        Envelope::LoadScene { scene } => Some(PlayerInbound::LoadScene(scene)),
        Envelope::Command { command, argument } => Some(PlayerInbound::Command { command, argument }),
        Envelope::Opcode(msg) => Some(PlayerInbound::Message(msg)),
        Envelope::Error { code, info } => Some(PlayerInbound::Error(GameErrorCode::from_code(code), info)),
        Envelope::SessionRequestState => Some(PlayerInbound::Session(SessionCommand::RequestState)),
        Envelope::SessionConfigure { min_bitrate, start_bitrate, max_bitrate } => {
            Some(PlayerInbound::Session(SessionCommand::Configure { min_bitrate, start_bitrate, max_bitrate }))
        }
        Envelope::SessionCheckSessionData { session_data_name } => {
            Some(PlayerInbound::Session(SessionCommand::CheckSessionData { name: session_data_name }))
        }
        Envelope::SessionPlay { session_data_name } => Some(PlayerInbound::Session(SessionCommand::Play {
            session_data_name: non_empty(session_data_name),
        })),
        Envelope::SessionStop => Some(PlayerInbound::Session(SessionCommand::Stop)),
        Envelope::SessionStartProfile { session_name, session_data_name } => {
            Some(PlayerInbound::Session(SessionCommand::StartProfile {
                session_name,
                session_data_name: non_empty(session_data_name),
            }))
        }
        Envelope::SessionStopProfile => Some(PlayerInbound::Session(SessionCommand::StopProfile)),
        Envelope::Connected { .. }
        | Envelope::RequestState
        | Envelope::SessionUpdateState(_)
        | Envelope::SessionProfileReport { .. } => None,
    };

    if routed.is_none() {
        debug!("Player has no handler for {}", tag);
    }
    routed
}

fn deadline(seconds: f32) -> Option<Duration> {
    (seconds.is_finite() && seconds > 0.0).then(|| Duration::from_secs_f32(seconds))
}

fn non_empty(name: Option<String>) -> Option<String> {
    name.filter(|n| !n.is_empty())
}
