//! Game Extension Client
//!
//! Role-aware client of the game extension: state reconciliation, session
//! control of the streaming backend, and the per-frame driver that ties
//! them to the transport.
//!
//! ## Module Structure
//!
//! - `sync`: Game state strings and the scene-change handshake
//! - `session`: Session phase and streaming backend commands
//! - `client`: Frame driver and application API

pub mod sync;
pub mod session;
pub mod client;

// Re-export key types
pub use sync::{GameHooks, GameSync};
pub use session::{
    Broadcast, PlayerConfig, SessionController, SessionPhase, SessionState, StreamingBackend,
};
pub use client::{BackendEvent, GameClient};
