//! # Playground Sync
//!
//! Session protocol and participant synchronization for a shared real-time
//! playground.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     PLAYGROUND SYNC                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Shared value types                        │
//! │  ├── pose.rs     - Tracked device pose                       │
//! │  └── rng.rs      - Reconnect jitter sources                  │
//! │                                                              │
//! │  network/        - Game extension link                       │
//! │  ├── protocol.rs - Tagged JSON envelopes                     │
//! │  ├── frame.rs    - Binary chunk frames                       │
//! │  ├── transport.rs- Reconnecting role-tagged session          │
//! │  ├── dispatch.rs - Per-role message routing                  │
//! │  └── transfer.rs - Chunked file transfer                     │
//! │                                                              │
//! │  game/           - Game extension client                     │
//! │  ├── sync.rs     - State reconciliation, scene handshake     │
//! │  ├── session.rs  - Session state machine                     │
//! │  └── client.rs   - Frame driver                              │
//! │                                                              │
//! │  registry/       - Participants on the multicast channel     │
//! │  ├── roster.rs   - Lifecycle, trackers, observer slot        │
//! │  └── local.rs    - Local runtime publishing                  │
//! │                                                              │
//! │  playground.rs   - Host composing all of the above           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Frame Model
//!
//! Everything is driven from one externally clocked frame step:
//! - The transport delivers buffered network events in arrival order
//! - Async hooks are polled, never awaited on a runtime
//! - The registry re-derives participants from the current channel snapshot
//!
//! The only spawned tasks move WebSocket bytes and post reconnect timers.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod config;
pub mod game;
pub mod network;
pub mod registry;
pub mod playground;

// Re-export commonly used types
pub use config::{ClientConfig, ConfigError, Mode, PlaygroundConfig};
pub use core::pose::Pose;
pub use game::client::GameClient;
pub use game::sync::GameHooks;
pub use game::session::StreamingBackend;
pub use network::transport::Role;
pub use playground::Playground;
pub use registry::{FrameSink, FrameSource, ParticipantData, ParticipantRegistry};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Frame rate of the standalone host (Hz)
pub const FRAME_RATE: u32 = 60;
