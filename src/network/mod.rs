//! Network Layer
//!
//! Reconnecting WebSocket link to the game extension and everything that
//! travels over it. This layer never holds game state; decoded packets are
//! routed into `game/`.

pub mod protocol;
pub mod frame;
pub mod transport;
pub mod dispatch;
pub mod transfer;

pub use protocol::{CodecError, Envelope, GameErrorCode, OpcodeMessage};
pub use frame::{ChunkFrame, FourCc, Packet};
pub use transport::{
    Dialer, PeerAddress, Role, TransportError, TransportEvent, TransportSession, WebSocketDialer,
};
pub use dispatch::{route, DirectorInbound, Inbound, PlayerInbound, SessionCommand};
pub use transfer::{ChunkReceiver, ImportSink, TransferError, MAX_CHUNK_PAYLOAD};
