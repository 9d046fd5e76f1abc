//! Transport Session
//!
//! Reconnecting, role-aware link to a single remote peer.
//!
//! The I/O side runs on tokio tasks that only move bytes: a [`Dialer`]
//! pump forwards link events into a queue, and a reconnect timer posts a
//! "reconnect due" event after a jittered delay. Every protocol-visible
//! state change happens inside [`TransportSession::poll_frame`], which the
//! host calls once per frame.
//!
//! Each dial gets a fresh generation number. Events from older generations
//! (a pump that is still closing, a timer armed before a shutdown) are
//! dropped on arrival.

use std::fmt;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};
#[cfg(feature = "debug-tracing")]
use tracing::trace;

use crate::core::rng::{DeterministicRng, JitterSource, ReconnectWindow};
use crate::network::frame::{ChunkFrame, Packet};
use crate::network::protocol::{CodecError, Envelope};

// =============================================================================
// ADDRESSING
// =============================================================================

/// Which side of the extension protocol this session speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Owns authoritative game and scene state.
    Director,
    /// Joined participant runtime.
    Player,
}

impl Role {
    /// Lowercase name, also used as the WebSocket path.
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Director => "director",
            Role::Player => "player",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parsed `host:port` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerAddress {
    /// Host name or IP literal.
    pub host: String,
    /// TCP port.
    pub port: u16,
}

impl PeerAddress {
    /// Parse `host:port`. Exactly one `:` separator is accepted.
    pub fn parse(address: &str) -> Result<Self, TransportError> {
        let mut tokens = address.split(':');
        let (host, port) = match (tokens.next(), tokens.next(), tokens.next()) {
            (Some(host), Some(port), None) => (host.trim(), port.trim()),
            _ => return Err(TransportError::InvalidAddress(address.to_string())),
        };

        if host.is_empty() {
            return Err(TransportError::InvalidAddress(address.to_string()));
        }

        let port: u16 = port
            .parse()
            .map_err(|_| TransportError::InvalidPort(port.to_string()))?;
        if port == 0 {
            return Err(TransportError::InvalidPort(port.to_string()));
        }

        Ok(Self { host: host.to_string(), port })
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Transport errors.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Address is not of the form `host:port`.
    #[error("invalid peer address: {0:?}")]
    InvalidAddress(String),

    /// Port is not a number in `1..=65535`.
    #[error("invalid port: {0:?}")]
    InvalidPort(String),
}

// =============================================================================
// LINK PLUMBING
// =============================================================================

/// Message queued for the I/O pump.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    /// JSON envelope.
    Text(String),
    /// Encoded chunk frame.
    Binary(Vec<u8>),
}

/// Raw event posted by an I/O pump or timer.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    /// Link established.
    Up,
    /// Link lost or dial failed.
    Down,
    /// Text message received.
    Text(String),
    /// Binary message received.
    Binary(Vec<u8>),
    /// Reconnect delay elapsed.
    ReconnectDue,
}

type Tagged = (u64, LinkEvent);

/// Handle a dialer uses to report link events for one connection attempt.
#[derive(Debug, Clone)]
pub struct LinkSender {
    generation: u64,
    tx: mpsc::UnboundedSender<Tagged>,
}

impl LinkSender {
    /// Report the link as established.
    pub fn up(&self) {
        self.post(LinkEvent::Up);
    }

    /// Report the link as lost.
    pub fn down(&self) {
        self.post(LinkEvent::Down);
    }

    /// Forward a received text message.
    pub fn text(&self, text: String) {
        self.post(LinkEvent::Text(text));
    }

    /// Forward a received binary message.
    pub fn binary(&self, bytes: Vec<u8>) {
        self.post(LinkEvent::Binary(bytes));
    }

    fn post(&self, event: LinkEvent) {
        // receiver only goes away with the session itself
        let _ = self.tx.send((self.generation, event));
    }
}

/// Opens connections to a peer.
///
/// `dial` must not block. It returns the sender the session writes outbound
/// messages to; dropping that sender asks the pump to close the connection
/// without reporting `Down`.
pub trait Dialer: Send {
    /// Start connecting to `address` in `role`, reporting through `link`.
    fn dial(&mut self, address: &PeerAddress, role: Role, link: LinkSender) -> mpsc::UnboundedSender<Outbound>;
}

/// Production dialer: WebSocket client at `ws://host:port/<role>`.
#[derive(Debug, Default, Clone)]
pub struct WebSocketDialer;

impl Dialer for WebSocketDialer {
    fn dial(&mut self, address: &PeerAddress, role: Role, link: LinkSender) -> mpsc::UnboundedSender<Outbound> {
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Outbound>();
        let url = format!("ws://{}/{}", address, role.as_str());

        tokio::spawn(async move {
            let ws_stream = match connect_async(url.as_str()).await {
                Ok((ws, _)) => ws,
                Err(e) => {
                    debug!("Connect to {} failed: {}", url, e);
                    link.down();
                    return;
                }
            };

            link.up();
            let (mut ws_sender, mut ws_receiver) = ws_stream.split();

            loop {
                tokio::select! {
                    out = out_rx.recv() => {
                        let msg = match out {
                            Some(Outbound::Text(text)) => Message::Text(text),
                            Some(Outbound::Binary(bytes)) => Message::Binary(bytes),
                            None => {
                                // session let go of this link
                                let _ = ws_sender.close().await;
                                return;
                            }
                        };
                        if ws_sender.send(msg).await.is_err() {
                            break;
                        }
                    }
                    msg = ws_receiver.next() => {
                        match msg {
                            Some(Ok(Message::Text(text))) => link.text(text),
                            Some(Ok(Message::Binary(bytes))) => link.binary(bytes),
                            Some(Ok(Message::Close(_))) | None => break,
                            Some(Err(e)) => {
                                warn!("WebSocket error on {}: {}", url, e);
                                break;
                            }
                            _ => {}
                        }
                    }
                }
            }

            link.down();
        });

        out_tx
    }
}

// =============================================================================
// SESSION
// =============================================================================

/// Event surfaced by [`TransportSession::poll_frame`].
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// Peer link came up.
    Connected,
    /// Peer link went down; identity has been cleared.
    Disconnected,
    /// Decoded message from the peer.
    Received(Packet),
}

/// Reconnecting link to one peer.
pub struct TransportSession {
    dialer: Box<dyn Dialer>,
    jitter: Box<dyn JitterSource>,
    window: ReconnectWindow,

    target: Option<(PeerAddress, Role)>,
    generation: u64,
    connected: bool,
    outbound: Option<mpsc::UnboundedSender<Outbound>>,
    peer_id: Option<String>,

    events_tx: mpsc::UnboundedSender<Tagged>,
    events_rx: mpsc::UnboundedReceiver<Tagged>,
    shutdown_tx: broadcast::Sender<()>,
}

impl Default for TransportSession {
    fn default() -> Self {
        Self::new(Box::new(WebSocketDialer), Box::new(DeterministicRng::from_clock()))
    }
}

impl TransportSession {
    /// Create an idle session.
    pub fn new(dialer: Box<dyn Dialer>, jitter: Box<dyn JitterSource>) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            dialer,
            jitter,
            window: ReconnectWindow::default(),
            target: None,
            generation: 0,
            connected: false,
            outbound: None,
            peer_id: None,
            events_tx,
            events_rx,
            shutdown_tx,
        }
    }

    /// Override the reconnect delay window.
    pub fn with_reconnect_window(mut self, window: ReconnectWindow) -> Self {
        self.window = window;
        self
    }

    /// Start the session towards `address` in `role`.
    ///
    /// Returns `false` for a malformed address. Calling again while the
    /// session is running is a no-op that returns `true`.
    pub fn configure(&mut self, address: &str, role: Role) -> bool {
        if self.target.is_some() {
            return true;
        }

        let address = match PeerAddress::parse(address) {
            Ok(address) => address,
            Err(e) => {
                warn!("Rejecting transport configuration: {}", e);
                return false;
            }
        };

        info!("Transport starting as {} towards {}", role, address);
        self.target = Some((address, role));
        self.dial();
        true
    }

    /// Whether `configure` has started the session.
    pub fn is_running(&self) -> bool {
        self.target.is_some()
    }

    /// Configured role, if running.
    pub fn role(&self) -> Option<Role> {
        self.target.as_ref().map(|(_, role)| *role)
    }

    /// Whether a peer link is up.
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Identity assigned by the peer on this connection.
    pub fn peer_id(&self) -> Option<&str> {
        self.peer_id.as_deref()
    }

    /// Send an envelope to the connected peer. Dropped when no peer is
    /// connected; returns whether it was handed to the link.
    pub fn send(&mut self, envelope: &Envelope) -> bool {
        let text = match envelope.to_json() {
            Ok(text) => text,
            Err(e) => {
                warn!("Failed to serialize {}: {}", envelope.tag(), e);
                return false;
            }
        };
        self.push(Outbound::Text(text), envelope.tag())
    }

    /// Send a binary chunk frame to the connected peer.
    pub fn send_chunk(&mut self, frame: &ChunkFrame) -> bool {
        let bytes = match frame.encode() {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Failed to encode chunk for {}: {}", frame.filename, e);
                return false;
            }
        };
        self.push(Outbound::Binary(bytes), "chunk")
    }

    fn push(&mut self, message: Outbound, what: &str) -> bool {
        match (&self.outbound, self.connected) {
            (Some(tx), true) => tx.send(message).is_ok(),
            _ => {
                debug!("No peer connected, dropping {}", what);
                false
            }
        }
    }

    /// Drain all queued link events in arrival order.
    pub fn poll_frame(&mut self) -> Vec<TransportEvent> {
        let mut events = Vec::new();

        while let Ok((generation, event)) = self.events_rx.try_recv() {
            if generation != self.generation {
                #[cfg(feature = "debug-tracing")]
                trace!("Stale link event from generation {}: {:?}", generation, event);
                continue;
            }

            match event {
                LinkEvent::Up => {
                    self.connected = true;
                    info!("Peer link up (generation {})", generation);
                    events.push(TransportEvent::Connected);
                }
                LinkEvent::Down => self.on_link_down(&mut events),
                LinkEvent::Text(text) => self.decode(Packet::from_text(&text), text.as_bytes(), &mut events),
                LinkEvent::Binary(bytes) => self.decode(Packet::from_binary(&bytes), &bytes, &mut events),
                LinkEvent::ReconnectDue => {
                    if self.target.is_some() && !self.connected {
                        debug!("Reconnecting");
                        self.dial();
                    }
                }
            }
        }

        events
    }

    /// Stop the session and cancel any pending reconnect.
    pub fn shutdown(&mut self) {
        if self.target.take().is_none() {
            return;
        }

        self.generation += 1;
        self.connected = false;
        self.outbound = None;
        self.peer_id = None;
        let _ = self.shutdown_tx.send(());
        info!("Transport shut down");
    }

    fn dial(&mut self) {
        let Some((address, role)) = self.target.clone() else {
            return;
        };

        self.generation += 1;
        let link = LinkSender {
            generation: self.generation,
            tx: self.events_tx.clone(),
        };
        self.outbound = Some(self.dialer.dial(&address, role, link));
    }

    fn on_link_down(&mut self, events: &mut Vec<TransportEvent>) {
        let was_connected = self.connected;
        self.connected = false;
        self.outbound = None;
        self.peer_id = None;

        if was_connected {
            info!("Peer link down");
            events.push(TransportEvent::Disconnected);
        }

        let delay = self.jitter.delay_in(&self.window);
        debug!("Reconnect scheduled in {:?}", delay);

        let tx = self.events_tx.clone();
        let generation = self.generation;
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {
                    let _ = tx.send((generation, LinkEvent::ReconnectDue));
                }
                _ = shutdown_rx.recv() => {}
            }
        });
    }

    fn decode(&mut self, result: Result<Packet, CodecError>, raw: &[u8], events: &mut Vec<TransportEvent>) {
        match result {
            Ok(Packet::Envelope(Envelope::Connected { id })) => {
                info!("Assigned identity {}", id);
                self.peer_id = Some(id);
            }
            Ok(packet) => events.push(TransportEvent::Received(packet)),
            Err(CodecError::UnknownTag(tag)) => {
                debug!("Ignoring message with unknown tag {}", tag);
            }
            Err(e) => {
                let head = &raw[..raw.len().min(8)];
                warn!("Discarding undecodable message ({}, starts {}): {}", raw.len(), hex::encode(head), e);
            }
        }
    }
}
