//! Game Extension Client
//!
//! Ties the transport, role dispatch, state synchronizer, session controller
//! and chunk receiver together. The host drives it with one
//! [`GameClient::poll_frame`] call per frame and forwards backend callbacks
//! (lifecycle, profile output, query answers) as they happen.

use std::path::Path;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::core::rng::DeterministicRng;
use crate::game::session::{Broadcast, SessionController, StreamingBackend};
use crate::game::sync::{GameHooks, GameSync};
use crate::network::dispatch::{route, DirectorInbound, Inbound, PlayerInbound};
use crate::network::protocol::{Envelope, OpcodeMessage};
use crate::network::transfer::{self, ChunkReceiver};
use crate::network::transport::{Role, TransportEvent, TransportSession, WebSocketDialer};

/// Backend lifecycle notifications that trigger a session state broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendEvent {
    /// Streaming client connected.
    Connect,
    /// Streaming client became active.
    Activate,
    /// Streaming client became inactive.
    Deactivate,
    /// Streaming client disconnected.
    Disconnect,
}

/// Game extension client for one role.
pub struct GameClient {
    role: Role,
    transport: TransportSession,
    sync: GameSync,
    session: SessionController,
    receiver: ChunkReceiver,
    settling: Vec<Instant>,
    after_configure: bool,
    outbox: Vec<Envelope>,
}

impl GameClient {
    /// Client using the WebSocket transport.
    pub fn new(role: Role, config: &ClientConfig) -> Self {
        let transport = TransportSession::new(Box::new(WebSocketDialer), Box::new(DeterministicRng::from_clock()))
            .with_reconnect_window(config.reconnect_window);
        Self::with_transport(role, config, transport)
    }

    /// Client over a caller-supplied transport.
    pub fn with_transport(role: Role, config: &ClientConfig, transport: TransportSession) -> Self {
        Self {
            role,
            transport,
            sync: GameSync::new(role),
            session: SessionController::new(config),
            receiver: ChunkReceiver::new(&config.staging_dir),
            settling: Vec::new(),
            after_configure: false,
            outbox: Vec::new(),
        }
    }

    /// Configured role.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Identity assigned by the peer.
    pub fn id(&self) -> Option<&str> {
        self.transport.peer_id()
    }

    /// Peer link is up.
    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    /// Start the session, or re-sync state if it is already running.
    ///
    /// On a running session the stashed state (if any) is applied and the
    /// local state echoed during the next frame.
    pub fn configure(&mut self, address: &str) -> bool {
        if self.transport.is_running() {
            self.after_configure = true;
            return true;
        }
        self.transport.configure(address, self.role)
    }

    /// Stop the session.
    pub fn shutdown(&mut self) {
        self.settling.clear();
        self.transport.shutdown();
    }

    // =========================================================================
    // FRAME
    // =========================================================================

    /// Service one frame: deliver network events, drive hook futures, and
    /// fire due session broadcasts.
    pub fn poll_frame(&mut self, hooks: &mut dyn GameHooks, backend: &mut dyn StreamingBackend) {
        for event in self.transport.poll_frame() {
            match event {
                TransportEvent::Connected => self.sync.on_peer_connected(hooks, &mut self.outbox),
                TransportEvent::Disconnected => {
                    debug!("Peer gone; {} settle timers dropped", self.settling.len());
                    self.settling.clear();
                }
                TransportEvent::Received(packet) => match route(self.role, packet) {
                    Some(Inbound::Director(msg)) => self.handle_director(msg, hooks),
                    Some(Inbound::Player(msg)) => self.handle_player(msg, hooks, backend),
                    None => {}
                },
            }
        }

        if std::mem::take(&mut self.after_configure) {
            self.sync.after_configure(hooks, &mut self.outbox);
        }

        self.sync.poll(hooks, &mut self.outbox);

        let now = Instant::now();
        let before = self.settling.len();
        self.settling.retain(|deadline| *deadline > now);
        for _ in self.settling.len()..before {
            self.queue_session_state(backend);
        }

        self.flush();
    }

    fn handle_director(&mut self, msg: DirectorInbound, hooks: &mut dyn GameHooks) {
        match msg {
            DirectorInbound::RequestState => self.sync.on_request_state(hooks, &mut self.outbox),
            DirectorInbound::UpdateState(state) => self.sync.on_update_state(state, None, hooks, &mut self.outbox),
            DirectorInbound::Command { command, argument } => hooks.on_command(&command, &argument),
            DirectorInbound::Message(msg) => hooks.on_message(&msg.source, msg.opcode, msg.data.as_deref()),
            DirectorInbound::Error(code, info) => warn!("Peer reported {:?}: {}", code, info),
        }
    }

    fn handle_player(&mut self, msg: PlayerInbound, hooks: &mut dyn GameHooks, backend: &mut dyn StreamingBackend) {
        match msg {
            PlayerInbound::UpdateState { state, timeout } => {
                self.sync.on_update_state(state, timeout, hooks, &mut self.outbox)
            }
            PlayerInbound::LoadScene(scene) => self.sync.on_load_scene(scene, hooks, &mut self.outbox),
            PlayerInbound::Command { command, argument } => hooks.on_command(&command, &argument),
            PlayerInbound::Message(msg) => hooks.on_message(&msg.source, msg.opcode, msg.data.as_deref()),
            PlayerInbound::Error(code, info) => warn!("Peer reported {:?}: {}", code, info),
            PlayerInbound::Session(command) => match self.session.handle(command, backend) {
                Broadcast::Now => self.queue_session_state(backend),
                Broadcast::After(delay) => self.settling.push(Instant::now() + delay),
            },
            PlayerInbound::SessionData(frame) => match self.receiver.accept(frame) {
                Ok(Some(path)) => backend.import_session_data(&path),
                Ok(None) => {}
                Err(e) => warn!("Discarding session data chunk: {}", e),
            },
        }
    }

    fn flush(&mut self) {
        for envelope in std::mem::take(&mut self.outbox) {
            self.transport.send(&envelope);
        }
    }

    // =========================================================================
    // BACKEND CALLBACKS
    // =========================================================================

    /// Broadcast the current session state to the peer.
    pub fn send_session_state(&mut self, backend: &dyn StreamingBackend) {
        self.queue_session_state(backend);
        self.flush();
    }

    // Queued behind sync replies so outbound order follows inbound order.
    fn queue_session_state(&mut self, backend: &dyn StreamingBackend) {
        if !self.transport.is_connected() {
            return;
        }
        let state = self.session.snapshot(backend);
        self.outbox.push(Envelope::SessionUpdateState(state));
    }

    /// Backend lifecycle change.
    pub fn on_backend_event(&mut self, event: BackendEvent, backend: &dyn StreamingBackend) {
        debug!("Backend {:?}", event);
        self.send_session_state(backend);
    }

    /// Backend wrote a profiler output file. Returns `true` once it was sent
    /// and removed.
    pub fn on_profile_data(&mut self, path: &Path) -> bool {
        transfer::send_profile_data(&mut self.transport, path)
    }

    /// Backend produced a profiling report.
    pub fn on_profile_report(&mut self, report: &str, backend: &dyn StreamingBackend) {
        if backend.config().is_none() {
            return;
        }
        self.transport.send(&Envelope::SessionProfileReport { report: report.to_string() });
    }

    /// Backend answered a query.
    pub fn on_query_response(&mut self, statement: &str, body: &str, backend: &dyn StreamingBackend) {
        if self.session.on_query_response(statement, body) {
            self.send_session_state(backend);
        }
    }

    // =========================================================================
    // APPLICATION API
    // =========================================================================

    /// Switch every peer to `scene` (director only).
    pub fn load_other_scene(&mut self, scene: &str, hooks: &mut dyn GameHooks) {
        self.sync.load_other_scene(scene, hooks, &mut self.outbox);
        self.flush();
    }

    /// Push the local state to the peer.
    pub fn send_update_game_state(&mut self, hooks: &mut dyn GameHooks) {
        let envelope = self.sync.state_envelope(hooks);
        self.transport.send(&envelope);
    }

    /// Ask the peer for its state.
    pub fn request_peer_state(&mut self) {
        self.transport.send(&Envelope::RequestState);
    }

    /// Send a command to the player (director only).
    pub fn send_command_to_player(&mut self, command: &str, argument: &str) {
        if self.role != Role::Director {
            debug!("Players cannot send commands");
            return;
        }
        self.transport.send(&Envelope::Command {
            command: command.to_string(),
            argument: argument.to_string(),
        });
    }

    /// Relay an opcode message to one client. Needs an assigned identity.
    pub fn send_message_to(&mut self, target: &str, opcode: i32, data: Option<&str>) {
        if target.is_empty() {
            return;
        }
        self.send_opcode(Some(target), opcode, data);
    }

    /// Relay an opcode message to every client. Needs an assigned identity.
    pub fn send_message_to_all(&mut self, opcode: i32, data: Option<&str>) {
        self.send_opcode(None, opcode, data);
    }

    fn send_opcode(&mut self, target: Option<&str>, opcode: i32, data: Option<&str>) {
        let Some(source) = self.transport.peer_id().map(str::to_string) else {
            debug!("No identity yet, dropping opcode {}", opcode);
            return;
        };

        self.transport.send(&Envelope::Opcode(OpcodeMessage {
            source,
            target: target.map(str::to_string),
            opcode,
            data: data.map(str::to_string),
        }));
        info!("Sent opcode {} to {}", opcode, target.unwrap_or("all"));
    }
}
