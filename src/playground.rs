//! Playground Host
//!
//! Composes the game extension client, the participant registry and the
//! local publisher into one frame step. The host owns every piece; nothing
//! here is global.
//!
//! A local player takes part only between the backend's `Activate` and
//! `Deactivate` events. Those edges surface as [`RegistryEvent`]s for the
//! local id, in the same stream as remote transitions.

use tracing::{info, warn};
#[cfg(feature = "debug-tracing")]
use tracing::trace;

use crate::config::{ClientConfig, Mode, MulticastConfig, PlaygroundConfig, GAME_EXTENSION_NAME};
use crate::game::client::{BackendEvent, GameClient};
use crate::game::session::StreamingBackend;
use crate::game::sync::GameHooks;
use crate::registry::{
    FrameSink, FrameSource, LocalObserver, LocalPlayer, LocalPublisher, ParticipantData, ParticipantRegistry,
    RegistryEvent,
};

/// Member id of the local runtime unless the host sets another.
pub const DEFAULT_LOCAL_ID: &str = "local";

/// What the local runtime publishes.
#[derive(Debug, Clone)]
pub enum LocalRuntime {
    /// Spectator view.
    Observer(LocalObserver),
    /// Participant.
    Player(LocalPlayer),
}

/// One playground process.
pub struct Playground {
    mode: Mode,
    local_id: String,
    multicast: Option<MulticastConfig>,
    client: GameClient,
    registry: ParticipantRegistry,
    local: LocalRuntime,
    local_events: Vec<RegistryEvent>,
}

impl Playground {
    /// Build the host for `config`, connecting to the game extension when an
    /// address is configured.
    pub fn new(config: &PlaygroundConfig, client_config: &ClientConfig) -> Self {
        let mode = config.mode();
        let mut playground = Self::with_client(mode, GameClient::new(mode.role(), client_config));

        if config.multicast.is_valid() {
            let multicast = &config.multicast;
            info!("Multicast group {}:{} (hint {:?})", multicast.address, multicast.port, multicast.hint);
            playground.multicast = Some(multicast.clone());
        } else {
            warn!("Multicast settings incomplete, running without a group");
        }

        match config.extension_address(GAME_EXTENSION_NAME) {
            Some(address) => {
                if playground.client.configure(address) {
                    info!("Game extension at {} as {}", address, mode.role());
                } else {
                    warn!("Invalid game extension address {:?}", address);
                }
            }
            None => info!("No game extension configured"),
        }

        playground
    }

    /// Host over an existing client.
    pub fn with_client(mode: Mode, client: GameClient) -> Self {
        let local = match mode {
            Mode::Observer => LocalRuntime::Observer(LocalObserver::default()),
            Mode::Player => LocalRuntime::Player(LocalPlayer::default()),
        };
        Self {
            mode,
            local_id: DEFAULT_LOCAL_ID.to_string(),
            multicast: None,
            client,
            registry: ParticipantRegistry::new(),
            local,
            local_events: Vec::new(),
        }
    }

    /// Use `id` as the local member id.
    pub fn with_local_id(mut self, id: impl Into<String>) -> Self {
        self.local_id = id.into();
        self
    }

    /// Runtime mode.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Local member id.
    pub fn local_id(&self) -> &str {
        &self.local_id
    }

    /// Multicast group, when the config names a usable one.
    pub fn multicast(&self) -> Option<&MulticastConfig> {
        self.multicast.as_ref()
    }

    /// Game extension client.
    pub fn client(&mut self) -> &mut GameClient {
        &mut self.client
    }

    /// Participant registry.
    pub fn registry(&self) -> &ParticipantRegistry {
        &self.registry
    }

    /// Local runtime, for the host to feed device readings.
    pub fn local_mut(&mut self) -> &mut LocalRuntime {
        &mut self.local
    }

    /// Multicast member appeared.
    pub fn member_joined(&mut self, id: &str) {
        self.registry.member_joined(id);
    }

    /// Multicast member disappeared.
    pub fn member_left(&mut self, id: &str) {
        self.registry.member_left(id);
    }

    /// Backend lifecycle change. Broadcasts session state and admits or
    /// removes the local player.
    pub fn on_backend_event(&mut self, event: BackendEvent, backend: &dyn StreamingBackend) {
        self.client.on_backend_event(event, backend);

        let LocalRuntime::Player(player) = &mut self.local else {
            return;
        };

        match event {
            BackendEvent::Activate if !player.activated => {
                if let Some(config) = backend.config() {
                    player.stereo = config.stereo;
                    player.user_id = Some(config.user_id);
                }
                player.activated = true;
                info!("Local player {} joined as {:?}", self.local_id, player.kind());
                self.local_events.push(RegistryEvent::Joined {
                    id: self.local_id.clone(),
                    kind: player.kind(),
                });
            }
            BackendEvent::Deactivate if player.activated => {
                player.activated = false;
                info!("Local player {} left", self.local_id);
                self.local_events.push(RegistryEvent::Left { id: self.local_id.clone() });
            }
            _ => {}
        }
    }

    /// Run one frame and return the participant transitions it produced,
    /// local ones first.
    pub fn tick<C>(
        &mut self,
        channel: &mut C,
        hooks: &mut dyn GameHooks,
        backend: &mut dyn StreamingBackend,
        data: &mut dyn ParticipantData,
    ) -> Vec<RegistryEvent>
    where
        C: FrameSource + FrameSink,
    {
        self.client.poll_frame(hooks, backend);
        self.registry.on_frame_tick_with(&*channel, data);

        let published = match &mut self.local {
            LocalRuntime::Observer(observer) => {
                observer.client_id = self.client.id().map(str::to_string);
                observer.publish(&mut *channel)
            }
            LocalRuntime::Player(player) => {
                if let Some(config) = backend.config() {
                    player.stereo = config.stereo;
                    player.user_id = Some(config.user_id);
                }
                let published = player.publish(&mut *channel);
                if published {
                    data.pend_local(player, &mut *channel);
                }
                published
            }
        };

        if !published {
            #[cfg(feature = "debug-tracing")]
            trace!("Local runtime idle this frame");
        }

        let mut events = std::mem::take(&mut self.local_events);
        events.extend(self.registry.take_events());
        events
    }

    /// Stop the extension client.
    pub fn shutdown(&mut self) {
        self.client.shutdown();
    }
}
