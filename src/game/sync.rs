//! Game State Synchronization
//!
//! Reconciles application state between director and player.
//!
//! ## Sequences
//!
//! - **Apply**: run the `apply_state` hook, then echo the local state back.
//! - **Scene load** (director): send `load-scene`, await `pre_load_scene`,
//!   then `load_scene`.
//! - **Scene load** (player, from `update-state`): stash the incoming state
//!   and load at once; the stash is applied on the next configure cycle.
//!   Until then the stash is the sequence in progress: later updates replace
//!   it rather than applying ahead of it.
//! - **Scene load** (player, from `load-scene`): await `pre_load_scene`, then
//!   `load_scene`.
//!
//! At most one sequence runs at a time. Work arriving meanwhile waits in a
//! single pending slot; newer work replaces older.
//!
//! Hook futures are polled once per frame from [`GameSync::poll`] with a
//! no-op waker, so they must not rely on being woken.

use std::future::Future;
use std::task::{Context, Poll};
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::task::noop_waker_ref;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::network::protocol::{Envelope, GameErrorCode};
use crate::network::transport::Role;

/// Application callbacks driven by the synchronizer.
pub trait GameHooks {
    /// Serialize current application state.
    fn evaluate_state(&mut self) -> String;

    /// Scene `state` belongs to, if it differs from the loaded one.
    fn scene_to_load(&mut self, state: &str) -> Option<String>;

    /// Currently loaded scene.
    fn current_scene(&self) -> Option<String> {
        None
    }

    /// Prepare for leaving the current scene.
    fn pre_load_scene(&mut self, _scene: &str) -> Option<BoxFuture<'static, ()>> {
        None
    }

    /// Apply a peer's state. Return a future to complete asynchronously.
    fn apply_state(&mut self, _state: &str) -> Option<BoxFuture<'static, ()>> {
        None
    }

    /// Switch scenes.
    fn load_scene(&mut self, scene: &str);

    /// Application command from the peer.
    fn on_command(&mut self, _command: &str, _argument: &str) {}

    /// Relayed opcode message.
    fn on_message(&mut self, _source: &str, _opcode: i32, _data: Option<&str>) {}
}

enum InFlight {
    Idle,
    Applying {
        future: BoxFuture<'static, ()>,
        deadline: Option<Instant>,
        timeout_reported: bool,
    },
    PreLoading {
        scene: String,
        future: BoxFuture<'static, ()>,
    },
}

/// Work parked behind an in-flight sequence.
#[derive(Debug, Clone, PartialEq)]
enum Pending {
    Update { state: String, timeout: Option<Duration> },
    Apply(String),
    LoadScene { scene: String, announce: bool },
}

/// Game state synchronizer for one role.
pub struct GameSync {
    role: Role,
    in_flight: InFlight,
    pending: Option<Pending>,
    stashed: Option<String>,
}

impl GameSync {
    /// Create an idle synchronizer.
    pub fn new(role: Role) -> Self {
        Self {
            role,
            in_flight: InFlight::Idle,
            pending: None,
            stashed: None,
        }
    }

    /// Role this synchronizer acts as.
    pub fn role(&self) -> Role {
        self.role
    }

    /// A sequence is in flight.
    pub fn is_busy(&self) -> bool {
        !matches!(self.in_flight, InFlight::Idle)
    }

    /// State waiting for the next configure cycle.
    pub fn stashed_state(&self) -> Option<&str> {
        self.stashed.as_deref()
    }

    /// Current local state as an `update-state` envelope.
    pub fn state_envelope(&self, hooks: &mut dyn GameHooks) -> Envelope {
        Envelope::UpdateState { state: hooks.evaluate_state() }
    }

    /// A peer link came up. The director pushes its state.
    pub fn on_peer_connected(&mut self, hooks: &mut dyn GameHooks, out: &mut Vec<Envelope>) {
        if self.role == Role::Director {
            out.push(self.state_envelope(hooks));
        }
    }

    /// Peer asked for our state.
    pub fn on_request_state(&mut self, hooks: &mut dyn GameHooks, out: &mut Vec<Envelope>) {
        out.push(self.state_envelope(hooks));
    }

    /// Peer pushed its state.
    pub fn on_update_state(
        &mut self,
        state: String,
        timeout: Option<Duration>,
        hooks: &mut dyn GameHooks,
        out: &mut Vec<Envelope>,
    ) {
        if self.park(Pending::Update { state: state.clone(), timeout }) {
            return;
        }

        match hooks.scene_to_load(&state) {
            Some(scene) if self.role == Role::Director => {
                self.start_scene_load(scene, true, hooks, out);
            }
            Some(scene) => {
                info!("State belongs to scene {}, loading before apply", scene);
                self.stashed = Some(state);
                hooks.load_scene(&scene);
            }
            None if self.stashed.is_some() => {
                debug!("Newer state replaces the stashed one");
                self.stashed = Some(state);
            }
            None => self.start_apply(state, timeout, hooks, out),
        }
    }

    /// Director asks to switch every peer to `scene`. Ignored for players,
    /// for an empty name and for the scene already loaded.
    pub fn load_other_scene(&mut self, scene: &str, hooks: &mut dyn GameHooks, out: &mut Vec<Envelope>) {
        if self.role != Role::Director {
            debug!("Only the director can change scenes");
            return;
        }
        if scene.is_empty() || hooks.current_scene().as_deref() == Some(scene) {
            return;
        }
        if self.park(Pending::LoadScene { scene: scene.to_string(), announce: true }) {
            return;
        }
        self.start_scene_load(scene.to_string(), true, hooks, out);
    }

    /// Peer asked us to switch to `scene`.
    pub fn on_load_scene(&mut self, scene: String, hooks: &mut dyn GameHooks, out: &mut Vec<Envelope>) {
        if self.park(Pending::LoadScene { scene: scene.clone(), announce: false }) {
            return;
        }
        self.start_scene_load(scene, false, hooks, out);
    }

    /// Configure ran again on a live session: apply any stashed state, then
    /// echo ours.
    pub fn after_configure(&mut self, hooks: &mut dyn GameHooks, out: &mut Vec<Envelope>) {
        match self.stashed.take() {
            Some(state) => {
                if self.park(Pending::Apply(state.clone())) {
                    return;
                }
                self.start_apply(state, None, hooks, out);
            }
            None => out.push(self.state_envelope(hooks)),
        }
    }

    /// Drive the in-flight sequence, then start parked work if it finished.
    pub fn poll(&mut self, hooks: &mut dyn GameHooks, out: &mut Vec<Envelope>) {
        self.drive(hooks, out);

        while !self.is_busy() {
            let Some(next) = self.pending.take() else {
                break;
            };
            debug!("Resuming parked {:?}", next);
            match next {
                Pending::Update { state, timeout } => self.on_update_state(state, timeout, hooks, out),
                Pending::Apply(state) => self.start_apply(state, None, hooks, out),
                Pending::LoadScene { scene, announce } => self.start_scene_load(scene, announce, hooks, out),
            }
        }
    }

    fn park(&mut self, work: Pending) -> bool {
        if !self.is_busy() {
            return false;
        }
        if let Some(replaced) = self.pending.replace(work) {
            debug!("Dropping parked {:?}", replaced);
        }
        true
    }

    fn start_apply(&mut self, state: String, timeout: Option<Duration>, hooks: &mut dyn GameHooks, out: &mut Vec<Envelope>) {
        match hooks.apply_state(&state) {
            None => out.push(self.state_envelope(hooks)),
            Some(future) => {
                self.in_flight = InFlight::Applying {
                    future,
                    deadline: timeout.map(|t| Instant::now() + t),
                    timeout_reported: false,
                };
                self.drive(hooks, out);
            }
        }
    }

    fn start_scene_load(&mut self, scene: String, announce: bool, hooks: &mut dyn GameHooks, out: &mut Vec<Envelope>) {
        if announce {
            out.push(Envelope::LoadScene { scene: scene.clone() });
        }

        match hooks.pre_load_scene(&scene) {
            None => {
                info!("Loading scene {}", scene);
                hooks.load_scene(&scene);
            }
            Some(future) => {
                self.in_flight = InFlight::PreLoading { scene, future };
                self.drive(hooks, out);
            }
        }
    }

    fn drive(&mut self, hooks: &mut dyn GameHooks, out: &mut Vec<Envelope>) {
        let mut cx = Context::from_waker(noop_waker_ref());

        match &mut self.in_flight {
            InFlight::Idle => {}

            InFlight::Applying { future, deadline, timeout_reported } => {
                if future.as_mut().poll(&mut cx).is_ready() {
                    self.in_flight = InFlight::Idle;
                    out.push(self.state_envelope(hooks));
                    return;
                }

                if let Some(deadline) = *deadline {
                    if !*timeout_reported && Instant::now() >= deadline {
                        warn!("State apply missed its deadline");
                        *timeout_reported = true;
                        out.push(Envelope::error(GameErrorCode::UpdateStateTimeout, "state apply timed out"));
                    }
                }
            }

            InFlight::PreLoading { scene, future } => {
                if let Poll::Ready(()) = future.as_mut().poll(&mut cx) {
                    let scene = std::mem::take(scene);
                    self.in_flight = InFlight::Idle;
                    info!("Loading scene {}", scene);
                    hooks.load_scene(&scene);
                }
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use futures_util::FutureExt;
    use tokio::sync::oneshot;

    /// Hooks double with scriptable async behavior.
    #[derive(Default)]
    pub(crate) struct ScriptedHooks {
        pub state: String,
        pub scene: String,
        pub log: Vec<String>,
        pub apply_gate: Option<oneshot::Receiver<()>>,
        pub preload_gate: Option<oneshot::Receiver<()>>,
    }

    impl ScriptedHooks {
        pub fn in_scene(scene: &str) -> Self {
            Self {
                state: format!("{}|local", scene),
                scene: scene.into(),
                ..Self::default()
            }
        }

        pub fn gate_apply(&mut self) -> oneshot::Sender<()> {
            let (tx, rx) = oneshot::channel();
            self.apply_gate = Some(rx);
            tx
        }

        pub fn gate_preload(&mut self) -> oneshot::Sender<()> {
            let (tx, rx) = oneshot::channel();
            self.preload_gate = Some(rx);
            tx
        }
    }

    fn gated(rx: Option<oneshot::Receiver<()>>) -> Option<BoxFuture<'static, ()>> {
        rx.map(|rx| async move {
            let _ = rx.await;
        }
        .boxed())
    }

    impl GameHooks for ScriptedHooks {
        fn evaluate_state(&mut self) -> String {
            self.state.clone()
        }

        // states look like "<scene>|<payload>"
        fn scene_to_load(&mut self, state: &str) -> Option<String> {
            let scene = state.split('|').next().unwrap_or_default();
            (!scene.is_empty() && scene != self.scene).then(|| scene.to_string())
        }

        fn current_scene(&self) -> Option<String> {
            Some(self.scene.clone())
        }

        fn pre_load_scene(&mut self, scene: &str) -> Option<BoxFuture<'static, ()>> {
            self.log.push(format!("pre-load {}", scene));
            gated(self.preload_gate.take())
        }

        fn apply_state(&mut self, state: &str) -> Option<BoxFuture<'static, ()>> {
            self.log.push(format!("apply {}", state));
            self.state = state.to_string();
            gated(self.apply_gate.take())
        }

        fn load_scene(&mut self, scene: &str) {
            self.log.push(format!("load {}", scene));
            self.scene = scene.to_string();
        }

        fn on_command(&mut self, command: &str, argument: &str) {
            self.log.push(format!("command {} {}", command, argument));
        }

        fn on_message(&mut self, source: &str, opcode: i32, data: Option<&str>) {
            self.log.push(format!("message {} {} {:?}", source, opcode, data));
        }
    }

    fn update(state: &str) -> Envelope {
        Envelope::UpdateState { state: state.into() }
    }

    #[test]
    fn test_sync_apply_echoes_state() {
        let mut hooks = ScriptedHooks::in_scene("Town");
        let mut sync = GameSync::new(Role::Player);
        let mut out = Vec::new();

        sync.on_update_state("Town|a".into(), None, &mut hooks, &mut out);

        assert_eq!(hooks.log, vec!["apply Town|a"]);
        assert_eq!(out, vec![update("Town|a")]);
        assert!(!sync.is_busy());
    }

    #[tokio::test]
    async fn test_parked_update_replaced_by_newer() {
        let mut hooks = ScriptedHooks::in_scene("Town");
        let gate = hooks.gate_apply();
        let mut sync = GameSync::new(Role::Player);
        let mut out = Vec::new();

        sync.on_update_state("Town|a".into(), None, &mut hooks, &mut out);
        assert!(sync.is_busy());
        assert!(out.is_empty());

        sync.on_update_state("Town|b".into(), None, &mut hooks, &mut out);
        sync.on_update_state("Town|c".into(), None, &mut hooks, &mut out);
        sync.poll(&mut hooks, &mut out);
        assert_eq!(hooks.log, vec!["apply Town|a"]);

        gate.send(()).unwrap();
        sync.poll(&mut hooks, &mut out);

        // "b" was replaced before it ever ran
        assert_eq!(hooks.log, vec!["apply Town|a", "apply Town|c"]);
        assert_eq!(out, vec![update("Town|a"), update("Town|c")]);
        assert!(!sync.is_busy());
    }

    #[tokio::test]
    async fn test_director_scene_handshake() {
        let mut hooks = ScriptedHooks::in_scene("Town");
        let gate = hooks.gate_preload();
        let mut sync = GameSync::new(Role::Director);
        let mut out = Vec::new();

        sync.on_update_state("Beach|x".into(), None, &mut hooks, &mut out);

        // announced before any local loading happens
        assert_eq!(out, vec![Envelope::LoadScene { scene: "Beach".into() }]);
        assert_eq!(hooks.log, vec!["pre-load Beach"]);

        sync.poll(&mut hooks, &mut out);
        assert_eq!(hooks.scene, "Town");

        gate.send(()).unwrap();
        sync.poll(&mut hooks, &mut out);
        assert_eq!(hooks.log, vec!["pre-load Beach", "load Beach"]);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_player_stashes_state_across_scene_load() {
        let mut hooks = ScriptedHooks::in_scene("Town");
        let mut sync = GameSync::new(Role::Player);
        let mut out = Vec::new();

        sync.on_update_state("Beach|x".into(), None, &mut hooks, &mut out);
        assert_eq!(hooks.log, vec!["load Beach"]);
        assert_eq!(sync.stashed_state(), Some("Beach|x"));
        assert!(out.is_empty());

        sync.after_configure(&mut hooks, &mut out);
        assert_eq!(hooks.log, vec!["load Beach", "apply Beach|x"]);
        assert_eq!(out, vec![update("Beach|x")]);
        assert_eq!(sync.stashed_state(), None);

        // nothing stashed: just echo
        sync.after_configure(&mut hooks, &mut out);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_newer_update_replaces_stashed_state() {
        let mut hooks = ScriptedHooks::in_scene("Town");
        let mut sync = GameSync::new(Role::Player);
        let mut out = Vec::new();

        sync.on_update_state("Beach|old".into(), None, &mut hooks, &mut out);
        sync.on_update_state("Beach|new".into(), None, &mut hooks, &mut out);
        assert_eq!(hooks.log, vec!["load Beach"]);
        assert_eq!(sync.stashed_state(), Some("Beach|new"));
        assert!(out.is_empty());

        sync.after_configure(&mut hooks, &mut out);
        assert_eq!(hooks.log, vec!["load Beach", "apply Beach|new"]);
        assert_eq!(hooks.state, "Beach|new");
        assert_eq!(out, vec![update("Beach|new")]);
    }

    #[test]
    fn test_player_load_scene_does_not_announce() {
        let mut hooks = ScriptedHooks::in_scene("Town");
        let mut sync = GameSync::new(Role::Player);
        let mut out = Vec::new();

        sync.on_load_scene("Beach".into(), &mut hooks, &mut out);
        assert_eq!(hooks.log, vec!["pre-load Beach", "load Beach"]);
        assert!(out.is_empty());
    }

    #[test]
    fn test_load_other_scene_guards() {
        let mut hooks = ScriptedHooks::in_scene("Town");
        let mut out = Vec::new();

        let mut player = GameSync::new(Role::Player);
        player.load_other_scene("Beach", &mut hooks, &mut out);
        assert!(hooks.log.is_empty());

        let mut director = GameSync::new(Role::Director);
        director.load_other_scene("", &mut hooks, &mut out);
        director.load_other_scene("Town", &mut hooks, &mut out);
        assert!(out.is_empty());

        director.load_other_scene("Beach", &mut hooks, &mut out);
        assert_eq!(out, vec![Envelope::LoadScene { scene: "Beach".into() }]);
        assert_eq!(hooks.log, vec!["pre-load Beach", "load Beach"]);
    }

    #[test]
    fn test_director_pushes_state_on_connect() {
        let mut hooks = ScriptedHooks::in_scene("Town");
        let mut out = Vec::new();

        GameSync::new(Role::Player).on_peer_connected(&mut hooks, &mut out);
        assert!(out.is_empty());

        GameSync::new(Role::Director).on_peer_connected(&mut hooks, &mut out);
        assert_eq!(out, vec![update("Town|local")]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_reported_once() {
        let mut hooks = ScriptedHooks::in_scene("Town");
        let gate = hooks.gate_apply();
        let mut sync = GameSync::new(Role::Player);
        let mut out = Vec::new();

        sync.on_update_state("Town|slow".into(), Some(Duration::from_millis(500)), &mut hooks, &mut out);
        tokio::time::advance(Duration::from_millis(400)).await;
        sync.poll(&mut hooks, &mut out);
        assert!(out.is_empty());

        tokio::time::advance(Duration::from_millis(200)).await;
        sync.poll(&mut hooks, &mut out);
        sync.poll(&mut hooks, &mut out);
        assert_eq!(out, vec![Envelope::error(GameErrorCode::UpdateStateTimeout, "state apply timed out")]);

        gate.send(()).unwrap();
        sync.poll(&mut hooks, &mut out);
        assert_eq!(out.last(), Some(&update("Town|slow")));
    }
}
