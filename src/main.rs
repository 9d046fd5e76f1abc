//! Playground Sync Host
//!
//! Standalone host for one playground runtime. Connects to the game
//! extension named in the config and runs the frame loop over an in-process
//! multicast channel until Ctrl-C.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use playground_sync::{
    ClientConfig, FRAME_RATE, GameHooks, Playground, PlaygroundConfig, StreamingBackend, VERSION,
    game::session::PlayerConfig,
    network::transfer::ImportSink,
    registry::{LoopbackChannel, NoParticipantData, RegistryEvent},
};

/// Playground runtime host
#[derive(Parser)]
#[command(name = "playground-sync")]
#[command(about = "Run one playground runtime until Ctrl-C", version)]
struct Args {
    /// JSON config file; without it the config comes from the environment
    #[arg(long)]
    config: Option<PathBuf>,
}

/// Hooks that track a scene name and log everything else.
struct LoggingHooks {
    scene: String,
}

impl GameHooks for LoggingHooks {
    fn evaluate_state(&mut self) -> String {
        self.scene.clone()
    }

    fn scene_to_load(&mut self, state: &str) -> Option<String> {
        (!state.is_empty()).then(|| state.to_string())
    }

    fn current_scene(&self) -> Option<String> {
        Some(self.scene.clone())
    }

    fn load_scene(&mut self, scene: &str) {
        info!("Loading scene {}", scene);
        self.scene = scene.to_string();
    }

    fn on_command(&mut self, command: &str, argument: &str) {
        info!("Command {} {:?}", command, argument);
    }

    fn on_message(&mut self, source: &str, opcode: i32, data: Option<&str>) {
        info!("Message from {}: opcode {} {:?}", source, opcode, data);
    }
}

/// Backend with no streaming client attached.
struct IdleBackend;

impl ImportSink for IdleBackend {
    fn import_session_data(&mut self, path: &Path) {
        info!("Session data staged at {}", path.display());
    }
}

impl StreamingBackend for IdleBackend {
    fn is_connected(&self) -> bool {
        false
    }

    fn config(&self) -> Option<PlayerConfig> {
        None
    }

    fn is_streaming(&self) -> bool {
        false
    }

    fn is_profiling(&self) -> bool {
        false
    }

    fn request_configure_session(&mut self, min_bitrate: u32, start_bitrate: u32, max_bitrate: u32) {
        debug!("Ignoring configure {}/{}/{}", min_bitrate, start_bitrate, max_bitrate);
    }

    fn request_query(&mut self, statement: &str) {
        debug!("Ignoring query {:?}", statement);
    }

    fn request_play(&mut self, _session_data_name: Option<&str>) {
        debug!("Ignoring play");
    }

    fn request_stop(&mut self) {
        debug!("Ignoring stop");
    }

    fn request_start_profile(&mut self, _output_dir: &Path, session_name: &str, _session_data_name: Option<&str>) {
        debug!("Ignoring profile {}", session_name);
    }

    fn request_stop_profile(&mut self) {
        debug!("Ignoring stop profile");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Playground Sync v{}", VERSION);

    let config = match args.config {
        Some(path) => PlaygroundConfig::load(&path)
            .with_context(|| format!("loading {}", path.display()))?
            .with_env(),
        None => PlaygroundConfig::from_env(),
    };
    info!("Mode: {:?}", config.mode());

    let mut playground = Playground::new(&config, &ClientConfig::default());
    let mut channel = LoopbackChannel::new(playground.local_id());
    let mut hooks = LoggingHooks { scene: String::new() };
    let mut backend = IdleBackend;

    let mut frame = interval(Duration::from_micros(1_000_000 / FRAME_RATE as u64));
    frame.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!("Running at {} Hz", FRAME_RATE);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = frame.tick() => {
                for event in playground.tick(&mut channel, &mut hooks, &mut backend, &mut NoParticipantData) {
                    match event {
                        RegistryEvent::Joined { id, kind } => info!("{} joined as {:?}", id, kind),
                        RegistryEvent::Left { id } => info!("{} left", id),
                    }
                }
                channel.commit();
            }
            result = &mut shutdown => {
                result.context("waiting for Ctrl-C")?;
                info!("Shutting down");
                break;
            }
        }
    }

    playground.shutdown();
    Ok(())
}
