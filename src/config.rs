//! Configuration
//!
//! Two layers:
//!
//! - [`PlaygroundConfig`]: deployment settings read from a JSON file, with
//!   an environment overlay.
//! - [`ClientConfig`]: protocol tunables with sensible defaults.
//!
//! The config file has a single root key, `playground`. Files written for
//! older deployments use `circlevr` instead and are still accepted.
//!
//! ```json
//! {
//!   "playground": {
//!     "mode": "observer",
//!     "multicast": { "address": "239.18.0.1", "port": 1888, "hint": "eth0" },
//!     "extensions": [ { "name": "circlevr-game-unity", "address": "10.0.0.5:9000" } ]
//!   }
//! }
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::core::rng::ReconnectWindow;
use crate::network::transport::Role;

/// Extension entry name of the game extension client.
pub const GAME_EXTENSION_NAME: &str = "circlevr-game-unity";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File could not be read.
    #[error("failed to read config {path}: {source}")]
    Io {
        /// Config path.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// File is not valid JSON for the expected layout.
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    /// Neither root key holds a config with a mode.
    #[error("config has no playground section with a mode")]
    MissingSection,
}

/// Runtime mode of this process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Spectator view; drives the game as director.
    Observer,
    /// Participant runtime.
    Player,
}

impl Mode {
    /// Parse a mode string. Anything other than `observer` is a player.
    pub fn parse(mode: &str) -> Self {
        match mode {
            "observer" => Mode::Observer,
            _ => Mode::Player,
        }
    }

    /// Game extension role for this mode.
    pub fn role(self) -> Role {
        match self {
            Mode::Observer => Role::Director,
            Mode::Player => Role::Player,
        }
    }
}

/// Multicast channel settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MulticastConfig {
    /// Group address.
    pub address: String,
    /// UDP port.
    pub port: i64,
    /// Interface hint.
    pub hint: String,
}

impl MulticastConfig {
    /// Address set and port in range.
    pub fn is_valid(&self) -> bool {
        !self.address.is_empty() && 0 < self.port && self.port <= 65535
    }
}

/// An extension endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtensionConfig {
    /// Extension name.
    pub name: String,
    /// `host:port` of the extension server.
    pub address: String,
}

/// Deployment settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaygroundConfig {
    /// `observer` or `player`.
    pub mode: String,
    /// Multicast channel.
    pub multicast: MulticastConfig,
    /// Extension endpoints.
    pub extensions: Vec<ExtensionConfig>,
}

#[derive(Deserialize)]
struct ConfigFile {
    #[serde(default)]
    playground: Option<PlaygroundConfig>,
    #[serde(default)]
    circlevr: Option<PlaygroundConfig>,
}

impl PlaygroundConfig {
    /// Read and parse a config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// Parse config file contents.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = serde_json::from_str(text)?;

        [file.playground, file.circlevr]
            .into_iter()
            .flatten()
            .find(PlaygroundConfig::is_valid)
            .ok_or(ConfigError::MissingSection)
    }

    /// Config built purely from environment variables.
    pub fn from_env() -> Self {
        Self::default().with_env()
    }

    /// Apply `PLAYGROUND_MODE` and `PLAYGROUND_EXTENSION_ADDRESS` on top.
    pub fn with_env(self) -> Self {
        self.overlay(|key| std::env::var(key).ok())
    }

    fn overlay(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(mode) = lookup("PLAYGROUND_MODE") {
            self.mode = mode;
        }

        if let Some(address) = lookup("PLAYGROUND_EXTENSION_ADDRESS") {
            match self.extensions.iter_mut().find(|e| e.name == GAME_EXTENSION_NAME) {
                Some(entry) => entry.address = address,
                None => self.extensions.push(ExtensionConfig {
                    name: GAME_EXTENSION_NAME.to_string(),
                    address,
                }),
            }
        }

        self
    }

    /// A mode is set.
    pub fn is_valid(&self) -> bool {
        !self.mode.is_empty()
    }

    /// Parsed mode.
    pub fn mode(&self) -> Mode {
        Mode::parse(&self.mode)
    }

    /// Address configured for extension `name`.
    pub fn extension_address(&self, name: &str) -> Option<&str> {
        self.extensions
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.address.as_str())
    }
}

/// Protocol tunables.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Window reconnect delays are drawn from.
    pub reconnect_window: ReconnectWindow,
    /// Wait after a play request before reporting state.
    pub play_settle: Duration,
    /// Wait after a stop request before reporting state.
    pub stop_settle: Duration,
    /// Directory inbound transfers and profiler output are written to.
    pub staging_dir: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            reconnect_window: ReconnectWindow::default(),
            play_settle: Duration::from_millis(300),
            stop_settle: Duration::from_millis(100),
            staging_dir: std::env::temp_dir().join("playground-sync"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SAMPLE: &str = r#"{
        "playground": {
            "mode": "observer",
            "multicast": { "address": "239.18.0.1", "port": 1888, "hint": "eth0" },
            "displays": { "layout": ["oooo"] },
            "extensions": [ { "name": "circlevr-game-unity", "address": "10.0.0.5:9000" } ]
        }
    }"#;

    #[test]
    fn test_parse_playground_section() {
        let config = PlaygroundConfig::from_json(SAMPLE).unwrap();

        assert_eq!(config.mode(), Mode::Observer);
        assert_eq!(config.mode().role(), Role::Director);
        assert!(config.multicast.is_valid());
        assert_eq!(config.extension_address(GAME_EXTENSION_NAME), Some("10.0.0.5:9000"));
        assert_eq!(config.extension_address("other"), None);
    }

    #[test]
    fn test_legacy_root_key() {
        let config = PlaygroundConfig::from_json(r#"{"circlevr":{"mode":"player"}}"#).unwrap();
        assert_eq!(config.mode(), Mode::Player);

        // an empty playground section falls through to the legacy one
        let config =
            PlaygroundConfig::from_json(r#"{"playground":{},"circlevr":{"mode":"observer"}}"#).unwrap();
        assert_eq!(config.mode(), Mode::Observer);
    }

    #[test]
    fn test_missing_section() {
        assert!(matches!(PlaygroundConfig::from_json("{}"), Err(ConfigError::MissingSection)));
        assert!(matches!(PlaygroundConfig::from_json("[1,"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("none.json");
        let err = PlaygroundConfig::load(&missing).unwrap_err();
        assert!(err.to_string().contains("none.json"));

        let path = dir.path().join("config.json");
        std::fs::write(&path, SAMPLE).unwrap();
        assert!(PlaygroundConfig::load(&path).is_ok());
    }

    #[test]
    fn test_unknown_mode_is_player() {
        assert_eq!(Mode::parse("spectator"), Mode::Player);
        assert_eq!(Mode::parse(""), Mode::Player);
    }

    #[test]
    fn test_multicast_validity() {
        let mut m = MulticastConfig { address: "239.0.0.1".into(), port: 65535, hint: String::new() };
        assert!(m.is_valid());
        m.port = 65536;
        assert!(!m.is_valid());
        m.port = 0;
        assert!(!m.is_valid());
        m.port = 80;
        m.address.clear();
        assert!(!m.is_valid());
    }

    #[test]
    fn test_env_overlay() {
        let vars: HashMap<&str, &str> = [
            ("PLAYGROUND_MODE", "player"),
            ("PLAYGROUND_EXTENSION_ADDRESS", "127.0.0.1:9100"),
        ]
        .into_iter()
        .collect();
        let lookup = |k: &str| vars.get(k).map(|v| v.to_string());

        let config = PlaygroundConfig::from_json(SAMPLE).unwrap().overlay(lookup);
        assert_eq!(config.mode(), Mode::Player);
        assert_eq!(config.extension_address(GAME_EXTENSION_NAME), Some("127.0.0.1:9100"));
        assert_eq!(config.extensions.len(), 1);

        let fresh = PlaygroundConfig::default().overlay(lookup);
        assert_eq!(fresh.extension_address(GAME_EXTENSION_NAME), Some("127.0.0.1:9100"));
    }

    #[test]
    fn test_client_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.play_settle, Duration::from_millis(300));
        assert_eq!(config.stop_settle, Duration::from_millis(100));
        assert_eq!(config.reconnect_window.min, Duration::from_secs(1));
    }
}
