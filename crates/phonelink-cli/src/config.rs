//! Configuration – reads/writes `~/.phonelink/config.toml`.

use phonelink_middleware::TransportKind;
use phonelink_types::BridgeError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Persisted bridge configuration stored in `~/.phonelink/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Phone sensor server endpoint. An `https://` scheme is mapped to
    /// `wss://` for the WebSocket transport; a bare host:port works for both
    /// transports.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Transport preference order, tried front to back.
    #[serde(default = "default_transports")]
    pub transports: Vec<String>,

    /// Reference frame stamped on published sensor messages.
    #[serde(default = "default_base_frame")]
    pub base_frame: String,

    /// Port the WebSocket event-stream egress listens on.
    #[serde(default = "default_egress_port")]
    pub egress_port: u16,

    /// MJPEG camera stream URL used by `phonelink-preview`.
    #[serde(default = "default_camera_url")]
    pub camera_stream_url: String,
}

fn default_endpoint() -> String {
    "https://localhost:3000".to_string()
}
fn default_transports() -> Vec<String> {
    vec!["websocket".to_string(), "tcp".to_string()]
}
fn default_base_frame() -> String {
    "phone_base_link".to_string()
}
fn default_egress_port() -> u16 {
    9090
}
fn default_camera_url() -> String {
    "https://localhost:3000/camera/stream.mjpg".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            transports: default_transports(),
            base_frame: default_base_frame(),
            egress_port: default_egress_port(),
            camera_stream_url: default_camera_url(),
        }
    }
}

impl Config {
    /// Parse the configured transport names into a preference order.
    pub fn transport_order(&self) -> Result<Vec<TransportKind>, BridgeError> {
        if self.transports.is_empty() {
            return Err(BridgeError::Config(
                "transport preference list is empty".to_string(),
            ));
        }
        self.transports.iter().map(|s| s.parse()).collect()
    }
}

/// Return the path to `~/.phonelink/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the config path relative to the given home directory.
/// Extracted for testability without mutating environment variables.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".phonelink").join("config.toml")
}

/// Load the config file from disk. Returns `None` if the file does not
/// exist. Env overrides are not applied here; callers run
/// [`apply_env_overrides`] after resolving the file or its absence, so
/// overrides take effect on a first run too.
pub fn load() -> Result<Option<Config>, BridgeError> {
    load_from(&config_path())
}

pub(crate) fn load_from(path: &PathBuf) -> Result<Option<Config>, BridgeError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).map_err(|e| {
        BridgeError::Config(format!("failed to read config at {}: {e}", path.display()))
    })?;
    let cfg: Config = toml::from_str(&raw)
        .map_err(|e| BridgeError::Config(format!("failed to parse config: {e}")))?;
    Ok(Some(cfg))
}

/// Apply `PHONELINK_*` environment variable overrides to `cfg`, whatever its
/// origin (file, defaults, or the parse-error fallback).
///
/// | Variable | Config field |
/// |---|---|
/// | `PHONELINK_ENDPOINT` | `endpoint` |
/// | `PHONELINK_BASE_FRAME` | `base_frame` |
/// | `PHONELINK_EGRESS_PORT` | `egress_port` |
/// | `PHONELINK_CAMERA_URL` | `camera_stream_url` |
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("PHONELINK_ENDPOINT") {
        cfg.endpoint = v;
    }
    if let Ok(v) = std::env::var("PHONELINK_BASE_FRAME") {
        cfg.base_frame = v;
    }
    if let Ok(v) = std::env::var("PHONELINK_EGRESS_PORT")
        && let Ok(port) = v.parse::<u16>() {
            cfg.egress_port = port;
        }
    if let Ok(v) = std::env::var("PHONELINK_CAMERA_URL") {
        cfg.camera_stream_url = v;
    }
}

/// Save the config to disk, creating `~/.phonelink/` if necessary.
pub fn save(cfg: &Config) -> Result<(), BridgeError> {
    save_to(cfg, &config_path())
}

pub(crate) fn save_to(cfg: &Config, path: &PathBuf) -> Result<(), BridgeError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            BridgeError::Config(format!("failed to create config directory: {e}"))
        })?;
    }
    let raw = toml::to_string_pretty(cfg)
        .map_err(|e| BridgeError::Config(format!("failed to serialize config: {e}")))?;
    fs::write(path, raw).map_err(|e| {
        BridgeError::Config(format!("failed to write config at {}: {e}", path.display()))
    })?;
    Ok(())
}
