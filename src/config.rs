use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::warn;

pub const DEFAULT_CONFIG_PATH: &str = "config/bridge.toml";

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub channel: ChannelConfig,
    pub navigation: NavigationConfig,
    pub snapshot: SnapshotConfig,
    pub look: LookConfig,
    pub dialogue: DialogueConfig,
    pub run: RunConfig,
}

/// Pipe transport paths.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Request stream, followed like `tail -f`.
    pub input: PathBuf,
    /// Response file, overwritten after every command.
    pub output: PathBuf,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from("cli_cmd.txt"),
            output: PathBuf::from("cli_state.txt"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct NavigationConfig {
    /// Upper bound on each animation wait around a goto move.
    pub wait_timeout_ms: u64,
    /// Poll interval of the animation wait.
    pub wait_step_ms: u64,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            wait_timeout_ms: 60_000,
            wait_step_ms: 16,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SnapshotConfig {
    /// Display log lines in `[DISPLAY_LOG]`.
    pub log_lines: usize,
    /// Objects listed per elevation by `debug_objects`.
    pub debug_objects_limit: usize,
    /// Radius of `debug_nearby`, `enter` and `scan_exits`.
    pub debug_nearby_range: i32,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            log_lines: 8,
            debug_objects_limit: 50,
            debug_nearby_range: 999,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LookConfig {
    /// Scenery names containing any of these never count as notable.
    pub excluded_keywords: Vec<String>,
    /// Scenery names must contain one of these to count as notable.
    pub included_keywords: Vec<String>,
    /// First prototype id of the exit-grid range.
    pub exit_pid_min: u32,
    /// Last prototype id of the exit-grid range (inclusive).
    pub exit_pid_max: u32,
}

impl Default for LookConfig {
    fn default() -> Self {
        let words = |list: &[&str]| list.iter().map(|w| w.to_string()).collect();
        Self {
            excluded_keywords: words(&[
                "wall",
                "blocker",
                "secret block",
                "cave wall",
                "pipe",
                "vent",
                "light",
            ]),
            included_keywords: words(&[
                "computer", "terminal", "elevator", "ladder", "bed", "locker", "desk", "console",
                "panel",
            ]),
            exit_pid_min: 0x0500_0010,
            exit_pid_max: 0x0500_0017,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DialogueConfig {
    /// Reply options containing one of these end the conversation.
    pub end_keywords: Vec<String>,
}

impl Default for DialogueConfig {
    fn default() -> Self {
        Self {
            end_keywords: ["goodbye", "bye", "leave", "done"]
                .iter()
                .map(|w| w.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RunConfig {
    /// Wall-clock length of one headless tick.
    pub tick_ms: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self { tick_ms: 16 }
    }
}

impl BridgeConfig {
    /// Load configuration from the default path.
    pub fn load() -> Self {
        Self::load_from_path(Path::new(DEFAULT_CONFIG_PATH))
    }

    /// Load configuration from an explicit path, falling back to defaults on errors.
    pub fn load_from_path(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<BridgeConfig>(&contents) {
                Ok(cfg) => cfg,
                Err(err) => {
                    warn!("Failed to parse {}: {err}. Using defaults", path.display());
                    BridgeConfig::default()
                }
            },
            Err(err) => {
                if path != Path::new(DEFAULT_CONFIG_PATH)
                    || err.kind() != std::io::ErrorKind::NotFound
                {
                    warn!("Failed to read {}: {err}. Using defaults", path.display());
                } else {
                    warn!(
                        "Bridge config not found at {}. Using defaults",
                        path.display()
                    );
                }
                BridgeConfig::default()
            }
        }
    }

    /// Save configuration to an explicit path.
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        let toml = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml)?;
        Ok(())
    }
}
