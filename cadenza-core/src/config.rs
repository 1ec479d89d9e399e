//! TOML configuration: embedded defaults merged with a user override file.
//!
//! The undo limit is deliberately not a plain field — the engine reads it on
//! every commit, so a settings dialog can shrink or grow history depth
//! mid-session without restarting.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde::Deserialize;

const DEFAULT_CONFIG: &str = include_str!("../config.toml");

#[derive(Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    history: HistoryConfig,
    #[serde(default)]
    runtime: RuntimeConfig,
    #[serde(default)]
    plugins: PluginsConfig,
}

#[derive(Deserialize, Default)]
struct HistoryConfig {
    undo_limit: Option<usize>,
}

#[derive(Deserialize, Default)]
struct RuntimeConfig {
    autosave: Option<bool>,
    autosave_interval_minutes: Option<u64>,
}

#[derive(Deserialize, Default)]
struct PluginsConfig {
    dir: Option<PathBuf>,
}

/// Live engine preferences. Shared via `Arc` between the manager and any
/// settings UI; the undo limit is atomic so changes take effect on the very
/// next commit.
pub struct Preferences {
    undo_limit: AtomicUsize,
    autosave: bool,
    autosave_interval_minutes: u64,
    plugin_dir: Option<PathBuf>,
}

impl Default for Preferences {
    fn default() -> Self {
        Self::from_file(toml::from_str(DEFAULT_CONFIG).unwrap_or_default())
    }
}

impl Preferences {
    pub fn load() -> Self {
        let mut base: ConfigFile = match toml::from_str(DEFAULT_CONFIG) {
            Ok(config) => config,
            Err(e) => {
                log::error!(target: "config", "embedded config.toml is malformed: {e}");
                ConfigFile::default()
            }
        };

        if let Some(path) = user_config_path() {
            if path.exists() {
                match std::fs::read_to_string(&path) {
                    Ok(contents) => match toml::from_str::<ConfigFile>(&contents) {
                        Ok(user) => merge(&mut base, user),
                        Err(e) => {
                            log::warn!(target: "config", "ignoring malformed config {}: {}", path.display(), e)
                        }
                    },
                    Err(e) => {
                        log::warn!(target: "config", "could not read config {}: {}", path.display(), e)
                    }
                }
            }
        }

        Self::from_file(base)
    }

    fn from_file(file: ConfigFile) -> Self {
        Self {
            undo_limit: AtomicUsize::new(file.history.undo_limit.unwrap_or(100)),
            autosave: file.runtime.autosave.unwrap_or(true),
            autosave_interval_minutes: file
                .runtime
                .autosave_interval_minutes
                .unwrap_or(2)
                .clamp(1, 10_080),
            plugin_dir: file.plugins.dir,
        }
    }

    /// Maximum undo history depth. Read live on every commit.
    pub fn undo_limit(&self) -> usize {
        self.undo_limit.load(Ordering::Relaxed)
    }

    pub fn set_undo_limit(&self, limit: usize) {
        self.undo_limit.store(limit, Ordering::Relaxed);
    }

    /// Whether periodic autosave snapshots are enabled.
    pub fn autosave_enabled(&self) -> bool {
        self.autosave
    }

    pub fn autosave_interval(&self) -> Duration {
        Duration::from_secs(self.autosave_interval_minutes * 60)
    }

    /// Configured plugin directory, or the platform default.
    pub fn plugin_dir(&self) -> PathBuf {
        self.plugin_dir
            .clone()
            .unwrap_or_else(crate::plugins::default_plugin_dir)
    }
}

fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("cadenza").join("config.toml"))
}

fn merge(base: &mut ConfigFile, user: ConfigFile) {
    if user.history.undo_limit.is_some() {
        base.history.undo_limit = user.history.undo_limit;
    }
    if user.runtime.autosave.is_some() {
        base.runtime.autosave = user.runtime.autosave;
    }
    if user.runtime.autosave_interval_minutes.is_some() {
        base.runtime.autosave_interval_minutes = user.runtime.autosave_interval_minutes;
    }
    if user.plugins.dir.is_some() {
        base.plugins.dir = user.plugins.dir;
    }
}
