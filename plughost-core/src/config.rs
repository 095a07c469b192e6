//! Runtime configuration, read from `~/.plughost/config.toml`.
//!
//! Every field has a default so a missing or partial file still yields a
//! usable configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Configuration shared by every component through the host context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Host dot directory (settings, preferences, generated documents).
    pub dot_root: PathBuf,
    /// Root of plugins installed by the host itself. Defaults to
    /// `<dot_root>/<plugins_subdir>`.
    pub managed_root: Option<PathBuf>,
    pub plugins_subdir: String,
    /// Bootstrap script embedded in documents synthesized for script entries.
    pub runtime_script: String,
    pub dev_mode: bool,
    /// Capacity of the lifecycle event bus.
    pub event_capacity: usize,
    /// Hooks never delivered to plugins that report no runtime version.
    /// A trailing `*` matches by prefix.
    pub suppressed_legacy_hooks: Vec<String>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            dot_root: dirs_path(),
            managed_root: None,
            plugins_subdir: "plugins".to_string(),
            runtime_script: "plughost-runtime.js".to_string(),
            dev_mode: false,
            event_capacity: 256,
            suppressed_legacy_hooks: vec![
                "hook:db:changed".to_string(),
                "hook:db:block*".to_string(),
            ],
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    core: CoreConfig,
}

impl CoreConfig {
    /// Loads `~/.plughost/config.toml` if it exists.
    pub fn load() -> Self {
        Self::load_from(dirs_path().join("config.toml"))
    }

    /// Loads configuration from an explicit path, falling back to defaults.
    pub fn load_from(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            info!("No config file found at {:?}, using defaults", path);
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<ConfigFile>(&contents) {
                Ok(file) => {
                    info!("Loaded plughost config from {:?}", path);
                    file.core
                }
                Err(e) => {
                    warn!("Failed to parse config file {:?}: {}. Using defaults.", path, e);
                    Self::default()
                }
            },
            Err(e) => {
                warn!("Failed to read config file {:?}: {}. Using defaults.", path, e);
                Self::default()
            }
        }
    }

    /// Configuration rooted at `dot_root`, for tests and embedding.
    pub fn with_dot_root(dot_root: impl Into<PathBuf>) -> Self {
        Self {
            dot_root: dot_root.into(),
            ..Self::default()
        }
    }

    pub fn managed_root(&self) -> PathBuf {
        self.managed_root
            .clone()
            .unwrap_or_else(|| self.dot_root.join(&self.plugins_subdir))
    }

    /// True if `package_root` lives under the managed root.
    pub fn is_managed(&self, package_root: &Path) -> bool {
        package_root.starts_with(self.managed_root())
    }

    pub fn is_suppressed_legacy_hook(&self, hook: &str) -> bool {
        self.suppressed_legacy_hooks.iter().any(|pattern| {
            match pattern.strip_suffix('*') {
                Some(prefix) => hook.starts_with(prefix),
                None => hook == pattern,
            }
        })
    }
}

fn dirs_path() -> PathBuf {
    if let Ok(home) = std::env::var("HOME") {
        Path::new(&home).join(".plughost")
    } else if let Ok(home) = std::env::var("USERPROFILE") {
        Path::new(&home).join(".plughost")
    } else {
        PathBuf::from(".plughost")
    }
}
