//! Lifecycle status of a plugin unit.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a plugin unit currently sits in its lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleStatus {
    #[default]
    Unloaded,
    Loading,
    Loaded,
    Unloading,
    Error,
}

impl LifecycleStatus {
    /// A unit in transition ignores further load/unload/reload requests.
    #[must_use]
    pub const fn is_pending(self) -> bool {
        matches!(self, Self::Loading | Self::Unloading)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unloaded => "unloaded",
            Self::Loading => "loading",
            Self::Loaded => "loaded",
            Self::Unloading => "unloading",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for LifecycleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
