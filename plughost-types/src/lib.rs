//! Core type definitions for plughost.
//!
//! This crate defines the plain data shared by every layer of the plugin
//! runtime:
//! - Plugin identities
//! - Lifecycle status of a plugin unit
//! - Plugin options and the package descriptor they are resolved from
//! - Theme descriptors and process-wide user preferences
//! - Settings schema declarations
//!
//! Nothing here performs I/O; persistence and execution live in
//! `plughost-core`.

mod ids;
mod options;
mod package;
mod preferences;
mod schema;
mod status;
mod theme;

pub use ids::PluginId;
pub use options::{ExecutionMode, PluginOptions};
pub use package::{HOST_SECTION, HostSection, PackageDescriptor};
pub use preferences::{ThemeSelections, UserPreferences};
pub use schema::{EnumPicker, SettingKind, SettingSchemaItem};
pub use status::LifecycleStatus;
pub use theme::{ThemeDescriptor, ThemeMode};

/// Reserved settings key that drives enable/disable of a plugin.
pub const DISABLED_KEY: &str = "disabled";

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid package descriptor: {0}")]
    InvalidDescriptor(String),
}
