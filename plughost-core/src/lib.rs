//! Plugin lifecycle and orchestration engine for plughost.
//!
//! The engine loads plugin packages, keeps one [`PluginUnit`] per plugin and
//! coordinates the whole population through the [`Orchestrator`].
//!
//! # Architecture
//!
//! Plugin code never runs inside this crate. Everything with an outside
//! effect goes through three collaborator traits held by the shared
//! [`HostContext`]:
//!
//! - **HostApi**: persistence, package descriptors, exported host calls
//! - **SandboxFactory**: opens the isolated channel a plugin runs behind
//! - **Presentation**: themes, styles, UI fragments and main-surface chrome
//!
//! ## Load sequence
//!
//! 1. Read and parse the package descriptor, fix the plugin identity
//! 2. Open the per-plugin [`plughost_settings::SettingsStore`]
//! 3. Register contributed themes when enabled
//! 4. Normalize the entry (synthesizing a host document for scripts)
//! 5. Open and connect the sandbox, then send `ready` once the batch is done
//!
//! Every step that acquires a resource pushes a release action onto the
//! unit's [`DisposalStack`]; unloading runs that stack.
//!
//! # Example
//!
//! ```
//! use plughost_core::mock::{MockHost, MockPresentation, MockSandboxFactory};
//! use plughost_core::{CoreConfig, HostContext, Orchestrator};
//! use std::sync::Arc;
//!
//! let ctx = HostContext::new(
//!     CoreConfig::with_dot_root("/tmp/plughost"),
//!     Arc::new(MockHost::new()),
//!     Arc::new(MockSandboxFactory::new()),
//!     Arc::new(MockPresentation::new()),
//! );
//! let orchestrator = Orchestrator::new(ctx);
//! assert_eq!(orchestrator.plugin_count(), 0);
//! ```

mod config;
mod context;
mod disposal;
mod error;
mod events;
mod fs_host;
pub mod hooks;
mod host;
pub mod mock;
mod orchestrator;
mod presentation;
mod ready;
pub mod requests;
pub mod sandbox;
mod themes;
pub mod unit;

pub use config::CoreConfig;
pub use context::HostContext;
pub use disposal::{DisposalStack, Release, release};
pub use error::{PluginError, PluginErrorKind, PluginResult};
pub use events::{CoreEvent, LoadFailure, LoadTiming, UnitEvent};
pub use fs_host::FsHost;
pub use hooks::{HOOK_APP, HOOK_DB, HOOK_EDITOR, HookCapability};
pub use host::HostApi;
pub use orchestrator::Orchestrator;
pub use presentation::{Presentation, StyleHandle};
pub use ready::ReadySignal;
pub use requests::{ApiCall, MainUiRequest, ProviderRequest, SandboxRequest, SettingsRequest, UiFragment};
pub use sandbox::{OutboundMessage, SandboxChannel, SandboxFactory, SandboxSpec};
pub use themes::SelectThemeOptions;
pub use unit::{LoadOptions, PluginUnit};

pub use plughost_settings::Settings;
