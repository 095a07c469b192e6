//! Per-plugin lifecycle state machine.
//!
//! A [`PluginUnit`] takes one plugin from its raw package description to a
//! running, revocable sandbox and back:
//!
//! ```text
//! unloaded -> loading -> loaded | error
//! loaded   -> unloading -> unloaded
//! ```
//!
//! Every resource acquired while loading gets one entry on the unit's
//! [`DisposalStack`]; unloading runs the stack. Settings changes never call
//! back into the unit directly. They queue [`UnitCommand`]s that the unit
//! drains after each of its public operations, so a toggle of `disabled`
//! is always evaluated against a settled status.

mod entry;
mod handlers;
mod package;

pub use entry::{host_document, is_remote, is_script_entry, is_valid_entry, resolve_url};

use entry::document_name;

use crate::context::HostContext;
use crate::disposal::DisposalStack;
use crate::error::{PluginError, PluginResult};
use crate::events::{CoreEvent, UnitEvent};
use crate::hooks::HookCapability;
use crate::ready::ReadySignal;
use crate::sandbox::{OutboundMessage, SandboxChannel, SandboxSpec};
use plughost_settings::{DEV_ENTRY_KEY, Settings, SettingsStore};
use plughost_types::{
    LifecycleStatus, PackageDescriptor, PluginId, PluginOptions, ThemeDescriptor,
};
use serde_json::Value;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

/// Work queued by settings listeners for the owning unit.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum UnitCommand {
    Load,
    Unload,
    Persist(Settings),
    ForwardSettings(Settings),
}

/// Options for [`PluginUnit::load`].
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Re-read persisted settings into the existing store.
    pub reload: bool,
    /// Batch signal gating the `Ready` message.
    pub ready: Option<ReadySignal>,
    /// Identities already registered in the active batch.
    pub taken: HashSet<PluginId>,
}

struct UnitState {
    id: PluginId,
    options: PluginOptions,
    status: LifecycleStatus,
    load_error: Option<Arc<PluginError>>,
    descriptor: Option<PackageDescriptor>,
    package_themes: Vec<ThemeDescriptor>,
    managed: bool,
    settings_path: Option<PathBuf>,
    effective_entry: Option<String>,
    sandbox: Option<Arc<dyn SandboxChannel>>,
    sdk_version: Option<String>,
    theme_release_pushed: bool,
    styles: HashSet<String>,
    unkeyed_styles: u64,
    fragments: HashSet<String>,
    main_ui_visible: bool,
    draggable: bool,
    resizable: bool,
}

/// One plugin and everything it currently holds.
pub struct PluginUnit {
    ctx: Arc<HostContext>,
    origin: String,
    state: Mutex<UnitState>,
    settings: OnceLock<Arc<SettingsStore>>,
    disposals: DisposalStack,
    events: broadcast::Sender<UnitEvent>,
    commands: mpsc::UnboundedSender<UnitCommand>,
    inbox: Mutex<mpsc::UnboundedReceiver<UnitCommand>>,
    reloading: Arc<AtomicBool>,
}

impl PluginUnit {
    /// Creates an unloaded unit. The identity starts as the explicit key,
    /// or a freshly minted one, until the package is resolved.
    pub fn new(ctx: Arc<HostContext>, options: PluginOptions) -> Self {
        let id = options
            .key
            .as_deref()
            .filter(|k| !k.is_empty())
            .map(PluginId::new)
            .unwrap_or_else(PluginId::mint);
        let managed = ctx.config().is_managed(&options.local_root());
        let (commands, inbox) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(64);
        Self {
            origin: options.url.clone(),
            ctx,
            state: Mutex::new(UnitState {
                id,
                options,
                status: LifecycleStatus::Unloaded,
                load_error: None,
                descriptor: None,
                package_themes: Vec::new(),
                managed,
                settings_path: None,
                effective_entry: None,
                sandbox: None,
                sdk_version: None,
                theme_release_pushed: false,
                styles: HashSet::new(),
                unkeyed_styles: 0,
                fragments: HashSet::new(),
                main_ui_visible: false,
                draggable: false,
                resizable: false,
            }),
            settings: OnceLock::new(),
            disposals: DisposalStack::new(),
            events,
            commands,
            inbox: Mutex::new(inbox),
            reloading: Arc::new(AtomicBool::new(false)),
        }
    }

    // ================================================================
    // Accessors
    // ================================================================

    pub fn id(&self) -> PluginId {
        self.state().id.clone()
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn options(&self) -> PluginOptions {
        self.state().options.clone()
    }

    pub fn descriptor(&self) -> Option<PackageDescriptor> {
        self.state().descriptor.clone()
    }

    pub fn status(&self) -> LifecycleStatus {
        self.state().status
    }

    pub fn is_pending(&self) -> bool {
        self.status().is_pending()
    }

    /// Failure recorded by the most recent load, if any.
    pub fn load_error(&self) -> Option<Arc<PluginError>> {
        self.state().load_error.clone()
    }

    pub fn settings(&self) -> Option<Arc<SettingsStore>> {
        self.settings.get().cloned()
    }

    pub fn settings_path(&self) -> Option<PathBuf> {
        self.state().settings_path.clone()
    }

    /// A unit without settings yet counts as enabled.
    pub fn is_enabled(&self) -> bool {
        self.settings.get().is_none_or(|s| !s.disabled())
    }

    pub fn has_entry(&self) -> bool {
        self.state().options.has_entry()
    }

    /// Installed under the host's managed root.
    pub fn is_managed(&self) -> bool {
        self.state().managed
    }

    /// Entry the sandbox was opened with.
    pub fn effective_entry(&self) -> Option<String> {
        self.state().effective_entry.clone()
    }

    pub fn has_sandbox(&self) -> bool {
        self.state().sandbox.is_some()
    }

    pub fn sdk_version(&self) -> Option<String> {
        self.state().sdk_version.clone()
    }

    pub fn hook_capability(&self) -> HookCapability {
        if self.state().sdk_version.is_some() {
            HookCapability::VersionAware
        } else {
            HookCapability::Legacy
        }
    }

    pub fn is_main_ui_visible(&self) -> bool {
        self.state().main_ui_visible
    }

    /// Labels of the pending release actions, in run order.
    pub fn disposal_labels(&self) -> Vec<String> {
        self.disposals.labels()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<UnitEvent> {
        self.events.subscribe()
    }

    pub(crate) fn command_sender(&self) -> mpsc::UnboundedSender<UnitCommand> {
        self.commands.clone()
    }

    // ================================================================
    // Lifecycle
    // ================================================================

    /// Loads the unit. Ignored while a transition is in progress; failures
    /// are recorded in [`PluginUnit::load_error`] and never propagate.
    pub async fn load(&self, options: LoadOptions) {
        self.load_once(options).await;
        self.drain_commands().await;
    }

    /// Unloads the unit. With `unregister`, managed installs are also
    /// announced for unlinking.
    pub async fn unload(&self, unregister: bool) {
        self.unload_once(unregister).await;
        self.drain_commands().await;
    }

    /// Unload followed by a fresh load that re-reads persisted settings.
    pub async fn reload(&self) {
        if self.is_pending() {
            debug!(plugin_id = %self.id(), "reload ignored while pending");
            return;
        }
        self.reloading.store(true, Ordering::SeqCst);
        self.unload_once(false).await;
        self.reloading.store(false, Ordering::SeqCst);
        self.load_once(LoadOptions {
            reload: true,
            ..Default::default()
        })
        .await;
        self.drain_commands().await;
    }

    /// Deep-merges `partial` into the settings. Returns true on change.
    pub async fn update_settings(&self, partial: Settings) -> bool {
        let changed = self.settings().is_some_and(|s| s.merge(partial));
        self.drain_commands().await;
        changed
    }

    /// Sets one settings key. Returns true on change.
    pub async fn set_setting(&self, key: &str, value: Value) -> bool {
        let changed = self.settings().is_some_and(|s| s.set(key, value));
        self.drain_commands().await;
        changed
    }

    /// Sends a message into the sandbox.
    pub async fn call_user_model(&self, message: OutboundMessage) -> PluginResult<()> {
        let (id, sandbox) = {
            let state = self.state();
            (state.id.clone(), state.sandbox.clone())
        };
        let Some(sandbox) = sandbox else {
            return Err(PluginError::sandbox(&id, "sandbox not connected"));
        };
        sandbox
            .call_user_model(message)
            .await
            .map_err(|e| PluginError::sandbox(&id, format!("{e:#}")))
    }

    /// Processes queued settings-driven work until the queue is empty.
    pub async fn drain_commands(&self) {
        loop {
            let next = self.inbox().try_recv().ok();
            let Some(command) = next else {
                break;
            };
            match command {
                UnitCommand::Load => self.load_once(LoadOptions::default()).await,
                UnitCommand::Unload => self.unload_once(false).await,
                UnitCommand::Persist(values) => self.persist_settings(&values).await,
                UnitCommand::ForwardSettings(values) => self.forward_settings(values).await,
            }
        }
    }

    async fn load_once(&self, options: LoadOptions) {
        let id = {
            let mut state = self.state();
            if state.status.is_pending() {
                debug!(plugin_id = %state.id, status = %state.status, "load ignored while pending");
                return;
            }
            state.status = LifecycleStatus::Loading;
            state.load_error = None;
            state.id.clone()
        };
        debug!(plugin_id = %id, origin = %self.origin, reload = options.reload, "loading plugin");

        match self.try_load(&options).await {
            Ok(()) => {
                let enabled = self.is_enabled();
                let id = {
                    let mut state = self.state();
                    state.status = if enabled {
                        LifecycleStatus::Loaded
                    } else {
                        LifecycleStatus::Unloaded
                    };
                    state.id.clone()
                };
                if enabled {
                    info!(plugin_id = %id, "Plugin loaded");
                    self.emit(UnitEvent::Loaded);
                } else {
                    info!(plugin_id = %id, "Plugin is disabled, not started");
                }
            }
            Err(err) => {
                let id = self.id();
                error!(plugin_id = %id, origin = %self.origin, "Plugin load failed: {err}");
                let message = err.to_string();
                {
                    let mut state = self.state();
                    state.load_error = Some(Arc::new(err));
                    state.status = LifecycleStatus::Error;
                }
                self.disposals.run(&id).await;
                self.reset_loaded_resources();
                self.emit(UnitEvent::Error(message));
            }
        }
    }

    async fn try_load(&self, options: &LoadOptions) -> PluginResult<()> {
        self.prepare_package(&options.taken).await?;
        self.setup_settings(options.reload).await?;

        let enabled = self.is_enabled();
        if enabled {
            self.apply_package_effects();
        }
        if !enabled || !self.has_entry() {
            return Ok(());
        }

        let entry = self.normalize_entry().await?;
        self.open_sandbox(entry, options.ready.clone()).await
    }

    async fn prepare_package(&self, taken: &HashSet<PluginId>) -> PluginResult<()> {
        let origin = self.origin.clone();
        let text = self
            .ctx
            .host()
            .load_plugin_config(&origin)
            .await
            .map_err(|e| PluginError::package(&origin, format!("{e:#}")))?
            .ok_or_else(|| PluginError::package(&origin, "package descriptor not found"))?;
        let mut descriptor = PackageDescriptor::parse(&text)
            .map_err(|e| PluginError::package(&origin, e.to_string()))?;

        let (current, managed, current_id) = {
            let state = self.state();
            (state.options.clone(), state.managed, state.id.clone())
        };
        let root = current.local_root();
        let resolved = package::resolve_options(&current, &descriptor, &root, managed);

        let id = if managed {
            root.file_name()
                .map(|name| PluginId::new(name.to_string_lossy()))
                .ok_or_else(|| PluginError::package(&origin, "managed package root has no name"))?
        } else if let Some(declared) = descriptor.declared_id() {
            PluginId::new(declared)
        } else {
            descriptor.set_declared_id(current_id.as_str());
            if let Err(e) = self
                .ctx
                .host()
                .save_plugin_config(&origin, descriptor.raw())
                .await
            {
                warn!(plugin_id = %current_id, "Failed to save plugin id: {e:#}");
            }
            current_id
        };

        if taken.contains(&id) {
            return Err(PluginError::DuplicateIdentity(id));
        }

        let mut state = self.state();
        state.id = id;
        state.options = resolved.options;
        state.package_themes = resolved.themes;
        state.descriptor = Some(descriptor);
        Ok(())
    }

    async fn setup_settings(&self, reload: bool) -> PluginResult<()> {
        let id = self.id();
        if let Some(store) = self.settings.get() {
            if reload {
                let (_, values) = self
                    .ctx
                    .host()
                    .load_plugin_user_settings(&id)
                    .await
                    .map_err(|e| PluginError::host_call("load_plugin_user_settings", e))?;
                store.restore(values);
            }
            return Ok(());
        }

        let (path, values) = self
            .ctx
            .host()
            .load_plugin_user_settings(&id)
            .await
            .map_err(|e| PluginError::host_call("load_plugin_user_settings", e))?;
        let store = Arc::new(SettingsStore::new(values));

        let schema = self.state().options.settings_schema.clone();
        if let Some(schema) = schema {
            if let Err(e) = store.set_schema(schema, true) {
                warn!(plugin_id = %id, "Declared settings schema rejected: {e}");
            }
        }

        let commands = self.commands.clone();
        store.subscribe(move |event| {
            let _ = commands.send(UnitCommand::Persist(event.new_settings().clone()));
            match event.disabled_transition() {
                Some(true) => {
                    let _ = commands.send(UnitCommand::Unload);
                }
                Some(false) => {
                    let _ = commands.send(UnitCommand::Load);
                }
                None => {}
            }
        });

        self.state().settings_path = Some(path);
        let _ = self.settings.set(store);
        Ok(())
    }

    fn apply_package_effects(&self) {
        let (id, themes) = {
            let state = self.state();
            (state.id.clone(), state.package_themes.clone())
        };
        if themes.is_empty() {
            return;
        }
        for theme in themes {
            self.ctx.register_theme(&id, theme);
        }
        self.push_theme_release(&id);
    }

    /// One theme deregistration per loaded unit, however many themes it
    /// contributes.
    pub(crate) fn push_theme_release(&self, id: &PluginId) {
        {
            let mut state = self.state();
            if state.theme_release_pushed {
                return;
            }
            state.theme_release_pushed = true;
        }
        let ctx = Arc::clone(&self.ctx);
        let id = id.clone();
        let reloading = Arc::clone(&self.reloading);
        self.disposals.push("themes", move || async move {
            // A reload keeps the user's theme selection.
            let effect = !reloading.load(Ordering::SeqCst);
            ctx.unregister_theme(&id, effect).await;
            Ok(())
        });
    }

    async fn normalize_entry(&self) -> PluginResult<String> {
        let (id, options, managed) = {
            let state = self.state();
            (state.id.clone(), state.options.clone(), state.managed)
        };
        let root = options.local_root();
        let dev_entry = options
            .dev_entry
            .clone()
            .or_else(|| {
                self.settings
                    .get()
                    .and_then(|s| s.get(DEV_ENTRY_KEY))
                    .and_then(|v| v.as_str().map(str::to_string))
            })
            .filter(|e| !e.is_empty());

        let entry = match dev_entry {
            Some(dev) => resolve_url(&root, &dev),
            None => options
                .entry
                .clone()
                .ok_or_else(|| PluginError::package(&self.origin, "package has no entry"))?,
        };

        if !is_script_entry(&entry) {
            self.state().effective_entry = Some(entry.clone());
            return Ok(entry);
        }

        let config = self.ctx.config();
        let document = host_document(options.display_name(), &config.runtime_script, &entry);
        let name = document_name(&id);
        let path = if managed {
            self.ctx
                .host()
                .write_dotdir_file(&name, &document, Some(&config.plugins_subdir))
                .await
                .map_err(|e| PluginError::host_call("write_dotdir_file", e))?
        } else {
            self.ctx
                .host()
                .write_user_tmp_file(&name, &document)
                .await
                .map_err(|e| PluginError::host_call("write_user_tmp_file", e))?
        };
        let effective = format!("file://{}", path.display());
        debug!(plugin_id = %id, entry = %effective, "synthesized host document");
        self.state().effective_entry = Some(effective.clone());
        Ok(effective)
    }

    async fn open_sandbox(&self, entry: String, ready: Option<ReadySignal>) -> PluginResult<()> {
        let (id, options) = {
            let state = self.state();
            (state.id.clone(), state.options.clone())
        };
        let spec = SandboxSpec {
            plugin_id: id.clone(),
            entry,
            mode: options.mode,
            package_root: options.local_root(),
        };
        let channel = self
            .ctx
            .sandboxes()
            .open(&spec)
            .await
            .map_err(|e| PluginError::sandbox(&id, format!("{e:#}")))?;

        self.state().sandbox = Some(Arc::clone(&channel));
        let destroy = Arc::clone(&channel);
        self.disposals
            .push("sandbox", move || async move { destroy.destroy().await });

        channel
            .connect()
            .await
            .map_err(|e| PluginError::sandbox(&id, format!("{e:#}")))?;

        let message = OutboundMessage::Ready { pid: id.clone() };
        match ready {
            Some(signal) if !signal.is_resolved() => {
                tokio::spawn(async move {
                    signal.wait().await;
                    if let Err(e) = channel.call_user_model(message).await {
                        warn!(plugin_id = %id, "Failed to signal ready: {e:#}");
                    }
                });
            }
            _ => channel
                .call_user_model(message)
                .await
                .map_err(|e| PluginError::sandbox(&id, format!("{e:#}")))?,
        }
        debug!(plugin_id = %spec.plugin_id, mode = ?spec.mode, "sandbox connected");
        Ok(())
    }

    async fn unload_once(&self, unregister: bool) {
        let (id, was_loaded, sandbox) = {
            let mut state = self.state();
            if state.status.is_pending() {
                debug!(plugin_id = %state.id, status = %state.status, "unload ignored while pending");
                return;
            }
            let was_loaded = state.status == LifecycleStatus::Loaded;
            state.status = LifecycleStatus::Unloading;
            (state.id.clone(), was_loaded, state.sandbox.clone())
        };
        debug!(plugin_id = %id, unregister, "unloading plugin");

        if was_loaded {
            if let Some(sandbox) = sandbox {
                if let Err(e) = sandbox
                    .call_user_model(OutboundMessage::BeforeUnload { unregister })
                    .await
                {
                    warn!(plugin_id = %id, "Failed to notify before unload: {e:#}");
                }
            }
            self.emit(UnitEvent::BeforeUnload { unregister });
            let failures = self.disposals.run(&id).await;
            if failures > 0 {
                warn!(plugin_id = %id, failures, "Unload finished with release failures");
            }
        }

        self.reset_loaded_resources();
        self.state().status = LifecycleStatus::Unloaded;
        self.emit(UnitEvent::Unloaded { unregister });
        info!(plugin_id = %id, "Plugin unloaded");

        if unregister && self.is_managed() {
            self.ctx.emit(CoreEvent::UnlinkPlugin(id));
        }
    }

    async fn persist_settings(&self, values: &Settings) {
        let id = self.id();
        if let Err(e) = self
            .ctx
            .host()
            .save_plugin_user_settings(&id, values)
            .await
        {
            warn!(plugin_id = %id, "Failed to save plugin settings: {e:#}");
        }
    }

    async fn forward_settings(&self, values: Settings) {
        let connected = self.has_sandbox();
        if !connected {
            return;
        }
        if let Err(e) = self
            .call_user_model(OutboundMessage::Settings { payload: values })
            .await
        {
            warn!(plugin_id = %self.id(), "Failed to forward settings: {e}");
        }
    }

    fn reset_loaded_resources(&self) {
        let mut state = self.state();
        state.sandbox = None;
        state.effective_entry = None;
        state.theme_release_pushed = false;
        state.styles.clear();
        state.fragments.clear();
        state.main_ui_visible = false;
        state.draggable = false;
        state.resizable = false;
    }

    fn emit(&self, event: UnitEvent) {
        let _ = self.events.send(event);
    }

    fn state(&self) -> MutexGuard<'_, UnitState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn inbox(&self) -> MutexGuard<'_, mpsc::UnboundedReceiver<UnitCommand>> {
        self.inbox.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for PluginUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state();
        f.debug_struct("PluginUnit")
            .field("id", &state.id)
            .field("origin", &self.origin)
            .field("status", &state.status)
            .finish_non_exhaustive()
    }
}
