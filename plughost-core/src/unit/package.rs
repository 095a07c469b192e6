//! Completes plugin options from a parsed package descriptor.

use super::entry::{is_valid_entry, resolve_url};
use plughost_types::{ExecutionMode, PackageDescriptor, PluginOptions, ThemeDescriptor};
use std::path::Path;

pub(crate) struct ResolvedPackage {
    pub options: PluginOptions,
    /// Declared theme contributions with locations resolved.
    pub themes: Vec<ThemeDescriptor>,
}

/// Copies the whitelisted descriptor fields onto a copy of `current`.
/// Development entries are only honoured outside the managed root.
pub(crate) fn resolve_options(
    current: &PluginOptions,
    descriptor: &PackageDescriptor,
    root: &Path,
    managed: bool,
) -> ResolvedPackage {
    let mut options = current.clone();
    let section = descriptor.section();

    options.name = descriptor.text("name").or(options.name);
    options.version = descriptor.text("version").or(options.version);
    options.description = descriptor.text("description").or(options.description);
    options.author = descriptor.text("author").or(options.author);
    options.repository = descriptor.text("repository").or(options.repository);
    options.title = descriptor.title().or(options.title);
    options.effect = descriptor.effect();
    options.theme = descriptor.declares_theme();

    let sponsors = descriptor.sponsors();
    if !sponsors.is_empty() {
        options.sponsors = sponsors;
    }
    if let Some(mode) = section.mode.as_deref() {
        options.mode = ExecutionMode::from_name(mode);
    }
    if let Some(icon) = section.icon.as_deref().filter(|i| !i.is_empty()) {
        options.icon = Some(resolve_url(root, icon));
    }
    if let Some(schema) = &section.settings {
        options.settings_schema = Some(schema.clone());
    }
    options.dev_entry = if managed {
        None
    } else {
        section.dev_entry.clone().or(options.dev_entry)
    };

    options.entry = descriptor
        .main()
        .filter(|main| is_valid_entry(main))
        .map(|main| resolve_url(root, &main))
        .or_else(|| current.entry.clone().filter(|e| is_valid_entry(e)));

    for (key, value) in &section.extra {
        options.extra.insert(key.clone(), value.clone());
    }

    let themes = section
        .themes
        .iter()
        .map(|theme| {
            let mut theme = theme.clone();
            theme.url = theme.location().map(|url| resolve_url(root, url));
            theme
        })
        .collect();

    ResolvedPackage { options, themes }
}
