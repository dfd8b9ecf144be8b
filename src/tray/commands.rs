use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};
use url::Url;

use crate::config::{ActionKind, ConfigStore, ItemAction};
use crate::platform::Services;

pub const SYSTEM_SETTINGS_APP: &str = "/System/Applications/System Settings.app";
pub const SETTINGS_URL_SCHEME: &str = "x-apple.systempreferences";

/// What the caller has to do after an action ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Followup {
    None,
    RefreshStatus,
    Reload,
    Quit,
}

type Handler = fn(&ActionDispatcher<'_>, &ItemAction) -> Result<Followup>;

/// Handler for each action tag. Separators are never dispatched.
fn handler(kind: ActionKind) -> Option<Handler> {
    let handler: Handler = match kind {
        ActionKind::OpenSettings => open_settings,
        ActionKind::OpenApp => open_app,
        ActionKind::OpenUrl => open_url,
        ActionKind::Shell => shell,
        ActionKind::AppleScript => apple_script,
        ActionKind::ClipboardCopy => clipboard_copy,
        ActionKind::ClipboardClear => clipboard_clear,
        ActionKind::ReloadConfig => reload_config,
        ActionKind::OpenConfig => open_config,
        ActionKind::RevealConfig => reveal_config,
        ActionKind::Relaunch => relaunch,
        ActionKind::Quit => quit,
        ActionKind::Separator => return None,
    };
    Some(handler)
}

pub struct ActionDispatcher<'a> {
    services: &'a Services,
    store: &'a ConfigStore,
}

impl<'a> ActionDispatcher<'a> {
    pub fn new(services: &'a Services, store: &'a ConfigStore) -> Self {
        Self { services, store }
    }

    /// Runs one action. Missing payload fields and collaborator failures are
    /// logged and turn the action into a no-op; this never fails.
    pub fn dispatch(&self, action: &ItemAction) -> Followup {
        let kind = action.kind();
        let Some(handler) = handler(kind) else {
            debug!(action = kind.as_str(), "not dispatchable");
            return Followup::None;
        };

        debug!(action = kind.as_str(), "dispatch");
        match handler(self, action) {
            Ok(followup) => followup,
            Err(err) => {
                warn!(action = kind.as_str(), "action failed: {err:#}");
                Followup::None
            }
        }
    }
}

/// A payload field that is present and non-empty.
fn required(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|s| !s.trim().is_empty())
}

fn skipped(kind: ActionKind, field: &str) -> Result<Followup> {
    debug!(action = kind.as_str(), field, "missing required field, skipping");
    Ok(Followup::None)
}

fn open_settings(d: &ActionDispatcher<'_>, action: &ItemAction) -> Result<Followup> {
    let ItemAction::OpenSettings { pane_id } = action else {
        return Ok(Followup::None);
    };

    if let Some(pane) = required(pane_id) {
        let opened = Url::parse(&format!("{SETTINGS_URL_SCHEME}:{pane}"))
            .context("pane url")
            .and_then(|url| d.services.launcher.open_url(&url));
        match opened {
            Ok(()) => return Ok(Followup::None),
            Err(err) => debug!(pane, "settings pane unavailable, opening app: {err:#}"),
        }
    }

    d.services
        .launcher
        .open_app(Path::new(SYSTEM_SETTINGS_APP))
        .context("open System Settings")?;
    Ok(Followup::None)
}

fn open_app(d: &ActionDispatcher<'_>, action: &ItemAction) -> Result<Followup> {
    let ItemAction::OpenApp { path } = action else {
        return Ok(Followup::None);
    };
    let Some(path) = required(path) else {
        return skipped(ActionKind::OpenApp, "path");
    };
    d.services
        .launcher
        .open_app(Path::new(path))
        .with_context(|| format!("open app {path}"))?;
    Ok(Followup::None)
}

fn open_url(d: &ActionDispatcher<'_>, action: &ItemAction) -> Result<Followup> {
    let ItemAction::OpenUrl { url } = action else {
        return Ok(Followup::None);
    };
    let Some(raw) = required(url) else {
        return skipped(ActionKind::OpenUrl, "url");
    };
    let Ok(url) = Url::parse(raw) else {
        debug!(url = raw, "not a valid URL, skipping");
        return Ok(Followup::None);
    };
    d.services
        .launcher
        .open_url(&url)
        .with_context(|| format!("open {url}"))?;
    Ok(Followup::None)
}

fn shell(d: &ActionDispatcher<'_>, action: &ItemAction) -> Result<Followup> {
    let ItemAction::Shell { command, arguments } = action else {
        return Ok(Followup::None);
    };
    let Some(command) = required(command) else {
        return skipped(ActionKind::Shell, "command");
    };
    let args = arguments.as_deref().unwrap_or_default();
    d.services
        .processes
        .spawn(command, args)
        .with_context(|| format!("run {command}"))?;
    Ok(Followup::None)
}

fn apple_script(d: &ActionDispatcher<'_>, action: &ItemAction) -> Result<Followup> {
    let ItemAction::AppleScript { script } = action else {
        return Ok(Followup::None);
    };
    let Some(script) = required(script) else {
        return skipped(ActionKind::AppleScript, "script");
    };
    d.services
        .processes
        .run_script(script)
        .context("run AppleScript")?;
    Ok(Followup::None)
}

fn clipboard_copy(d: &ActionDispatcher<'_>, action: &ItemAction) -> Result<Followup> {
    let ItemAction::ClipboardCopy { text } = action else {
        return Ok(Followup::None);
    };
    // Empty text is a valid thing to copy; only an absent field is skipped.
    let Some(text) = text.as_deref() else {
        return skipped(ActionKind::ClipboardCopy, "text");
    };
    d.services
        .clipboard
        .set(text)
        .context("set clipboard")?;
    Ok(Followup::RefreshStatus)
}

fn clipboard_clear(d: &ActionDispatcher<'_>, _action: &ItemAction) -> Result<Followup> {
    if let Err(err) = d.services.clipboard.clear() {
        warn!("clear clipboard: {err:#}");
    }
    Ok(Followup::RefreshStatus)
}

fn reload_config(_d: &ActionDispatcher<'_>, _action: &ItemAction) -> Result<Followup> {
    Ok(Followup::Reload)
}

fn open_config(d: &ActionDispatcher<'_>, _action: &ItemAction) -> Result<Followup> {
    let path = d.store.location();
    d.services
        .launcher
        .open_file(&path)
        .with_context(|| format!("open {}", path.display()))?;
    Ok(Followup::None)
}

fn reveal_config(d: &ActionDispatcher<'_>, _action: &ItemAction) -> Result<Followup> {
    let path = d.store.location();
    d.services
        .launcher
        .reveal_file(&path)
        .with_context(|| format!("reveal {}", path.display()))?;
    Ok(Followup::None)
}

fn relaunch(d: &ActionDispatcher<'_>, _action: &ItemAction) -> Result<Followup> {
    // The current instance goes away even if the new one failed to start.
    match d.services.lifecycle.relaunch() {
        Ok(()) => info!("relaunching"),
        Err(err) => warn!("relaunch: {err:#}"),
    }
    Ok(Followup::Quit)
}

fn quit(_d: &ActionDispatcher<'_>, _action: &ItemAction) -> Result<Followup> {
    Ok(Followup::Quit)
}
