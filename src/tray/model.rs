use std::env;

use tracing::{debug, info};

use crate::config::{Config, ConfigStore};
use crate::platform::Services;
use crate::status::{self, StatusSlot};
use crate::tray::builder;
use crate::tray::commands::{ActionDispatcher, Followup};
use crate::tray::menu::{IconSpec, MenuItem, MenuSpec};

pub const DEBUG_ENV: &str = "MACTOOLS_DEBUG";
pub const DEBUG_ALERT_ENV: &str = "MACTOOLS_DEBUG_ALERT";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Reloading,
}

/// Environment overrides, read once per reload.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DebugSwitches {
    pub window: bool,
    pub alert: bool,
}

impl DebugSwitches {
    pub fn from_env() -> Self {
        Self {
            window: env_flag(DEBUG_ENV),
            alert: env_flag(DEBUG_ALERT_ENV),
        }
    }
}

fn env_flag(name: &str) -> bool {
    env::var(name).is_ok_and(|v| v == "1")
}

/// Whether the diagnostic surface should be visible.
pub fn debug_enabled(switches: DebugSwitches, debug_build: bool, config: &Config) -> bool {
    switches.window || debug_build || config.debug.show_window
}

/// The debug predicate as it stands before the first reload. Reads the file
/// strictly and leaves it alone; an unreadable config counts as the fallback.
pub fn startup_debug(store: &ConfigStore, switches: DebugSwitches, debug_build: bool) -> bool {
    let config = store.try_load().unwrap_or_else(|_| Config::fallback());
    debug_enabled(switches, debug_build, &config)
}

/// Owns the current config snapshot and the menu built from it.
pub struct TrayModel {
    store: ConfigStore,
    services: Services,
    config: Config,
    menu: MenuSpec,
    icon: IconSpec,
    phase: Phase,
    switches: fn() -> DebugSwitches,
    debug_build: bool,
    show_debug: bool,
    debug_alert: bool,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ModelUpdate {
    pub refresh_menu: bool,
    pub refresh_icon: bool,
    /// Placeholders whose text changed in place.
    pub refreshed_status: Vec<StatusSlot>,
    pub show_debug: Option<bool>,
    pub quit: bool,
}

impl TrayModel {
    /// Loads the config and builds the first menu.
    pub fn new(store: ConfigStore, services: Services) -> Self {
        let config = Config::fallback();
        let icon = builder::resolve_icon(&config, store.directory());
        let mut model = Self {
            store,
            services,
            menu: builder::build(&config),
            icon,
            config,
            phase: Phase::Idle,
            switches: DebugSwitches::from_env,
            debug_build: cfg!(debug_assertions),
            show_debug: false,
            debug_alert: false,
        };
        model.reload();
        model
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn menu(&self) -> &MenuSpec {
        &self.menu
    }

    pub fn icon(&self) -> &IconSpec {
        &self.icon
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn show_debug(&self) -> bool {
        self.show_debug
    }

    pub fn debug_alert(&self) -> bool {
        self.debug_alert
    }

    /// Replaces the config snapshot, icon and menu, then refreshes status.
    pub fn reload(&mut self) -> ModelUpdate {
        if self.phase == Phase::Reloading {
            debug!("reload already in progress");
            return ModelUpdate::default();
        }
        self.phase = Phase::Reloading;

        self.config = self.store.load();
        self.icon = builder::resolve_icon(&self.config, self.store.directory());
        self.menu = builder::build(&self.config);
        let refreshed_status = self.refresh_status();

        let switches = (self.switches)();
        self.show_debug = debug_enabled(switches, self.debug_build, &self.config);
        self.debug_alert = switches.alert;

        info!(
            path = %self.store.path().display(),
            sections = self.config.sections.len(),
            nodes = self.menu.items.len(),
            "config loaded"
        );
        self.phase = Phase::Idle;

        ModelUpdate {
            refresh_menu: true,
            refresh_icon: true,
            refreshed_status,
            show_debug: Some(self.show_debug),
            quit: false,
        }
    }

    /// Rewrites the text of every placeholder in the current menu from a fresh
    /// snapshot. Nothing is rebuilt; menus without placeholders skip the query.
    pub fn refresh_status(&mut self) -> Vec<StatusSlot> {
        let slots: Vec<StatusSlot> = self.menu.status_slots().collect();
        if slots.is_empty() {
            return slots;
        }

        let snapshot = self.services.status.now();
        let time_format = self.config.status_section.time_format();
        for slot in &slots {
            let text = status::status_text(*slot, &snapshot, time_format);
            self.menu.set_status_text(*slot, text);
        }
        slots
    }

    /// Invoked by the render surface for the action node with `id`.
    pub fn invoke(&mut self, id: u16) -> ModelUpdate {
        let node = self
            .menu
            .items
            .iter()
            .find(|item| matches!(item, MenuItem::Action { id: node, .. } if *node == id));
        let action = match node {
            Some(MenuItem::Action { enabled: false, .. }) => {
                debug!(id, "ignoring disabled menu item");
                return ModelUpdate::default();
            }
            Some(MenuItem::Action { action, .. }) => action.clone(),
            _ => {
                debug!(id, "no menu item with this id");
                return ModelUpdate::default();
            }
        };

        let followup = ActionDispatcher::new(&self.services, &self.store).dispatch(&action);
        match followup {
            Followup::None => ModelUpdate::default(),
            Followup::RefreshStatus => ModelUpdate {
                refreshed_status: self.refresh_status(),
                ..Default::default()
            },
            Followup::Reload => self.reload(),
            Followup::Quit => ModelUpdate {
                quit: true,
                ..Default::default()
            },
        }
    }
}
