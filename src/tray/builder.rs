//! Turns a config snapshot into the ordered render model.

use std::path::Path;

use crate::config::{ActionKind, Config, ItemAction, MenuItem as ItemConfig, MenuSection, FALLBACK_SYMBOL};
use crate::status::StatusSlot;
use crate::tray::menu::{IconImage, IconSpec, MenuItem, MenuSpec};

pub const CMD_BASE_ITEM: u16 = 1000;

pub fn default_title(kind: ActionKind) -> &'static str {
    match kind {
        ActionKind::OpenSettings => "Open Settings",
        ActionKind::OpenApp => "Open App",
        ActionKind::OpenUrl => "Open URL",
        ActionKind::Shell => "Run Command",
        ActionKind::AppleScript => "Run AppleScript",
        ActionKind::ClipboardCopy => "Copy to Clipboard",
        ActionKind::ClipboardClear => "Clear Clipboard",
        ActionKind::ReloadConfig => "Reload Config",
        ActionKind::OpenConfig => "Open Config",
        ActionKind::RevealConfig => "Reveal Config in Finder",
        ActionKind::Relaunch => "Relaunch MacTools",
        ActionKind::Quit => "Quit",
        ActionKind::Separator => "",
    }
}

/// Configured title if non-empty, otherwise the tag's default.
pub fn display_title(item: &ItemConfig) -> String {
    match item.title.as_deref() {
        Some(t) if !t.is_empty() => t.to_string(),
        _ => default_title(item.action.kind()).to_string(),
    }
}

pub fn build(config: &Config) -> MenuSpec {
    let mut builder = Builder {
        items: Vec::new(),
        next_id: CMD_BASE_ITEM,
    };

    builder.items.push(MenuItem::Header(config.display_title().to_string()));
    builder.items.push(MenuItem::Separator);

    builder.add_status_section(config);
    for section in &config.sections {
        builder.add_section(section);
    }
    builder.add_footer(config);

    MenuSpec::new(builder.items)
}

struct Builder {
    items: Vec<MenuItem>,
    next_id: u16,
}

impl Builder {
    fn add_status_section(&mut self, config: &Config) {
        let status = &config.status_section;
        if !status.has_any() {
            return;
        }

        if !status.title.is_empty() {
            self.items.push(MenuItem::Header(status.title.clone()));
        }

        let enabled = [
            status.show_time,
            status.show_battery,
            status.show_wifi,
            status.show_clipboard,
        ];
        for (slot, on) in StatusSlot::ALL.into_iter().zip(enabled) {
            if on {
                self.items.push(MenuItem::Status {
                    slot,
                    text: slot.placeholder(),
                });
            }
        }

        self.items.push(MenuItem::Separator);
    }

    fn add_section(&mut self, section: &MenuSection) {
        if section.items.is_empty() {
            return;
        }

        if let Some(title) = section.title.as_deref().filter(|t| !t.is_empty()) {
            self.items.push(MenuItem::Header(title.to_string()));
        }

        for item in &section.items {
            self.add_item(item);
        }

        self.items.push(MenuItem::Separator);
    }

    fn add_footer(&mut self, config: &Config) {
        let footer = &config.footer;
        let entries = [
            (footer.show_reload_config, ItemAction::ReloadConfig),
            (footer.show_open_config, ItemAction::OpenConfig),
            (footer.show_reveal_config, ItemAction::RevealConfig),
            (footer.show_relaunch, ItemAction::Relaunch),
            (footer.show_quit, ItemAction::Quit),
        ];
        for (on, action) in entries {
            if on {
                self.add_item(&ItemConfig::new(action));
            }
        }
    }

    fn add_item(&mut self, item: &ItemConfig) {
        if item.action.kind() == ActionKind::Separator {
            self.items.push(MenuItem::Separator);
            return;
        }

        let id = self.next_id;
        self.next_id = self.next_id.saturating_add(1);
        self.items.push(MenuItem::Action {
            id,
            title: display_title(item),
            enabled: item.enabled.unwrap_or(true),
            key_equivalent: item.key_equivalent.clone().unwrap_or_default(),
            action: item.action.clone(),
        });
    }
}

/// Menu bar icon: custom image file, then symbol name, then the built-in symbol.
pub fn resolve_icon(config: &Config, config_dir: &Path) -> IconSpec {
    let icon = &config.menu_bar_icon;
    let title = config.display_title().to_string();
    let tooltip = icon
        .accessibility_label
        .clone()
        .unwrap_or_else(|| title.clone());

    let from_file = icon
        .icon_path
        .as_deref()
        .filter(|p| !p.is_empty())
        .map(|p| config_dir.join(p))
        .filter(|p| p.is_file());

    let image = match (from_file, icon.symbol_name.as_deref()) {
        (Some(path), _) => IconImage::File(path),
        (None, Some(symbol)) if !symbol.is_empty() => IconImage::Symbol(symbol.to_string()),
        _ => IconImage::Symbol(FALLBACK_SYMBOL.to_string()),
    };

    IconSpec {
        image,
        tooltip,
        title,
    }
}
