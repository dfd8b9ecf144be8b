use std::{
    env, fs,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

pub const APP_NAME: &str = "MacTools";
pub const CONFIG_ENV: &str = "MACTOOLS_CONFIG";
pub const CONFIG_FILE_NAME: &str = "config.json";
pub const BUNDLED_DEFAULT_NAME: &str = "DefaultConfig.json";
pub const FALLBACK_SYMBOL: &str = "hammer.circle.fill";
pub const DEFAULT_TIME_FORMAT: &str = "EEE, MMM d h:mm a";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub version: i64,

    /// Title shown in the menu header and used when no icon can be drawn.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_title: Option<String>,

    pub menu_bar_icon: MenuBarIcon,
    pub status_section: StatusSection,
    pub sections: Vec<MenuSection>,
    pub footer: Footer,

    #[serde(default, skip_serializing_if = "DebugConfig::is_default")]
    pub debug: DebugConfig,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuBarIcon {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol_name: Option<String>,

    /// Image file, relative paths resolve against the config directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accessibility_label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSection {
    pub title: String,
    pub show_time: bool,
    pub show_battery: bool,
    #[serde(rename = "showWiFi")]
    pub show_wifi: bool,
    pub show_clipboard: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_format: Option<String>,
}

impl StatusSection {
    pub fn has_any(&self) -> bool {
        self.show_time || self.show_battery || self.show_wifi || self.show_clipboard
    }

    pub fn time_format(&self) -> &str {
        match self.time_format.as_deref() {
            Some(f) if !f.trim().is_empty() => f,
            _ => DEFAULT_TIME_FORMAT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub items: Vec<MenuItem>,
}

/// One configured entry. The `type` tag selects the action and its payload,
/// the remaining fields apply to every action-bound entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuItem {
    #[serde(flatten)]
    pub action: ItemAction,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_equivalent: Option<String>,
}

impl MenuItem {
    pub fn new(action: ItemAction) -> Self {
        Self {
            action,
            title: None,
            enabled: None,
            key_equivalent: None,
        }
    }

    pub fn titled(action: ItemAction, title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::new(action)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ItemAction {
    OpenSettings {
        #[serde(rename = "paneID", default, skip_serializing_if = "Option::is_none")]
        pane_id: Option<String>,
    },
    OpenApp {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<String>,
    },
    #[serde(rename = "openURL")]
    OpenUrl {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
    },
    Shell {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        command: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        arguments: Option<Vec<String>>,
    },
    AppleScript {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        script: Option<String>,
    },
    ClipboardCopy {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
    },
    ClipboardClear,
    ReloadConfig,
    OpenConfig,
    RevealConfig,
    Relaunch,
    Quit,
    Separator,
}

/// Payload-free discriminant of [`ItemAction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ActionKind {
    OpenSettings,
    OpenApp,
    OpenUrl,
    Shell,
    AppleScript,
    ClipboardCopy,
    ClipboardClear,
    ReloadConfig,
    OpenConfig,
    RevealConfig,
    Relaunch,
    Quit,
    Separator,
}

impl ActionKind {
    pub const ALL: [ActionKind; 13] = [
        ActionKind::OpenSettings,
        ActionKind::OpenApp,
        ActionKind::OpenUrl,
        ActionKind::Shell,
        ActionKind::AppleScript,
        ActionKind::ClipboardCopy,
        ActionKind::ClipboardClear,
        ActionKind::ReloadConfig,
        ActionKind::OpenConfig,
        ActionKind::RevealConfig,
        ActionKind::Relaunch,
        ActionKind::Quit,
        ActionKind::Separator,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::OpenSettings => "openSettings",
            ActionKind::OpenApp => "openApp",
            ActionKind::OpenUrl => "openURL",
            ActionKind::Shell => "shell",
            ActionKind::AppleScript => "appleScript",
            ActionKind::ClipboardCopy => "clipboardCopy",
            ActionKind::ClipboardClear => "clipboardClear",
            ActionKind::ReloadConfig => "reloadConfig",
            ActionKind::OpenConfig => "openConfig",
            ActionKind::RevealConfig => "revealConfig",
            ActionKind::Relaunch => "relaunch",
            ActionKind::Quit => "quit",
            ActionKind::Separator => "separator",
        }
    }
}

impl ItemAction {
    pub fn kind(&self) -> ActionKind {
        match self {
            ItemAction::OpenSettings { .. } => ActionKind::OpenSettings,
            ItemAction::OpenApp { .. } => ActionKind::OpenApp,
            ItemAction::OpenUrl { .. } => ActionKind::OpenUrl,
            ItemAction::Shell { .. } => ActionKind::Shell,
            ItemAction::AppleScript { .. } => ActionKind::AppleScript,
            ItemAction::ClipboardCopy { .. } => ActionKind::ClipboardCopy,
            ItemAction::ClipboardClear => ActionKind::ClipboardClear,
            ItemAction::ReloadConfig => ActionKind::ReloadConfig,
            ItemAction::OpenConfig => ActionKind::OpenConfig,
            ItemAction::RevealConfig => ActionKind::RevealConfig,
            ItemAction::Relaunch => ActionKind::Relaunch,
            ItemAction::Quit => ActionKind::Quit,
            ItemAction::Separator => ActionKind::Separator,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Footer {
    pub show_reload_config: bool,
    pub show_open_config: bool,
    pub show_reveal_config: bool,
    pub show_relaunch: bool,
    pub show_quit: bool,
}

impl Footer {
    pub fn all(enabled: bool) -> Self {
        Self {
            show_reload_config: enabled,
            show_open_config: enabled,
            show_reveal_config: enabled,
            show_relaunch: enabled,
            show_quit: enabled,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugConfig {
    #[serde(default)]
    pub show_window: bool,
}

impl DebugConfig {
    fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

impl Config {
    /// Minimal config used whenever no valid file is available.
    pub fn fallback() -> Self {
        Self {
            version: 1,
            app_title: None,
            menu_bar_icon: MenuBarIcon {
                symbol_name: Some(FALLBACK_SYMBOL.to_string()),
                icon_path: None,
                accessibility_label: Some(APP_NAME.to_string()),
            },
            status_section: StatusSection {
                title: "Status".to_string(),
                show_time: true,
                show_battery: true,
                show_wifi: true,
                show_clipboard: true,
                time_format: Some(DEFAULT_TIME_FORMAT.to_string()),
            },
            sections: Vec::new(),
            footer: Footer::all(true),
            debug: DebugConfig::default(),
        }
    }

    pub fn display_title(&self) -> &str {
        match self.app_title.as_deref().map(str::trim) {
            Some(t) if !t.is_empty() => t,
            _ => APP_NAME,
        }
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        let mut s = serde_json::to_string_pretty(self).context("serialize config")?;
        s.push('\n');
        Ok(s)
    }
}

/// Owns the on-disk config file and hands out fresh snapshots.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
    bundled_default: Option<PathBuf>,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            bundled_default: None,
        }
    }

    pub fn with_bundled_default(mut self, bundled_default: Option<PathBuf>) -> Self {
        self.bundled_default = bundled_default;
        self
    }

    /// Store at the per-user location, seeded from the app bundle when present.
    pub fn from_env() -> Result<Self> {
        let path = resolve_config_path().ok_or_else(|| {
            anyhow!("No config path available (set {CONFIG_ENV} or ensure HOME is present)")
        })?;
        Ok(Self::new(path).with_bundled_default(bundled_default_path()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Config file path, materializing the default first so callers can open it.
    pub fn location(&self) -> PathBuf {
        self.ensure_default();
        self.path.clone()
    }

    pub fn directory(&self) -> &Path {
        match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        }
    }

    /// Makes sure a config file exists. Never overwrites; failures are logged only.
    pub fn ensure_default(&self) {
        match self.try_ensure_default() {
            Ok(true) => info!(path = %self.path.display(), "wrote default config"),
            Ok(false) => {}
            Err(err) => warn!("ensure default config: {err:#}"),
        }
    }

    fn try_ensure_default(&self) -> Result<bool> {
        let dir = self.directory();
        if !dir.exists() {
            fs::create_dir_all(dir)
                .with_context(|| format!("create config dir {}", dir.display()))?;
        }

        if self.path.exists() {
            return Ok(false);
        }

        let bytes = match self.read_bundled_default() {
            Some(bytes) => bytes,
            None => Config::fallback().to_json_pretty()?.into_bytes(),
        };
        write_atomic(&self.path, &bytes)?;
        Ok(true)
    }

    fn read_bundled_default(&self) -> Option<Vec<u8>> {
        let path = self.bundled_default.as_deref()?;
        match fs::read(path) {
            Ok(bytes) => Some(bytes),
            Err(err) => {
                debug!(path = %path.display(), "bundled default unreadable: {err}");
                None
            }
        }
    }

    /// Loads the current config. A missing or broken file is replaced with the
    /// fallback config, which is then returned; this never fails.
    pub fn load(&self) -> Config {
        self.ensure_default();

        match self.try_load() {
            Ok(cfg) => cfg,
            Err(err) => {
                warn!("config unusable, restoring fallback: {err:#}");
                let fallback = Config::fallback();
                if let Err(err) = self.save(&fallback) {
                    warn!("write fallback config: {err:#}");
                }
                fallback
            }
        }
    }

    /// Strict parse of the file on disk, without any healing.
    pub fn try_load(&self) -> Result<Config> {
        let bytes = fs::read(&self.path)
            .with_context(|| format!("reading config {}", self.path.display()))?;
        let cfg: Config = serde_json::from_slice(&bytes)
            .with_context(|| format!("parsing {}", self.path.display()))?;
        Ok(cfg)
    }

    pub fn save(&self, config: &Config) -> Result<()> {
        let dir = self.directory();
        fs::create_dir_all(dir).with_context(|| format!("create config dir {}", dir.display()))?;
        write_atomic(&self.path, config.to_json_pretty()?.as_bytes())
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes).with_context(|| format!("write {}", tmp.display()))?;
    fs::rename(&tmp, path)
        .with_context(|| format!("rename {} -> {}", tmp.display(), path.display()))?;
    Ok(())
}

pub fn resolve_config_path() -> Option<PathBuf> {
    if let Ok(p) = env::var(CONFIG_ENV) {
        if !p.trim().is_empty() {
            return Some(PathBuf::from(p));
        }
    }

    if let Some(data) = dirs::data_dir() {
        return Some(data.join(APP_NAME).join(CONFIG_FILE_NAME));
    }

    env::var_os("HOME").map(|home| {
        PathBuf::from(home)
            .join("Library")
            .join("Application Support")
            .join(APP_NAME)
            .join(CONFIG_FILE_NAME)
    })
}

/// `DefaultConfig.json` shipped inside the app bundle (or next to the binary).
pub fn bundled_default_path() -> Option<PathBuf> {
    let exe = env::current_exe().ok()?;
    let dir = exe.parent()?;
    [
        dir.join("..").join("Resources").join(BUNDLED_DEFAULT_NAME),
        dir.join(BUNDLED_DEFAULT_NAME),
    ]
    .into_iter()
    .find(|p| p.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> ConfigStore {
        ConfigStore::new(dir.path().join(APP_NAME).join(CONFIG_FILE_NAME))
    }

    fn sample_config() -> Config {
        Config {
            sections: vec![MenuSection {
                title: Some("Quick".to_string()),
                items: vec![
                    MenuItem::titled(
                        ItemAction::OpenSettings {
                            pane_id: Some("com.apple.preference.network".to_string()),
                        },
                        "Network",
                    ),
                    MenuItem::new(ItemAction::Separator),
                    MenuItem {
                        action: ItemAction::Shell {
                            command: Some("/usr/bin/say".to_string()),
                            arguments: Some(vec!["hello".to_string()]),
                        },
                        title: None,
                        enabled: Some(false),
                        key_equivalent: Some("s".to_string()),
                    },
                ],
            }],
            ..Config::fallback()
        }
    }

    #[test]
    fn config_round_trips_through_json() {
        for cfg in [Config::fallback(), sample_config()] {
            let json = cfg.to_json_pretty().unwrap();
            let back: Config = serde_json::from_str(&json).unwrap();
            assert_eq!(back, cfg);
        }
    }

    #[test]
    fn parses_every_item_type() {
        let json = r#"{
            "version": 2,
            "menuBarIcon": {},
            "statusSection": {"title": "", "showTime": false, "showBattery": false, "showWiFi": true, "showClipboard": false},
            "sections": [{"items": [
                {"type": "openSettings", "paneID": "com.apple.preference.sound"},
                {"type": "openApp", "path": "/Applications/Safari.app"},
                {"type": "openURL", "url": "https://example.com"},
                {"type": "shell", "command": "/usr/bin/open", "arguments": ["-a", "Notes"]},
                {"type": "appleScript", "script": "beep"},
                {"type": "clipboardCopy", "text": "hi"},
                {"type": "clipboardClear"},
                {"type": "reloadConfig"},
                {"type": "openConfig"},
                {"type": "revealConfig"},
                {"type": "relaunch"},
                {"type": "quit", "title": "Bye", "keyEquivalent": "q"},
                {"type": "separator", "title": "ignored"}
            ]}],
            "footer": {"showReloadConfig": true, "showOpenConfig": false, "showRevealConfig": false, "showRelaunch": false, "showQuit": true}
        }"#;
        let cfg: Config = serde_json::from_str(json).unwrap();
        let kinds: Vec<ActionKind> = cfg.sections[0]
            .items
            .iter()
            .map(|i| i.action.kind())
            .collect();
        assert_eq!(kinds, ActionKind::ALL.to_vec());
        assert_eq!(
            cfg.sections[0].items[3].action,
            ItemAction::Shell {
                command: Some("/usr/bin/open".to_string()),
                arguments: Some(vec!["-a".to_string(), "Notes".to_string()]),
            }
        );
        assert_eq!(cfg.sections[0].items[11].title.as_deref(), Some("Bye"));
        assert_eq!(cfg.debug, DebugConfig::default());
    }

    #[test]
    fn tag_names_match_serialized_form() {
        for kind in ActionKind::ALL {
            let json = format!(r#"{{"type": "{}"}}"#, kind.as_str());
            let item: MenuItem = serde_json::from_str(&json).unwrap();
            assert_eq!(item.action.kind(), kind);
        }
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let mut value = serde_json::to_value(sample_config()).unwrap();
        value["someFutureKey"] = serde_json::json!({"nested": true});
        value["sections"][0]["items"][0]["colour"] = serde_json::json!("red");
        let cfg: Config = serde_json::from_value(value).unwrap();
        assert_eq!(cfg, sample_config());
    }

    #[test]
    fn unknown_item_type_is_rejected() {
        let json = r#"{"type": "launchRocket", "title": "x"}"#;
        assert!(serde_json::from_str::<MenuItem>(json).is_err());
    }

    #[test]
    fn supplemental_fields_parse() {
        let mut value = serde_json::to_value(Config::fallback()).unwrap();
        value["appTitle"] = serde_json::json!("  Tools  ");
        value["debug"] = serde_json::json!({"showWindow": true});
        let cfg: Config = serde_json::from_value(value).unwrap();
        assert_eq!(cfg.display_title(), "Tools");
        assert!(cfg.debug.show_window);
        assert_eq!(Config::fallback().display_title(), APP_NAME);
    }

    #[test]
    fn time_format_defaults_when_blank() {
        let mut status = Config::fallback().status_section;
        status.time_format = Some("  ".to_string());
        assert_eq!(status.time_format(), DEFAULT_TIME_FORMAT);
        status.time_format = Some("HH:mm".to_string());
        assert_eq!(status.time_format(), "HH:mm");
    }

    #[test]
    fn ensure_default_creates_directory_and_file() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp);
        assert!(!store.directory().exists());

        store.ensure_default();

        assert!(store.path().is_file());
        assert_eq!(store.try_load().unwrap(), Config::fallback());
    }

    #[test]
    fn ensure_default_never_overwrites() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp);
        fs::create_dir_all(store.directory()).unwrap();
        fs::write(store.path(), "not json").unwrap();

        store.ensure_default();

        assert_eq!(fs::read_to_string(store.path()).unwrap(), "not json");
    }

    #[test]
    fn ensure_default_prefers_bundled_default() {
        let tmp = TempDir::new().unwrap();
        let bundled = tmp.path().join(BUNDLED_DEFAULT_NAME);
        fs::write(&bundled, sample_config().to_json_pretty().unwrap()).unwrap();
        let store = store_in(&tmp).with_bundled_default(Some(bundled));

        assert_eq!(store.load(), sample_config());
    }

    #[test]
    fn shipped_default_config_parses() {
        let tmp = TempDir::new().unwrap();
        let shipped = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("assets")
            .join(BUNDLED_DEFAULT_NAME);
        let store = store_in(&tmp).with_bundled_default(Some(shipped));

        let cfg = store.load();

        assert_ne!(cfg, Config::fallback());
        assert_eq!(store.try_load().unwrap(), cfg);
        assert_eq!(cfg.version, 1);
        assert!(cfg.status_section.show_wifi);
        assert_eq!(cfg.footer, Footer::all(true));
        let titles: Vec<_> = cfg
            .sections
            .iter()
            .filter_map(|s| s.title.as_deref())
            .collect();
        assert_eq!(titles, ["System Settings", "Apps", "Utilities"]);
        let kinds: Vec<_> = cfg
            .sections
            .iter()
            .flat_map(|s| &s.items)
            .map(|item| item.action.kind())
            .collect();
        for kind in [
            ActionKind::OpenSettings,
            ActionKind::OpenApp,
            ActionKind::OpenUrl,
            ActionKind::Shell,
            ActionKind::AppleScript,
            ActionKind::ClipboardCopy,
            ActionKind::ClipboardClear,
            ActionKind::Separator,
        ] {
            assert!(kinds.contains(&kind), "{kind:?} missing from shipped default");
        }
    }

    #[test]
    fn missing_bundled_default_falls_back() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp).with_bundled_default(Some(tmp.path().join("nope.json")));

        assert_eq!(store.load(), Config::fallback());
    }

    #[test]
    fn load_missing_file_yields_fallback_and_leaves_parseable_file() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp);

        assert_eq!(store.load(), Config::fallback());
        assert_eq!(store.try_load().unwrap(), Config::fallback());
    }

    #[test]
    fn load_corrupt_file_self_heals() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp);
        fs::create_dir_all(store.directory()).unwrap();

        for broken in [
            "{ this is not json",
            r#"{"version": "one"}"#,
            r#"{"version": 1, "menuBarIcon": {}, "statusSection": {"title": "", "showTime": 1, "showBattery": false, "showWiFi": false, "showClipboard": false}, "sections": [], "footer": {"showReloadConfig": true, "showOpenConfig": true, "showRevealConfig": true, "showRelaunch": true, "showQuit": true}}"#,
            "",
        ] {
            fs::write(store.path(), broken).unwrap();
            assert_eq!(store.load(), Config::fallback());
            assert_eq!(store.try_load().unwrap(), Config::fallback());
        }
    }

    #[test]
    fn try_load_reports_parse_errors() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp);
        fs::create_dir_all(store.directory()).unwrap();
        fs::write(store.path(), "[]").unwrap();

        let err = store.try_load().unwrap_err();
        assert!(format!("{err:#}").contains("parsing"));
        assert_eq!(fs::read_to_string(store.path()).unwrap(), "[]");
    }

    #[test]
    fn save_then_load_returns_same_snapshot() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp);
        store.save(&sample_config()).unwrap();

        assert_eq!(store.load(), sample_config());
        assert!(!store.path().with_extension("tmp").exists());
    }

    #[test]
    fn location_materializes_default() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp);

        let path = store.location();

        assert!(path.is_file());
        assert_eq!(store.directory(), tmp.path().join(APP_NAME));
    }
}
