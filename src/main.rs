use std::{sync::mpsc, time::Duration};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use mactools::{
    config::{self, ConfigStore, ItemAction},
    logging,
    platform::{self, MENUBAR_BIN},
    tray::{
        menu::{MenuItem, MenuSpec},
        model::TrayModel,
        refresh::{RefreshTimer, REFRESH_INTERVAL},
    },
};

#[derive(Parser, Debug)]
#[command(name = "mactools", version, about = "Config-driven macOS menu bar toolkit")]
struct Cli {
    /// Log at debug level (RUST_LOG overrides).
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Prints the config path that would be used.
    ConfigPath,
    /// Writes the default config if none exists yet, then prints its path.
    Init,
    /// Parses the config strictly and reports problems without repairing the file.
    Check,
    /// Prints the menu built from the current config, with live status values.
    Menu,
    /// Runs the action bound to a menu item id (as printed by `menu`).
    Invoke { id: u16 },
    /// Prints the menu, then the refreshed status lines on every tick.
    Watch {
        /// Seconds between refreshes.
        #[arg(long, default_value_t = REFRESH_INTERVAL.as_secs())]
        interval: u64,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.debug);

    match cli.command {
        Command::ConfigPath => {
            if let Some(path) = config::resolve_config_path() {
                println!("{}", path.display());
            }
        }
        Command::Init => {
            let store = ConfigStore::from_env()?;
            println!("{}", store.location().display());
        }
        Command::Check => {
            let store = ConfigStore::from_env()?;
            let cfg = store.try_load()?;
            let items: usize = cfg.sections.iter().map(|s| s.items.len()).sum();
            println!(
                "{}: ok (version {}, {} sections, {items} items)",
                store.path().display(),
                cfg.version,
                cfg.sections.len()
            );
        }
        Command::Menu => {
            let model = load_model()?;
            print_menu(model.menu());
        }
        Command::Invoke { id } => {
            let mut model = load_model()?;
            match model.menu().action(id) {
                None => bail!("No menu item with id {id}. Run `mactools menu` to list them."),
                Some(ItemAction::Relaunch) => {
                    println!("relaunch requested; start {MENUBAR_BIN} to run the menu bar app");
                    return Ok(());
                }
                Some(_) => {}
            }
            let update = model.invoke(id);
            if update.refresh_menu {
                print_menu(model.menu());
            } else if !update.refreshed_status.is_empty() {
                print_status(model.menu());
            }
            if update.quit {
                println!("quit requested");
            }
        }
        Command::Watch { interval } => {
            let mut model = load_model()?;
            print_menu(model.menu());

            let (tx, rx) = mpsc::channel();
            let _timer = RefreshTimer::start(Duration::from_secs(interval.max(1)), move || {
                let _ = tx.send(());
            })?;
            while rx.recv().is_ok() {
                model.refresh_status();
                print_status(model.menu());
            }
        }
    }

    Ok(())
}

fn load_model() -> Result<TrayModel> {
    let store = ConfigStore::from_env()?;
    let services = platform::services().context("select platform services")?;
    Ok(TrayModel::new(store, services))
}

fn print_menu(menu: &MenuSpec) {
    for item in &menu.items {
        match item {
            MenuItem::Header(title) => println!("{title}"),
            MenuItem::Separator => println!("---"),
            MenuItem::Status { text, .. } => println!("  {text}"),
            MenuItem::Action {
                id,
                title,
                enabled,
                key_equivalent,
                ..
            } => {
                let mut line = format!("[{id}] {title}");
                if !key_equivalent.is_empty() {
                    line.push_str(&format!(" (cmd-{key_equivalent})"));
                }
                if !enabled {
                    line.push_str(" (disabled)");
                }
                println!("{line}");
            }
        }
    }
}

fn print_status(menu: &MenuSpec) {
    for item in &menu.items {
        if let MenuItem::Status { text, .. } = item {
            println!("{text}");
        }
    }
}
