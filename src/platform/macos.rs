use std::{
    env,
    ffi::OsStr,
    io::Write,
    path::Path,
    process::{Command, Stdio},
    thread,
    time::Duration,
};

use anyhow::{bail, Context, Result};
use chrono::Local;
use tracing::debug;
use url::Url;

use super::{
    capture_with_timeout, relaunch_argv, spawn_detached, Clipboard, Launcher, Lifecycle,
    ProcessRunner, Services, StatusProvider,
};
use crate::status::{self, StatusSnapshot};

const OSASCRIPT: &str = "/usr/bin/osascript";
const WIFI_INTERFACE: &str = "en0";
const PROBE_TIMEOUT: Duration = Duration::from_millis(750);

pub fn services() -> Services {
    Services {
        launcher: Box::new(Workspace),
        processes: Box::new(Processes),
        clipboard: Box::new(Pasteboard),
        status: Box::new(SystemStatus {
            wifi_interface: WIFI_INTERFACE.to_string(),
        }),
        lifecycle: Box::new(Relauncher),
    }
}

struct Workspace;

impl Launcher for Workspace {
    fn open_url(&self, url: &Url) -> Result<()> {
        run_open(&[OsStr::new(url.as_str())])
    }

    fn open_app(&self, path: &Path) -> Result<()> {
        run_open(&[OsStr::new("-a"), path.as_os_str()])
    }

    fn open_file(&self, path: &Path) -> Result<()> {
        run_open(&[path.as_os_str()])
    }

    fn reveal_file(&self, path: &Path) -> Result<()> {
        run_open(&[OsStr::new("-R"), path.as_os_str()])
    }
}

fn run_open(args: &[&OsStr]) -> Result<()> {
    let shown = args
        .iter()
        .map(|a| a.to_string_lossy())
        .collect::<Vec<_>>()
        .join(" ");
    let status = Command::new("open")
        .args(args)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .with_context(|| format!("running open {shown}"))?;
    if !status.success() {
        bail!("open {shown} failed (exit={status})");
    }
    Ok(())
}

struct Processes;

impl ProcessRunner for Processes {
    fn spawn(&self, program: &str, args: &[String]) -> Result<()> {
        let mut cmd = Command::new(program);
        cmd.args(args);
        spawn_detached(cmd)
    }

    fn run_script(&self, script: &str) -> Result<()> {
        let mut cmd = Command::new(OSASCRIPT);
        cmd.arg("-e").arg(script);
        spawn_detached(cmd)
    }
}

struct Pasteboard;

impl Clipboard for Pasteboard {
    fn set(&self, text: &str) -> Result<()> {
        let mut child = Command::new("pbcopy")
            .stdin(Stdio::piped())
            .spawn()
            .context("running pbcopy")?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(text.as_bytes())
                .context("writing to pbcopy")?;
        }
        let status = child.wait().context("waiting for pbcopy")?;
        if !status.success() {
            bail!("pbcopy failed (exit={status})");
        }
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.set("")
    }
}

struct SystemStatus {
    wifi_interface: String,
}

impl StatusProvider for SystemStatus {
    fn now(&self) -> StatusSnapshot {
        // Probes run side by side and each is time-boxed, so opening the menu
        // waits at most one PROBE_TIMEOUT.
        let (battery, wifi, clipboard) = thread::scope(|scope| {
            let battery = scope.spawn(|| {
                capture("pmset", &["-g", "batt"])
                    .ok()
                    .and_then(|raw| status::parse_pmset_battery(&raw))
            });
            let wifi = scope.spawn(|| {
                capture(
                    "networksetup",
                    &["-getairportnetwork", self.wifi_interface.as_str()],
                )
                .ok()
                .and_then(|raw| status::parse_airport_network(&raw))
            });
            let clipboard = scope.spawn(|| {
                capture("pbpaste", &[])
                    .ok()
                    .and_then(|raw| status::clipboard_preview(&raw))
            });
            (
                battery.join().ok().flatten(),
                wifi.join().ok().flatten(),
                clipboard.join().ok().flatten(),
            )
        });

        StatusSnapshot {
            time: Local::now(),
            battery,
            wifi,
            clipboard,
        }
    }
}

fn capture(program: &str, args: &[&str]) -> Result<String> {
    let mut cmd = Command::new(program);
    cmd.args(args);
    capture_with_timeout(cmd, PROBE_TIMEOUT).map_err(|err| {
        debug!("status probe failed: {err:#}");
        err
    })
}

struct Relauncher;

impl Lifecycle for Relauncher {
    fn relaunch(&self) -> Result<()> {
        let exe = env::current_exe().context("current_exe")?;
        let (program, args) = relaunch_argv(&exe);
        let mut cmd = Command::new(program);
        cmd.args(args);
        spawn_detached(cmd)
    }
}
