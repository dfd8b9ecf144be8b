use std::{
    ffi::OsString,
    io::Read,
    path::{Path, PathBuf},
    process::{Child, Command, Stdio},
    thread,
    time::{Duration, Instant},
};

use anyhow::{anyhow, bail, Context, Result};
use tracing::debug;
use url::Url;

use crate::status::StatusSnapshot;

/// Opens things through the OS workspace (URLs, apps, files, Finder).
pub trait Launcher {
    fn open_url(&self, url: &Url) -> Result<()>;
    fn open_app(&self, path: &Path) -> Result<()>;
    fn open_file(&self, path: &Path) -> Result<()>;
    fn reveal_file(&self, path: &Path) -> Result<()>;
}

/// Starts external work without waiting for it.
pub trait ProcessRunner {
    fn spawn(&self, program: &str, args: &[String]) -> Result<()>;
    fn run_script(&self, script: &str) -> Result<()>;
}

pub trait Clipboard {
    fn set(&self, text: &str) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

/// Pure query of live system state.
pub trait StatusProvider {
    fn now(&self) -> StatusSnapshot;
}

pub trait Lifecycle {
    /// Starts a fresh instance. The caller terminates the current one.
    fn relaunch(&self) -> Result<()>;
}

/// The external collaborators the tray core talks to.
pub struct Services {
    pub launcher: Box<dyn Launcher>,
    pub processes: Box<dyn ProcessRunner>,
    pub clipboard: Box<dyn Clipboard>,
    pub status: Box<dyn StatusProvider>,
    pub lifecycle: Box<dyn Lifecycle>,
}

#[cfg(target_os = "macos")]
mod macos;

pub fn services() -> Result<Services> {
    #[cfg(target_os = "macos")]
    {
        return Ok(macos::services());
    }

    #[cfg(not(target_os = "macos"))]
    {
        bail!("Unsupported OS (MacTools only runs on macOS).");
    }
}

/// Spawns `command` as a detached task: stdio is discarded, nobody waits on
/// the result, and a reaper thread collects the exit status so the child does
/// not linger as a zombie.
pub fn spawn_detached(mut command: Command) -> Result<()> {
    let program = command.get_program().to_string_lossy().into_owned();
    let child = command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .with_context(|| format!("spawn {program}"))?;
    debug!(program = %program, pid = child.id(), "spawned detached task");
    reap(child);
    Ok(())
}

fn reap(mut child: Child) {
    let spawned = thread::Builder::new()
        .name("mactools-reaper".to_string())
        .spawn(move || {
            let _ = child.wait();
        });
    if let Err(err) = spawned {
        debug!("reaper thread unavailable: {err}");
    }
}

/// Binary a relaunch starts when the app is not running from a bundle.
pub const MENUBAR_BIN: &str = "mactools-menubar";

/// Program and arguments that start a fresh menu bar instance for `exe`.
///
/// Inside an `.app` bundle this is `open -n <bundle>`. Otherwise it is the
/// `mactools-menubar` binary next to `exe`, with no forwarded arguments, so a
/// relaunch requested from the CLI never replays the CLI command.
pub fn relaunch_argv(exe: &Path) -> (OsString, Vec<OsString>) {
    if let Some(bundle) = app_bundle(exe) {
        return (
            OsString::from("open"),
            vec![OsString::from("-n"), bundle.into_os_string()],
        );
    }
    (exe.with_file_name(MENUBAR_BIN).into_os_string(), Vec::new())
}

pub fn app_bundle(exe: &Path) -> Option<PathBuf> {
    exe.ancestors()
        .find(|p| p.extension().is_some_and(|ext| ext == "app"))
        .map(Path::to_path_buf)
}

/// Runs `command` and returns its stdout, killing it once `timeout` elapses.
pub fn capture_with_timeout(mut command: Command, timeout: Duration) -> Result<String> {
    let program = command.get_program().to_string_lossy().into_owned();
    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .with_context(|| format!("running {program}"))?;
    let mut stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("{program}: stdout not captured"))?;
    // Drain concurrently so a chatty child cannot block on a full pipe.
    let reader = thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = stdout.read_to_end(&mut buf);
        buf
    });

    let deadline = Instant::now() + timeout;
    let status = loop {
        if let Some(status) = child.try_wait().with_context(|| format!("waiting on {program}"))? {
            break status;
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            bail!("{program} timed out after {}ms", timeout.as_millis());
        }
        thread::sleep(Duration::from_millis(5));
    };

    let buf = reader
        .join()
        .map_err(|_| anyhow!("{program}: output reader panicked"))?;
    if !status.success() {
        bail!("{program} failed (exit={status})");
    }
    // Clipboard contents are not guaranteed to be UTF-8.
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

#[cfg(all(test, unix))]
mod relaunch_tests {
    use super::*;

    #[test]
    fn finds_enclosing_app_bundle() {
        let exe = Path::new("/Applications/MacTools.app/Contents/MacOS/mactools-menubar");
        assert_eq!(
            app_bundle(exe).as_deref(),
            Some(Path::new("/Applications/MacTools.app"))
        );
        assert_eq!(app_bundle(Path::new("/usr/local/bin/mactools-menubar")), None);
    }

    #[test]
    fn relaunch_from_bundle_opens_new_instance() {
        let (program, args) =
            relaunch_argv(Path::new("/Applications/MacTools.app/Contents/MacOS/mactools"));
        assert_eq!(program, OsString::from("open"));
        assert_eq!(
            args,
            vec![OsString::from("-n"), OsString::from("/Applications/MacTools.app")]
        );
    }

    #[test]
    fn relaunch_from_cli_starts_menubar_without_args() {
        let (program, args) = relaunch_argv(Path::new("/usr/local/bin/mactools"));
        assert_eq!(program, OsString::from("/usr/local/bin/mactools-menubar"));
        assert!(args.is_empty());

        let (program, args) = relaunch_argv(Path::new("/opt/mt/mactools-menubar"));
        assert_eq!(program, OsString::from("/opt/mt/mactools-menubar"));
        assert!(args.is_empty());
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn spawn_detached_returns_without_waiting() {
        let mut cmd = Command::new("sleep");
        cmd.arg("5");
        let started = std::time::Instant::now();
        spawn_detached(cmd).unwrap();
        assert!(started.elapsed() < std::time::Duration::from_secs(4));
    }

    #[test]
    fn spawn_detached_reports_missing_program() {
        let cmd = Command::new("/definitely/not/a/real/program");
        assert!(spawn_detached(cmd).is_err());
    }

    #[test]
    fn capture_returns_stdout() {
        let mut cmd = Command::new("echo");
        cmd.arg("85%");
        let out = capture_with_timeout(cmd, Duration::from_secs(5)).unwrap();
        assert_eq!(out.trim(), "85%");
    }

    #[test]
    fn capture_gives_up_on_slow_commands() {
        let mut cmd = Command::new("sleep");
        cmd.arg("5");
        let started = Instant::now();
        let err = capture_with_timeout(cmd, Duration::from_millis(100)).unwrap_err();
        assert!(err.to_string().contains("timed out"), "{err:#}");
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn capture_reports_failure_status() {
        let cmd = Command::new("false");
        assert!(capture_with_timeout(cmd, Duration::from_secs(5)).is_err());
    }
}
