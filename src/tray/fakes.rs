//! Recording collaborators for unit tests.

use std::{
    cell::{Cell, RefCell},
    path::{Path, PathBuf},
    rc::Rc,
};

use anyhow::{bail, Result};
use chrono::{Local, TimeZone};
use url::Url;

use crate::platform::{Clipboard, Launcher, Lifecycle, ProcessRunner, Services, StatusProvider};
use crate::status::StatusSnapshot;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    OpenUrl(String),
    OpenApp(PathBuf),
    OpenFile(PathBuf),
    RevealFile(PathBuf),
    Spawn(String, Vec<String>),
    Script(String),
    ClipboardSet(String),
    ClipboardClear,
    Relaunch,
}

#[derive(Clone, Default)]
pub struct Recorder {
    calls: Rc<RefCell<Vec<Call>>>,
    fail_urls: Rc<Cell<bool>>,
    status_queries: Rc<Cell<usize>>,
}

impl Recorder {
    pub fn services(&self) -> Services {
        Services {
            launcher: Box::new(self.clone()),
            processes: Box::new(self.clone()),
            clipboard: Box::new(self.clone()),
            status: Box::new(self.clone()),
            lifecycle: Box::new(self.clone()),
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn fail_urls(&self, fail: bool) {
        self.fail_urls.set(fail);
    }

    pub fn status_queries(&self) -> usize {
        self.status_queries.get()
    }

    fn record(&self, call: Call) {
        self.calls.borrow_mut().push(call);
    }
}

impl Launcher for Recorder {
    fn open_url(&self, url: &Url) -> Result<()> {
        self.record(Call::OpenUrl(url.as_str().to_string()));
        if self.fail_urls.get() {
            bail!("no handler for {url}");
        }
        Ok(())
    }

    fn open_app(&self, path: &Path) -> Result<()> {
        self.record(Call::OpenApp(path.to_path_buf()));
        Ok(())
    }

    fn open_file(&self, path: &Path) -> Result<()> {
        self.record(Call::OpenFile(path.to_path_buf()));
        Ok(())
    }

    fn reveal_file(&self, path: &Path) -> Result<()> {
        self.record(Call::RevealFile(path.to_path_buf()));
        Ok(())
    }
}

impl ProcessRunner for Recorder {
    fn spawn(&self, program: &str, args: &[String]) -> Result<()> {
        self.record(Call::Spawn(program.to_string(), args.to_vec()));
        Ok(())
    }

    fn run_script(&self, script: &str) -> Result<()> {
        self.record(Call::Script(script.to_string()));
        Ok(())
    }
}

impl Clipboard for Recorder {
    fn set(&self, text: &str) -> Result<()> {
        self.record(Call::ClipboardSet(text.to_string()));
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.record(Call::ClipboardClear);
        Ok(())
    }
}

impl StatusProvider for Recorder {
    fn now(&self) -> StatusSnapshot {
        self.status_queries.set(self.status_queries.get() + 1);
        StatusSnapshot {
            time: Local.with_ymd_and_hms(2024, 1, 2, 9, 30, 0).unwrap(),
            battery: Some("50%".to_string()),
            wifi: Some("Office".to_string()),
            clipboard: Some("copied".to_string()),
        }
    }
}

impl Lifecycle for Recorder {
    fn relaunch(&self) -> Result<()> {
        self.record(Call::Relaunch);
        Ok(())
    }
}
