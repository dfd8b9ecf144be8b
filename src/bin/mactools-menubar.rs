use anyhow::Result;

#[cfg(not(target_os = "macos"))]
fn main() -> Result<()> {
    anyhow::bail!("mactools-menubar is only supported on macOS");
}

#[cfg(target_os = "macos")]
fn main() -> Result<()> {
    mactools::tray::platform::macos::run()
}
