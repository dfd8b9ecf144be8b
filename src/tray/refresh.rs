use std::{
    sync::mpsc::{self, RecvTimeoutError, Sender},
    thread::{self, JoinHandle},
    time::Duration,
};

use anyhow::{Context, Result};
use tracing::debug;

pub const REFRESH_INTERVAL: Duration = Duration::from_secs(30);

/// Periodic tick on a background thread. The callback should only hand the
/// tick over to the control thread; it must not touch the menu itself.
///
/// Stopping (or dropping) the timer wakes the thread and joins it, so no tick
/// fires after `stop` returns.
pub struct RefreshTimer {
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl RefreshTimer {
    pub fn start<F>(period: Duration, mut on_tick: F) -> Result<Self>
    where
        F: FnMut() + Send + 'static,
    {
        let (stop, stopped) = mpsc::channel::<()>();
        let handle = thread::Builder::new()
            .name("mactools-refresh".to_string())
            .spawn(move || loop {
                match stopped.recv_timeout(period) {
                    Err(RecvTimeoutError::Timeout) => on_tick(),
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            })
            .context("spawn refresh timer")?;
        debug!(period_secs = period.as_secs_f64(), "refresh timer started");

        Ok(Self {
            stop: Some(stop),
            handle: Some(handle),
        })
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    pub fn stop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
            debug!("refresh timer stopped");
        }
    }
}

impl Drop for RefreshTimer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    #[test]
    fn ticks_until_stopped() {
        let (tx, rx) = mpsc::channel();
        let mut timer = RefreshTimer::start(Duration::from_millis(10), move || {
            let _ = tx.send(());
        })
        .unwrap();

        for _ in 0..3 {
            rx.recv_timeout(Duration::from_secs(5)).unwrap();
        }
        timer.stop();
        assert!(!timer.is_running());

        while rx.try_recv().is_ok() {}
        assert_eq!(
            rx.recv_timeout(Duration::from_millis(50)),
            Err(RecvTimeoutError::Disconnected)
        );
    }

    #[test]
    fn drop_stops_without_waiting_for_period() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ticks);
        let started = std::time::Instant::now();
        {
            let _timer = RefreshTimer::start(Duration::from_secs(60), move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }
        assert!(started.elapsed() < Duration::from_secs(30));
        assert_eq!(ticks.load(Ordering::SeqCst), 0);
    }
}
