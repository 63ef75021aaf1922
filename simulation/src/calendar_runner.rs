//! Calendar Runner - Background thread that ticks the simulation at regular intervals

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{error, info, warn};

use crate::world::{SimulationWorld, TickResult};

/// Calendar runner that manages a background thread for automatic ticking
pub struct CalendarRunner {
    is_running: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
}

impl CalendarRunner {
    pub fn new() -> Self {
        Self {
            is_running: Arc::new(AtomicBool::new(false)),
            thread_handle: None,
        }
    }

    /// Start advancing the world one day every `interval_ms` milliseconds.
    ///
    /// The callback receives each day's summary. The runner stops by itself if a day
    /// fails or the world lock is poisoned; a stop request takes effect between days.
    pub fn start<F>(&mut self, world: Arc<Mutex<SimulationWorld>>, interval_ms: u64, callback: F)
    where
        F: Fn(TickResult) + Send + 'static,
    {
        if self.is_running.load(Ordering::Relaxed) {
            warn!("calendar runner already running");
            return;
        }

        info!("starting calendar runner ({}ms intervals)", interval_ms);
        self.is_running.store(true, Ordering::Relaxed);
        let running = Arc::clone(&self.is_running);

        let handle = thread::spawn(move || {
            while running.load(Ordering::Relaxed) {
                let tick_result = match world.lock() {
                    Ok(mut w) => w.tick(),
                    Err(_) => {
                        error!("world lock poisoned; stopping calendar runner");
                        break;
                    }
                };
                match tick_result {
                    Ok(result) => callback(result),
                    Err(e) => {
                        error!("simulation day failed: {}", e);
                        break;
                    }
                }
                thread::sleep(Duration::from_millis(interval_ms));
            }
            running.store(false, Ordering::Relaxed);
            info!("calendar runner thread stopped");
        });

        self.thread_handle = Some(handle);
    }

    /// Stop the calendar ticking
    pub fn stop(&mut self) {
        self.is_running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.thread_handle.take() {
            info!("stopping calendar runner");
            if handle.join().is_err() {
                warn!("calendar runner thread panicked");
            }
        }
    }

    /// Check if the calendar is currently running
    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::Relaxed)
    }
}

impl Default for CalendarRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for CalendarRunner {
    fn drop(&mut self) {
        self.stop();
    }
}
