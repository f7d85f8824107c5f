// SPDX-License-Identifier: GPL-3.0-only

//! Capture thread lifecycle
//!
//! Capture providers run their frame pumps on dedicated threads. The
//! controller gives every provider the same start/stop/join surface and
//! guarantees the stop signal is observed between iterations.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Action returned by a capture iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopAction {
    Continue,
    Stop,
}

/// Controller for a capture loop running on its own thread
pub struct CaptureLoopController {
    thread: Option<JoinHandle<()>>,
    stop_signal: Arc<AtomicBool>,
    name: String,
}

impl CaptureLoopController {
    /// Start an iteration-style loop; `loop_fn` owns its state and is called
    /// until it returns [`LoopAction::Stop`] or the controller is stopped.
    pub fn start<F>(name: &str, mut loop_fn: F) -> Self
    where
        F: FnMut() -> LoopAction + Send + 'static,
    {
        Self::spawn(name, move |stop| {
            while !stop.load(Ordering::SeqCst) {
                if loop_fn() == LoopAction::Stop {
                    break;
                }
            }
            Ok(())
        })
    }

    /// Start a loop whose body constructs its own state in-thread.
    ///
    /// Needed for capture stacks whose stream borrows the device (the body
    /// keeps both on its stack). The body must poll `stop` between frames.
    pub fn spawn<F>(name: &str, body: F) -> Self
    where
        F: FnOnce(Arc<AtomicBool>) -> Result<(), String> + Send + 'static,
    {
        let stop_signal = Arc::new(AtomicBool::new(false));
        let stop = Arc::clone(&stop_signal);
        let thread_name = name.to_string();

        info!(name = %name, "Starting capture loop");
        let thread = thread::spawn(move || {
            debug!(name = %thread_name, "Capture loop thread started");
            if let Err(e) = body(stop) {
                warn!(name = %thread_name, error = %e, "Capture loop failed");
            }
            debug!(name = %thread_name, "Capture loop thread exiting");
        });

        Self {
            thread: Some(thread),
            stop_signal,
            name: name.to_string(),
        }
    }

    /// Signal the loop to stop without waiting for the thread
    pub fn request_stop(&self) {
        debug!(name = %self.name, "Requesting capture loop stop");
        self.stop_signal.store(true, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.thread.as_ref().map(|h| !h.is_finished()).unwrap_or(false)
    }

    /// Wait up to `wait` for the thread to wind down; detaches on timeout.
    ///
    /// Capture iterations are bounded by one frame interval, so a timeout
    /// here means the device stalled; the thread is left to exit on its own
    /// rather than blocking the caller.
    pub fn join_within(&mut self, wait: Duration) -> bool {
        let deadline = Instant::now() + wait;
        loop {
            let finished = self.thread.as_ref().map(|h| h.is_finished()).unwrap_or(true);
            if finished {
                if let Some(handle) = self.thread.take() {
                    if handle.join().is_err() {
                        warn!(name = %self.name, "Capture loop thread panicked");
                    }
                }
                return true;
            }
            if Instant::now() >= deadline {
                warn!(name = %self.name, "Capture loop did not stop in time, detaching");
                self.thread = None;
                return false;
            }
            thread::sleep(Duration::from_millis(5));
        }
    }

    /// Stop the loop and wait briefly for the thread to finish
    pub fn stop(&mut self, wait: Duration) -> bool {
        self.request_stop();
        self.join_within(wait)
    }
}

impl Drop for CaptureLoopController {
    fn drop(&mut self) {
        if self.thread.is_some() {
            self.request_stop();
            self.join_within(Duration::from_millis(250));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    #[test]
    fn loop_stops_itself() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = Arc::clone(&counter);

        let mut controller = CaptureLoopController::start("test-loop", move || {
            if counter_clone.fetch_add(1, Ordering::SeqCst) >= 4 {
                LoopAction::Stop
            } else {
                LoopAction::Continue
            }
        });

        assert!(controller.join_within(Duration::from_secs(1)));
        assert_eq!(counter.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn stop_signal_interrupts_loop() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = Arc::clone(&counter);

        let mut controller = CaptureLoopController::start("test-loop", move || {
            counter_clone.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(5));
            LoopAction::Continue
        });

        thread::sleep(Duration::from_millis(25));
        assert!(controller.stop(Duration::from_secs(1)));
        assert!(counter.load(Ordering::SeqCst) > 0);
    }

    #[test]
    fn failed_body_exits_cleanly() {
        let mut controller =
            CaptureLoopController::spawn("test-fail", |_| Err("no device".to_string()));
        assert!(controller.join_within(Duration::from_secs(1)));
        assert!(!controller.is_running());
    }
}
