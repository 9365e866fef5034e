// SPDX-License-Identifier: GPL-3.0-only
//! Worker threads for capture and encoding
//!
//! Capture sources dequeue frames on their own thread and the MJPEG encoder
//! compresses on one. Both are a closure called in a loop until it asks to
//! stop or its owner does. [`CaptureLoopController`] owns that thread and
//! joins it when stopped or dropped.

use crate::errors::{BackendError, BackendResult};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// What the loop body wants after one iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopAction {
    Continue,
    Stop,
}

/// Handle to a named worker thread running a loop body
///
/// ```ignore
/// let mut worker = CaptureLoopController::start("test-pattern", move || generator.tick());
/// // ...
/// worker.stop();
/// ```
pub struct CaptureLoopController {
    handle: Option<JoinHandle<()>>,
    stop_requested: Arc<AtomicBool>,
    name: String,
}

impl CaptureLoopController {
    /// Spawn `body` on a thread called `name`
    ///
    /// If the thread cannot be spawned a warning is logged and the
    /// controller reports `is_running() == false`.
    pub fn start<F>(name: &str, mut body: F) -> Self
    where
        F: FnMut() -> LoopAction + Send + 'static,
    {
        let stop_requested = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop_requested);
        let thread_name = name.to_string();

        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || drive(&thread_name, &flag, &mut body));

        let handle = match handle {
            Ok(handle) => {
                info!(name = %name, "Worker thread started");
                Some(handle)
            }
            Err(e) => {
                warn!(name = %name, error = %e, "Failed to spawn worker thread");
                None
            }
        };

        Self {
            handle,
            stop_requested,
            name: name.to_string(),
        }
    }

    /// Spawn a worker whose state is built on the worker thread itself
    ///
    /// Device handles and mapped buffers stay on the thread that created
    /// them. The call waits for `init` so that a device which cannot be
    /// opened fails here, in the caller, rather than silently on the thread.
    pub fn start_with_init<S, I, F>(name: &str, init: I, mut body: F) -> BackendResult<Self>
    where
        S: 'static,
        I: FnOnce() -> BackendResult<S> + Send + 'static,
        F: FnMut(&mut S) -> LoopAction + Send + 'static,
    {
        let stop_requested = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop_requested);
        let thread_name = name.to_string();
        let (ready_tx, ready_rx) = mpsc::sync_channel::<BackendResult<()>>(1);

        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let mut state = match init() {
                    Ok(state) => state,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));
                drop(ready_tx);
                drive(&thread_name, &flag, &mut || body(&mut state));
            })
            .map_err(|e| BackendError::StartFailed(format!("spawn {}: {}", name, e)))?;

        let mut controller = Self {
            handle: Some(handle),
            stop_requested,
            name: name.to_string(),
        };

        let ready = ready_rx.recv().unwrap_or_else(|_| {
            Err(BackendError::StartFailed(format!(
                "{} exited during initialization",
                name
            )))
        });

        match ready {
            Ok(()) => {
                info!(name = %name, "Worker thread initialized");
                Ok(controller)
            }
            Err(e) => {
                warn!(name = %name, error = %e, "Worker initialization failed");
                controller.join();
                Err(e)
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Ask the loop to end after its current iteration; does not wait
    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
    }

    /// Ask the loop to end and wait for the thread
    pub fn stop(&mut self) {
        self.request_stop();
        self.join();
    }

    /// Wait for the loop to end on its own
    pub fn join(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        match handle.join() {
            Ok(()) => debug!(name = %self.name, "Worker thread joined"),
            Err(_) => warn!(name = %self.name, "Worker thread panicked"),
        }
    }
}

impl Drop for CaptureLoopController {
    fn drop(&mut self) {
        self.stop();
    }
}

fn drive(name: &str, stop_requested: &AtomicBool, body: &mut dyn FnMut() -> LoopAction) {
    while !stop_requested.load(Ordering::SeqCst) {
        if body() == LoopAction::Stop {
            debug!(name = %name, "Loop body finished");
            break;
        }
    }
    debug!(name = %name, "Worker thread exiting");
}
