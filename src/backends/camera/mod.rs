// SPDX-License-Identifier: GPL-3.0-only

//! Capture source abstraction
//!
//! ```text
//! ┌──────────────────────┐
//! │     Orchestrator     │
//! └──────────┬───────────┘
//!            │ next_message()
//!            ▼
//! ┌──────────────────────┐
//! │ CaptureSource trait  │  ← open / configure / start / stop
//! └──────────┬───────────┘
//!            │
//!     ┌──────┴───────┐
//!     ▼              ▼
//!  ┌──────┐    ┌──────────┐
//!  │ V4L2 │    │ Pattern  │  ← capture thread + bounded channel
//!  └──────┘    └──────────┘
//! ```

pub mod format_converters;
pub mod frame_loop;
pub mod pattern;
pub mod types;
pub mod v4l2;

pub use pattern::TestPatternSource;
pub use types::*;
pub use v4l2::{V4l2Source, list_devices};

use crate::config::{Config, SourceKind};
use crate::errors::BackendResult;
use std::sync::mpsc::{Receiver, RecvTimeoutError, SyncSender, TrySendError};
use std::time::Duration;
use tracing::{debug, warn};

/// Producer of capture messages
///
/// Sources must deliver `Timeout` when no frame completes within their
/// watchdog interval, and must deliver `Quit` at most once with nothing
/// after it.
pub trait CaptureSource {
    /// Acquire the device
    fn open(&mut self) -> BackendResult<()>;

    /// Negotiate the stream; returns the geometry the device accepted
    fn configure(&mut self, flags: StreamFlags) -> BackendResult<StreamInfo>;

    /// Begin producing frames
    fn start_capture(&mut self) -> BackendResult<()>;

    /// Stop producing frames; the session stays open and configured
    fn stop_capture(&mut self) -> BackendResult<()>;

    /// Block until the next message is available
    fn next_message(&mut self) -> Message;

    /// The configured stream, if `configure` has succeeded
    fn stream_info(&self) -> Option<&StreamInfo>;
}

impl<T: CaptureSource + ?Sized> CaptureSource for Box<T> {
    fn open(&mut self) -> BackendResult<()> {
        (**self).open()
    }

    fn configure(&mut self, flags: StreamFlags) -> BackendResult<StreamInfo> {
        (**self).configure(flags)
    }

    fn start_capture(&mut self) -> BackendResult<()> {
        (**self).start_capture()
    }

    fn stop_capture(&mut self) -> BackendResult<()> {
        (**self).stop_capture()
    }

    fn next_message(&mut self) -> Message {
        (**self).next_message()
    }

    fn stream_info(&self) -> Option<&StreamInfo> {
        (**self).stream_info()
    }
}

/// Build the capture source named by the configuration
pub fn create_source(config: &Config) -> BackendResult<Box<dyn CaptureSource>> {
    Ok(match config.source {
        SourceKind::V4l2 => Box::new(V4l2Source::new(config)?),
        SourceKind::Pattern => Box::new(TestPatternSource::new(config)),
    })
}

/// Receiving end of a capture thread, with the stall watchdog
pub(crate) struct MessageChannel {
    receiver: Option<Receiver<Message>>,
    watchdog: Duration,
}

impl MessageChannel {
    pub(crate) fn new(watchdog: Duration) -> Self {
        Self {
            receiver: None,
            watchdog,
        }
    }

    /// Replace the receiver; anything queued on the old one is discarded
    pub(crate) fn attach(&mut self, receiver: Receiver<Message>) {
        self.receiver = Some(receiver);
    }

    pub(crate) fn detach(&mut self) {
        self.receiver = None;
    }

    pub(crate) fn recv(&mut self) -> Message {
        let Some(receiver) = &self.receiver else {
            return Message::Quit;
        };

        match receiver.recv_timeout(self.watchdog) {
            Ok(message) => message,
            Err(RecvTimeoutError::Timeout) => Message::Timeout,
            Err(RecvTimeoutError::Disconnected) => {
                debug!("Capture thread closed its channel");
                self.receiver = None;
                Message::Quit
            }
        }
    }
}

/// Hand a message to the orchestrator without blocking the capture thread
///
/// Returns `false` once the receiving side is gone.
pub(crate) fn deliver(sender: &SyncSender<Message>, message: Message, sequence: u64) -> bool {
    match sender.try_send(message) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            if sequence % 30 == 0 {
                warn!(sequence, "Frame dropped (orchestrator behind)");
            }
            true
        }
        Err(TrySendError::Disconnected(_)) => false,
    }
}
