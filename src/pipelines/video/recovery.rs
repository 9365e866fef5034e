// SPDX-License-Identifier: MPL-2.0

//! Restarting a stalled capture device
//!
//! A watchdog timeout usually means the driver fell behind. Capture is
//! stopped and started again on the same session; the encoder and output
//! are left untouched. There is no retry: a failed restart ends the
//! recording.

use crate::backends::camera::CaptureSource;
use crate::errors::BackendError;
use tracing::{error, info, warn};

/// Result of one recovery attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryOutcome {
    Recovered,
    Fatal(BackendError),
}

/// Stop-then-start recovery with a running stall count
#[derive(Debug, Default)]
pub struct FaultRecovery {
    stalls: u64,
}

impl FaultRecovery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stalls seen so far, including the one being recovered
    pub fn stall_count(&self) -> u64 {
        self.stalls
    }

    pub fn recover<S: CaptureSource + ?Sized>(&mut self, source: &mut S) -> RecoveryOutcome {
        self.stalls += 1;
        error!(
            stalls = self.stalls,
            "Device timeout detected, attempting a restart"
        );

        // A source that is already stopped is fine to start again
        if let Err(e) = source.stop_capture() {
            warn!(error = %e, "Failed to stop stalled capture");
        }

        match source.start_capture() {
            Ok(()) => {
                info!(stalls = self.stalls, "Capture restarted");
                RecoveryOutcome::Recovered
            }
            Err(e) => {
                error!(error = %e, "Capture restart failed");
                RecoveryOutcome::Fatal(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::types::{Message, StreamFlags, StreamInfo};
    use crate::errors::BackendResult;

    #[derive(Default)]
    struct FlakySource {
        calls: Vec<&'static str>,
        fail_start: bool,
        fail_stop: bool,
    }

    impl CaptureSource for FlakySource {
        fn open(&mut self) -> BackendResult<()> {
            Ok(())
        }

        fn configure(&mut self, _flags: StreamFlags) -> BackendResult<StreamInfo> {
            Err(BackendError::InvalidState("unused".into()))
        }

        fn start_capture(&mut self) -> BackendResult<()> {
            self.calls.push("start");
            if self.fail_start {
                Err(BackendError::StartFailed("device gone".into()))
            } else {
                Ok(())
            }
        }

        fn stop_capture(&mut self) -> BackendResult<()> {
            self.calls.push("stop");
            if self.fail_stop {
                Err(BackendError::StopFailed("already stopped".into()))
            } else {
                Ok(())
            }
        }

        fn next_message(&mut self) -> Message {
            Message::Quit
        }

        fn stream_info(&self) -> Option<&StreamInfo> {
            None
        }
    }

    #[test]
    fn test_stop_then_start() {
        let mut source = FlakySource::default();
        let mut recovery = FaultRecovery::new();
        assert_eq!(recovery.recover(&mut source), RecoveryOutcome::Recovered);
        assert_eq!(source.calls, vec!["stop", "start"]);
        assert_eq!(recovery.stall_count(), 1);
    }

    #[test]
    fn test_failed_start_is_fatal() {
        let mut source = FlakySource {
            fail_start: true,
            ..Default::default()
        };
        let mut recovery = FaultRecovery::new();
        assert!(matches!(
            recovery.recover(&mut source),
            RecoveryOutcome::Fatal(BackendError::StartFailed(_))
        ));
    }

    #[test]
    fn test_failed_stop_still_restarts() {
        let mut source = FlakySource {
            fail_stop: true,
            ..Default::default()
        };
        let mut recovery = FaultRecovery::new();
        assert_eq!(recovery.recover(&mut source), RecoveryOutcome::Recovered);
        assert_eq!(recovery.recover(&mut source), RecoveryOutcome::Recovered);
        assert_eq!(recovery.stall_count(), 2);
    }
}
