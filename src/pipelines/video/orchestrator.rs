// SPDX-License-Identifier: MPL-2.0

//! The capture loop
//!
//! One orchestrator drives every recording mode; the encoder strategy is a
//! type parameter. Each [`Orchestrator::step`] blocks on exactly one
//! message from the capture source:
//!
//! ```text
//! Timeout         ─▶ stop + start the device, carry on (or fail)
//! Quit            ─▶ finished (ProducerQuit)
//! Unknown         ─▶ protocol violation
//! RequestComplete ─▶ poll keys/signals ─▶ split? ─▶ budgets/quit?
//!                    ─▶ encoder + preview ─▶ frame budget?
//! ```
//!
//! The orchestrator never copies pixels. It forwards the shared buffer
//! handle and lets go of it before the step returns.

use super::recovery::{FaultRecovery, RecoveryOutcome};
use super::termination::{Clock, SystemClock, TerminationPolicy, TerminationReason};
use crate::backends::camera::CaptureSource;
use crate::backends::camera::types::{CompletedRequestPtr, Message, StreamFlags, StreamInfo};
use crate::config::Config;
use crate::control::{Command, ControlSignals};
use crate::errors::{BackendError, CaptureError, CaptureResult};
use crate::media::encoders::{Encoder, EncoderCallbacks};
use crate::output::{SharedOutput, with_output};
use crate::preview::Preview;
use std::time::Instant;
use tracing::{debug, info, trace, warn};

/// Session lifecycle
///
/// `Recovering` only exists inside a single [`Orchestrator::step`]; it is
/// never observable between steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Capturing,
    Recovering,
    Stopping,
    Stopped,
}

/// Outcome of one loop iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Continue,
    Finished(TerminationReason),
}

pub struct Orchestrator<S: CaptureSource, E: Encoder> {
    source: S,
    encoder: E,
    output: SharedOutput,
    control: ControlSignals,
    policy: TerminationPolicy,
    flags: StreamFlags,
    preview: Option<Box<dyn Preview>>,
    clock: Box<dyn Clock>,
    recovery: FaultRecovery,
    state: SessionState,
    stream: Option<StreamInfo>,
    start_time: Option<Instant>,
    frame_index: u64,
    capture_running: bool,
    encoder_running: bool,
}

impl<S: CaptureSource, E: Encoder> Orchestrator<S, E> {
    pub fn new(
        source: S,
        encoder: E,
        output: SharedOutput,
        control: ControlSignals,
        policy: TerminationPolicy,
        config: &Config,
    ) -> Self {
        Self {
            source,
            encoder,
            output,
            control,
            policy,
            flags: config.stream_flags(),
            preview: None,
            clock: Box::new(SystemClock),
            recovery: FaultRecovery::new(),
            state: SessionState::Idle,
            stream: None,
            start_time: None,
            frame_index: 0,
            capture_running: false,
            encoder_running: false,
        }
    }

    /// Show every forwarded frame on `preview` as well
    pub fn with_preview(mut self, preview: Box<dyn Preview>) -> Self {
        self.preview = Some(preview);
        self
    }

    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_recovery(mut self, recovery: FaultRecovery) -> Self {
        self.recovery = recovery;
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Frames forwarded to the encoder so far
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    pub fn stall_count(&self) -> u64 {
        self.recovery.stall_count()
    }

    /// Stream geometry, once started
    pub fn stream_info(&self) -> Option<&StreamInfo> {
        self.stream.as_ref()
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn encoder(&self) -> &E {
        &self.encoder
    }

    /// Record until a termination rule fires or a fatal error occurs
    ///
    /// The session is shut down in both cases: capture first, then the
    /// encoder, then the output.
    pub fn run(&mut self) -> CaptureResult<TerminationReason> {
        let result = self.start().and_then(|()| self.capture_loop());
        let shutdown = self.stop();

        match result {
            Ok(reason) => {
                shutdown?;
                Ok(reason)
            }
            Err(e) => {
                if let Err(shutdown_error) = shutdown {
                    warn!(error = %shutdown_error, "Shutdown after failure also failed");
                }
                Err(e)
            }
        }
    }

    fn capture_loop(&mut self) -> CaptureResult<TerminationReason> {
        loop {
            if let Step::Finished(reason) = self.step()? {
                info!(%reason, frames = self.frame_index, "Halting");
                return Ok(reason);
            }
        }
    }

    /// Open and configure the source, start the encoder, then capture
    pub fn start(&mut self) -> CaptureResult<()> {
        if self.state != SessionState::Idle {
            return Err(BackendError::InvalidState(format!(
                "cannot start a session that is {:?}",
                self.state
            ))
            .into());
        }

        self.source.open()?;
        let stream = self.source.configure(self.flags)?;
        self.stream = Some(stream);

        self.encoder
            .start(EncoderCallbacks::forward_to(self.output.clone()))?;
        self.encoder_running = true;
        debug!(encoder = self.encoder.name(), "Encoder started");

        self.source.start_capture()?;
        self.capture_running = true;

        self.start_time = Some(self.clock.now());
        self.state = SessionState::Capturing;
        Ok(())
    }

    /// Consume one message from the capture source
    pub fn step(&mut self) -> CaptureResult<Step> {
        if self.state != SessionState::Capturing {
            return Err(BackendError::InvalidState(format!(
                "cannot capture in state {:?}",
                self.state
            ))
            .into());
        }

        let message = self.source.next_message();
        trace!(message = message.name(), "Capture message");
        match message {
            Message::Timeout => self.recover(),
            Message::Quit => Ok(Step::Finished(TerminationReason::ProducerQuit)),
            Message::RequestComplete(request) => self.handle_request(request),
            Message::Unknown(kind) => Err(CaptureError::ProtocolViolation { kind }),
        }
    }

    fn recover(&mut self) -> CaptureResult<Step> {
        self.state = SessionState::Recovering;
        match self.recovery.recover(&mut self.source) {
            RecoveryOutcome::Recovered => {
                self.state = SessionState::Capturing;
                Ok(Step::Continue)
            }
            RecoveryOutcome::Fatal(e) => {
                self.capture_running = false;
                self.state = SessionState::Stopping;
                Err(CaptureError::RecoveryFailed(e))
            }
        }
    }

    fn handle_request(&mut self, request: CompletedRequestPtr) -> CaptureResult<Step> {
        let Some(stream) = self.stream else {
            return Err(BackendError::InvalidState("frame before configure".into()).into());
        };

        if self.frame_index == 0 {
            info!(
                width = stream.width,
                height = stream.height,
                stride = stream.stride,
                format = %stream.pixel_format,
                "Stream geometry"
            );
        }

        let command = self.control.poll();
        if command == Command::SplitOutput {
            with_output(&self.output, |output| output.start_new_segment())?;
        }

        debug!(
            frame = self.frame_index,
            latency_us = request.captured_at.elapsed().as_micros() as u64,
            "Viewfinder frame"
        );
        let start = self.start_time.unwrap_or_else(|| self.clock.now());
        if let Some(reason) =
            self.policy
                .should_stop(self.clock.now(), start, self.frame_index, command)
        {
            return Ok(Step::Finished(reason));
        }

        self.encoder.encode(&request, &stream)?;
        if let Some(preview) = self.preview.as_mut() {
            preview.show(&request, &stream);
        }
        drop(request);

        self.frame_index += 1;
        if self.policy.frame_budget_reached(self.frame_index) {
            return Ok(Step::Finished(TerminationReason::FrameBudgetReached));
        }
        Ok(Step::Continue)
    }

    /// Stop capture, then the encoder, then close the output
    ///
    /// Every stage is attempted even if an earlier one fails; the first
    /// failure is returned.
    pub fn stop(&mut self) -> CaptureResult<()> {
        if self.state == SessionState::Stopped {
            return Ok(());
        }
        self.state = SessionState::Stopping;
        let mut first_error: Option<CaptureError> = None;

        if self.capture_running {
            self.capture_running = false;
            if let Err(e) = self.source.stop_capture() {
                warn!(error = %e, "Failed to stop capture");
                first_error.get_or_insert(e.into());
            }
        }

        if self.encoder_running {
            self.encoder_running = false;
            if let Err(e) = self.encoder.stop() {
                warn!(error = %e, "Failed to stop encoder");
                first_error.get_or_insert(e.into());
            }
        }

        if let Err(e) = with_output(&self.output, |output| output.close()) {
            warn!(error = %e, "Failed to close output");
            first_error.get_or_insert(e.into());
        }

        self.state = SessionState::Stopped;
        debug!(frames = self.frame_index, stalls = self.stall_count(), "Session stopped");
        first_error.map_or(Ok(()), Err)
    }
}
