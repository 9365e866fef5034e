// SPDX-License-Identifier: MPL-2.0

//! Integration tests for the capture loop
//!
//! The capture source, encoder and output are scripted fakes that record
//! what happened to them in a shared event log. Time is driven by a manual
//! clock the source advances before delivering each message.

use camera_vid::backends::camera::{
    CaptureSource, ColourSpace, CompletedRequest, CompletedRequestPtr, FrameData, FrameMetadata,
    Message, PixelFormat, StreamFlags, StreamInfo, TestPatternSource,
};
use camera_vid::config::SourceKind;
use camera_vid::control::{ControlSignals, KeySource, SignalCell};
use camera_vid::errors::{BackendError, BackendResult, EncoderResult, ErrorKind, OutputResult};
use camera_vid::media::encoders::{Encoder, EncoderCallbacks, NullEncoder};
use camera_vid::output::{FileOutput, Output, SharedOutput, shared};
use camera_vid::pipelines::video::{
    Clock, Orchestrator, SessionState, Step, TerminationPolicy, TerminationReason,
};
use camera_vid::preview::Preview;
use camera_vid::{Codec, Config};
use std::cell::Cell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

type Events = Arc<Mutex<Vec<String>>>;

const NO_TIME: Duration = Duration::ZERO;

fn stream() -> StreamInfo {
    StreamInfo {
        width: 4,
        height: 2,
        stride: 8,
        pixel_format: PixelFormat::YUYV,
        colour_space: ColourSpace::Jpeg,
    }
}

fn frame(sequence: u64) -> CompletedRequestPtr {
    CompletedRequest::new(
        sequence,
        sequence as i64 * 33_333,
        FrameData::from(vec![sequence as u8; 16]),
    )
    .into_ptr()
}

fn frames(count: u64) -> Vec<(Duration, Message)> {
    (0..count)
        .map(|i| (NO_TIME, Message::RequestComplete(frame(i))))
        .collect()
}

#[derive(Clone)]
struct ManualClock(Rc<Cell<Instant>>);

impl ManualClock {
    fn new() -> Self {
        Self(Rc::new(Cell::new(Instant::now())))
    }

    fn advance(&self, by: Duration) {
        self.0.set(self.0.get() + by);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.0.get()
    }
}

struct ScriptedSource {
    script: VecDeque<(Duration, Message)>,
    clock: ManualClock,
    events: Events,
    fail_restart: bool,
    starts: u32,
    delivered: usize,
    info: Option<StreamInfo>,
}

impl ScriptedSource {
    fn new(script: Vec<(Duration, Message)>, clock: &ManualClock, events: &Events) -> Self {
        Self {
            script: script.into(),
            clock: clock.clone(),
            events: events.clone(),
            fail_restart: false,
            starts: 0,
            delivered: 0,
            info: None,
        }
    }

    fn failing_restart(mut self) -> Self {
        self.fail_restart = true;
        self
    }

    fn log(&self, event: &str) {
        self.events.lock().unwrap().push(event.to_string());
    }
}

impl CaptureSource for ScriptedSource {
    fn open(&mut self) -> BackendResult<()> {
        self.log("source.open");
        Ok(())
    }

    fn configure(&mut self, flags: StreamFlags) -> BackendResult<StreamInfo> {
        self.log("source.configure");
        let info = StreamInfo {
            colour_space: flags.colour_space,
            ..stream()
        };
        self.info = Some(info);
        Ok(info)
    }

    fn start_capture(&mut self) -> BackendResult<()> {
        self.starts += 1;
        self.log("source.start");
        if self.fail_restart && self.starts > 1 {
            return Err(BackendError::StartFailed("device disappeared".to_string()));
        }
        Ok(())
    }

    fn stop_capture(&mut self) -> BackendResult<()> {
        self.log("source.stop");
        Ok(())
    }

    fn next_message(&mut self) -> Message {
        match self.script.pop_front() {
            Some((elapse, message)) => {
                self.clock.advance(elapse);
                self.delivered += 1;
                message
            }
            None => Message::Quit,
        }
    }

    fn stream_info(&self) -> Option<&StreamInfo> {
        self.info.as_ref()
    }
}

/// Synchronous encoder that logs sequences and forwards the raw bytes
struct RecordingEncoder {
    callbacks: Option<EncoderCallbacks>,
    events: Events,
    encoded: Vec<u64>,
}

impl RecordingEncoder {
    fn new(events: &Events) -> Self {
        Self {
            callbacks: None,
            events: events.clone(),
            encoded: Vec::new(),
        }
    }
}

impl Encoder for RecordingEncoder {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn start(&mut self, callbacks: EncoderCallbacks) -> EncoderResult<()> {
        self.events.lock().unwrap().push("encoder.start".to_string());
        self.callbacks = Some(callbacks);
        Ok(())
    }

    fn stop(&mut self) -> EncoderResult<()> {
        self.events.lock().unwrap().push("encoder.stop".to_string());
        self.callbacks = None;
        Ok(())
    }

    fn encode(&mut self, request: &CompletedRequestPtr, _stream: &StreamInfo) -> EncoderResult<()> {
        self.encoded.push(request.sequence);
        if let Some(callbacks) = self.callbacks.as_mut() {
            (callbacks.output_ready)(&request.data, request.timestamp_us, true);
            (callbacks.metadata_ready)(&request.metadata);
        }
        Ok(())
    }
}

#[derive(Default)]
struct OutputLog {
    packets: Vec<i64>,
    metadata: Vec<u64>,
    segments: u32,
    closed: bool,
}

struct RecordingOutput {
    log: Arc<Mutex<OutputLog>>,
    events: Events,
}

impl Output for RecordingOutput {
    fn output_ready(&mut self, _data: &[u8], timestamp_us: i64, _keyframe: bool) -> OutputResult<()> {
        self.log.lock().unwrap().packets.push(timestamp_us);
        Ok(())
    }

    fn metadata_ready(&mut self, metadata: &FrameMetadata) -> OutputResult<()> {
        self.log.lock().unwrap().metadata.push(metadata.sequence);
        Ok(())
    }

    fn start_new_segment(&mut self) -> OutputResult<()> {
        self.log.lock().unwrap().segments += 1;
        Ok(())
    }

    fn close(&mut self) -> OutputResult<()> {
        self.events.lock().unwrap().push("output.close".to_string());
        self.log.lock().unwrap().closed = true;
        Ok(())
    }
}

struct ScriptedKeys(VecDeque<Option<char>>);

impl KeySource for ScriptedKeys {
    fn poll_key(&mut self) -> Option<char> {
        self.0.pop_front().flatten()
    }
}

struct CountingPreview(Rc<Cell<u64>>);

impl Preview for CountingPreview {
    fn show(&mut self, _request: &CompletedRequestPtr, _stream: &StreamInfo) {
        self.0.set(self.0.get() + 1);
    }
}

struct Harness {
    clock: ManualClock,
    events: Events,
    log: Arc<Mutex<OutputLog>>,
    output: SharedOutput,
}

impl Harness {
    fn new() -> Self {
        let events: Events = Arc::default();
        let log = Arc::new(Mutex::new(OutputLog::default()));
        let output = shared(RecordingOutput {
            log: log.clone(),
            events: events.clone(),
        });
        Self {
            clock: ManualClock::new(),
            events,
            log,
            output,
        }
    }

    fn source(&self, script: Vec<(Duration, Message)>) -> ScriptedSource {
        ScriptedSource::new(script, &self.clock, &self.events)
    }

    fn orchestrator(
        &self,
        source: ScriptedSource,
        control: ControlSignals,
        policy: TerminationPolicy,
    ) -> Orchestrator<ScriptedSource, RecordingEncoder> {
        Orchestrator::new(
            source,
            RecordingEncoder::new(&self.events),
            self.output.clone(),
            control,
            policy,
            &Config::default(),
        )
        .with_clock(Box::new(self.clock.clone()))
    }

    fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

fn quiet_control() -> ControlSignals {
    static CELL: SignalCell = SignalCell::new();
    ControlSignals::disabled().with_cell(&CELL)
}

#[test]
fn test_frame_budget_encodes_exactly_budget_frames_in_order() {
    let harness = Harness::new();
    let source = harness.source(frames(8));
    let mut session = harness.orchestrator(
        source,
        quiet_control(),
        TerminationPolicy::new(Some(5), None),
    );

    assert_eq!(session.run().unwrap(), TerminationReason::FrameBudgetReached);
    assert_eq!(session.encoder().encoded, vec![0, 1, 2, 3, 4]);
    assert_eq!(session.source().delivered, 5);
    assert_eq!(session.frame_index(), 5);
    assert_eq!(session.state(), SessionState::Stopped);

    let log = harness.log.lock().unwrap();
    assert_eq!(log.metadata, vec![0, 1, 2, 3, 4]);
    assert!(log.closed);
}

#[test]
fn test_frame_budget_ignores_elapsed_time() {
    let harness = Harness::new();
    let script = (0..6)
        .map(|i| (Duration::from_secs(10), Message::RequestComplete(frame(i))))
        .collect();
    let source = harness.source(script);
    let mut session = harness.orchestrator(
        source,
        quiet_control(),
        TerminationPolicy::new(Some(4), Some(Duration::from_millis(100))),
    );

    assert_eq!(session.run().unwrap(), TerminationReason::FrameBudgetReached);
    assert_eq!(session.encoder().encoded.len(), 4);
}

#[test]
fn test_time_budget_stops_on_first_frame_past_budget() {
    let harness = Harness::new();
    let script = (0..10)
        .map(|i| (Duration::from_millis(500), Message::RequestComplete(frame(i))))
        .collect();
    let source = harness.source(script);
    let mut session = harness.orchestrator(
        source,
        quiet_control(),
        TerminationPolicy::new(None, Some(Duration::from_secs(1))),
    );

    // Frames arrive at 0.5s and 1.0s (not past the budget), then 1.5s
    assert_eq!(session.run().unwrap(), TerminationReason::TimeElapsed);
    assert_eq!(session.encoder().encoded, vec![0, 1]);
    assert_eq!(session.source().delivered, 3);
}

#[test]
fn test_stall_is_recovered_without_encoding() {
    let harness = Harness::new();
    let source = harness.source(vec![
        (NO_TIME, Message::RequestComplete(frame(0))),
        (NO_TIME, Message::Timeout),
        (NO_TIME, Message::RequestComplete(frame(1))),
    ]);
    let mut session =
        harness.orchestrator(source, quiet_control(), TerminationPolicy::default());

    assert_eq!(session.run().unwrap(), TerminationReason::ProducerQuit);
    assert_eq!(session.encoder().encoded, vec![0, 1]);
    assert_eq!(session.stall_count(), 1);
    assert_eq!(session.source().starts, 2);
}

#[test]
fn test_timeout_leaves_frame_index_alone() {
    let harness = Harness::new();
    let source = harness.source(vec![
        (NO_TIME, Message::RequestComplete(frame(0))),
        (NO_TIME, Message::Timeout),
        (NO_TIME, Message::Timeout),
    ]);
    let mut session =
        harness.orchestrator(source, quiet_control(), TerminationPolicy::default());

    session.start().unwrap();
    assert_eq!(session.state(), SessionState::Capturing);
    assert_eq!(session.step().unwrap(), Step::Continue);
    assert_eq!(session.frame_index(), 1);

    for _ in 0..2 {
        assert_eq!(session.step().unwrap(), Step::Continue);
        assert_eq!(session.frame_index(), 1);
        assert_eq!(session.state(), SessionState::Capturing);
    }
    assert_eq!(
        session.step().unwrap(),
        Step::Finished(TerminationReason::ProducerQuit)
    );
    session.stop().unwrap();
}

#[test]
fn test_failed_restart_is_a_recovery_failure() {
    let harness = Harness::new();
    let source = harness
        .source(vec![
            (NO_TIME, Message::RequestComplete(frame(0))),
            (NO_TIME, Message::Timeout),
            (NO_TIME, Message::RequestComplete(frame(1))),
        ])
        .failing_restart();
    let mut session =
        harness.orchestrator(source, quiet_control(), TerminationPolicy::default());

    let err = session.run().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RecoveryFailure);
    assert_eq!(session.encoder().encoded, vec![0]);
    assert_eq!(session.state(), SessionState::Stopped);
    assert!(harness.log.lock().unwrap().closed);
    assert!(harness.events().contains(&"encoder.stop".to_string()));
}

#[test]
fn test_unknown_message_is_a_protocol_violation() {
    let harness = Harness::new();
    let source = harness.source(vec![
        (NO_TIME, Message::RequestComplete(frame(0))),
        (NO_TIME, Message::Unknown(42)),
        (NO_TIME, Message::RequestComplete(frame(1))),
    ]);
    let mut session =
        harness.orchestrator(source, quiet_control(), TerminationPolicy::default());

    let err = session.run().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ProtocolViolation);
    assert!(err.to_string().contains("42"));
    assert_eq!(session.encoder().encoded, vec![0]);
    assert_eq!(session.source().delivered, 2);
}

#[test]
fn test_sigint_quits_with_only_keypress_mode() {
    static CELL: SignalCell = SignalCell::new();
    let harness = Harness::new();
    let source = harness.source(frames(3));
    let control = ControlSignals::new(true, false)
        .with_cell(&CELL)
        .with_keys(Box::new(ScriptedKeys(VecDeque::new())));
    let mut session = harness.orchestrator(source, control, TerminationPolicy::default());

    CELL.record(libc::SIGINT);
    assert_eq!(session.run().unwrap(), TerminationReason::UserQuit);
    assert!(session.encoder().encoded.is_empty());
    assert_eq!(CELL.peek(), None);
}

#[test]
fn test_sigint_during_stall_is_acted_on_at_next_frame() {
    static CELL: SignalCell = SignalCell::new();
    let harness = Harness::new();
    let source = harness.source(vec![
        (NO_TIME, Message::RequestComplete(frame(0))),
        (NO_TIME, Message::Timeout),
        (NO_TIME, Message::RequestComplete(frame(1))),
    ]);
    let control = ControlSignals::disabled().with_cell(&CELL);
    let mut session = harness.orchestrator(source, control, TerminationPolicy::default());

    session.start().unwrap();
    assert_eq!(session.step().unwrap(), Step::Continue);

    CELL.record(libc::SIGINT);
    assert_eq!(session.step().unwrap(), Step::Continue);
    assert_eq!(session.stall_count(), 1);
    assert_eq!(CELL.peek(), Some(libc::SIGINT));

    assert_eq!(
        session.step().unwrap(),
        Step::Finished(TerminationReason::UserQuit)
    );
    assert_eq!(CELL.peek(), None);
    assert_eq!(session.encoder().encoded, vec![0]);
    session.stop().unwrap();
}

#[test]
fn test_keys_split_and_quit() {
    static CELL: SignalCell = SignalCell::new();
    let harness = Harness::new();
    let source = harness.source(frames(10));
    let keys = ScriptedKeys(VecDeque::from([None, Some('\n'), None, Some('q')]));
    let control = ControlSignals::new(true, false)
        .with_cell(&CELL)
        .with_keys(Box::new(keys));
    let mut session = harness.orchestrator(source, control, TerminationPolicy::default());

    assert_eq!(session.run().unwrap(), TerminationReason::UserQuit);
    assert_eq!(session.encoder().encoded, vec![0, 1, 2]);
    assert_eq!(harness.log.lock().unwrap().segments, 1);
}

#[test]
fn test_user_signals_split_and_stop_in_signal_mode() {
    static CELL: SignalCell = SignalCell::new();
    let harness = Harness::new();
    let source = harness.source(frames(10));
    let control = ControlSignals::new(false, true).with_cell(&CELL);
    let mut session = harness.orchestrator(source, control, TerminationPolicy::default());

    session.start().unwrap();
    CELL.record(libc::SIGUSR1);
    assert_eq!(session.step().unwrap(), Step::Continue);
    assert_eq!(session.step().unwrap(), Step::Continue);
    CELL.record(libc::SIGUSR2);
    assert_eq!(
        session.step().unwrap(),
        Step::Finished(TerminationReason::UserQuit)
    );
    session.stop().unwrap();

    assert_eq!(harness.log.lock().unwrap().segments, 1);
    assert_eq!(session.encoder().encoded, vec![0, 1]);
}

#[test]
fn test_shutdown_stops_camera_before_encoder() {
    let harness = Harness::new();
    let source = harness.source(frames(2));
    let mut session =
        harness.orchestrator(source, quiet_control(), TerminationPolicy::default());
    session.run().unwrap();

    assert_eq!(
        harness.events(),
        vec![
            "source.open",
            "source.configure",
            "encoder.start",
            "source.start",
            "source.stop",
            "encoder.stop",
            "output.close",
        ]
    );
}

#[test]
fn test_orchestrator_releases_buffer_handles() {
    let harness = Harness::new();
    let request = frame(0);
    let source = harness.source(vec![(NO_TIME, Message::RequestComplete(request.clone()))]);
    let mut session =
        harness.orchestrator(source, quiet_control(), TerminationPolicy::default());

    session.start().unwrap();
    assert_eq!(Arc::strong_count(&request), 2);
    session.step().unwrap();
    assert_eq!(Arc::strong_count(&request), 1);
    session.stop().unwrap();
}

#[test]
fn test_preview_sees_every_forwarded_frame() {
    let harness = Harness::new();
    let shown = Rc::new(Cell::new(0));
    let source = harness.source(frames(4));
    let mut session = harness
        .orchestrator(source, quiet_control(), TerminationPolicy::new(Some(3), None))
        .with_preview(Box::new(CountingPreview(shown.clone())));

    session.run().unwrap();
    assert_eq!(shown.get(), 3);
}

#[test]
fn test_step_before_start_is_rejected() {
    let harness = Harness::new();
    let source = harness.source(frames(1));
    let mut session =
        harness.orchestrator(source, quiet_control(), TerminationPolicy::default());

    assert_eq!(session.state(), SessionState::Idle);
    assert_eq!(session.step().unwrap_err().kind(), ErrorKind::Device);
}

#[test]
fn test_pattern_source_to_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pattern.yuv");
    let config = Config {
        source: SourceKind::Pattern,
        codec: Codec::Yuv420,
        width: 32,
        height: 16,
        framerate: 60,
        frames: 3,
        output: Some(path.clone()),
        ..Config::default()
    };

    let mut session = Orchestrator::new(
        TestPatternSource::new(&config),
        NullEncoder::new(),
        shared(FileOutput::create(&path).unwrap()),
        quiet_control(),
        TerminationPolicy::from_config(&config),
        &config,
    );

    assert_eq!(session.run().unwrap(), TerminationReason::FrameBudgetReached);
    assert_eq!(std::fs::metadata(&path).unwrap().len(), 3 * 32 * 16 * 2);
}
