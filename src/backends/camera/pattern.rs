// SPDX-License-Identifier: GPL-3.0-only

//! Synthetic capture source
//!
//! Produces scrolling colour bars in YUYV at the configured frame rate.
//! Useful for exercising encoders and outputs without a camera attached.

use super::format_converters::rgb_to_yuv;
use super::frame_loop::{CaptureLoopController, LoopAction};
use super::types::*;
use super::{CaptureSource, MessageChannel, deliver};
use crate::config::Config;
use crate::constants::MESSAGE_CHANNEL_DEPTH;
use crate::errors::{BackendError, BackendResult};
use std::sync::mpsc::{self, SyncSender};
use std::time::{Duration, Instant};
use tracing::info;

/// RGB values of the eight classic bars, left to right
const BARS: [(u8, u8, u8); 8] = [
    (255, 255, 255),
    (255, 255, 0),
    (0, 255, 255),
    (0, 255, 0),
    (255, 0, 255),
    (255, 0, 0),
    (0, 0, 255),
    (0, 0, 0),
];

pub struct TestPatternSource {
    width: u32,
    height: u32,
    frame_interval: Duration,
    opened: bool,
    info: Option<StreamInfo>,
    controller: Option<CaptureLoopController>,
    messages: MessageChannel,
    /// Sequence numbers continue across restarts
    next_sequence: u64,
    /// Timestamps are measured from the first start, not each restart
    epoch: Option<Instant>,
}

impl TestPatternSource {
    pub fn new(config: &Config) -> Self {
        let fps = config.framerate.max(1);
        Self {
            // YUYV needs an even width
            width: config.width.max(2) & !1,
            height: config.height.max(1),
            frame_interval: Duration::from_micros(1_000_000 / fps as u64),
            opened: false,
            info: None,
            controller: None,
            messages: MessageChannel::new(config.watchdog()),
            next_sequence: 0,
            epoch: None,
        }
    }
}

impl CaptureSource for TestPatternSource {
    fn open(&mut self) -> BackendResult<()> {
        self.opened = true;
        Ok(())
    }

    fn configure(&mut self, flags: StreamFlags) -> BackendResult<StreamInfo> {
        if !self.opened {
            return Err(BackendError::InvalidState(
                "configure called before open".to_string(),
            ));
        }
        let info = StreamInfo {
            width: self.width,
            height: self.height,
            stride: self.width * 2,
            pixel_format: PixelFormat::YUYV,
            colour_space: flags.colour_space,
        };
        self.info = Some(info);
        Ok(info)
    }

    fn start_capture(&mut self) -> BackendResult<()> {
        if self.controller.is_some() {
            return Err(BackendError::InvalidState("capture already running".to_string()));
        }
        let info = self.info.ok_or_else(|| {
            BackendError::InvalidState("start_capture called before configure".to_string())
        })?;

        let (sender, receiver) = mpsc::sync_channel(MESSAGE_CHANNEL_DEPTH);
        let mut generator = PatternGenerator {
            info,
            sender,
            sequence: self.next_sequence,
            interval: self.frame_interval,
            epoch: *self.epoch.get_or_insert_with(Instant::now),
            started: Instant::now(),
            frame: 0,
        };

        self.controller = Some(CaptureLoopController::start("test-pattern", move || {
            generator.tick()
        }));
        self.messages.attach(receiver);
        info!(width = info.width, height = info.height, "Test pattern started");
        Ok(())
    }

    fn stop_capture(&mut self) -> BackendResult<()> {
        if let Some(mut controller) = self.controller.take() {
            controller.stop();
        }
        self.messages.detach();
        // Restarted streams should not reuse sequence numbers
        self.next_sequence += 1_000_000;
        Ok(())
    }

    fn next_message(&mut self) -> Message {
        self.messages.recv()
    }

    fn stream_info(&self) -> Option<&StreamInfo> {
        self.info.as_ref()
    }
}

impl Drop for TestPatternSource {
    fn drop(&mut self) {
        let _ = self.stop_capture();
    }
}

struct PatternGenerator {
    info: StreamInfo,
    sender: SyncSender<Message>,
    sequence: u64,
    interval: Duration,
    epoch: Instant,
    /// Start of this capture run; pacing restarts with it
    started: Instant,
    /// Frames generated since `started`
    frame: u64,
}

impl PatternGenerator {
    fn tick(&mut self) -> LoopAction {
        let due = self.started + frame_offset(self.interval, self.frame);
        let now = Instant::now();
        if due > now {
            std::thread::sleep(due - now);
        }

        let timestamp_us = self.epoch.elapsed().as_micros() as i64;
        let data = colour_bars_yuyv(self.info.width, self.info.height, self.frame as u32);
        let request = CompletedRequest::new(self.sequence, timestamp_us, FrameData::from(data))
            .with_frame_duration(self.interval.as_micros() as u64);

        let delivered = deliver(
            &self.sender,
            Message::RequestComplete(request.into_ptr()),
            self.sequence,
        );
        self.sequence += 1;
        self.frame += 1;

        if delivered {
            LoopAction::Continue
        } else {
            LoopAction::Stop
        }
    }
}

/// When frame `frame` of a run is due, relative to the run's start
fn frame_offset(interval: Duration, frame: u64) -> Duration {
    Duration::from_micros((interval.as_micros() as u64).saturating_mul(frame))
}

/// Render colour bars scrolled `offset` pixels to the left, packed YUYV
pub fn colour_bars_yuyv(width: u32, height: u32, offset: u32) -> Vec<u8> {
    let w = width as usize;
    let bar_width = (w / BARS.len()).max(1);
    let yuv: Vec<(u8, u8, u8)> = BARS.iter().map(|&(r, g, b)| rgb_to_yuv(r, g, b)).collect();

    let mut row = Vec::with_capacity(w * 2);
    for x in (0..w).step_by(2) {
        let bar = ((x + offset as usize) / bar_width) % BARS.len();
        let (y, u, v) = yuv[bar];
        row.extend_from_slice(&[y, u, y, v]);
    }

    row.repeat(height as usize)
}
