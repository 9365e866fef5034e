// SPDX-License-Identifier: GPL-3.0-only

//! V4L2 capture source
//!
//! Frames are dequeued from an mmap stream on a capture thread and copied
//! once into a shared buffer before the device buffer is requeued. From
//! there on the frame is only ever passed around by reference.

use super::frame_loop::{CaptureLoopController, LoopAction};
use super::types::*;
use super::{CaptureSource, MessageChannel, deliver};
use crate::config::Config;
use crate::constants::{CAPTURE_BUFFER_COUNT, CAPTURE_POLL_INTERVAL, MESSAGE_CHANNEL_DEPTH};
use crate::errors::{BackendError, BackendResult};
use std::io;
use std::sync::mpsc::{self, SyncSender};
use std::time::Duration;
use tracing::{debug, error, info, warn};
use v4l::buffer::Type;
use v4l::format::Colorspace;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::video::capture::Parameters;
use v4l::{Format, FourCC};

/// A V4L2 capture node driven through an mmap stream
pub struct V4l2Source {
    device_path: String,
    width: u32,
    height: u32,
    framerate: u32,
    fourcc: [u8; 4],
    opened: bool,
    /// Format the device accepted, re-applied on every start
    format: Option<Format>,
    info: Option<StreamInfo>,
    controller: Option<CaptureLoopController>,
    messages: MessageChannel,
}

impl V4l2Source {
    pub fn new(config: &Config) -> BackendResult<Self> {
        let fourcc = config
            .fourcc()
            .map_err(|e| BackendError::FormatNotSupported(e.to_string()))?;
        Ok(Self {
            device_path: config.device.clone(),
            width: config.width,
            height: config.height,
            framerate: config.framerate,
            fourcc,
            opened: false,
            format: None,
            info: None,
            controller: None,
            messages: MessageChannel::new(config.watchdog()),
        })
    }

    fn open_device(&self) -> BackendResult<Device> {
        Device::with_path(&self.device_path).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                BackendError::DeviceNotFound(self.device_path.clone())
            } else {
                BackendError::InitializationFailed(format!(
                    "Failed to open V4L2 device {}: {}",
                    self.device_path, e
                ))
            }
        })
    }
}

impl CaptureSource for V4l2Source {
    fn open(&mut self) -> BackendResult<()> {
        let dev = self.open_device()?;
        let caps = dev
            .query_caps()
            .map_err(|e| BackendError::InitializationFailed(format!("Query caps: {}", e)))?;

        if !caps
            .capabilities
            .contains(v4l::capability::Flags::VIDEO_CAPTURE)
        {
            return Err(BackendError::InitializationFailed(format!(
                "{} is not a video capture device",
                self.device_path
            )));
        }

        info!(
            device = %self.device_path,
            driver = %caps.driver,
            card = %caps.card,
            "Opened V4L2 device"
        );
        self.opened = true;
        Ok(())
    }

    fn configure(&mut self, flags: StreamFlags) -> BackendResult<StreamInfo> {
        if !self.opened {
            return Err(BackendError::InvalidState(
                "configure called before open".to_string(),
            ));
        }

        let dev = self.open_device()?;
        let mut format = Format::new(self.width, self.height, FourCC::new(&self.fourcc));
        format.colorspace = match flags.colour_space {
            ColourSpace::Default => Colorspace::Default,
            ColourSpace::Jpeg => Colorspace::JPEG,
            ColourSpace::Smpte170m => Colorspace::SMPTE170M,
            ColourSpace::Raw => Colorspace::RAW,
        };

        let actual = dev
            .set_format(&format)
            .map_err(|e| BackendError::FormatNotSupported(format!("{}: {}", format, e)))?;

        if actual.fourcc != format.fourcc {
            warn!(
                requested = %format.fourcc,
                got = %actual.fourcc,
                "Device substituted a different pixel format"
            );
        }

        if self.framerate > 0
            && let Err(e) = dev.set_params(&Parameters::with_fps(self.framerate))
        {
            warn!(error = %e, fps = self.framerate, "Could not set frame rate");
        }

        let info = StreamInfo {
            width: actual.width,
            height: actual.height,
            stride: actual.stride,
            pixel_format: PixelFormat::from_fourcc(&actual.fourcc.repr),
            colour_space: flags.colour_space,
        };

        debug!(stream = %info, raw = flags.raw, "V4L2 stream configured");
        self.format = Some(actual);
        self.info = Some(info);
        Ok(info)
    }

    fn start_capture(&mut self) -> BackendResult<()> {
        if self.controller.is_some() {
            return Err(BackendError::InvalidState("capture already running".to_string()));
        }
        let format = self.format.ok_or_else(|| {
            BackendError::InvalidState("start_capture called before configure".to_string())
        })?;

        let (sender, receiver) = mpsc::sync_channel(MESSAGE_CHANNEL_DEPTH);
        let path = self.device_path.clone();
        let frame_duration_us = (self.framerate > 0).then(|| 1_000_000 / self.framerate as u64);

        let controller = CaptureLoopController::start_with_init(
            "v4l2-capture",
            move || open_stream(&path, &format, sender, frame_duration_us),
            capture_one,
        )?;

        self.messages.attach(receiver);
        self.controller = Some(controller);
        info!(device = %self.device_path, "V4L2 capture started");
        Ok(())
    }

    fn stop_capture(&mut self) -> BackendResult<()> {
        if let Some(mut controller) = self.controller.take() {
            controller.stop();
            info!(device = %self.device_path, "V4L2 capture stopped");
        }
        self.messages.detach();
        Ok(())
    }

    fn next_message(&mut self) -> Message {
        self.messages.recv()
    }

    fn stream_info(&self) -> Option<&StreamInfo> {
        self.info.as_ref()
    }
}

impl Drop for V4l2Source {
    fn drop(&mut self) {
        let _ = self.stop_capture();
    }
}

/// Capture-thread state; owns the device and its mapped buffers
struct StreamState {
    _device: Device,
    stream: MmapStream<'static>,
    sender: SyncSender<Message>,
    frame_duration_us: Option<u64>,
}

fn open_stream(
    path: &str,
    format: &Format,
    sender: SyncSender<Message>,
    frame_duration_us: Option<u64>,
) -> BackendResult<StreamState> {
    let mut device = Device::with_path(path)
        .map_err(|e| BackendError::StartFailed(format!("Failed to open {}: {}", path, e)))?;

    device
        .set_format(format)
        .map_err(|e| BackendError::StartFailed(format!("Failed to apply format: {}", e)))?;

    let mut stream = MmapStream::with_buffers(&mut device, Type::VideoCapture, CAPTURE_BUFFER_COUNT)
        .map_err(|e| BackendError::StartFailed(format!("Failed to create buffer stream: {}", e)))?;
    stream.set_timeout(CAPTURE_POLL_INTERVAL);

    Ok(StreamState {
        _device: device,
        stream,
        sender,
        frame_duration_us,
    })
}

fn capture_one(state: &mut StreamState) -> LoopAction {
    match state.stream.next() {
        Ok((buf, meta)) => {
            let used = (meta.bytesused as usize).min(buf.len());
            let used = if used == 0 { buf.len() } else { used };
            let timestamp_us = meta.timestamp.sec as i64 * 1_000_000 + meta.timestamp.usec as i64;
            let sequence = meta.sequence as u64;

            let mut request =
                CompletedRequest::new(sequence, timestamp_us, FrameData::copy_from(&buf[..used]));
            if let Some(duration) = state.frame_duration_us {
                request = request.with_frame_duration(duration);
            }

            if deliver(
                &state.sender,
                Message::RequestComplete(request.into_ptr()),
                sequence,
            ) {
                LoopAction::Continue
            } else {
                LoopAction::Stop
            }
        }
        // Nothing arrived within the poll interval; the orchestrator's
        // watchdog decides whether that is a stall
        Err(e) if e.kind() == io::ErrorKind::TimedOut => LoopAction::Continue,
        Err(e) if e.raw_os_error() == Some(libc::ENODEV) => {
            error!(error = %e, "V4L2 device disappeared");
            LoopAction::Stop
        }
        Err(e) => {
            warn!(error = %e, "Failed to dequeue frame");
            std::thread::sleep(Duration::from_millis(10));
            LoopAction::Continue
        }
    }
}

/// A V4L2 node that can be passed to `--device`
#[derive(Debug, Clone)]
pub struct DeviceEntry {
    pub index: usize,
    pub path: String,
    pub name: String,
}

/// Enumerate V4L2 video nodes
pub fn list_devices() -> Vec<DeviceEntry> {
    v4l::context::enum_devices()
        .into_iter()
        .map(|node| DeviceEntry {
            index: node.index(),
            path: node.path().display().to_string(),
            name: node.name().unwrap_or_else(|| "unknown".to_string()),
        })
        .collect()
}
