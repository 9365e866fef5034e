// SPDX-License-Identifier: GPL-3.0-only
// Shared types for capture sources

//! Shared types for capture sources

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Frame data storage
///
/// Pixel bytes are reference counted so that a completed request can be
/// handed to the encoder and the preview path without copying.
#[derive(Clone)]
pub struct FrameData(Arc<[u8]>);

impl FrameData {
    /// Copy bytes out of a device buffer that is about to be requeued
    pub fn copy_from(bytes: &[u8]) -> Self {
        FrameData(Arc::from(bytes))
    }

    /// Get the length of the frame data in bytes
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if the frame data is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of live references to the underlying bytes
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }
}

impl From<Vec<u8>> for FrameData {
    fn from(bytes: Vec<u8>) -> Self {
        FrameData(Arc::from(bytes.into_boxed_slice()))
    }
}

impl std::fmt::Debug for FrameData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "FrameData({} bytes)", self.0.len())
    }
}

impl AsRef<[u8]> for FrameData {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl std::ops::Deref for FrameData {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

/// Pixel layout of a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// Packed 4:2:2, Y0 U Y1 V
    YUYV,
    /// Packed 4:2:2, U Y0 V Y1
    UYVY,
    /// Semi-planar 4:2:0, Y plane then interleaved UV
    NV12,
    /// Planar 4:2:0 (I420), Y then U then V
    YUV420,
    RGB24,
    Gray8,
    /// Each buffer is a complete JPEG image
    MJPEG,
    /// Anything else, kept as its FourCC (raw Bayer and the like)
    Other([u8; 4]),
}

impl PixelFormat {
    pub fn from_fourcc(code: &[u8; 4]) -> Self {
        match code {
            b"YUYV" => PixelFormat::YUYV,
            b"UYVY" => PixelFormat::UYVY,
            b"NV12" => PixelFormat::NV12,
            b"YU12" | b"I420" => PixelFormat::YUV420,
            b"RGB3" => PixelFormat::RGB24,
            b"GREY" => PixelFormat::Gray8,
            b"MJPG" | b"JPEG" => PixelFormat::MJPEG,
            other => PixelFormat::Other(*other),
        }
    }

    pub fn fourcc(&self) -> [u8; 4] {
        match self {
            PixelFormat::YUYV => *b"YUYV",
            PixelFormat::UYVY => *b"UYVY",
            PixelFormat::NV12 => *b"NV12",
            PixelFormat::YUV420 => *b"YU12",
            PixelFormat::RGB24 => *b"RGB3",
            PixelFormat::Gray8 => *b"GREY",
            PixelFormat::MJPEG => *b"MJPG",
            PixelFormat::Other(code) => *code,
        }
    }
}

impl std::fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let code = self.fourcc();
        write!(f, "{}", String::from_utf8_lossy(&code).trim_end())
    }
}

/// Colour-space hint passed to the source when the stream is configured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ColourSpace {
    /// Let the device pick
    #[default]
    Default,
    /// Full-range BT.601, what JPEG and raw YUV files expect
    Jpeg,
    /// Limited-range BT.601
    Smpte170m,
    /// Sensor data, no colour processing
    Raw,
}

/// Flags handed to `CaptureSource::configure`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StreamFlags {
    pub colour_space: ColourSpace,
    /// Ask for the unprocessed sensor stream
    pub raw: bool,
}

/// Negotiated geometry of the video stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamInfo {
    pub width: u32,
    pub height: u32,
    /// Bytes per row, may include padding
    pub stride: u32,
    pub pixel_format: PixelFormat,
    pub colour_space: ColourSpace,
}

impl std::fmt::Display for StreamInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}x{} stride {} format {}",
            self.width, self.height, self.stride, self.pixel_format
        )
    }
}

/// Per-frame metadata forwarded to the output sink
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameMetadata {
    /// Frame sequence number as reported by the source
    pub sequence: u64,
    /// Sensor timestamp (microseconds)
    pub timestamp_us: i64,
    /// Bytes of payload in the buffer
    pub bytes_used: usize,
    /// Nominal frame duration (microseconds), when the source knows it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame_duration_us: Option<u64>,
}

/// A finished frame as delivered by the capture source
#[derive(Debug, Clone)]
pub struct CompletedRequest {
    pub sequence: u64,
    /// Sensor timestamp (microseconds); used as the presentation timestamp
    pub timestamp_us: i64,
    pub data: FrameData,
    pub metadata: FrameMetadata,
    /// When the frame was dequeued, for latency diagnostics
    pub captured_at: Instant,
}

/// Shared handle to a completed request
pub type CompletedRequestPtr = Arc<CompletedRequest>;

impl CompletedRequest {
    pub fn new(sequence: u64, timestamp_us: i64, data: FrameData) -> Self {
        let metadata = FrameMetadata {
            sequence,
            timestamp_us,
            bytes_used: data.len(),
            frame_duration_us: None,
        };
        Self {
            sequence,
            timestamp_us,
            data,
            metadata,
            captured_at: Instant::now(),
        }
    }

    pub fn with_frame_duration(mut self, frame_duration_us: u64) -> Self {
        self.metadata.frame_duration_us = Some(frame_duration_us);
        self
    }

    pub fn into_ptr(self) -> CompletedRequestPtr {
        Arc::new(self)
    }
}

/// One message from the capture source; exactly one is consumed per loop iteration
#[derive(Debug, Clone)]
pub enum Message {
    /// No frame completed within the watchdog interval
    Timeout,
    /// A frame finished
    RequestComplete(CompletedRequestPtr),
    /// The source ended the session; nothing follows
    Quit,
    /// A message kind outside the source contract
    Unknown(u32),
}

impl Message {
    /// Short name for logging
    pub fn name(&self) -> &'static str {
        match self {
            Message::Timeout => "Timeout",
            Message::RequestComplete(_) => "RequestComplete",
            Message::Quit => "Quit",
            Message::Unknown(_) => "Unknown",
        }
    }
}
