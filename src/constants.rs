// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How long `next_message` waits for a completed frame before reporting a stall
pub const DEFAULT_WATCHDOG_TIMEOUT: Duration = Duration::from_millis(1000);

/// Number of mmap buffers requested from a V4L2 device
pub const CAPTURE_BUFFER_COUNT: u32 = 4;

/// Completed requests that may queue between a capture thread and the orchestrator
pub const MESSAGE_CHANNEL_DEPTH: usize = 8;

/// Frames that may queue in front of a threaded encoder
pub const ENCODE_QUEUE_DEPTH: usize = 4;

/// Poll interval used by capture threads so a stop request is seen promptly
pub const CAPTURE_POLL_INTERVAL: Duration = Duration::from_millis(200);

pub const DEFAULT_WIDTH: u32 = 640;
pub const DEFAULT_HEIGHT: u32 = 480;
pub const DEFAULT_FRAMERATE: u32 = 30;
pub const DEFAULT_PIXEL_FORMAT: &str = "YUYV";
pub const DEFAULT_DEVICE: &str = "/dev/video0";

/// Default folder name for saving videos
pub const DEFAULT_SAVE_FOLDER: &str = "Camera";

/// JPEG quality presets for the MJPEG encoder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JpegQuality {
    /// Smaller segments, visible artefacts
    Low,
    /// Balanced quality and size (default)
    #[default]
    Medium,
    High,
    Maximum,
}

impl JpegQuality {
    /// All presets, lowest quality first
    pub const ALL: [JpegQuality; 4] = [
        JpegQuality::Low,
        JpegQuality::Medium,
        JpegQuality::High,
        JpegQuality::Maximum,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            JpegQuality::Low => "Low",
            JpegQuality::Medium => "Medium",
            JpegQuality::High => "High",
            JpegQuality::Maximum => "Maximum",
        }
    }

    /// Quality factor handed to the JPEG encoder (1-100)
    pub fn value(&self) -> u8 {
        match self {
            JpegQuality::Low => 60,
            JpegQuality::Medium => 80,
            JpegQuality::High => 92,
            JpegQuality::Maximum => 98,
        }
    }
}

impl std::str::FromStr for JpegQuality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(JpegQuality::Low),
            "medium" => Ok(JpegQuality::Medium),
            "high" => Ok(JpegQuality::High),
            "max" | "maximum" => Ok(JpegQuality::Maximum),
            other => Err(format!("unknown quality preset '{}'", other)),
        }
    }
}
