// SPDX-License-Identifier: GPL-3.0-only

//! Session configuration
//!
//! A [`Config`] is built once (defaults, then an optional JSON file, then
//! command-line flags) and is read-only for the lifetime of a session.

use crate::backends::camera::types::{ColourSpace, StreamFlags};
use crate::constants::{
    DEFAULT_DEVICE, DEFAULT_FRAMERATE, DEFAULT_HEIGHT, DEFAULT_PIXEL_FORMAT,
    DEFAULT_WATCHDOG_TIMEOUT, DEFAULT_WIDTH, JpegQuality,
};
use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Output codec
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    /// Uncompressed frames as delivered by the camera
    #[default]
    Yuv420,
    /// Motion JPEG, one JPEG per frame
    Mjpeg,
    /// Raw sensor stream, no colour processing hint
    Raw,
}

impl Codec {
    /// File extension used for auto-generated output names
    pub fn extension(&self) -> &'static str {
        match self {
            Codec::Yuv420 => "yuv",
            Codec::Mjpeg => "mjpeg",
            Codec::Raw => "raw",
        }
    }
}

impl std::fmt::Display for Codec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Codec::Yuv420 => write!(f, "yuv420"),
            Codec::Mjpeg => write!(f, "mjpeg"),
            Codec::Raw => write!(f, "raw"),
        }
    }
}

impl std::str::FromStr for Codec {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "yuv420" => Ok(Codec::Yuv420),
            "mjpeg" => Ok(Codec::Mjpeg),
            "raw" => Ok(Codec::Raw),
            other => Err(ConfigError::UnknownCodec(other.to_string())),
        }
    }
}

/// Where frames come from
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// A V4L2 video capture node
    #[default]
    V4l2,
    /// Synthetic colour bars, no hardware needed
    Pattern,
}

/// Layout of the per-frame metadata file
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MetadataFormat {
    /// One JSON array, one object per frame
    #[default]
    Json,
    /// `key=value` lines, frames separated by a blank line
    Txt,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 0 = quiet, 1 = normal, 2 = debug
    pub verbose: u8,
    /// Time budget in milliseconds, 0 = unlimited
    pub timeout_ms: u64,
    /// Frame-count budget, 0 = unlimited
    pub frames: u64,
    pub codec: Codec,
    /// Read Enter / x / q from stdin
    pub keypress: bool,
    /// React to SIGUSR1 (split) and SIGUSR2 (quit)
    pub signal: bool,
    /// Output file, `-` for stdout, unset to discard
    pub output: Option<PathBuf>,
    pub source: SourceKind,
    /// V4L2 device node
    pub device: String,
    pub width: u32,
    pub height: u32,
    pub framerate: u32,
    /// FourCC requested from the device (e.g. "YUYV", "MJPG")
    pub pixel_format: String,
    /// Stall watchdog in milliseconds
    pub watchdog_ms: u64,
    pub quality: JpegQuality,
    /// Per-frame metadata file
    pub metadata: Option<PathBuf>,
    pub metadata_format: MetadataFormat,
    /// Frame timestamp file (timecode format v2)
    pub save_pts: Option<PathBuf>,
    /// Disable the preview path
    pub nopreview: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            verbose: 1,
            timeout_ms: 0,
            frames: 0,
            codec: Codec::default(),
            keypress: false,
            signal: false,
            output: None,
            source: SourceKind::default(),
            device: DEFAULT_DEVICE.to_string(),
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            framerate: DEFAULT_FRAMERATE,
            pixel_format: DEFAULT_PIXEL_FORMAT.to_string(),
            watchdog_ms: DEFAULT_WATCHDOG_TIMEOUT.as_millis() as u64,
            quality: JpegQuality::default(),
            metadata: None,
            metadata_format: MetadataFormat::default(),
            save_pts: None,
            nopreview: false,
        }
    }
}

impl Config {
    /// Load a configuration from a JSON file; missing fields take their defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&contents).map_err(|e| match e {
            ConfigError::Parse { message, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                message,
            },
            other => other,
        })
    }

    pub fn from_json(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_json::from_str(contents).map_err(|e| ConfigError::Parse {
            path: PathBuf::new(),
            message: e.to_string(),
        })?;
        config.fourcc()?;
        Ok(config)
    }

    pub fn time_budget(&self) -> Option<Duration> {
        (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms))
    }

    pub fn frame_budget(&self) -> Option<u64> {
        (self.frames > 0).then_some(self.frames)
    }

    pub fn watchdog(&self) -> Duration {
        if self.watchdog_ms == 0 {
            DEFAULT_WATCHDOG_TIMEOUT
        } else {
            Duration::from_millis(self.watchdog_ms)
        }
    }

    /// Colour-space hint derived from the codec
    pub fn colour_space(&self) -> ColourSpace {
        match self.codec {
            Codec::Mjpeg | Codec::Yuv420 => ColourSpace::Jpeg,
            Codec::Raw => ColourSpace::Raw,
        }
    }

    pub fn stream_flags(&self) -> StreamFlags {
        StreamFlags {
            colour_space: self.colour_space(),
            raw: self.codec == Codec::Raw,
        }
    }

    /// Requested pixel format as a four character code, space padded
    pub fn fourcc(&self) -> Result<[u8; 4], ConfigError> {
        let bytes = self.pixel_format.as_bytes();
        if bytes.is_empty() || bytes.len() > 4 || !self.pixel_format.is_ascii() {
            return Err(ConfigError::InvalidPixelFormat(self.pixel_format.clone()));
        }
        let mut code = [b' '; 4];
        code[..bytes.len()].copy_from_slice(bytes);
        Ok(code)
    }

    /// Whether frames should also be handed to a preview path
    pub fn preview_enabled(&self) -> bool {
        !self.nopreview && self.codec != Codec::Raw
    }
}
