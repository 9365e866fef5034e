// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands for camera operations
//!
//! This module provides command-line functionality for:
//! - Listing available cameras
//! - Recording encoded or raw video

use camera_vid::backends::camera::{create_source, list_devices};
use camera_vid::config::{Codec, Config, MetadataFormat, SourceKind};
use camera_vid::constants::{DEFAULT_SAVE_FOLDER, JpegQuality};
use camera_vid::control::{ControlSignals, install_signal_handlers};
use camera_vid::media::create_encoder;
use camera_vid::output::create_output;
use camera_vid::pipelines::video::{Orchestrator, TerminationPolicy};
use camera_vid::preview::NullPreview;
use chrono::Local;
use clap::Args;
use std::path::{Path, PathBuf};
use tracing::info;

/// Options shared by the `vid` and `raw` commands
#[derive(Args, Debug, Default, Clone)]
pub struct RecordArgs {
    /// Read defaults from a JSON configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Verbosity: 0 quiet, 1 normal, 2 debug
    #[arg(short, long)]
    pub verbose: Option<u8>,

    /// Stop after this many milliseconds (0 = no limit)
    #[arg(short, long)]
    pub timeout: Option<u64>,

    /// Stop after this many frames (0 = no limit); overrides --timeout
    #[arg(long)]
    pub frames: Option<u64>,

    /// Output codec: yuv420, mjpeg or raw
    #[arg(long)]
    pub codec: Option<Codec>,

    /// Enter splits the output, x or q stops
    #[arg(short, long)]
    pub keypress: bool,

    /// SIGUSR1 splits the output, SIGUSR2 stops
    #[arg(short, long)]
    pub signal: bool,

    /// Output file, '-' for stdout, 'auto' for ~/Videos/Camera
    #[arg(short, long)]
    pub output: Option<String>,

    /// Frame source: v4l2 or pattern
    #[arg(long, value_parser = ["v4l2", "pattern"])]
    pub source: Option<String>,

    /// V4L2 device node
    #[arg(short, long)]
    pub device: Option<String>,

    #[arg(long)]
    pub width: Option<u32>,

    #[arg(long)]
    pub height: Option<u32>,

    #[arg(long)]
    pub framerate: Option<u32>,

    /// Pixel format to request from the camera (e.g. YUYV, MJPG)
    #[arg(long)]
    pub pixel_format: Option<String>,

    /// Restart the camera when no frame arrives for this many milliseconds
    #[arg(long)]
    pub watchdog: Option<u64>,

    /// JPEG quality: low, medium, high or max
    #[arg(short, long)]
    pub quality: Option<JpegQuality>,

    /// Write per-frame metadata to this file
    #[arg(long)]
    pub metadata: Option<PathBuf>,

    /// Metadata layout: json or txt
    #[arg(long, value_parser = ["json", "txt"])]
    pub metadata_format: Option<String>,

    /// Write frame timestamps (timecode format v2) to this file
    #[arg(long)]
    pub save_pts: Option<PathBuf>,

    /// Do not show a preview
    #[arg(short, long)]
    pub nopreview: bool,
}

impl RecordArgs {
    /// Defaults, then the config file, then explicit flags
    pub fn into_config(self, raw: bool) -> Result<Config, Box<dyn std::error::Error>> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };

        if let Some(verbose) = self.verbose {
            config.verbose = verbose;
        }
        if let Some(timeout) = self.timeout {
            config.timeout_ms = timeout;
        }
        if let Some(frames) = self.frames {
            config.frames = frames;
        }
        if let Some(codec) = self.codec {
            config.codec = codec;
        }
        config.keypress |= self.keypress;
        config.signal |= self.signal;
        config.nopreview |= self.nopreview;

        if let Some(source) = self.source.as_deref() {
            config.source = match source {
                "pattern" => SourceKind::Pattern,
                _ => SourceKind::V4l2,
            };
        }
        if let Some(device) = self.device {
            config.device = device;
        }
        if let Some(width) = self.width {
            config.width = width;
        }
        if let Some(height) = self.height {
            config.height = height;
        }
        if let Some(framerate) = self.framerate {
            config.framerate = framerate;
        }
        if let Some(pixel_format) = self.pixel_format {
            config.pixel_format = pixel_format;
        }
        if let Some(watchdog) = self.watchdog {
            config.watchdog_ms = watchdog;
        }
        if let Some(quality) = self.quality {
            config.quality = quality;
        }
        if let Some(metadata) = self.metadata {
            config.metadata = Some(metadata);
        }
        if let Some(format) = self.metadata_format.as_deref() {
            config.metadata_format = match format {
                "txt" => MetadataFormat::Txt,
                _ => MetadataFormat::Json,
            };
        }
        if let Some(pts) = self.save_pts {
            config.save_pts = Some(pts);
        }

        if raw {
            config.codec = Codec::Raw;
            config.nopreview = true;
        }

        if let Some(output) = self.output {
            config.output = Some(resolve_output(&output, config.codec)?);
        }

        config.fourcc()?;
        Ok(config)
    }
}

/// Expand `auto` into a timestamped file in the default video folder
fn resolve_output(output: &str, codec: Codec) -> std::io::Result<PathBuf> {
    if output != "auto" {
        return Ok(PathBuf::from(output));
    }

    let dir = get_default_video_dir();
    std::fs::create_dir_all(&dir)?;
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    Ok(dir.join(format!("video_{}.{}", timestamp, codec.extension())))
}

/// Get default video directory
fn get_default_video_dir() -> PathBuf {
    dirs::video_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
        .join(DEFAULT_SAVE_FOLDER)
}

/// Record until a budget, a key, a signal or the camera ends the session
pub fn record_video(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    if config.verbose >= 2 {
        eprintln!("Options:\n{}", serde_json::to_string_pretty(config)?);
    }

    install_signal_handlers(config.signal)?;

    let source = create_source(config)?;
    let encoder = create_encoder(config);
    let output = create_output(config)?;
    let control = ControlSignals::new(config.keypress, config.signal);
    let policy = TerminationPolicy::from_config(config);

    let mut session = Orchestrator::new(source, encoder, output, control, policy, config);
    if config.preview_enabled() {
        session = session.with_preview(Box::new(NullPreview::new()));
    }

    if let Some(path) = config.output.as_deref().filter(|p| *p != Path::new("-")) {
        info!(path = %path.display(), codec = %config.codec, "Recording");
    }

    let reason = session.run()?;
    info!(
        %reason,
        frames = session.frame_index(),
        stalls = session.stall_count(),
        "Recording finished"
    );
    Ok(())
}

/// List all available cameras
pub fn list_cameras() -> Result<(), Box<dyn std::error::Error>> {
    let cameras = list_devices();

    if cameras.is_empty() {
        println!("No cameras found.");
        return Ok(());
    }

    println!("Available cameras:");
    println!();
    for camera in &cameras {
        println!("  [{}] {} ({})", camera.index, camera.name, camera.path);
    }
    println!();

    Ok(())
}
