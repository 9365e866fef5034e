// SPDX-License-Identifier: GPL-3.0-only

//! Output sinks for encoded video
//!
//! The sink is shared between the encoder callbacks (which may run on an
//! encoder thread) and the orchestrator (which asks for new segments).

pub mod file;
pub mod null;

pub use file::FileOutput;
pub use null::NullOutput;

use crate::backends::camera::types::FrameMetadata;
use crate::config::Config;
use crate::errors::{OutputError, OutputResult};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Destination for encoded frames and their metadata
pub trait Output: Send {
    /// One encoded frame
    fn output_ready(&mut self, data: &[u8], timestamp_us: i64, keyframe: bool)
    -> OutputResult<()>;

    /// Metadata of one encoded frame
    fn metadata_ready(&mut self, metadata: &FrameMetadata) -> OutputResult<()>;

    /// Begin a new segment. Sinks may defer the cut to the next keyframe.
    fn start_new_segment(&mut self) -> OutputResult<()>;

    /// Flush and finalize everything written so far
    fn close(&mut self) -> OutputResult<()>;
}

/// Output sink shared between the orchestrator and encoder callbacks
pub type SharedOutput = Arc<Mutex<Box<dyn Output>>>;

/// Wrap a sink for sharing
pub fn shared<O: Output + 'static>(output: O) -> SharedOutput {
    Arc::new(Mutex::new(Box::new(output)))
}

/// Run `f` with the sink locked
pub fn with_output<T>(
    output: &SharedOutput,
    f: impl FnOnce(&mut dyn Output) -> OutputResult<T>,
) -> OutputResult<T> {
    let mut guard = output.lock().map_err(|_| OutputError::Poisoned)?;
    f(guard.as_mut())
}

/// Build the sink described by the configuration
pub fn create_output(config: &Config) -> OutputResult<SharedOutput> {
    let Some(path) = config.output.as_deref() else {
        return Ok(shared(NullOutput::default()));
    };

    let mut output = if path == Path::new("-") {
        FileOutput::stdout()
    } else {
        FileOutput::create(path)?
    };

    if let Some(pts) = &config.save_pts {
        output = output.with_pts(pts)?;
    }
    if let Some(metadata) = &config.metadata {
        output = output.with_metadata(metadata, config.metadata_format)?;
    }

    Ok(shared(output))
}
