// SPDX-License-Identifier: GPL-3.0-only

//! Encoder strategies
//!
//! The orchestrator drives a single loop and is generic over [`Encoder`].
//! Encoders report results through two callbacks registered at start:
//! "output ready" for encoded bytes and "metadata ready" for per-frame
//! metadata. Both are forwarded verbatim to the output sink.

pub mod mjpeg;
pub mod null;

pub use mjpeg::MjpegEncoder;
pub use null::NullEncoder;

use crate::backends::camera::types::{CompletedRequestPtr, FrameMetadata, StreamInfo};
use crate::config::{Codec, Config};
use crate::errors::EncoderResult;
use crate::output::SharedOutput;
use tracing::error;

/// Called with (bytes, timestamp in µs, keyframe) for every encoded frame
pub type OutputReadyCallback = Box<dyn FnMut(&[u8], i64, bool) + Send>;

/// Called with the metadata of every encoded frame
pub type MetadataReadyCallback = Box<dyn FnMut(&FrameMetadata) + Send>;

/// The two callbacks an encoder reports through
pub struct EncoderCallbacks {
    pub output_ready: OutputReadyCallback,
    pub metadata_ready: MetadataReadyCallback,
}

impl EncoderCallbacks {
    pub fn new(output_ready: OutputReadyCallback, metadata_ready: MetadataReadyCallback) -> Self {
        Self {
            output_ready,
            metadata_ready,
        }
    }

    /// Callbacks that hand everything to a shared output sink
    ///
    /// Callbacks may run on an encoder thread, so sink errors are logged
    /// here rather than returned.
    pub fn forward_to(output: SharedOutput) -> Self {
        let for_metadata = output.clone();
        Self {
            output_ready: Box::new(move |bytes, timestamp_us, keyframe| {
                let result = match output.lock() {
                    Ok(mut sink) => sink.output_ready(bytes, timestamp_us, keyframe),
                    Err(_) => Err(crate::errors::OutputError::Poisoned),
                };
                if let Err(e) = result {
                    error!(error = %e, "Failed to write encoded frame");
                }
            }),
            metadata_ready: Box::new(move |metadata| {
                let result = match for_metadata.lock() {
                    Ok(mut sink) => sink.metadata_ready(metadata),
                    Err(_) => Err(crate::errors::OutputError::Poisoned),
                };
                if let Err(e) = result {
                    error!(error = %e, "Failed to write frame metadata");
                }
            }),
        }
    }
}

/// A video encoder strategy
pub trait Encoder {
    /// Short name for logging
    fn name(&self) -> &'static str;

    /// Register callbacks and get ready to accept frames
    fn start(&mut self, callbacks: EncoderCallbacks) -> EncoderResult<()>;

    /// Flush pending frames and release resources
    fn stop(&mut self) -> EncoderResult<()>;

    /// Queue one frame. Must not block longer than about one frame interval.
    ///
    /// Implementations clone the handle if they need the pixels after
    /// returning; the caller drops its own reference right away.
    fn encode(&mut self, request: &CompletedRequestPtr, stream: &StreamInfo) -> EncoderResult<()>;
}

impl<T: Encoder + ?Sized> Encoder for Box<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn start(&mut self, callbacks: EncoderCallbacks) -> EncoderResult<()> {
        (**self).start(callbacks)
    }

    fn stop(&mut self) -> EncoderResult<()> {
        (**self).stop()
    }

    fn encode(&mut self, request: &CompletedRequestPtr, stream: &StreamInfo) -> EncoderResult<()> {
        (**self).encode(request, stream)
    }
}

/// Select the encoder for the configured codec
pub fn create_encoder(config: &Config) -> Box<dyn Encoder> {
    match config.codec {
        Codec::Mjpeg => Box::new(MjpegEncoder::new(config.quality.value())),
        Codec::Yuv420 | Codec::Raw => Box::new(NullEncoder::new()),
    }
}
