// SPDX-License-Identifier: GPL-3.0-only

//! Motion JPEG encoder
//!
//! Frames are compressed on one worker thread fed by a bounded queue, so
//! output order always matches submission order. Buffers that are already
//! JPEG (MJPG cameras) are passed through without re-encoding.

use super::{Encoder, EncoderCallbacks};
use crate::backends::camera::format_converters::frame_to_rgb;
use crate::backends::camera::frame_loop::{CaptureLoopController, LoopAction};
use crate::backends::camera::types::{CompletedRequestPtr, PixelFormat, StreamInfo};
use crate::constants::ENCODE_QUEUE_DEPTH;
use crate::errors::{EncoderError, EncoderResult};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender};
use tracing::{debug, error, info};

struct EncodeJob {
    request: CompletedRequestPtr,
    stream: StreamInfo,
}

pub struct MjpegEncoder {
    quality: u8,
    queue: Option<SyncSender<EncodeJob>>,
    worker: Option<CaptureLoopController>,
    failures: Arc<AtomicU64>,
}

impl MjpegEncoder {
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
            queue: None,
            worker: None,
            failures: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Frames that could not be compressed and were skipped
    pub fn failed_frames(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}

impl Encoder for MjpegEncoder {
    fn name(&self) -> &'static str {
        "mjpeg"
    }

    fn start(&mut self, callbacks: EncoderCallbacks) -> EncoderResult<()> {
        if self.worker.is_some() {
            return Ok(());
        }

        let (sender, receiver) = mpsc::sync_channel(ENCODE_QUEUE_DEPTH);
        let mut worker = EncodeWorker {
            receiver,
            callbacks,
            quality: self.quality,
            failures: Arc::clone(&self.failures),
        };

        self.worker = Some(CaptureLoopController::start("mjpeg-encode", move || {
            worker.run_one()
        }));
        self.queue = Some(sender);
        info!(quality = self.quality, "MJPEG encoder started");
        Ok(())
    }

    fn stop(&mut self) -> EncoderResult<()> {
        // Closing the queue lets the worker drain what is left, then exit
        self.queue.take();
        if let Some(mut worker) = self.worker.take() {
            worker.join();
            info!(failed = self.failed_frames(), "MJPEG encoder stopped");
        }
        Ok(())
    }

    fn encode(&mut self, request: &CompletedRequestPtr, stream: &StreamInfo) -> EncoderResult<()> {
        if let PixelFormat::Other(_) = stream.pixel_format {
            return Err(EncoderError::UnsupportedFormat(stream.pixel_format.to_string()));
        }

        let queue = self.queue.as_ref().ok_or(EncoderError::NotRunning)?;
        queue
            .send(EncodeJob {
                request: Arc::clone(request),
                stream: *stream,
            })
            .map_err(|_| EncoderError::WorkerGone("queue closed".to_string()))
    }
}

impl Drop for MjpegEncoder {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

struct EncodeWorker {
    receiver: Receiver<EncodeJob>,
    callbacks: EncoderCallbacks,
    quality: u8,
    failures: Arc<AtomicU64>,
}

impl EncodeWorker {
    fn run_one(&mut self) -> LoopAction {
        let Ok(job) = self.receiver.recv() else {
            return LoopAction::Stop;
        };

        match encode_frame(&job.request.data, &job.stream, self.quality) {
            Ok(jpeg) => {
                (self.callbacks.output_ready)(&jpeg, job.request.timestamp_us, true);
                (self.callbacks.metadata_ready)(&job.request.metadata);
            }
            Err(e) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                error!(sequence = job.request.sequence, error = %e, "Dropping frame");
            }
        }
        LoopAction::Continue
    }
}

/// Compress one frame to JPEG, or pass it through if it already is one
pub fn encode_frame(data: &[u8], stream: &StreamInfo, quality: u8) -> EncoderResult<Vec<u8>> {
    if stream.pixel_format == PixelFormat::MJPEG {
        debug!(bytes = data.len(), "Passing through MJPEG frame");
        return Ok(data.to_vec());
    }

    let rgb = frame_to_rgb(data, stream).ok_or_else(|| {
        EncoderError::EncodingFailed(format!(
            "{} bytes do not hold a {} frame",
            data.len(),
            stream
        ))
    })?;

    let expected = stream.width as usize * stream.height as usize * 3;
    if rgb.len() != expected {
        return Err(EncoderError::EncodingFailed(format!(
            "converted {} RGB bytes, expected {} for {}",
            rgb.len(),
            expected,
            stream
        )));
    }

    let mut buffer = Vec::new();
    let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buffer, quality);
    encoder
        .encode(
            &rgb,
            stream.width,
            stream.height,
            image::ExtendedColorType::Rgb8,
        )
        .map_err(|e| EncoderError::EncodingFailed(format!("JPEG encoding failed: {}", e)))?;

    Ok(buffer)
}
