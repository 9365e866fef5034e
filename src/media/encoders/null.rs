// SPDX-License-Identifier: GPL-3.0-only

//! Pass-through encoder
//!
//! Hands the camera buffer to the output unchanged. Used for raw and
//! uncompressed YUV recordings, where every frame is a keyframe.

use super::{Encoder, EncoderCallbacks};
use crate::backends::camera::types::{CompletedRequestPtr, StreamInfo};
use crate::errors::{EncoderError, EncoderResult};
use tracing::debug;

#[derive(Default)]
pub struct NullEncoder {
    callbacks: Option<EncoderCallbacks>,
    frames: u64,
}

impl NullEncoder {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Encoder for NullEncoder {
    fn name(&self) -> &'static str {
        "null"
    }

    fn start(&mut self, callbacks: EncoderCallbacks) -> EncoderResult<()> {
        self.callbacks = Some(callbacks);
        self.frames = 0;
        Ok(())
    }

    fn stop(&mut self) -> EncoderResult<()> {
        if self.callbacks.take().is_some() {
            debug!(frames = self.frames, "Null encoder stopped");
        }
        Ok(())
    }

    fn encode(&mut self, request: &CompletedRequestPtr, _stream: &StreamInfo) -> EncoderResult<()> {
        let callbacks = self.callbacks.as_mut().ok_or(EncoderError::NotRunning)?;
        (callbacks.output_ready)(&request.data, request.timestamp_us, true);
        (callbacks.metadata_ready)(&request.metadata);
        self.frames += 1;
        Ok(())
    }
}
