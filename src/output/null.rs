// SPDX-License-Identifier: GPL-3.0-only

use super::Output;
use crate::backends::camera::types::FrameMetadata;
use crate::errors::OutputResult;
use tracing::debug;

/// Discards everything, keeping only counters
#[derive(Debug, Default)]
pub struct NullOutput {
    pub frames: u64,
    pub bytes: u64,
    pub segments: u32,
}

impl Output for NullOutput {
    fn output_ready(&mut self, data: &[u8], _timestamp_us: i64, _keyframe: bool) -> OutputResult<()> {
        self.frames += 1;
        self.bytes += data.len() as u64;
        Ok(())
    }

    fn metadata_ready(&mut self, _metadata: &FrameMetadata) -> OutputResult<()> {
        Ok(())
    }

    fn start_new_segment(&mut self) -> OutputResult<()> {
        self.segments += 1;
        Ok(())
    }

    fn close(&mut self) -> OutputResult<()> {
        debug!(frames = self.frames, bytes = self.bytes, "Discarded output");
        Ok(())
    }
}
