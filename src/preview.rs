// SPDX-License-Identifier: GPL-3.0-only

//! Viewfinder path
//!
//! A preview receives the same buffer handle as the encoder. It keeps its
//! own reference for as long as it needs the pixels.

use crate::backends::camera::types::{CompletedRequestPtr, StreamInfo};

/// Something that displays frames while they are being recorded
pub trait Preview {
    fn show(&mut self, request: &CompletedRequestPtr, stream: &StreamInfo);
}

/// Preview that only counts what it was shown
#[derive(Debug, Default)]
pub struct NullPreview {
    shown: u64,
}

impl NullPreview {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shown(&self) -> u64 {
        self.shown
    }
}

impl Preview for NullPreview {
    fn show(&mut self, _request: &CompletedRequestPtr, _stream: &StreamInfo) {
        self.shown += 1;
    }
}
