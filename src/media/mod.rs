// SPDX-License-Identifier: GPL-3.0-only

//! Media processing
//!
//! # Modules
//!
//! - [`encoders`]: encoder strategies driven by the capture orchestrator

pub mod encoders;

// Re-export commonly used types
pub use encoders::{Encoder, EncoderCallbacks, MjpegEncoder, NullEncoder, create_encoder};
