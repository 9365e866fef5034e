// SPDX-License-Identifier: MPL-2.0

//! Camera video recorder
//!
//! This library provides the capture loop behind the `camera-vid` command:
//! it pulls completed frames from a camera, hands them to an encoder,
//! routes the encoded bytes to an output and decides frame by frame whether
//! to continue, restart a stalled device or stop.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`backends`]: Capture sources (V4L2, test pattern)
//! - [`media`]: Encoder strategies (pass-through, MJPEG)
//! - [`output`]: File, stdout and null sinks
//! - [`control`]: Keypresses and OS signals
//! - [`pipelines`]: The recording loop and its policies
//! - [`config`]: Session configuration
//!
//! # Example
//!
//! ```ignore
//! let config = Config::default();
//! let source = backends::camera::create_source(&config)?;
//! let encoder = media::create_encoder(&config);
//! let output = output::create_output(&config)?;
//! let mut session = Orchestrator::new(
//!     source,
//!     encoder,
//!     output,
//!     ControlSignals::new(config.keypress, config.signal),
//!     TerminationPolicy::from_config(&config),
//!     &config,
//! );
//! let reason = session.run()?;
//! ```

pub mod backends;
pub mod config;
pub mod constants;
pub mod control;
pub mod errors;
pub mod media;
pub mod output;
pub mod pipelines;
pub mod preview;

// Re-export commonly used types
pub use config::{Codec, Config};
pub use constants::JpegQuality;
pub use control::{Command, ControlSignals};
pub use errors::{CaptureError, ErrorKind};
pub use pipelines::video::{Orchestrator, TerminationPolicy, TerminationReason};
