// SPDX-License-Identifier: MPL-2.0

//! Capture pipelines
//!
//! # Pipeline Architecture
//!
//! ```text
//! ┌──────────────┐     ┌───────────────────┐     ┌──────────────┐     ┌──────────────┐
//! │ Capture      │ ──▶ │  Orchestrator     │ ──▶ │   Encoder    │ ──▶ │    Output    │
//! │ (V4L2 /      │     │  - termination    │     │ (null/MJPEG) │     │ (file/stdout)│
//! │  pattern)    │     │  - recovery       │     └──────────────┘     └──────▲───────┘
//! └──────────────┘     │  - keys/signals   │ ── segment splits ──────────────┘
//!                      └───────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`video`]: The recording loop and its policies

pub mod video;
