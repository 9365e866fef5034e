// SPDX-License-Identifier: MPL-2.0

//! Backend abstraction layer for camera capture
//!
//! This module provides the capture sources the recording loop pulls
//! frames from:
//! - V4L2 devices through memory-mapped streaming
//! - A synthetic colour-bar pattern for running without hardware
//!
//! # Modules
//!
//! - [`camera`]: Capture source trait, message types and implementations

pub mod camera;
