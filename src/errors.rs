// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the capture session
//!
//! Each collaborator has its own error enum. [`CaptureError`] is what a
//! session returns to its caller; [`ErrorKind`] lets callers tell a broken
//! producer apart from an unavailable device without matching on messages.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using CaptureError
pub type CaptureResult<T> = Result<T, CaptureError>;

/// Result type for capture source operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Result type for encoder operations
pub type EncoderResult<T> = Result<T, EncoderError>;

/// Result type for output sink operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Errors reported by a capture source
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// Camera device not found
    #[error("Device not found: {0}")]
    DeviceNotFound(String),
    /// Failed to open or initialize the device
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),
    /// The device rejected the requested stream configuration
    #[error("Format not supported: {0}")]
    FormatNotSupported(String),
    /// Starting the stream failed
    #[error("Failed to start capture: {0}")]
    StartFailed(String),
    /// Stopping the stream failed
    #[error("Failed to stop capture: {0}")]
    StopFailed(String),
    /// Operation issued in the wrong session phase
    #[error("Invalid state: {0}")]
    InvalidState(String),
    /// General I/O error
    #[error("I/O error: {0}")]
    IoError(String),
}

/// Errors reported by an encoder
#[derive(Debug, Clone, Error)]
pub enum EncoderError {
    /// Encoder was used before `start` or after `stop`
    #[error("Encoder not running")]
    NotRunning,
    /// Pixel format the encoder cannot consume
    #[error("Unsupported input format: {0}")]
    UnsupportedFormat(String),
    /// Compression failed
    #[error("Encoding failed: {0}")]
    EncodingFailed(String),
    /// The worker thread went away
    #[error("Encoder worker stopped: {0}")]
    WorkerGone(String),
}

/// Errors reported by an output sink
#[derive(Debug, Error)]
pub enum OutputError {
    /// Could not create an output file
    #[error("Failed to create {path}: {source}")]
    Create {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Writing or flushing failed
    #[error("Write failed: {0}")]
    Write(#[from] std::io::Error),
    /// Metadata could not be serialized
    #[error("Metadata serialization failed: {0}")]
    Metadata(#[from] serde_json::Error),
    /// Data arrived after the sink was closed
    #[error("Output already closed")]
    Closed,
    /// The shared sink lock was poisoned by a panicking holder
    #[error("Output sink poisoned")]
    Poisoned,
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Unknown codec: {0}")]
    UnknownCodec(String),

    #[error("Invalid pixel format: {0} (expected a four character code)")]
    InvalidPixelFormat(String),
}

/// Session-ending error returned by the orchestrator
#[derive(Debug, Error)]
pub enum CaptureError {
    /// The capture source produced a message kind outside its contract
    #[error("unrecognised message (kind {kind}) from capture source")]
    ProtocolViolation { kind: u32 },
    /// Restarting the device after a stall failed
    #[error("device restart after timeout failed: {0}")]
    RecoveryFailed(BackendError),
    /// Opening, configuring or driving the capture source failed
    #[error("camera error: {0}")]
    Backend(#[from] BackendError),
    /// Encoder failure
    #[error("encoder error: {0}")]
    Encoder(#[from] EncoderError),
    /// Output sink failure
    #[error("output error: {0}")]
    Output(#[from] OutputError),
}

/// Coarse classification of a [`CaptureError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    ProtocolViolation,
    RecoveryFailure,
    Device,
    Encoder,
    Output,
}

impl CaptureError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CaptureError::ProtocolViolation { .. } => ErrorKind::ProtocolViolation,
            CaptureError::RecoveryFailed(_) => ErrorKind::RecoveryFailure,
            CaptureError::Backend(_) => ErrorKind::Device,
            CaptureError::Encoder(_) => ErrorKind::Encoder,
            CaptureError::Output(_) => ErrorKind::Output,
        }
    }
}

impl From<std::io::Error> for BackendError {
    fn from(err: std::io::Error) -> Self {
        BackendError::IoError(err.to_string())
    }
}
