// SPDX-License-Identifier: MPL-2.0

//! Video recording loop
//!
//! This module provides the single capture loop used by every recording
//! mode, together with the policies it consults each iteration:
//! - [`termination`]: frame budget, time budget and quit commands
//! - [`recovery`]: restarting the device after a watchdog timeout

pub mod orchestrator;
pub mod recovery;
pub mod termination;

pub use orchestrator::{Orchestrator, SessionState, Step};
pub use recovery::{FaultRecovery, RecoveryOutcome};
pub use termination::{Clock, SystemClock, TerminationPolicy, TerminationReason};
