// SPDX-License-Identifier: MPL-2.0

//! When a recording ends
//!
//! A frame budget, when set, is the only budget that counts: a time budget
//! configured alongside it is ignored. A `Quit` command always ends the
//! recording.

use crate::config::Config;
use crate::control::Command;
use std::time::{Duration, Instant};

/// Why the capture loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    TimeElapsed,
    FrameBudgetReached,
    UserQuit,
    ProducerQuit,
}

impl std::fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            TerminationReason::TimeElapsed => "time budget elapsed",
            TerminationReason::FrameBudgetReached => "frame budget reached",
            TerminationReason::UserQuit => "stopped by user",
            TerminationReason::ProducerQuit => "capture source ended",
        };
        f.write_str(text)
    }
}

/// Source of "now" for the time budget
pub trait Clock {
    fn now(&self) -> Instant;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Budgets that end a recording
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TerminationPolicy {
    pub frame_budget: Option<u64>,
    pub time_budget: Option<Duration>,
}

impl TerminationPolicy {
    pub fn new(frame_budget: Option<u64>, time_budget: Option<Duration>) -> Self {
        Self {
            frame_budget,
            time_budget,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.frame_budget(), config.time_budget())
    }

    /// Whether the loop should end before handling the current frame
    ///
    /// Pure: depends only on its arguments.
    pub fn should_stop(
        &self,
        now: Instant,
        start: Instant,
        frame_index: u64,
        last_command: Command,
    ) -> Option<TerminationReason> {
        if self.frame_budget_reached(frame_index) {
            return Some(TerminationReason::FrameBudgetReached);
        }

        if self.frame_budget.is_none()
            && let Some(budget) = self.time_budget
            && now.saturating_duration_since(start) > budget
        {
            return Some(TerminationReason::TimeElapsed);
        }

        if last_command == Command::Quit {
            return Some(TerminationReason::UserQuit);
        }

        None
    }

    pub fn frame_budget_reached(&self, frame_index: u64) -> bool {
        self.frame_budget.is_some_and(|budget| frame_index >= budget)
    }
}
