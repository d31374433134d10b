//! System configuration parameters
//!
//! Hardware shape (channel count, step capacity) is fixed at build time.
//! Timing and safety tunables live in [`ControllerConfig`], supplied once
//! when the controller is constructed and never mutated afterwards.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Number of independently switchable relay channels on the board.
pub const NUM_CHANNELS: usize = 4;

/// Maximum steps in a single routine; longer definitions are truncated.
pub const MAX_ROUTINE_STEPS: usize = 16;

/// Maximum label length (bytes) kept for routines and steps.
pub const MAX_LABEL_LEN: usize = 32;

/// Default hard cutoff for any energised channel (20 min).
pub const DEFAULT_MAX_ON_TIME_SECS: u32 = 1200;

/// Core timing and safety configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerConfig {
    // --- Safety ---
    /// Maximum time (seconds) any channel may stay energised
    pub max_on_time_secs: u32,

    // --- Routine engine ---
    /// Extra wait beyond a step's duration before the engine gives up on
    /// the timer and moves on (seconds)
    pub step_margin_secs: u32,
    /// Wait-loop poll interval; bounds skip/stop latency (milliseconds)
    pub poll_interval_ms: u32,
    /// Pause between consecutive routine steps (milliseconds)
    pub settle_delay_ms: u32,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            // Safety
            max_on_time_secs: DEFAULT_MAX_ON_TIME_SECS,

            // Routine engine
            step_margin_secs: 2,
            poll_interval_ms: 100, // 10 Hz
            settle_delay_ms: 500,
        }
    }
}

impl ControllerConfig {
    /// Reject values that would disable the cutoff or stall the engine.
    pub fn validate(&self) -> Result<()> {
        if self.max_on_time_secs == 0 {
            return Err(Error::Config("max_on_time_secs must be > 0"));
        }
        if self.poll_interval_ms == 0 {
            return Err(Error::Config("poll_interval_ms must be > 0"));
        }
        if self.step_margin_secs > self.max_on_time_secs {
            return Err(Error::Config("step_margin_secs exceeds max_on_time_secs"));
        }
        Ok(())
    }
}
