//! On-time safety bounds.
//!
//! Every energised channel carries a hard cutoff.  Manual activation arms
//! the cutoff at the maximum on-time; timed activation and routine steps
//! arm it at their (clamped) duration.  This module owns the arithmetic:
//!
//! 1. A timed request of 0 s means "turn off", not an error.
//! 2. Requests above the maximum are clamped, never rejected.
//! 3. Remaining time is `deadline − now`, floored at 0.

use log::warn;

use crate::config::ControllerConfig;

/// Clamping and deadline arithmetic for channel on-time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OnTimeLimits {
    max_on_secs: u32,
}

impl OnTimeLimits {
    pub fn new(config: &ControllerConfig) -> Self {
        Self {
            max_on_secs: config.max_on_time_secs.max(1),
        }
    }

    /// Cutoff used for manual activation.
    pub fn max_on_secs(&self) -> u32 {
        self.max_on_secs
    }

    /// Resolve a timed-on request.  `None` means the request is a turn-off.
    pub fn clamp_timed(&self, requested_secs: u32) -> Option<u32> {
        if requested_secs == 0 {
            return None;
        }
        Some(self.clamp_step(requested_secs))
    }

    /// Clamp a duration to `[.., max_on_secs]`, logging when it bites.
    pub fn clamp_step(&self, secs: u32) -> u32 {
        if secs > self.max_on_secs {
            warn!(
                "Safety: requested {}s exceeds {}s cutoff, clamping",
                secs, self.max_on_secs
            );
            return self.max_on_secs;
        }
        secs
    }

    /// Absolute deadline for a session of `secs` starting at `now_ms`.
    pub fn deadline_ms(now_ms: u64, secs: u32) -> u64 {
        now_ms.saturating_add(u64::from(secs) * 1000)
    }

    /// Whole seconds left until `deadline_ms`, floored at 0.
    pub fn remaining_secs(deadline_ms: u64, now_ms: u64) -> u32 {
        let left = deadline_ms.saturating_sub(now_ms) / 1000;
        u32::try_from(left).unwrap_or(u32::MAX)
    }
}
