//! Outbound application events.
//!
//! The relay controller and routine engine emit these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them (log to serial, push to a web
//! client, record in a test).

use crate::channels::ChannelMode;
use crate::routine::Label;

/// Structured events emitted by the core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    /// A channel's mode changed (including Off).
    ChannelChanged { channel: u8, mode: ChannelMode },

    /// A channel's cutoff timer expired and forced it off.
    CutoffFired { channel: u8 },

    /// A routine run was accepted and its worker started.
    RoutineStarted { label: Label, steps: usize },

    /// The routine worker activated a step.
    StepStarted {
        index: usize,
        channel: u8,
        duration_secs: u32,
    },

    /// The current step was cut short by a skip request.
    StepSkipped { index: usize },

    /// The routine ran every step to the end.
    RoutineCompleted { label: Label },

    /// The routine was cancelled by a stop request.
    RoutineStopped { label: Label },

    /// A start request was rejected because another routine is running.
    RoutineRejected { label: Label },
}
