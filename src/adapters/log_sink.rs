//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (which goes to UART / USB-CDC in production).
//! A websocket push adapter would implement the same trait.

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&self, event: &AppEvent) {
        match event {
            AppEvent::ChannelChanged { channel, mode } => {
                info!("RELAY | ch={} mode={:?}", channel, mode);
            }
            AppEvent::CutoffFired { channel } => {
                warn!("RELAY | ch={} safety cutoff", channel);
            }
            AppEvent::RoutineStarted { label, steps } => {
                info!("ROUTINE | '{}' started, {} steps", label, steps);
            }
            AppEvent::StepStarted {
                index,
                channel,
                duration_secs,
            } => {
                info!("ROUTINE | step {} -> ch={} for {}s", index, channel, duration_secs);
            }
            AppEvent::StepSkipped { index } => {
                info!("ROUTINE | step {} skipped", index);
            }
            AppEvent::RoutineCompleted { label } => {
                info!("ROUTINE | '{}' completed", label);
            }
            AppEvent::RoutineStopped { label } => {
                info!("ROUTINE | '{}' stopped", label);
            }
            AppEvent::RoutineRejected { label } => {
                warn!("ROUTINE | '{}' rejected, another routine is running", label);
            }
        }
    }
}
