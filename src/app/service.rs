//! Relay service — the control facade consumed by the command source.
//!
//! [`RelayService`] owns the routine engine and shares the relay
//! controller with it.  It exposes a clean, hardware-agnostic API; all
//! I/O flows through the port traits the controller was built with.
//!
//! ```text
//!  HTTP / console ──▶ ┌──────────────────────────┐ ──▶ EventSink
//!                     │       RelayService       │
//!   OutputPort    ◀── │ RelayController · Engine │ ◀── TimerPort
//!                     └──────────────────────────┘
//! ```

use std::sync::Arc;

use embedded_hal::delay::DelayNs;
use log::{info, warn};
use serde::Serialize;

use crate::channels::{ChannelMode, ChannelStatus};
use crate::config::{ControllerConfig, NUM_CHANNELS};
use crate::definitions::StoredRoutine;
use crate::error::{Error, Result};
use crate::relay::RelayController;
use crate::routine::{Routine, RoutineEngine, RoutineStatus};

use super::commands::{AppCommand, CommandReply, RelayAction};
use super::ports::{EventSink, OutputPort};

/// Everything the status endpoint reports, taken in one call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SystemStatus {
    pub relays: [ChannelStatus; NUM_CHANNELS],
    pub routine: RoutineStatus,
}

impl SystemStatus {
    /// JSON payload for the status endpoint.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            warn!("Status serialisation failed: {}", e);
            String::from("{}")
        })
    }
}

// ───────────────────────────────────────────────────────────────
// RelayService
// ───────────────────────────────────────────────────────────────

pub struct RelayService<O, D> {
    relays: Arc<RelayController<O>>,
    routines: RoutineEngine<O, D>,
}

impl<O, D> RelayService<O, D>
where
    O: OutputPort + Send + 'static,
    D: DelayNs + Clone + Send + 'static,
{
    pub fn new(
        relays: Arc<RelayController<O>>,
        delay: D,
        config: &ControllerConfig,
        sink: Arc<dyn EventSink + Send + Sync>,
    ) -> Self {
        let routines = RoutineEngine::new(Arc::clone(&relays), delay, config, sink);
        info!("RelayService ready");
        Self { relays, routines }
    }

    // ── Channel commands ──────────────────────────────────────

    pub fn turn_on(&self, channel: u8) -> Result<()> {
        self.relays.turn_on(channel)
    }

    pub fn turn_off(&self, channel: u8) -> Result<()> {
        self.relays.turn_off(channel)
    }

    pub fn turn_on_timed(&self, channel: u8, secs: u32) -> Result<()> {
        self.relays.turn_on_timed(channel, secs)
    }

    pub fn toggle(&self, channel: u8) -> Result<ChannelMode> {
        self.relays.toggle(channel)
    }

    pub fn channel_status(&self, channel: u8) -> Result<ChannelStatus> {
        self.relays.status(channel)
    }

    // ── Routine commands ──────────────────────────────────────

    pub fn start_routine(&self, routine: Routine) -> Result<()> {
        self.routines.start(routine)
    }

    /// Start routine `index` of a parsed definitions document.
    pub fn start_routine_from_document(&self, doc: &[StoredRoutine], index: usize) -> Result<()> {
        let stored = doc
            .get(index)
            .ok_or(Error::Definition("routine index out of range"))?;
        self.routines.start(stored.to_routine())
    }

    pub fn stop_routine(&self) -> bool {
        self.routines.stop()
    }

    pub fn skip_step(&self) -> bool {
        self.routines.skip_step()
    }

    pub fn routine_status(&self) -> RoutineStatus {
        self.routines.status()
    }

    // ── Status ────────────────────────────────────────────────

    pub fn status(&self) -> SystemStatus {
        SystemStatus {
            relays: self.relays.snapshot(),
            routine: self.routines.status(),
        }
    }

    /// Execute one command and return the resulting status.
    pub fn handle_command(&self, cmd: AppCommand) -> Result<CommandReply> {
        match cmd {
            AppCommand::Relay { channel, action } => {
                match action {
                    RelayAction::On => self.turn_on(channel)?,
                    RelayAction::Off => self.turn_off(channel)?,
                    RelayAction::Toggle => {
                        self.toggle(channel)?;
                    }
                    RelayAction::Timed { secs } => self.turn_on_timed(channel, secs)?,
                }
                self.channel_status(channel).map(CommandReply::Channel)
            }
            AppCommand::StartRoutine(routine) => {
                self.start_routine(routine)?;
                Ok(CommandReply::Routine(self.routine_status()))
            }
            AppCommand::StopRoutine => {
                self.stop_routine();
                Ok(CommandReply::Routine(self.routine_status()))
            }
            AppCommand::SkipStep => {
                self.skip_step();
                Ok(CommandReply::Routine(self.routine_status()))
            }
            AppCommand::Status => Ok(CommandReply::System(self.status())),
        }
    }
}
