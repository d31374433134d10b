//! Inbound commands to the relay service.
//!
//! These represent actions requested by the outside world (HTTP handlers,
//! a serial console) that the [`RelayService`](super::service::RelayService)
//! interprets and acts upon.  Request-shape validation stays with the
//! caller; keyword parsing lives here so every front end agrees on it.

use crate::channels::ChannelStatus;
use crate::error::{Error, Result};
use crate::routine::{Routine, RoutineStatus};

use super::service::SystemStatus;

/// What to do with one relay channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayAction {
    On,
    Off,
    Toggle,
    /// Timed on; `secs == 0` turns the channel off.
    Timed { secs: u32 },
}

impl RelayAction {
    /// Map an action keyword (`on`, `off`, `toggle`, `timed`).
    ///
    /// `timed` without a duration is treated as duration 0.
    pub fn parse(keyword: &str, duration_secs: Option<u32>) -> Result<Self> {
        match keyword {
            "on" => Ok(Self::On),
            "off" => Ok(Self::Off),
            "toggle" => Ok(Self::Toggle),
            "timed" => Ok(Self::Timed {
                secs: duration_secs.unwrap_or(0),
            }),
            _ => Err(Error::UnknownAction),
        }
    }
}

/// Routine control keywords.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutineAction {
    Start,
    Stop,
    Skip,
}

impl RoutineAction {
    pub fn parse(keyword: &str) -> Result<Self> {
        match keyword {
            "start" => Ok(Self::Start),
            "stop" => Ok(Self::Stop),
            "skip" => Ok(Self::Skip),
            _ => Err(Error::UnknownAction),
        }
    }
}

/// Commands that external adapters can send into the core.
#[derive(Debug, Clone)]
pub enum AppCommand {
    /// Act on one relay channel.
    Relay { channel: u8, action: RelayAction },

    /// Start a routine (rejected while another is running).
    StartRoutine(Routine),

    /// Stop the running routine and turn every channel off.
    StopRoutine,

    /// End the current routine step early.
    SkipStep,

    /// Full status snapshot.
    Status,
}

impl AppCommand {
    /// Build the routine command for an action keyword.  `start` needs the
    /// routine to run; `stop` and `skip` ignore it.
    pub fn for_routine(action: RoutineAction, routine: Option<Routine>) -> Result<Self> {
        match action {
            RoutineAction::Start => routine
                .map(Self::StartRoutine)
                .ok_or(Error::Definition("start without a routine")),
            RoutineAction::Stop => Ok(Self::StopRoutine),
            RoutineAction::Skip => Ok(Self::SkipStep),
        }
    }
}

/// Status returned after a successful command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandReply {
    Channel(ChannelStatus),
    Routine(RoutineStatus),
    System(SystemStatus),
}
