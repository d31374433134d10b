//! Channel state table.
//!
//! Authoritative record of every relay channel: its mode, the deadline
//! of its cutoff timer, and the timer generation.  There is no separate
//! on/off flag; a channel is on exactly when its mode is not `Off`, and
//! the physical level is written in the same call that changes the mode.
//!
//! The table itself is not thread-safe; [`RelayController`](crate::relay::RelayController)
//! wraps it in a single mutex.

use log::{debug, warn};
use serde::Serialize;

use crate::app::ports::OutputPort;
use crate::config::NUM_CHANNELS;
use crate::error::{Error, Result};
use crate::safety::OnTimeLimits;

/// Operating mode of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelMode {
    /// De-energised.
    #[default]
    Off,
    /// On without an explicit duration; protected by the max-on cutoff.
    Manual,
    /// On for an explicit, bounded duration.
    Timed,
}

impl ChannelMode {
    pub fn is_on(self) -> bool {
        self != Self::Off
    }
}

/// Per-channel status as exposed to the command source.
///
/// Serialises to the web UI's shape:
/// `{"id":0,"state":"on","mode":"timed","rem":42}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChannelStatus {
    pub id: u8,
    #[serde(rename = "state", serialize_with = "on_off")]
    pub energized: bool,
    pub mode: ChannelMode,
    #[serde(rename = "rem")]
    pub remaining_secs: u32,
}

fn on_off<S: serde::Serializer>(energized: &bool, s: S) -> core::result::Result<S::Ok, S::Error> {
    s.serialize_str(if *energized { "on" } else { "off" })
}

/// Internal bookkeeping for one channel.
#[derive(Debug, Clone, Copy, Default)]
struct ChannelSlot {
    mode: ChannelMode,
    /// Cutoff deadline (clock ms); `Some` only while on.
    deadline_ms: Option<u64>,
    /// Bumped on every arm and every turn-off.
    generation: u32,
}

/// Validate a channel index from any entry point.
pub fn check_channel(channel: u8) -> Result<usize> {
    let idx = channel as usize;
    if idx < NUM_CHANNELS {
        Ok(idx)
    } else {
        Err(Error::InvalidChannel(channel))
    }
}

/// The channel state table plus the output it drives.
pub struct ChannelTable<O> {
    output: O,
    slots: [ChannelSlot; NUM_CHANNELS],
}

impl<O: OutputPort> ChannelTable<O> {
    /// Create the table with every channel de-energised.
    pub fn new(mut output: O) -> Self {
        for ch in 0..NUM_CHANNELS as u8 {
            if let Err(e) = output.write(ch, false) {
                warn!("Relay {}: initial release failed: {}", ch, e);
            }
        }
        Self {
            output,
            slots: [ChannelSlot::default(); NUM_CHANNELS],
        }
    }

    pub fn mode(&self, idx: usize) -> ChannelMode {
        self.slots[idx].mode
    }

    pub fn generation(&self, idx: usize) -> u32 {
        self.slots[idx].generation
    }

    /// Start a new timer session and return its generation.
    pub fn next_generation(&mut self, idx: usize) -> u32 {
        let slot = &mut self.slots[idx];
        slot.generation = slot.generation.wrapping_add(1);
        slot.generation
    }

    /// Energise the channel and record its mode and cutoff deadline.
    pub fn set_on(&mut self, idx: usize, mode: ChannelMode, deadline_ms: u64) {
        self.write_level(idx, true);
        let slot = &mut self.slots[idx];
        slot.mode = mode;
        slot.deadline_ms = Some(deadline_ms);
    }

    /// De-energise the channel.  Invalidates any in-flight expiry.
    pub fn set_off(&mut self, idx: usize) {
        self.write_level(idx, false);
        let slot = &mut self.slots[idx];
        slot.mode = ChannelMode::Off;
        slot.deadline_ms = None;
        slot.generation = slot.generation.wrapping_add(1);
    }

    pub fn status(&self, idx: usize, now_ms: u64) -> ChannelStatus {
        let slot = &self.slots[idx];
        let remaining_secs = match (slot.mode, slot.deadline_ms) {
            (ChannelMode::Off, _) | (_, None) => 0,
            (_, Some(deadline)) => OnTimeLimits::remaining_secs(deadline, now_ms),
        };
        ChannelStatus {
            id: idx as u8,
            energized: slot.mode.is_on(),
            mode: slot.mode,
            remaining_secs,
        }
    }

    /// Channels that are on but whose deadline has already passed.
    pub fn overdue(&self, now_ms: u64) -> impl Iterator<Item = usize> + '_ {
        self.slots.iter().enumerate().filter_map(move |(idx, slot)| {
            let late = slot.mode.is_on() && slot.deadline_ms.is_some_and(|d| d <= now_ms);
            late.then_some(idx)
        })
    }

    // Best-effort: the relay has no feedback path, so a failed write is
    // logged and the recorded mode still follows the request.
    fn write_level(&mut self, idx: usize, energized: bool) {
        match self.output.write(idx as u8, energized) {
            Ok(()) => debug!("Relay {}: level -> {}", idx, if energized { "ON" } else { "OFF" }),
            Err(e) => warn!("Relay {}: output write failed: {}", idx, e),
        }
    }
}
