//! Relay bank output driver.
//!
//! Maps logical channels onto digital output pins and applies the board's
//! coil polarity.  Implements [`OutputPort`], so the domain never sees
//! pin levels, only energised / released.

use embedded_hal::digital::{OutputPin, PinState};
use log::warn;

use crate::app::ports::OutputPort;
use crate::config::NUM_CHANNELS;
use crate::error::OutputError;
use crate::pins::Polarity;

/// All relay coils of the board.
pub struct RelayBank<P> {
    pins: [P; NUM_CHANNELS],
    polarity: Polarity,
}

impl<P: OutputPin> RelayBank<P> {
    pub fn new(pins: [P; NUM_CHANNELS], polarity: Polarity) -> Self {
        Self { pins, polarity }
    }
}

impl<P: OutputPin> OutputPort for RelayBank<P> {
    fn write(&mut self, channel: u8, energized: bool) -> Result<(), OutputError> {
        let pin = self
            .pins
            .get_mut(channel as usize)
            .ok_or(OutputError::Unmapped(channel))?;
        let state = PinState::from(self.polarity.level(energized));
        pin.set_state(state).map_err(|e| {
            warn!("Relay {}: pin error {:?}", channel, e);
            OutputError::PinWrite(channel)
        })
    }
}
