//! GPIO / peripheral pin assignments for the RelayNode main board.
//!
//! Single source of truth: every driver references this module rather than
//! hard-coding pin numbers.  Change a pin here and it propagates everywhere.

use crate::config::NUM_CHANNELS;

// ---------------------------------------------------------------------------
// Relay outputs
// ---------------------------------------------------------------------------

/// Relay coil drive pins, indexed by logical channel.
pub const RELAY_GPIOS: [i32; NUM_CHANNELS] = [4, 5, 6, 7];

/// Which GPIO level energises a relay coil.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    /// HIGH = energised (plain transistor driver).
    ActiveHigh,
    /// LOW = energised (opto-isolated relay modules).
    ActiveLow,
}

impl Polarity {
    /// GPIO level (true = HIGH) that produces the requested relay state.
    pub const fn level(self, energized: bool) -> bool {
        match self {
            Self::ActiveHigh => energized,
            Self::ActiveLow => !energized,
        }
    }
}

/// Board polarity, selected at build time with the `active-low` feature.
#[cfg(feature = "active-low")]
pub const RELAY_POLARITY: Polarity = Polarity::ActiveLow;

/// Board polarity, selected at build time with the `active-low` feature.
#[cfg(not(feature = "active-low"))]
pub const RELAY_POLARITY: Polarity = Polarity::ActiveHigh;
