//! Unified error types for the RelayNode firmware.
//!
//! A single `Error` enum that every subsystem converts into, keeping the
//! request-facing error handling uniform.  All variants are `Copy` so they
//! can be returned across the facade without allocation.
//!
//! Not everything that "goes wrong" is an error here:
//!
//! - a zero duration on a timed request means "turn off";
//! - durations above the safety bound are clamped, not rejected;
//! - stop/skip while no routine runs are harmless no-ops.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible core operation funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Channel index outside `[0, NUM_CHANNELS)`.  Never mutates state.
    InvalidChannel(u8),
    /// `start` while a routine is already running; the running one is untouched.
    RoutineAlreadyRunning,
    /// The channel's cutoff timer could not be armed; the channel was left off.
    TimerUnavailable(u8),
    /// Unrecognised action keyword from the command source.
    UnknownAction,
    /// Routine definition document is malformed or the index is out of range.
    Definition(&'static str),
    /// Configuration failed validation.
    Config(&'static str),
    /// The routine worker thread could not be spawned.
    Spawn,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidChannel(ch) => write!(f, "invalid channel {ch}"),
            Self::RoutineAlreadyRunning => write!(f, "a routine is already running"),
            Self::TimerUnavailable(ch) => write!(f, "cutoff timer unavailable for channel {ch}"),
            Self::UnknownAction => write!(f, "unknown action"),
            Self::Definition(msg) => write!(f, "routine definition: {msg}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Spawn => write!(f, "routine task spawn failed"),
        }
    }
}

impl core::error::Error for Error {}

// ---------------------------------------------------------------------------
// Port errors
// ---------------------------------------------------------------------------

/// Failure writing a physical output level.  Best-effort: logged, never
/// propagated to callers, since the channel has no feedback path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputError {
    /// The pin driver reported a failed level change for this channel.
    PinWrite(u8),
    /// The driver has no pin for this channel.
    Unmapped(u8),
}

impl fmt::Display for OutputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PinWrite(ch) => write!(f, "pin write failed for channel {ch}"),
            Self::Unmapped(ch) => write!(f, "no pin mapped for channel {ch}"),
        }
    }
}

/// Failure arming a per-channel one-shot timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerError {
    /// The timer backend has no slot for this channel.
    NoSlot(u8),
    /// The backend refused to start the timer (ESP-IDF return code).
    StartFailed(i32),
    /// Host backend could not spawn its sleeper thread.
    SpawnFailed,
}

impl fmt::Display for TimerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoSlot(ch) => write!(f, "no timer slot for channel {ch}"),
            Self::StartFailed(rc) => write!(f, "timer start failed (rc={rc})"),
            Self::SpawnFailed => write!(f, "timer thread spawn failed"),
        }
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
