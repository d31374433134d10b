//! Port traits — the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ RelayController / RoutineEngine (domain)
//! ```
//!
//! Driven adapters (relay outputs, one-shot timers, clocks, event sinks)
//! implement these traits.  The domain consumes them through generics or
//! trait objects, so the core never touches hardware directly and every
//! path can be exercised on the host with simulated time.
//!
//! ## Threading notes
//!
//! - **OutputPort** is only ever called with the channel-table lock held,
//!   so implementations need `Send` but not `Sync`.
//! - **TimerPort** callbacks must not touch channel state; they post an
//!   [`Expiry`](crate::timer::Expiry) onto the expiry queue instead.
//! - **EventSink** may be called from the routine worker and from request
//!   contexts concurrently.

use core::time::Duration;

use crate::error::{OutputError, TimerError};
use crate::timer::Expiry;

// ───────────────────────────────────────────────────────────────
// Output port (driven adapter: domain → relay coils)
// ───────────────────────────────────────────────────────────────

/// Write-side port: the domain calls this to set a channel's physical level.
pub trait OutputPort {
    /// Energise (`true`) or release (`false`) the relay for `channel`.
    ///
    /// Polarity is the adapter's concern; the domain only speaks in
    /// energised / de-energised.
    fn write(&mut self, channel: u8, energized: bool) -> Result<(), OutputError>;
}

// ───────────────────────────────────────────────────────────────
// Timer port (driven adapter: domain → one-shot timers)
// ───────────────────────────────────────────────────────────────

/// One one-shot timer per channel.
///
/// When a timer fires, the backend posts the `Expiry` it was armed with
/// onto the expiry queue.  Re-arming a channel replaces its previous
/// timer; a late fire from the replaced timer carries an old generation
/// and is discarded by the controller.
pub trait TimerPort {
    /// Arm (or re-arm) the timer for `expiry.channel` to fire after `after`.
    fn arm(&self, expiry: Expiry, after: Duration) -> Result<(), TimerError>;

    /// Disarm the channel's timer.  Harmless if it is not armed.
    fn cancel(&self, channel: u8);
}

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

/// Monotonic time source used for remaining-time reporting and routine
/// step bookkeeping.
pub trait Clock {
    /// Milliseconds since an arbitrary, fixed origin (usually boot).
    fn now_ms(&self) -> u64;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go (serial log, a
/// websocket push, a test recorder).
pub trait EventSink {
    fn emit(&self, event: &super::events::AppEvent);
}
