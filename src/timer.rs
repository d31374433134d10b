//! Timer expiry messages.
//!
//! Cutoff timers never touch channel state themselves.  They post an
//! [`Expiry`] onto a bounded queue; the relay controller consumes it on
//! the same serialized path as explicit commands.
//!
//! ```text
//! ┌──────────────┐               ┌──────────────┐     ┌─────────────────┐
//! │ esp_timer cb │──┐            │              │     │ RelayController │
//! │ sleeper thr. │──┼──Expiry──▶ │ ExpiryQueue  │────▶│ (table lock)    │
//! │ SimTime      │──┘            │ (embassy-sync)     │                 │
//! └──────────────┘               └──────────────┘     └─────────────────┘
//! ```
//!
//! Each arm of a channel's timer carries a fresh generation.  An expiry
//! whose generation no longer matches the channel's is stale (the channel
//! was re-armed or turned off since) and is dropped.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use log::warn;

/// Queue depth.  Four channels plus stale fires from re-armed host timers.
pub const EXPIRY_QUEUE_DEPTH: usize = 16;

/// A fired one-shot timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Expiry {
    pub channel: u8,
    pub generation: u32,
}

/// Bounded MPMC queue carrying expiries from timer contexts to the controller.
pub type ExpiryQueue = Channel<CriticalSectionRawMutex, Expiry, EXPIRY_QUEUE_DEPTH>;

/// Post an expiry without blocking.  Safe from timer-task context.
///
/// Returns `false` if the queue is full; the controller's deadline sweep
/// still cuts the channel off on its next access.
pub fn post(queue: &ExpiryQueue, expiry: Expiry) -> bool {
    if queue.try_send(expiry).is_err() {
        warn!(
            "Timer: expiry queue full, dropping fire for relay {} (gen {})",
            expiry.channel, expiry.generation
        );
        return false;
    }
    true
}
