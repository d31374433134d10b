//! Per-channel one-shot cutoff timers on ESP-IDF's esp_timer API.
//!
//! One esp_timer per relay channel, created once at boot.  Arming records
//! the session (generation and due time) in the channel's slot and
//! (re)starts the timer; the callback posts `Expiry { channel, generation }`
//! onto the expiry queue and returns.
//!
//! `esp_timer_stop` does not wait for a callback that is already running,
//! so a fire of the previous session can overlap the next arm.  The
//! callback only posts when the recorded session is actually due; an
//! overlapping fire sees either the old session (stale, dropped by the
//! controller) or the new one not yet due (ignored).
//!
//! Timer callbacks execute in the ESP timer task context (not ISR), so
//! they can safely use the embassy-sync channel's critical section.
//!
//! Host builds use [`ThreadTimer`](crate::adapters::thread_timer::ThreadTimer)
//! or [`SimTime`](crate::adapters::sim::SimTime) instead.

use crate::timer::Expiry;

#[cfg(target_os = "espidf")]
pub use esp::EspOneShotTimers;

/// The session a channel's timer was last armed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArmedSession {
    pub generation: u32,
    /// esp_timer clock (µs since boot).
    pub due_us: i64,
}

/// Expiry to post for a fire observed at `now_us`, if the armed session
/// is due.
pub fn due_expiry(channel: u8, armed: Option<ArmedSession>, now_us: i64) -> Option<Expiry> {
    armed
        .filter(|a| now_us >= a.due_us)
        .map(|a| Expiry {
            channel,
            generation: a.generation,
        })
}

#[cfg(target_os = "espidf")]
mod esp {
    use core::time::Duration;
    use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

    use esp_idf_svc::sys::*;
    use log::{error, info};

    use crate::app::ports::TimerPort;
    use crate::config::NUM_CHANNELS;
    use crate::error::TimerError;
    use crate::timer::{self, Expiry, ExpiryQueue};

    use super::{due_expiry, ArmedSession};

    const TIMER_NAMES: [&[u8]; NUM_CHANNELS] = [b"relay0\0", b"relay1\0", b"relay2\0", b"relay3\0"];

    struct TimerSlot {
        channel: u8,
        armed: Mutex<Option<ArmedSession>>,
        handle: esp_timer_handle_t,
        queue: Arc<ExpiryQueue>,
    }

    // SAFETY: the handle is only passed to esp_timer_* functions, which are
    // thread-safe; the session is behind a mutex and the queue is Sync.
    unsafe impl Send for TimerSlot {}
    unsafe impl Sync for TimerSlot {}

    impl TimerSlot {
        fn armed(&self) -> MutexGuard<'_, Option<ArmedSession>> {
            self.armed.lock().unwrap_or_else(PoisonError::into_inner)
        }
    }

    fn now_us() -> i64 {
        // SAFETY: esp_timer_get_time has no preconditions once the system is up.
        unsafe { esp_timer_get_time() }
    }

    unsafe extern "C" fn cutoff_cb(arg: *mut core::ffi::c_void) {
        // SAFETY: `arg` is the leaked `&'static TimerSlot` registered in `new`.
        let slot = unsafe { &*(arg as *const TimerSlot) };
        let armed = *slot.armed();
        if let Some(expiry) = due_expiry(slot.channel, armed, now_us()) {
            timer::post(&slot.queue, expiry);
        }
    }

    /// esp_timer-backed [`TimerPort`].
    pub struct EspOneShotTimers {
        slots: [&'static TimerSlot; NUM_CHANNELS],
    }

    impl EspOneShotTimers {
        /// Create one stopped timer per channel.  Called once from `main()`.
        pub fn new(queue: &Arc<ExpiryQueue>) -> Result<Self, TimerError> {
            let mut slots: heapless::Vec<&'static TimerSlot, NUM_CHANNELS> = heapless::Vec::new();
            for ch in 0..NUM_CHANNELS as u8 {
                // Slots live for the whole program; the timer keeps a raw
                // pointer to them.
                let slot: &'static mut TimerSlot = Box::leak(Box::new(TimerSlot {
                    channel: ch,
                    armed: Mutex::new(None),
                    handle: core::ptr::null_mut(),
                    queue: Arc::clone(queue),
                }));
                let args = esp_timer_create_args_t {
                    callback: Some(cutoff_cb),
                    arg: core::ptr::from_mut(slot).cast(),
                    dispatch_method: esp_timer_dispatch_t_ESP_TIMER_TASK,
                    name: TIMER_NAMES[ch as usize].as_ptr().cast(),
                    skip_unhandled_events: true,
                };
                // SAFETY: `args` outlives the call; `slot.handle` is written once here.
                let ret = unsafe { esp_timer_create(&args, &mut slot.handle) };
                if ret != ESP_OK as i32 {
                    error!("hw_timer: relay {} timer create failed (rc={})", ch, ret);
                    return Err(TimerError::StartFailed(ret));
                }
                if slots.push(slot).is_err() {
                    return Err(TimerError::NoSlot(ch));
                }
            }
            let slots = slots
                .into_array()
                .map_err(|_| TimerError::NoSlot(NUM_CHANNELS as u8))?;
            info!("hw_timer: {} cutoff timers created", NUM_CHANNELS);
            Ok(Self { slots })
        }

        fn slot(&self, channel: u8) -> Result<&'static TimerSlot, TimerError> {
            self.slots
                .get(channel as usize)
                .copied()
                .ok_or(TimerError::NoSlot(channel))
        }
    }

    impl TimerPort for EspOneShotTimers {
        fn arm(&self, expiry: Expiry, after: Duration) -> Result<(), TimerError> {
            let slot = self.slot(expiry.channel)?;
            // SAFETY: handle was created in `new` and is never deleted.
            unsafe { esp_timer_stop(slot.handle) };
            let us = u64::try_from(after.as_micros()).unwrap_or(u64::MAX);
            // Recorded before the start, so the real fire is never early.
            *slot.armed() = Some(ArmedSession {
                generation: expiry.generation,
                due_us: now_us().saturating_add(i64::try_from(us).unwrap_or(i64::MAX)),
            });
            // SAFETY: as above.
            let ret = unsafe { esp_timer_start_once(slot.handle, us) };
            if ret != ESP_OK as i32 {
                *slot.armed() = None;
                return Err(TimerError::StartFailed(ret));
            }
            Ok(())
        }

        fn cancel(&self, channel: u8) {
            if let Ok(slot) = self.slot(channel) {
                *slot.armed() = None;
                // ESP_ERR_INVALID_STATE just means it was not running.
                // SAFETY: handle was created in `new` and is never deleted.
                unsafe { esp_timer_stop(slot.handle) };
            }
        }
    }
}
