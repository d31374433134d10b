//! Host one-shot timer backend.
//!
//! One sleeper thread per channel, started on the channel's first arm and
//! kept for the life of the [`ThreadTimer`].  Arming replaces the
//! sleeper's pending expiry and wakes it; cancelling clears it.  A
//! replaced or cancelled session therefore never posts, and the thread
//! count stays at one per channel however often a relay is re-armed.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::app::ports::TimerPort;
use crate::config::NUM_CHANNELS;
use crate::error::TimerError;
use crate::timer::{self, Expiry, ExpiryQueue};

#[derive(Debug, Default)]
struct Pending {
    next: Option<(Expiry, Instant)>,
    started: bool,
    closed: bool,
}

#[derive(Debug, Default)]
struct Sleeper {
    pending: Mutex<Pending>,
    wake: Condvar,
}

impl Sleeper {
    fn lock(&self) -> MutexGuard<'_, Pending> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn run(&self, queue: &ExpiryQueue) {
        let mut pending = self.lock();
        loop {
            if pending.closed {
                return;
            }
            match pending.next {
                None => {
                    pending = self.wake.wait(pending).unwrap_or_else(PoisonError::into_inner);
                }
                Some((expiry, due)) => {
                    let now = Instant::now();
                    if now >= due {
                        pending.next = None;
                        drop(pending);
                        timer::post(queue, expiry);
                        pending = self.lock();
                    } else {
                        pending = self
                            .wake
                            .wait_timeout(pending, due - now)
                            .unwrap_or_else(PoisonError::into_inner)
                            .0;
                    }
                }
            }
        }
    }
}

/// Sleeper-thread timers for host runs.
pub struct ThreadTimer {
    expiries: Arc<ExpiryQueue>,
    sleepers: [Arc<Sleeper>; NUM_CHANNELS],
}

impl ThreadTimer {
    pub fn new(expiries: Arc<ExpiryQueue>) -> Self {
        Self {
            expiries,
            sleepers: core::array::from_fn(|_| Arc::new(Sleeper::default())),
        }
    }

    fn sleeper(&self, channel: u8) -> Result<&Arc<Sleeper>, TimerError> {
        self.sleepers
            .get(channel as usize)
            .ok_or(TimerError::NoSlot(channel))
    }

    fn start_sleeper(&self, channel: u8, sleeper: &Arc<Sleeper>) -> Result<(), TimerError> {
        let queue = Arc::clone(&self.expiries);
        let worker = Arc::clone(sleeper);
        std::thread::Builder::new()
            .name(format!("relay{channel}-timer"))
            .spawn(move || worker.run(&queue))
            .map(drop)
            .map_err(|e| {
                warn!("Timer: sleeper spawn failed for relay {}: {}", channel, e);
                TimerError::SpawnFailed
            })
    }
}

impl TimerPort for ThreadTimer {
    fn arm(&self, expiry: Expiry, after: Duration) -> Result<(), TimerError> {
        let sleeper = self.sleeper(expiry.channel)?;
        let mut pending = sleeper.lock();
        if !pending.started {
            self.start_sleeper(expiry.channel, sleeper)?;
            pending.started = true;
        }
        pending.next = Some((expiry, Instant::now() + after));
        sleeper.wake.notify_one();
        Ok(())
    }

    fn cancel(&self, channel: u8) {
        if let Ok(sleeper) = self.sleeper(channel) {
            sleeper.lock().next = None;
            sleeper.wake.notify_one();
        }
    }
}

impl Drop for ThreadTimer {
    fn drop(&mut self) {
        for sleeper in &self.sleepers {
            let mut pending = sleeper.lock();
            pending.next = None;
            pending.closed = true;
            sleeper.wake.notify_one();
        }
        debug!("Timer: sleepers released");
    }
}
