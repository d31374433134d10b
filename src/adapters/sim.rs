//! Simulated time for host runs.
//!
//! [`SimTime`] is a manually advanced clock that doubles as the one-shot
//! timer backend: armed timers are kept in a pending list and posted onto
//! the expiry queue when [`SimTime::advance`] moves past their due time.
//! [`SimDelay`] lets the routine worker drive the same clock, so a
//! twenty-minute routine runs in a few milliseconds of wall time.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use embedded_hal::delay::DelayNs;

use crate::app::ports::{Clock, TimerPort};
use crate::error::TimerError;
use crate::timer::{self, Expiry, ExpiryQueue};

#[derive(Debug, Clone, Copy)]
struct Pending {
    expiry: Expiry,
    due_ms: u64,
}

struct SimInner {
    now_ms: AtomicU64,
    pending: Mutex<Vec<Pending>>,
    expiries: Arc<ExpiryQueue>,
}

/// Shared simulated clock + timer backend.  Clones share state.
#[derive(Clone)]
pub struct SimTime {
    inner: Arc<SimInner>,
}

impl SimTime {
    pub fn new(expiries: Arc<ExpiryQueue>) -> Self {
        Self {
            inner: Arc::new(SimInner {
                now_ms: AtomicU64::new(0),
                pending: Mutex::new(Vec::new()),
                expiries,
            }),
        }
    }

    pub fn now_ms(&self) -> u64 {
        self.inner.now_ms.load(Ordering::SeqCst)
    }

    /// Move the clock forward and fire every timer that came due,
    /// earliest first.
    pub fn advance(&self, by: Duration) {
        let mut pending = self.pending();
        let step = u64::try_from(by.as_millis()).unwrap_or(u64::MAX);
        let now = self
            .inner
            .now_ms
            .fetch_add(step, Ordering::SeqCst)
            .saturating_add(step);

        let mut due: Vec<Pending> = Vec::new();
        pending.retain(|p| {
            if p.due_ms <= now {
                due.push(*p);
                false
            } else {
                true
            }
        });
        due.sort_by_key(|p| p.due_ms);
        for p in due {
            timer::post(&self.inner.expiries, p.expiry);
        }
    }

    pub fn advance_secs(&self, secs: u64) {
        self.advance(Duration::from_secs(secs));
    }

    /// Whether `channel` has a timer waiting to fire.
    pub fn armed(&self, channel: u8) -> bool {
        self.pending().iter().any(|p| p.expiry.channel == channel)
    }

    fn pending(&self) -> std::sync::MutexGuard<'_, Vec<Pending>> {
        self.inner.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Clock for SimTime {
    fn now_ms(&self) -> u64 {
        SimTime::now_ms(self)
    }
}

impl TimerPort for SimTime {
    fn arm(&self, expiry: Expiry, after: Duration) -> Result<(), TimerError> {
        let mut pending = self.pending();
        pending.retain(|p| p.expiry.channel != expiry.channel);
        let after_ms = u64::try_from(after.as_millis()).unwrap_or(u64::MAX);
        pending.push(Pending {
            expiry,
            due_ms: self.now_ms().saturating_add(after_ms),
        });
        Ok(())
    }

    fn cancel(&self, channel: u8) {
        self.pending().retain(|p| p.expiry.channel != channel);
    }
}

/// Blocking delay that advances a [`SimTime`] instead of sleeping.
///
/// Each call also yields for `real_tick` of wall time so other threads
/// (the test body, a stop request) get to run between polls.
#[derive(Clone)]
pub struct SimDelay {
    time: SimTime,
    real_tick: Duration,
}

impl SimDelay {
    pub fn new(time: SimTime) -> Self {
        Self {
            time,
            real_tick: Duration::from_millis(1),
        }
    }

    pub fn with_real_tick(mut self, tick: Duration) -> Self {
        self.real_tick = tick;
        self
    }
}

impl DelayNs for SimDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.time.advance(Duration::from_nanos(u64::from(ns)));
        std::thread::sleep(self.real_tick);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.time.advance(Duration::from_millis(u64::from(ms)));
        std::thread::sleep(self.real_tick);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_only_when_due() {
        let q = Arc::new(ExpiryQueue::new());
        let t = SimTime::new(q.clone());
        t.arm(Expiry { channel: 0, generation: 1 }, Duration::from_secs(5))
            .unwrap();
        t.advance_secs(4);
        assert!(q.try_receive().is_err());
        t.advance_secs(1);
        assert_eq!(q.try_receive().ok(), Some(Expiry { channel: 0, generation: 1 }));
        assert!(!t.armed(0));
    }

    #[test]
    fn rearm_replaces_and_cancel_clears() {
        let q = Arc::new(ExpiryQueue::new());
        let t = SimTime::new(q.clone());
        t.arm(Expiry { channel: 1, generation: 1 }, Duration::from_secs(1))
            .unwrap();
        t.arm(Expiry { channel: 1, generation: 2 }, Duration::from_secs(3))
            .unwrap();
        t.advance_secs(2);
        assert!(q.try_receive().is_err());
        t.cancel(1);
        t.advance_secs(5);
        assert!(q.try_receive().is_err());
    }

    #[test]
    fn delay_advances_clock() {
        let q = Arc::new(ExpiryQueue::new());
        let t = SimTime::new(q);
        let mut d = SimDelay::new(t.clone()).with_real_tick(Duration::ZERO);
        d.delay_ms(250);
        d.delay_ms(250);
        assert_eq!(t.now_ms(), 500);
    }
}
