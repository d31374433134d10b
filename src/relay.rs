//! Relay controller — the serialized facade over the channel table.
//!
//! Every state-changing operation (commands, routine steps, cutoff
//! expiries) runs under one lock, so a channel's mode, its physical
//! level and its timer generation always move together.
//!
//! ```text
//!   request ctx ─┐
//!   routine    ──┼──▶ RelayController ──lock──▶ ChannelTable ──▶ OutputPort
//!   dispatcher ──┘          │
//!                           └──▶ TimerPort.arm / cancel
//! ```
//!
//! Cutoff timers post onto the [`ExpiryQueue`]; the queue is drained at
//! the start of every facade call and by the optional dispatcher thread.
//! After draining, channels whose recorded deadline has already passed
//! are swept off as well, so a lost timer fire can delay a cutoff but
//! never suppress it.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use log::{debug, error, info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::{Clock, EventSink, OutputPort, TimerPort};
use crate::channels::{check_channel, ChannelMode, ChannelStatus, ChannelTable};
use crate::config::{ControllerConfig, NUM_CHANNELS};
use crate::drivers::task_pin::{self, EXPIRY_TASK};
use crate::error::{Error, Result};
use crate::safety::OnTimeLimits;
use crate::timer::{Expiry, ExpiryQueue};

/// Thread-safe owner of all relay channels.
pub struct RelayController<O> {
    table: Mutex<ChannelTable<O>>,
    timer: Box<dyn TimerPort + Send + Sync>,
    clock: Arc<dyn Clock + Send + Sync>,
    expiries: Arc<ExpiryQueue>,
    sink: Arc<dyn EventSink + Send + Sync>,
    limits: OnTimeLimits,
}

impl<O: OutputPort> RelayController<O> {
    /// Build the controller and drive every channel to off.
    ///
    /// `timer` must post its fires onto the same `expiries` queue.
    pub fn new(
        output: O,
        timer: Box<dyn TimerPort + Send + Sync>,
        clock: Arc<dyn Clock + Send + Sync>,
        expiries: Arc<ExpiryQueue>,
        sink: Arc<dyn EventSink + Send + Sync>,
        config: &ControllerConfig,
    ) -> Result<Self> {
        config.validate()?;
        let limits = OnTimeLimits::new(config);
        info!(
            "Relay: {} channels, max on-time {}s",
            NUM_CHANNELS,
            limits.max_on_secs()
        );
        Ok(Self {
            table: Mutex::new(ChannelTable::new(output)),
            timer,
            clock,
            expiries,
            sink,
            limits,
        })
    }

    // ── Commands ─────────────────────────────────────────────────

    /// Manual on.  Arms the cutoff at the maximum on-time; calling it on
    /// an already-on channel restarts that cutoff.
    pub fn turn_on(&self, channel: u8) -> Result<()> {
        let idx = check_channel(channel)?;
        let mut table = self.access();
        self.energize(&mut table, idx, ChannelMode::Manual, self.limits.max_on_secs())
    }

    /// Turn a channel off.  Idempotent.
    pub fn turn_off(&self, channel: u8) -> Result<()> {
        let idx = check_channel(channel)?;
        let mut table = self.access();
        self.release(&mut table, idx);
        Ok(())
    }

    /// Timed on.  `0` turns the channel off; anything above the maximum
    /// on-time is clamped.
    pub fn turn_on_timed(&self, channel: u8, secs: u32) -> Result<()> {
        let idx = check_channel(channel)?;
        let mut table = self.access();
        match self.limits.clamp_timed(secs) {
            Some(secs) => self.energize(&mut table, idx, ChannelMode::Timed, secs),
            None => {
                self.release(&mut table, idx);
                Ok(())
            }
        }
    }

    /// Flip a channel: off → manual on, anything else → off.
    ///
    /// The read and the write happen under one lock acquisition.
    pub fn toggle(&self, channel: u8) -> Result<ChannelMode> {
        let idx = check_channel(channel)?;
        let mut table = self.access();
        if table.mode(idx).is_on() {
            self.release(&mut table, idx);
        } else {
            self.energize(&mut table, idx, ChannelMode::Manual, self.limits.max_on_secs())?;
        }
        Ok(table.mode(idx))
    }

    /// Turn every channel off.
    pub fn all_off(&self) {
        let mut table = self.access();
        for idx in 0..NUM_CHANNELS {
            self.release(&mut table, idx);
        }
    }

    // ── Queries ──────────────────────────────────────────────────

    pub fn mode(&self, channel: u8) -> Result<ChannelMode> {
        let idx = check_channel(channel)?;
        Ok(self.access().mode(idx))
    }

    pub fn is_on(&self, channel: u8) -> Result<bool> {
        self.mode(channel).map(ChannelMode::is_on)
    }

    /// Whole seconds until the channel's cutoff; 0 when off.
    pub fn remaining_secs(&self, channel: u8) -> Result<u32> {
        self.status(channel).map(|s| s.remaining_secs)
    }

    pub fn status(&self, channel: u8) -> Result<ChannelStatus> {
        let idx = check_channel(channel)?;
        let table = self.access();
        Ok(table.status(idx, self.clock.now_ms()))
    }

    /// Consistent view of all channels, taken under one lock.
    pub fn snapshot(&self) -> [ChannelStatus; NUM_CHANNELS] {
        let table = self.access();
        let now = self.clock.now_ms();
        core::array::from_fn(|idx| table.status(idx, now))
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    pub fn limits(&self) -> &OnTimeLimits {
        &self.limits
    }

    // ── Expiry handling ──────────────────────────────────────────

    /// Apply one timer fire.  Stale fires are discarded.
    pub fn handle_expiry(&self, expiry: Expiry) {
        let mut table = self.lock();
        self.apply_expiry(&mut table, expiry);
    }

    /// Drain pending expiries and sweep overdue channels.
    pub fn poll_expiries(&self) {
        drop(self.access());
    }

    /// Spawn a thread that applies expiries as soon as they are posted.
    ///
    /// Without it, cutoffs are applied on the next facade call.
    pub fn spawn_expiry_dispatcher(self: &Arc<Self>) -> Result<JoinHandle<()>>
    where
        O: Send + 'static,
    {
        let this = Arc::clone(self);
        task_pin::spawn(&EXPIRY_TASK, move || {
            loop {
                let expiry = futures_lite::future::block_on(this.expiries.receive());
                this.handle_expiry(expiry);
            }
        })
    }

    // ── Internals ────────────────────────────────────────────────

    fn lock(&self) -> MutexGuard<'_, ChannelTable<O>> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Lock the table with pending expiries already applied.
    fn access(&self) -> MutexGuard<'_, ChannelTable<O>> {
        let mut table = self.lock();
        while let Ok(expiry) = self.expiries.try_receive() {
            self.apply_expiry(&mut table, expiry);
        }

        let now = self.clock.now_ms();
        let overdue: heapless::Vec<usize, NUM_CHANNELS> = table.overdue(now).collect();
        for idx in overdue {
            debug!("Relay {}: deadline passed before its timer fire, sweeping", idx);
            self.cut_off(&mut table, idx);
        }
        table
    }

    fn apply_expiry(&self, table: &mut ChannelTable<O>, expiry: Expiry) {
        let Ok(idx) = check_channel(expiry.channel) else {
            warn!("Relay: expiry for unknown channel {}", expiry.channel);
            return;
        };
        if !table.mode(idx).is_on() || table.generation(idx) != expiry.generation {
            debug!(
                "Relay {}: stale expiry (gen {} vs {})",
                idx,
                expiry.generation,
                table.generation(idx)
            );
            return;
        }
        self.cut_off(table, idx);
    }

    fn cut_off(&self, table: &mut ChannelTable<O>, idx: usize) {
        info!("Relay {}: cutoff timer expired, turning off", idx);
        table.set_off(idx);
        self.sink.emit(&AppEvent::CutoffFired { channel: idx as u8 });
        self.sink.emit(&AppEvent::ChannelChanged {
            channel: idx as u8,
            mode: ChannelMode::Off,
        });
    }

    fn energize(
        &self,
        table: &mut ChannelTable<O>,
        idx: usize,
        mode: ChannelMode,
        secs: u32,
    ) -> Result<()> {
        let channel = idx as u8;
        self.timer.cancel(channel);
        let generation = table.next_generation(idx);

        // Never leave a channel energised without a running cutoff.
        if let Err(e) = self
            .timer
            .arm(Expiry { channel, generation }, Duration::from_secs(u64::from(secs)))
        {
            error!("Relay {}: cutoff timer arm failed ({}), forcing off", idx, e);
            self.release(table, idx);
            return Err(Error::TimerUnavailable(channel));
        }

        let deadline = OnTimeLimits::deadline_ms(self.clock.now_ms(), secs);
        table.set_on(idx, mode, deadline);
        info!("Relay {}: ON ({:?}, {}s)", idx, mode, secs);
        self.sink.emit(&AppEvent::ChannelChanged { channel, mode });
        Ok(())
    }

    fn release(&self, table: &mut ChannelTable<O>, idx: usize) {
        let was_on = table.mode(idx).is_on();
        self.timer.cancel(idx as u8);
        table.set_off(idx);
        if was_on {
            info!("Relay {}: OFF", idx);
            self.sink.emit(&AppEvent::ChannelChanged {
                channel: idx as u8,
                mode: ChannelMode::Off,
            });
        }
    }
}
