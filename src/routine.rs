//! Routine engine — single-flight sequential step executor.
//!
//! A routine is an ordered list of `(channel, duration, label)` steps.
//! The engine runs at most one routine at a time on a dedicated worker
//! thread, activating one channel per step through the relay controller:
//!
//! ```text
//!            start()                       last step done
//!   ┌──────┐ ───────▶ ┌─────────────────┐ ───────────────▶ ┌──────┐
//!   │ Idle │          │ Running(step i) │                  │ Idle │
//!   └──────┘ ◀─────── └─────────────────┘                  └──────┘
//!             stop()      │          ▲
//!                         └──────────┘
//!            skip / channel went off / margin elapsed → step i+1
//! ```
//!
//! The worker waits cooperatively: each poll it checks the stop flag, the
//! skip flag, the channel's mode and the step's deadline, then sleeps for
//! one poll interval.  Stop and skip are therefore observed within one
//! poll interval.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;

use embedded_hal::delay::DelayNs;
use log::{debug, info, warn};
use serde::Serialize;

use crate::app::events::AppEvent;
use crate::app::ports::{EventSink, OutputPort};
use crate::config::{ControllerConfig, MAX_LABEL_LEN, MAX_ROUTINE_STEPS};
use crate::drivers::task_pin::{self, ROUTINE_TASK};
use crate::error::{Error, Result};
use crate::relay::RelayController;

/// Bounded routine / step label.
pub type Label = heapless::String<MAX_LABEL_LEN>;

/// Build a [`Label`], truncating at a char boundary if `text` is too long.
pub fn make_label(text: &str) -> Label {
    let mut label = Label::new();
    for c in text.chars() {
        if label.push(c).is_err() {
            break;
        }
    }
    label
}

// ───────────────────────────────────────────────────────────────
// Routine definition
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutineStep {
    pub channel: u8,
    pub duration_secs: u32,
    pub label: Label,
}

/// An ordered list of steps, at most [`MAX_ROUTINE_STEPS`] long.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Routine {
    pub label: Label,
    pub steps: heapless::Vec<RoutineStep, MAX_ROUTINE_STEPS>,
}

impl Routine {
    pub fn new(label: &str) -> Self {
        Self {
            label: make_label(label),
            steps: heapless::Vec::new(),
        }
    }

    /// Append a step.  Steps beyond the capacity are dropped with a warning.
    pub fn push_step(&mut self, channel: u8, duration_secs: u32, label: &str) -> bool {
        let step = RoutineStep {
            channel,
            duration_secs,
            label: make_label(label),
        };
        if self.steps.push(step).is_err() {
            warn!(
                "Routine '{}': more than {} steps, dropping '{}'",
                self.label, MAX_ROUTINE_STEPS, label
            );
            return false;
        }
        true
    }

    /// Builder form of [`push_step`](Self::push_step).
    #[must_use]
    pub fn with_step(mut self, channel: u8, duration_secs: u32, label: &str) -> Self {
        self.push_step(channel, duration_secs, label);
        self
    }
}

// ───────────────────────────────────────────────────────────────
// Status snapshot
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepStatus {
    #[serde(rename = "name")]
    pub label: Label,
    pub channel_id: u8,
    pub duration_secs: u32,
    /// Rounded up, so a 90 s step reads as 2 min.
    pub duration_minutes: u32,
}

/// Routine status; key names follow the web UI (`name`, `currentStep`,
/// `numSteps`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutineStatus {
    pub running: bool,
    #[serde(rename = "name")]
    pub label: Label,
    /// Index of the executing step; `None` while idle.
    pub current_step: Option<usize>,
    pub num_steps: usize,
    pub steps: heapless::Vec<StepStatus, MAX_ROUTINE_STEPS>,
}

// ───────────────────────────────────────────────────────────────
// Shared run record
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct RunState {
    running: bool,
    routine: Routine,
    current_step: usize,
}

impl RunState {
    fn snapshot(&self) -> RoutineStatus {
        RoutineStatus {
            running: self.running,
            label: self.routine.label.clone(),
            current_step: self.running.then_some(self.current_step),
            num_steps: self.routine.steps.len(),
            steps: self
                .routine
                .steps
                .iter()
                .map(|s| StepStatus {
                    label: s.label.clone(),
                    channel_id: s.channel,
                    duration_secs: s.duration_secs,
                    duration_minutes: s.duration_secs.div_ceil(60),
                })
                .collect(),
        }
    }
}

/// Flags shared between the control side and one worker.
#[derive(Debug, Default)]
struct RunSignals {
    cancel: AtomicBool,
    skip: AtomicBool,
}

struct Worker {
    handle: JoinHandle<()>,
    signals: Arc<RunSignals>,
}

#[derive(Debug, Clone, Copy)]
struct StepTiming {
    margin_secs: u32,
    poll_ms: u32,
    settle_ms: u32,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

// ───────────────────────────────────────────────────────────────
// Engine
// ───────────────────────────────────────────────────────────────

/// Owns the routine run record and its worker thread.
///
/// `D` is the delay used by the worker's wait loop; a real delay on the
/// device, [`SimDelay`](crate::adapters::sim::SimDelay) in host tests.
pub struct RoutineEngine<O, D> {
    relays: Arc<RelayController<O>>,
    run: Arc<Mutex<RunState>>,
    // Held across start/stop so the two never interleave.
    worker: Mutex<Option<Worker>>,
    delay: D,
    timing: StepTiming,
    sink: Arc<dyn EventSink + Send + Sync>,
}

impl<O, D> RoutineEngine<O, D>
where
    O: OutputPort + Send + 'static,
    D: DelayNs + Clone + Send + 'static,
{
    pub fn new(
        relays: Arc<RelayController<O>>,
        delay: D,
        config: &ControllerConfig,
        sink: Arc<dyn EventSink + Send + Sync>,
    ) -> Self {
        Self {
            relays,
            run: Arc::new(Mutex::new(RunState::default())),
            worker: Mutex::new(None),
            delay,
            timing: StepTiming {
                margin_secs: config.step_margin_secs,
                poll_ms: config.poll_interval_ms.max(1),
                settle_ms: config.settle_delay_ms,
            },
            sink,
        }
    }

    /// Start `routine` on a fresh worker.
    ///
    /// Rejected with [`Error::RoutineAlreadyRunning`] while another run is
    /// active; the running one is left untouched.  Step durations are
    /// clamped to the maximum on-time before the run is recorded.
    pub fn start(&self, mut routine: Routine) -> Result<()> {
        let mut worker = lock(&self.worker);
        let mut run = lock(&self.run);

        if run.running {
            warn!(
                "Routine '{}' rejected: '{}' is already running",
                routine.label, run.routine.label
            );
            self.sink.emit(&AppEvent::RoutineRejected {
                label: routine.label.clone(),
            });
            return Err(Error::RoutineAlreadyRunning);
        }

        // A previous run that finished on its own leaves its handle behind.
        if let Some(done) = worker.take() {
            let _ = done.handle.join();
        }

        let limits = *self.relays.limits();
        for step in &mut routine.steps {
            step.duration_secs = limits.clamp_step(step.duration_secs);
        }

        let label = routine.label.clone();
        let steps = routine.steps.clone();
        *run = RunState {
            running: true,
            routine,
            current_step: 0,
        };

        let signals = Arc::new(RunSignals::default());
        let runner = StepRunner {
            relays: Arc::clone(&self.relays),
            run: Arc::clone(&self.run),
            signals: Arc::clone(&signals),
            delay: self.delay.clone(),
            timing: self.timing,
            sink: Arc::clone(&self.sink),
        };

        let worker_label = label.clone();
        let handle = match task_pin::spawn(&ROUTINE_TASK, move || runner.execute(&worker_label, &steps)) {
            Ok(handle) => handle,
            Err(e) => {
                warn!("Routine '{}' could not start: {}", label, e);
                *run = RunState::default();
                return Err(e);
            }
        };

        // The worker takes the run lock before its first event, so this
        // one is always first.
        info!("Routine '{}' started ({} steps)", label, run.routine.steps.len());
        self.sink.emit(&AppEvent::RoutineStarted {
            label,
            steps: run.routine.steps.len(),
        });
        drop(run);

        *worker = Some(Worker { handle, signals });
        Ok(())
    }

    /// Cancel the running routine and turn every channel off.
    ///
    /// Returns `false` (and changes nothing) when no routine is running.
    /// When it returns `true`, the worker has exited and all channels are
    /// off.
    pub fn stop(&self) -> bool {
        let mut worker = lock(&self.worker);
        if !lock(&self.run).running {
            debug!("Routine stop: nothing running");
            return false;
        }

        if let Some(w) = worker.take() {
            w.signals.cancel.store(true, Ordering::SeqCst);
            if w.handle.join().is_err() {
                warn!("Routine worker panicked");
            }
        }

        self.relays.all_off();
        let label = {
            let mut run = lock(&self.run);
            let label = run.routine.label.clone();
            *run = RunState::default();
            label
        };
        info!("Routine '{}' stopped", label);
        self.sink.emit(&AppEvent::RoutineStopped { label });
        true
    }

    /// Ask the current step to end early.  No-op when idle.
    ///
    /// A request made between steps (during the settle pause) ends the
    /// next step as soon as it starts.
    pub fn skip_step(&self) -> bool {
        let worker = lock(&self.worker);
        let running = lock(&self.run).running;
        match worker.as_ref() {
            Some(w) if running => {
                info!("Routine: skip requested");
                w.signals.skip.store(true, Ordering::SeqCst);
                true
            }
            _ => false,
        }
    }

    pub fn status(&self) -> RoutineStatus {
        lock(&self.run).snapshot()
    }

    pub fn is_running(&self) -> bool {
        lock(&self.run).running
    }
}

// ───────────────────────────────────────────────────────────────
// Worker
// ───────────────────────────────────────────────────────────────

/// Why a step's wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StepEnd {
    Completed,
    Skipped,
    TimedOut,
    Cancelled,
}

struct StepRunner<O, D> {
    relays: Arc<RelayController<O>>,
    run: Arc<Mutex<RunState>>,
    signals: Arc<RunSignals>,
    delay: D,
    timing: StepTiming,
    sink: Arc<dyn EventSink + Send + Sync>,
}

impl<O: OutputPort, D: DelayNs> StepRunner<O, D> {
    fn execute(mut self, label: &Label, steps: &[RoutineStep]) {
        for (index, step) in steps.iter().enumerate() {
            if index > 0 && !self.pause(self.timing.settle_ms) {
                return;
            }
            if self.cancelled() {
                return;
            }

            lock(&self.run).current_step = index;
            info!(
                "Routine '{}' step {}/{}: '{}' on relay {} for {}s",
                label,
                index + 1,
                steps.len(),
                step.label,
                step.channel,
                step.duration_secs
            );
            self.sink.emit(&AppEvent::StepStarted {
                index,
                channel: step.channel,
                duration_secs: step.duration_secs,
            });

            if let Err(e) = self.relays.turn_on_timed(step.channel, step.duration_secs) {
                warn!("Routine step {} could not start: {}", index, e);
                continue;
            }

            match self.wait_step(index, step) {
                StepEnd::Cancelled => return,
                end => debug!("Routine step {} ended: {:?}", index, end),
            }
        }

        *lock(&self.run) = RunState::default();
        info!("Routine '{}' completed", label);
        self.sink.emit(&AppEvent::RoutineCompleted {
            label: label.clone(),
        });
    }

    fn wait_step(&mut self, index: usize, step: &RoutineStep) -> StepEnd {
        let started = self.relays.now_ms();
        let limit_ms = u64::from(step.duration_secs.saturating_add(self.timing.margin_secs)) * 1000;

        loop {
            if self.cancelled() {
                return StepEnd::Cancelled;
            }
            if self.signals.skip.swap(false, Ordering::SeqCst) {
                self.release(step.channel);
                self.sink.emit(&AppEvent::StepSkipped { index });
                return StepEnd::Skipped;
            }
            if !self.relays.is_on(step.channel).unwrap_or(false) {
                return StepEnd::Completed;
            }
            if self.relays.now_ms().saturating_sub(started) >= limit_ms {
                warn!(
                    "Routine step {}: relay {} still on {}s past its duration, forcing off",
                    index, step.channel, self.timing.margin_secs
                );
                self.release(step.channel);
                return StepEnd::TimedOut;
            }
            self.delay.delay_ms(self.timing.poll_ms);
        }
    }

    /// Sleep `ms` in poll-sized chunks.  Returns `false` if cancelled.
    fn pause(&mut self, ms: u32) -> bool {
        let mut left = ms;
        while left > 0 {
            if self.cancelled() {
                return false;
            }
            let chunk = left.min(self.timing.poll_ms);
            self.delay.delay_ms(chunk);
            left -= chunk;
        }
        !self.cancelled()
    }

    fn cancelled(&self) -> bool {
        self.signals.cancel.load(Ordering::SeqCst)
    }

    fn release(&self, channel: u8) {
        if let Err(e) = self.relays.turn_off(channel) {
            warn!("Routine: turning off relay {} failed: {}", channel, e);
        }
    }
}
