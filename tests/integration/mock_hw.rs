//! Mock hardware adapters for integration tests.
//!
//! Records every relay write and every event so tests can assert on the
//! full history without touching real GPIO registers.  Time is simulated
//! through [`SimTime`], so routines measured in minutes finish in a few
//! milliseconds of wall time.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use relaynode::adapters::sim::{SimDelay, SimTime};
use relaynode::app::events::AppEvent;
use relaynode::app::ports::{EventSink, OutputPort};
use relaynode::app::service::RelayService;
use relaynode::config::{ControllerConfig, NUM_CHANNELS};
use relaynode::error::OutputError;
use relaynode::relay::RelayController;
use relaynode::timer::ExpiryQueue;

// ── Output recorder ───────────────────────────────────────────

#[derive(Debug, Default)]
pub struct OutputLog {
    pub levels: [bool; NUM_CHANNELS],
    pub writes: Vec<(u8, bool)>,
}

/// `OutputPort` that records into a shared [`OutputLog`].
#[derive(Clone, Default)]
pub struct RecordingOutput(pub Arc<Mutex<OutputLog>>);

#[allow(dead_code)]
impl RecordingOutput {
    pub fn level(&self, channel: u8) -> bool {
        self.0.lock().unwrap().levels[channel as usize]
    }

    pub fn any_energized(&self) -> bool {
        self.0.lock().unwrap().levels.iter().any(|&l| l)
    }

    pub fn write_count(&self) -> usize {
        self.0.lock().unwrap().writes.len()
    }
}

impl OutputPort for RecordingOutput {
    fn write(&mut self, channel: u8, energized: bool) -> Result<(), OutputError> {
        let mut log = self.0.lock().unwrap();
        log.levels[channel as usize] = energized;
        log.writes.push((channel, energized));
        Ok(())
    }
}

// ── Event recorder ────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<AppEvent>>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn events(&self) -> Vec<AppEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn contains(&self, event: &AppEvent) -> bool {
        self.events.lock().unwrap().contains(event)
    }

    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.lock().unwrap().iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: &AppEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

// ── Rig ───────────────────────────────────────────────────────

/// A full service wired to mocks and simulated time.
pub struct Rig {
    pub service: RelayService<RecordingOutput, SimDelay>,
    pub relays: Arc<RelayController<RecordingOutput>>,
    pub output: RecordingOutput,
    pub sink: Arc<RecordingSink>,
    pub time: SimTime,
}

#[allow(dead_code)]
impl Rig {
    pub fn new() -> Self {
        Self::with_config(ControllerConfig::default())
    }

    pub fn with_config(config: ControllerConfig) -> Self {
        let queue = Arc::new(ExpiryQueue::new());
        let time = SimTime::new(queue.clone());
        let output = RecordingOutput::default();
        let sink = Arc::new(RecordingSink::default());
        let relays = Arc::new(
            RelayController::new(
                output.clone(),
                Box::new(time.clone()),
                Arc::new(time.clone()),
                queue,
                sink.clone(),
                &config,
            )
            .unwrap(),
        );
        let service = RelayService::new(
            relays.clone(),
            SimDelay::new(time.clone()),
            &config,
            sink.clone(),
        );
        Self {
            service,
            relays,
            output,
            sink,
            time,
        }
    }
}

/// Spin (in wall time) until `cond` holds; fail after 10 s.
#[allow(dead_code)]
pub fn wait_until(what: &str, mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !cond() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        std::thread::sleep(Duration::from_micros(200));
    }
}
