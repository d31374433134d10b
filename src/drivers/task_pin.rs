//! Core-pinned thread spawning for ESP32-S3 dual-core.
//!
//! Wraps `esp_pthread_set_cfg()` so that `std::thread::spawn` creates a
//! FreeRTOS task pinned to a specific CPU core with explicit priority
//! and stack size. On non-ESP targets, falls back to plain thread spawn.
//!
//! # ESP-IDF Threading Model
//!
//! ESP-IDF implements `std::thread` via pthreads, which are thin wrappers
//! around FreeRTOS tasks. `esp_pthread_set_cfg()` sets thread-local
//! configuration that applies to the *next* `pthread_create()` call from
//! the calling thread. This means the config→spawn pair must not be
//! interleaved with other thread creation on the same thread.

use std::thread::JoinHandle;

use crate::error::Error;

/// CPU core identifiers for the ESP32-S3 Xtensa LX7 dual-core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum Core {
    /// Core 0 (PRO_CPU) — protocol stacks (WiFi, lwIP, HTTP server).
    Pro = 0,
    /// Core 1 (APP_CPU) — relay timing and routine execution.
    App = 1,
}

/// Placement of one long-lived firmware task.
#[derive(Debug, Clone, Copy)]
pub struct TaskSpec {
    /// Null-terminated task name (e.g. `"routine\0"`).
    pub name: &'static str,
    pub core: Core,
    pub priority: u8,
    pub stack_kb: usize,
}

/// Routine worker: one per accepted run.
pub const ROUTINE_TASK: TaskSpec = TaskSpec {
    name: "routine\0",
    core: Core::App,
    priority: 5,
    stack_kb: 6,
};

/// Expiry dispatcher: applies cutoff timer fires to the channel table.
pub const EXPIRY_TASK: TaskSpec = TaskSpec {
    name: "relay-expiry\0",
    core: Core::App,
    priority: 10,
    stack_kb: 4,
};

impl TaskSpec {
    fn display_name(&self) -> &'static str {
        self.name.trim_end_matches('\0')
    }
}

/// Spawn a thread placed according to `spec`.
///
/// On ESP-IDF, uses `esp_pthread_set_cfg()` to configure core affinity,
/// priority, and stack size before `std::thread::spawn`.
#[cfg(target_os = "espidf")]
pub fn spawn(spec: &TaskSpec, f: impl FnOnce() + Send + 'static) -> Result<JoinHandle<()>, Error> {
    unsafe {
        let mut cfg = esp_idf_sys::esp_create_default_pthread_config();
        cfg.pin_to_core = spec.core as i32;
        cfg.prio = spec.priority as i32;
        cfg.stack_size = (spec.stack_kb * 1024) as i32;
        cfg.thread_name = spec.name.as_ptr() as *const _;
        let ret = esp_idf_sys::esp_pthread_set_cfg(&cfg);
        if ret != esp_idf_sys::ESP_OK as i32 {
            log::error!("esp_pthread_set_cfg failed for '{}': {}", spec.display_name(), ret);
            return Err(Error::Spawn);
        }
    }

    log::info!(
        "Spawning '{}' on {:?} (pri={}, stack={}KB)",
        spec.display_name(),
        spec.core,
        spec.priority,
        spec.stack_kb
    );

    std::thread::Builder::new()
        .name(spec.display_name().into())
        .spawn(f)
        .map_err(|e| {
            log::error!("Thread creation failed for '{}': {}", spec.display_name(), e);
            Error::Spawn
        })
}

/// Simulation fallback — ignores core affinity and priority.
#[cfg(not(target_os = "espidf"))]
pub fn spawn(spec: &TaskSpec, f: impl FnOnce() + Send + 'static) -> Result<JoinHandle<()>, Error> {
    log::debug!(
        "Spawning '{}' (sim, no core pinning, stack={}KB)",
        spec.display_name(),
        spec.stack_kb
    );

    // Host test harnesses need more headroom than the device budget.
    std::thread::Builder::new()
        .name(spec.display_name().into())
        .stack_size(spec.stack_kb.max(256) * 1024)
        .spawn(f)
        .map_err(|e| {
            log::error!("Thread creation failed for '{}': {}", spec.display_name(), e);
            Error::Spawn
        })
}
