//! Application core — the control facade, zero I/O.
//!
//! This module contains what the command source (HTTP layer) talks to:
//! relay commands, routine start/stop/skip, and status snapshots.
//! All interaction with hardware happens through **port traits** defined
//! in [`ports`], keeping this layer fully testable without real peripherals.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
