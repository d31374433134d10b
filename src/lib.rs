//! RelayNode firmware library.
//!
//! Exposes the relay state machine, routine engine and their adapters for
//! integration testing and for the HTTP front end. All ESP-IDF-specific
//! code is guarded by `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

// Links the std critical-section impl that embassy-sync needs on the host.
#[cfg(not(target_os = "espidf"))]
use critical_section as _;

pub mod app;
pub mod channels;
pub mod config;
pub mod definitions;
pub mod error;
pub mod pins;
pub mod relay;
pub mod routine;
pub mod safety;
pub mod timer;

pub mod adapters;
pub mod drivers;
