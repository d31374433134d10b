//! Relay output driver, hardware initialisation, and peripheral helpers.

pub mod hw_init;
pub mod hw_timer;
pub mod relay;
pub mod task_pin;
