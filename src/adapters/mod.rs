//! Adapters — concrete implementations of the hexagonal port traits.
//!
//! | Adapter        | Implements         | Connects to                 |
//! |----------------|--------------------|-----------------------------|
//! | `log_sink`     | EventSink          | Serial log output           |
//! | `sim`          | Clock, TimerPort   | Manually advanced host time |
//! |                | DelayNs            |                             |
//! | `thread_timer` | TimerPort          | Host sleeper threads        |
//! | `time`         | Clock, DelayNs     | esp_timer / `Instant`       |
//!
//! The device timer backend lives with the drivers
//! ([`hw_timer`](crate::drivers::hw_timer)); so does the relay output
//! ([`RelayBank`](crate::drivers::relay::RelayBank)).

pub mod log_sink;
pub mod sim;
pub mod thread_timer;
pub mod time;
