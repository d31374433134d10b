//! One-shot hardware peripheral initialization.
//!
//! Configures the relay GPIOs as push-pull outputs in the released state
//! using raw ESP-IDF sys calls. Called once from `main()` before the
//! relay controller is built.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

use embedded_hal::digital::{ErrorKind, ErrorType, OutputPin};

use crate::pins::{self, Polarity};

// ── Error type ────────────────────────────────────────────────

/// Errors during one-shot peripheral initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwInitError {
    GpioConfigFailed(i32),
}

impl core::fmt::Display for HwInitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::GpioConfigFailed(rc) => write!(f, "GPIO config failed (rc={})", rc),
        }
    }
}

impl core::error::Error for HwInitError {}

// ── Relay outputs ─────────────────────────────────────────────

/// Configure every relay pin as an output and drive it to the released level.
#[cfg(target_os = "espidf")]
pub fn init_relay_outputs(polarity: Polarity) -> Result<(), HwInitError> {
    let released = polarity.level(false);
    for &pin in &pins::RELAY_GPIOS {
        let cfg = gpio_config_t {
            pin_bit_mask: 1u64 << pin,
            mode: gpio_mode_t_GPIO_MODE_OUTPUT,
            pull_up_en: gpio_pullup_t_GPIO_PULLUP_DISABLE,
            pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
            intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
        };
        // SAFETY: called once from main() before any task touches the pins.
        let ret = unsafe { gpio_config(&cfg) };
        if ret != ESP_OK as i32 {
            return Err(HwInitError::GpioConfigFailed(ret));
        }
        // Configure → release with nothing in between, so a coil never
        // sees a spurious energise pulse at boot.
        if let Err(rc) = gpio_write(pin, released) {
            return Err(HwInitError::GpioConfigFailed(rc));
        }
    }
    log::info!(
        "hw_init: relay outputs configured {:?} ({:?})",
        pins::RELAY_GPIOS,
        polarity
    );
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_relay_outputs(polarity: Polarity) -> Result<(), HwInitError> {
    log::info!("hw_init(sim): relay GPIO init skipped ({:?})", polarity);
    Ok(())
}

#[cfg(target_os = "espidf")]
pub fn gpio_write(pin: i32, high: bool) -> Result<(), i32> {
    // SAFETY: gpio_set_level writes to an already-configured output pin.
    // Callers serialize per pin (the relay table lock).
    let ret = unsafe { gpio_set_level(pin, u32::from(high)) };
    if ret == ESP_OK as i32 { Ok(()) } else { Err(ret) }
}

#[cfg(not(target_os = "espidf"))]
pub fn gpio_write(_pin: i32, _high: bool) -> Result<(), i32> {
    Ok(())
}

// ── embedded-hal pin ──────────────────────────────────────────

/// ESP-IDF return code from a failed GPIO call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpioError(pub i32);

impl embedded_hal::digital::Error for GpioError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

/// A GPIO configured by [`init_relay_outputs`], driven through `gpio_set_level`.
#[derive(Debug, Clone, Copy)]
pub struct RawGpio {
    pin: i32,
}

impl RawGpio {
    pub const fn new(pin: i32) -> Self {
        Self { pin }
    }

    pub const fn pin(&self) -> i32 {
        self.pin
    }
}

impl ErrorType for RawGpio {
    type Error = GpioError;
}

impl OutputPin for RawGpio {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        gpio_write(self.pin, false).map_err(GpioError)
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        gpio_write(self.pin, true).map_err(GpioError)
    }
}

/// One [`RawGpio`] per relay channel, in channel order.
pub fn relay_pins() -> [RawGpio; crate::config::NUM_CHANNELS] {
    pins::RELAY_GPIOS.map(RawGpio::new)
}
