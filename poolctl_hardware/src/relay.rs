//! GPIO-driven relay block (Raspberry Pi, `rppal`).
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use poolctl_traits::{ActuationPort, Channel, PortError};
use rppal::gpio::{Gpio, OutputPin};

use crate::error::{HwError, Result};
use crate::util::retry_with_backoff;

/// Relay outputs only: the board has no feedback line, and the pin's output
/// latch would just echo our own writes. `read_channel` keeps the trait
/// default (`Unsupported`), so the watchdog skips the read-back rule.
pub struct GpioRelayBlock {
    pins: Mutex<HashMap<Channel, OutputPin>>,
    active_low: bool,
    write_retries: u32,
    retry_backoff: Duration,
}

impl GpioRelayBlock {
    /// Claim the GPIO pin of every relay port listed in `port_gpio`
    /// (index 0 = port 1) and drive all relays OFF.
    pub fn new(
        port_gpio: &[u8],
        active_low: bool,
        write_retries: u32,
        retry_backoff: Duration,
    ) -> Result<Self> {
        let gpio = Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))?;
        let mut pins = HashMap::new();
        for (idx, &bcm) in port_gpio.iter().enumerate() {
            let port = Channel::try_from(idx + 1).map_err(|_| HwError::UnmappedPort(u8::MAX))?;
            let pin = gpio.get(bcm).map_err(|e| HwError::Gpio(e.to_string()))?;
            // OFF level for the board.
            let out = if active_low {
                pin.into_output_high()
            } else {
                pin.into_output_low()
            };
            tracing::debug!(port, gpio = bcm, "relay port claimed");
            pins.insert(port, out);
        }
        Ok(Self {
            pins: Mutex::new(pins),
            active_low,
            write_retries,
            retry_backoff,
        })
    }

    fn write_level(&self, channel: Channel, on: bool) -> Result<()> {
        let mut pins = self.pins.lock().unwrap_or_else(PoisonError::into_inner);
        let pin = pins
            .get_mut(&channel)
            .ok_or(HwError::UnmappedPort(channel))?;
        if on != self.active_low {
            pin.set_high();
        } else {
            pin.set_low();
        }
        Ok(())
    }
}

impl ActuationPort for GpioRelayBlock {
    fn set_channel(&self, channel: Channel, on: bool) -> std::result::Result<(), PortError> {
        retry_with_backoff(
            self.write_retries,
            self.retry_backoff,
            std::thread::sleep,
            |_| self.write_level(channel, on),
        )
        .map_err(|e| {
            tracing::error!(channel, on, error = %e, "relay write failed");
            PortError::from(e)
        })
    }
}
