//! Runtime configuration for the controller.
//!
//! These are the structs handed to constructors. They are separate from the
//! TOML-deserialized config in `poolctl_config`; see `conversions`.
use std::time::Duration;

use poolctl_traits::Channel;

/// Relay channel per device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Channels {
    pub pump: Channel,
    pub heater: Channel,
    pub light: Channel,
}

impl Default for Channels {
    fn default() -> Self {
        Self {
            pump: 1,
            heater: 2,
            light: 3,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct HeaterLimits {
    /// Longest a single ON period may last.
    pub max_runtime: Duration,
    /// Input temperature at or above which the heater is forced OFF.
    pub max_water_temp_c: f32,
}

impl Default for HeaterLimits {
    fn default() -> Self {
        Self {
            max_runtime: Duration::from_secs(4 * 3600),
            max_water_temp_c: 40.0,
        }
    }
}

/// Pulse timings for the blind light protocol. No defaults: they are
/// calibrated against the fixture firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LightTiming {
    /// OFF duration that advances the fixture one color.
    pub advance_window: Duration,
    /// OFF duration that returns the fixture to color 0.
    pub reset_window: Duration,
    /// ON hold after each pulse.
    pub settle: Duration,
    /// ON hold when a sequence starts with the light OFF.
    pub power_on_hold: Duration,
    /// User OFF periods shorter than this lose the tracked color.
    pub retain_after_off: Duration,
}

#[derive(Debug, Clone, Copy)]
pub struct ThermometerCfg {
    pub retries: u32,
    pub backoff: Duration,
    pub read_timeout: Duration,
    pub staleness: Duration,
}

impl Default for ThermometerCfg {
    fn default() -> Self {
        Self {
            retries: 2,
            backoff: Duration::from_millis(20),
            read_timeout: Duration::from_millis(80),
            staleness: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct WatchdogCfg {
    pub network_grace: Duration,
    /// `None` disables the full-stop rule.
    pub network_full_stop: Option<Duration>,
    pub max_port_failures: u32,
}

impl Default for WatchdogCfg {
    fn default() -> Self {
        Self {
            network_grace: Duration::from_secs(60),
            network_full_stop: Some(Duration::from_secs(300)),
            max_port_failures: 5,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ControlCfg {
    pub tick_period: Duration,
}

impl Default for ControlCfg {
    fn default() -> Self {
        Self {
            tick_period: Duration::from_secs(1),
        }
    }
}
