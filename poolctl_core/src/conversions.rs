//! `From` implementations bridging `poolctl_config` types to `poolctl_core` types.

use std::time::Duration;

use crate::config::{Channels, ControlCfg, HeaterLimits, LightTiming, ThermometerCfg, WatchdogCfg};

// ── Channels ─────────────────────────────────────────────────────────────────

impl From<&poolctl_config::Channels> for Channels {
    fn from(c: &poolctl_config::Channels) -> Self {
        Self {
            pump: c.pump,
            heater: c.heater,
            light: c.light,
        }
    }
}

// ── HeaterLimits ─────────────────────────────────────────────────────────────

impl From<&poolctl_config::HeaterCfg> for HeaterLimits {
    fn from(c: &poolctl_config::HeaterCfg) -> Self {
        Self {
            max_runtime: Duration::from_secs(c.max_runtime_s),
            max_water_temp_c: c.max_water_temp_c,
        }
    }
}

// ── LightTiming ──────────────────────────────────────────────────────────────

impl From<&poolctl_config::LightCfg> for LightTiming {
    fn from(c: &poolctl_config::LightCfg) -> Self {
        Self {
            advance_window: Duration::from_millis(c.advance_window_ms),
            reset_window: Duration::from_millis(c.reset_window_ms),
            settle: Duration::from_millis(c.settle_ms),
            power_on_hold: Duration::from_millis(c.power_on_hold_ms),
            retain_after_off: Duration::from_secs(c.retain_after_off_s),
        }
    }
}

// ── ThermometerCfg ───────────────────────────────────────────────────────────

impl From<&poolctl_config::ThermometerCfg> for ThermometerCfg {
    fn from(c: &poolctl_config::ThermometerCfg) -> Self {
        Self {
            retries: c.retries,
            backoff: Duration::from_millis(c.backoff_ms),
            read_timeout: Duration::from_millis(c.read_timeout_ms),
            staleness: Duration::from_secs(c.staleness_s),
        }
    }
}

// ── WatchdogCfg ──────────────────────────────────────────────────────────────

impl From<&poolctl_config::WatchdogCfg> for WatchdogCfg {
    fn from(c: &poolctl_config::WatchdogCfg) -> Self {
        Self {
            network_grace: Duration::from_secs(c.network_grace_s),
            network_full_stop: (c.network_full_stop_s > 0)
                .then(|| Duration::from_secs(c.network_full_stop_s)),
            max_port_failures: c.max_port_failures,
        }
    }
}

// ── ControlCfg ───────────────────────────────────────────────────────────────

impl From<&poolctl_config::ControlCfg> for ControlCfg {
    fn from(c: &poolctl_config::ControlCfg) -> Self {
        Self {
            tick_period: Duration::from_millis(c.tick_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_full_stop_disables_rule() {
        let cfg = poolctl_config::WatchdogCfg {
            network_grace_s: 60,
            network_full_stop_s: 0,
            max_port_failures: 3,
        };
        let w = WatchdogCfg::from(&cfg);
        assert_eq!(w.network_full_stop, None);
        assert_eq!(w.network_grace, Duration::from_secs(60));
    }

    #[test]
    fn light_timing_units() {
        let cfg = poolctl_config::LightCfg {
            advance_window_ms: 1300,
            reset_window_ms: 12_000,
            settle_ms: 1200,
            power_on_hold_ms: 17_000,
            retain_after_off_s: 60,
        };
        let t = LightTiming::from(&cfg);
        assert_eq!(t.advance_window, Duration::from_millis(1300));
        assert_eq!(t.retain_after_off, Duration::from_secs(60));
    }
}
