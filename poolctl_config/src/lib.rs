#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema for the pool controller.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - Light pulse timings have no defaults: they are calibrated against the
//!   fixture firmware and must be present in every config file.
use serde::Deserialize;

/// Relay ports available on the relay block.
pub const RELAY_PORTS: std::ops::RangeInclusive<u8> = 1..=8;

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HardwareMode {
    #[default]
    Simulated,
    Real,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Hardware {
    /// "simulated" (default) or "real"
    pub mode: HardwareMode,
    /// Extra attempts for a failed relay write before it counts as failed
    pub relay_write_retries: u32,
    pub relay_retry_backoff_ms: u64,
}

impl Default for Hardware {
    fn default() -> Self {
        Self {
            mode: HardwareMode::Simulated,
            relay_write_retries: 2,
            relay_retry_backoff_ms: 20,
        }
    }
}

/// Relay port assignment per device.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Channels {
    pub pump: u8,
    pub heater: u8,
    pub light: u8,
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

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Relay {
    /// Relay boards energize the coil on a LOW output
    pub active_low: bool,
    /// BCM GPIO pin per relay port, index 0 = port 1
    pub port_gpio: Vec<u8>,
}

impl Default for Relay {
    fn default() -> Self {
        Self {
            active_low: true,
            port_gpio: vec![4, 17, 27, 22, 18, 23, 24, 25],
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    /// Water entering the heater (pool temperature)
    #[default]
    Intake,
    HeaterOutput,
    Ambient,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Sensor {
    pub name: String,
    /// 1-Wire device id, e.g. "28-0316a2795cff"
    pub device: String,
    /// What the simulated backend reports for this sensor
    #[serde(default)]
    pub kind: SensorKind,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct HeaterCfg {
    /// Sensor whose reading drives reach-and-stop and over-temperature checks
    pub input_sensor: String,
    /// Hard cap on a single heater ON period (seconds)
    pub max_runtime_s: u64,
    pub max_water_temp_c: f32,
}

impl Default for HeaterCfg {
    fn default() -> Self {
        Self {
            input_sensor: "intake".to_string(),
            max_runtime_s: 14_400,
            max_water_temp_c: 40.0,
        }
    }
}

/// Light pulse timings. The three windows are required.
#[derive(Debug, Deserialize)]
pub struct LightCfg {
    pub advance_window_ms: u64,
    pub reset_window_ms: u64,
    pub settle_ms: u64,
    /// Hold after powering the fixture on before the first pulse
    #[serde(default = "default_power_on_hold_ms")]
    pub power_on_hold_ms: u64,
    /// An OFF period shorter than this loses the tracked color
    #[serde(default = "default_retain_after_off_s")]
    pub retain_after_off_s: u64,
}

const fn default_power_on_hold_ms() -> u64 {
    17_000
}

const fn default_retain_after_off_s() -> u64 {
    60
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ThermometerCfg {
    pub retries: u32,
    pub backoff_ms: u64,
    pub read_timeout_ms: u64,
    pub staleness_s: u64,
}

impl Default for ThermometerCfg {
    fn default() -> Self {
        Self {
            retries: 2,
            backoff_ms: 20,
            read_timeout_ms: 80,
            staleness_s: 60,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct WatchdogCfg {
    /// Heater may stay ON this long after the network drops
    pub network_grace_s: u64,
    /// Outage after which the pump is stopped too (0 disables)
    pub network_full_stop_s: u64,
    /// Consecutive failed relay writes that make the port unreachable
    pub max_port_failures: u32,
}

impl Default for WatchdogCfg {
    fn default() -> Self {
        Self {
            network_grace_s: 60,
            network_full_stop_s: 300,
            max_port_failures: 5,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct NetworkCfg {
    /// host:port probed with a TCP connect
    pub target: String,
    pub connect_timeout_ms: u64,
    pub interval_s: u64,
}

impl Default for NetworkCfg {
    fn default() -> Self {
        Self {
            target: "1.1.1.1:53".to_string(),
            connect_timeout_ms: 2_000,
            interval_s: 10,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ControlCfg {
    pub tick_ms: u64,
}

impl Default for ControlCfg {
    fn default() -> Self {
        Self { tick_ms: 1_000 }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
    /// JSON-lines device event log
    pub events_file: Option<String>,
}

/// Thermal model for the simulated backend.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Simulation {
    pub initial_pool_c: f32,
    pub ambient_c: f32,
    pub heater_delta_c: f32,
    pub max_heater_output_c: f32,
    pub heating_rate_per_hour: f32,
    pub heat_loss_rate_per_hour: f32,
    /// Simulated seconds per real second
    pub time_multiplier: f32,
}

impl Default for Simulation {
    fn default() -> Self {
        Self {
            initial_pool_c: 26.0,
            ambient_c: 22.0,
            heater_delta_c: 10.0,
            max_heater_output_c: 40.0,
            heating_rate_per_hour: 5.0,
            heat_loss_rate_per_hour: 0.5,
            time_multiplier: 1.0,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub hardware: Hardware,
    #[serde(default)]
    pub channels: Channels,
    #[serde(default)]
    pub relay: Relay,
    #[serde(default)]
    pub sensors: Vec<Sensor>,
    #[serde(default)]
    pub heater: HeaterCfg,
    pub light: LightCfg,
    #[serde(default)]
    pub thermometer: ThermometerCfg,
    #[serde(default)]
    pub watchdog: WatchdogCfg,
    #[serde(default)]
    pub network: NetworkCfg,
    #[serde(default)]
    pub control: ControlCfg,
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub simulation: Simulation,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

fn ensure_port(name: &str, port: u8) -> eyre::Result<()> {
    if !RELAY_PORTS.contains(&port) {
        eyre::bail!("channels.{name} must be a relay port in 1..=8, got {port}");
    }
    Ok(())
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Channels
        let ch = &self.channels;
        ensure_port("pump", ch.pump)?;
        ensure_port("heater", ch.heater)?;
        ensure_port("light", ch.light)?;
        if ch.pump == ch.heater || ch.pump == ch.light || ch.heater == ch.light {
            eyre::bail!("channels.pump, channels.heater and channels.light must be distinct");
        }

        // Relay
        if self.relay.port_gpio.len() != RELAY_PORTS.len() {
            eyre::bail!(
                "relay.port_gpio must list exactly {} GPIO pins, got {}",
                RELAY_PORTS.len(),
                self.relay.port_gpio.len()
            );
        }
        if self.hardware.relay_retry_backoff_ms > 1_000 {
            eyre::bail!("hardware.relay_retry_backoff_ms is unreasonably large (>1s)");
        }

        // Sensors
        for (idx, s) in self.sensors.iter().enumerate() {
            if s.name.trim().is_empty() {
                eyre::bail!("sensors[{idx}].name must not be empty");
            }
            if s.device.trim().is_empty() {
                eyre::bail!("sensors[{idx}].device must not be empty");
            }
            if self.sensors[..idx].iter().any(|o| o.name == s.name) {
                eyre::bail!("sensors[{idx}].name '{}' is duplicated", s.name);
            }
        }
        if !self
            .sensors
            .iter()
            .any(|s| s.name == self.heater.input_sensor)
        {
            eyre::bail!(
                "heater.input_sensor '{}' does not name a configured sensor",
                self.heater.input_sensor
            );
        }

        // Heater
        if self.heater.max_runtime_s == 0 {
            eyre::bail!("heater.max_runtime_s must be >= 1");
        }
        if self.heater.max_runtime_s > 86_400 {
            eyre::bail!("heater.max_runtime_s is unreasonably large (>24h)");
        }
        if !self.heater.max_water_temp_c.is_finite()
            || !(20.0..=45.0).contains(&self.heater.max_water_temp_c)
        {
            eyre::bail!("heater.max_water_temp_c must be in [20.0, 45.0]");
        }

        // Light
        let l = &self.light;
        if l.advance_window_ms == 0 {
            eyre::bail!("light.advance_window_ms must be >= 1");
        }
        if l.settle_ms == 0 {
            eyre::bail!("light.settle_ms must be >= 1");
        }
        if l.reset_window_ms <= l.advance_window_ms {
            eyre::bail!("light.reset_window_ms must be greater than light.advance_window_ms");
        }
        if l.reset_window_ms > 120_000 {
            eyre::bail!("light.reset_window_ms is unreasonably large (>2min)");
        }

        // Thermometer
        let t = &self.thermometer;
        if t.read_timeout_ms == 0 {
            eyre::bail!("thermometer.read_timeout_ms must be >= 1");
        }
        if t.retries > 10 {
            eyre::bail!("thermometer.retries must be <= 10");
        }
        if t.staleness_s == 0 {
            eyre::bail!("thermometer.staleness_s must be >= 1");
        }

        // Control
        if self.control.tick_ms < 100 || self.control.tick_ms > 10_000 {
            eyre::bail!("control.tick_ms must be in [100, 10000]");
        }
        let attempts = u64::from(t.retries) + 1;
        let worst_case_ms = (attempts * t.read_timeout_ms + (attempts - 1) * t.backoff_ms)
            .saturating_mul(self.sensors.len() as u64);
        if worst_case_ms >= self.control.tick_ms {
            eyre::bail!(
                "thermometer worst-case read time ({worst_case_ms} ms for {} sensors) must fit inside control.tick_ms ({})",
                self.sensors.len(),
                self.control.tick_ms
            );
        }

        // Watchdog
        let w = &self.watchdog;
        if w.max_port_failures == 0 {
            eyre::bail!("watchdog.max_port_failures must be >= 1");
        }
        if w.network_full_stop_s != 0 && w.network_full_stop_s < w.network_grace_s {
            eyre::bail!("watchdog.network_full_stop_s must be >= watchdog.network_grace_s (or 0 to disable)");
        }

        // Network
        if self.network.target.trim().is_empty() {
            eyre::bail!("network.target must not be empty");
        }
        if self.network.connect_timeout_ms == 0 {
            eyre::bail!("network.connect_timeout_ms must be >= 1");
        }
        if self.network.interval_s == 0 {
            eyre::bail!("network.interval_s must be >= 1");
        }

        // Simulation
        let s = &self.simulation;
        if !(s.time_multiplier.is_finite() && s.time_multiplier > 0.0) {
            eyre::bail!("simulation.time_multiplier must be > 0");
        }
        if s.heating_rate_per_hour < 0.0 || s.heat_loss_rate_per_hour < 0.0 {
            eyre::bail!("simulation heating/heat-loss rates must be >= 0");
        }

        Ok(())
    }

    pub fn sensor(&self, name: &str) -> Option<&Sensor> {
        self.sensors.iter().find(|s| s.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[[sensors]]
name = "intake"
device = "28-0000000001"

[light]
advance_window_ms = 1300
reset_window_ms = 12000
settle_ms = 1200
"#;

    #[test]
    fn minimal_config_fills_defaults() {
        let cfg = load_toml(MINIMAL).unwrap();
        cfg.validate().unwrap();
        assert_eq!(cfg.hardware.mode, HardwareMode::Simulated);
        assert_eq!(cfg.heater.max_runtime_s, 14_400);
        assert_eq!(cfg.light.retain_after_off_s, 60);
        assert_eq!(cfg.relay.port_gpio[0], 4);
        assert_eq!(cfg.control.tick_ms, 1_000);
    }

    #[test]
    fn sensor_lookup_by_name() {
        let cfg = load_toml(MINIMAL).unwrap();
        assert_eq!(cfg.sensor("intake").map(|s| s.device.as_str()), Some("28-0000000001"));
        assert!(cfg.sensor("missing").is_none());
    }
}
