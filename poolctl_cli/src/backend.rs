//! Port factory: simulated or real hardware, chosen once at startup.

use std::sync::Arc;

use poolctl_config::{Config, HardwareMode, SensorKind};
use poolctl_hardware::{SimPool, SimProbe, SimRelayBlock, SimSensorKind, SimSensors, ThermalParams};
use poolctl_traits::{ActuationPort, Clock, ConnectivityProbe, MonotonicClock, SensorPort};

/// Start the simulated probe disconnected (exercises the network watchdog).
const SIM_OFFLINE_ENV: &str = "POOLCTL_SIM_OFFLINE";

pub struct Backend {
    pub port: Arc<dyn ActuationPort>,
    pub sensors: Arc<dyn SensorPort>,
    pub probe: Arc<dyn ConnectivityProbe>,
    pub clock: Arc<dyn Clock>,
}

// ── Simulation ───────────────────────────────────────────────────────────────

const fn thermal_params(s: &poolctl_config::Simulation) -> ThermalParams {
    ThermalParams {
        initial_pool_c: s.initial_pool_c,
        ambient_c: s.ambient_c,
        heater_delta_c: s.heater_delta_c,
        max_heater_output_c: s.max_heater_output_c,
        heating_rate_per_hour: s.heating_rate_per_hour,
        heat_loss_rate_per_hour: s.heat_loss_rate_per_hour,
        time_multiplier: s.time_multiplier,
    }
}

const fn sim_kind(kind: SensorKind) -> SimSensorKind {
    match kind {
        SensorKind::Intake => SimSensorKind::Intake,
        SensorKind::HeaterOutput => SimSensorKind::HeaterOutput,
        SensorKind::Ambient => SimSensorKind::Ambient,
    }
}

fn simulated(cfg: &Config) -> Backend {
    let clock: Arc<dyn Clock> = Arc::new(MonotonicClock::new());
    let relays = Arc::new(SimRelayBlock::new());
    let pool = Arc::new(SimPool::new(
        relays.clone(),
        cfg.channels.pump,
        cfg.channels.heater,
        thermal_params(&cfg.simulation),
        clock.clone(),
    ));
    let sensors = cfg
        .sensors
        .iter()
        .fold(SimSensors::new(pool), |s, sensor| {
            s.with_sensor(sensor.name.clone(), sim_kind(sensor.kind))
        });
    let online = std::env::var_os(SIM_OFFLINE_ENV).is_none();
    tracing::info!(online, sensors = cfg.sensors.len(), "simulated backend");
    Backend {
        port: relays,
        sensors: Arc::new(sensors),
        probe: Arc::new(SimProbe::new(online, clock.clone())),
        clock,
    }
}

// ── Real hardware ────────────────────────────────────────────────────────────

#[cfg(all(feature = "hardware", target_os = "linux"))]
fn real(cfg: &Config) -> eyre::Result<Backend> {
    use eyre::WrapErr;
    use poolctl_hardware::{DEFAULT_W1_BASE, GpioRelayBlock, TcpProbe, W1Sensors};
    use std::time::Duration;

    let relays = GpioRelayBlock::new(
        &cfg.relay.port_gpio,
        cfg.relay.active_low,
        cfg.hardware.relay_write_retries,
        Duration::from_millis(cfg.hardware.relay_retry_backoff_ms),
    )
    .wrap_err("open relay GPIO")?;
    let sensors = cfg
        .sensors
        .iter()
        .fold(W1Sensors::new(DEFAULT_W1_BASE), |s, sensor| {
            s.with_sensor(sensor.name.clone(), sensor.device.clone())
        });
    let probe = TcpProbe::spawn(
        cfg.network.target.clone(),
        Duration::from_millis(cfg.network.connect_timeout_ms),
        Duration::from_secs(cfg.network.interval_s),
    );
    tracing::info!(target_addr = %cfg.network.target, "hardware backend");
    Ok(Backend {
        port: Arc::new(relays),
        sensors: Arc::new(sensors),
        probe: Arc::new(probe),
        clock: Arc::new(MonotonicClock::new()),
    })
}

#[cfg(not(all(feature = "hardware", target_os = "linux")))]
fn real(_cfg: &Config) -> eyre::Result<Backend> {
    eyre::bail!("hardware.mode = \"real\" needs a Linux build with the `hardware` feature")
}

pub fn build(cfg: &Config) -> eyre::Result<Backend> {
    match cfg.hardware.mode {
        HardwareMode::Simulated => Ok(simulated(cfg)),
        HardwareMode::Real => real(cfg),
    }
}
