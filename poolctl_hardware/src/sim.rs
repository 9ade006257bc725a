//! Simulated relay block, thermal model, sensors and connectivity.
//!
//! The thermal model reads the relay levels directly, so the simulated pool
//! only warms when both the pump and heater relays are actually energized.
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use poolctl_traits::{
    ActuationPort, Channel, Clock, ConnectivityProbe, NetworkStatus, PortError, SensorError,
    SensorPort,
};

const PORTS: usize = 8;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

fn port_index(channel: Channel) -> Result<usize, PortError> {
    match channel {
        1..=8 => Ok(usize::from(channel - 1)),
        other => Err(PortError::UnknownChannel(other)),
    }
}

/// In-memory 8-port relay block with read-back and fault injection.
#[derive(Debug, Default)]
pub struct SimRelayBlock {
    levels: Mutex<[bool; PORTS]>,
    stuck: Mutex<[Option<bool>; PORTS]>,
    unreachable: AtomicBool,
    writes: AtomicU64,
}

impl SimRelayBlock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_on(&self, channel: Channel) -> bool {
        port_index(channel).is_ok_and(|i| lock(&self.levels)[i])
    }

    /// Make every write and read fail as if the relay block were disconnected.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::Relaxed);
    }

    /// Weld a relay: writes are accepted but the channel keeps `level`.
    /// `None` releases it.
    pub fn stick(&self, channel: Channel, level: Option<bool>) {
        if let Ok(i) = port_index(channel) {
            lock(&self.stuck)[i] = level;
            if let Some(l) = level {
                lock(&self.levels)[i] = l;
            }
        }
    }

    /// Successful writes since creation.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    fn ensure_reachable(&self) -> Result<(), PortError> {
        if self.unreachable.load(Ordering::Relaxed) {
            return Err(PortError::Unreachable(
                "simulated relay block offline".to_string(),
            ));
        }
        Ok(())
    }
}

impl ActuationPort for SimRelayBlock {
    fn set_channel(&self, channel: Channel, on: bool) -> Result<(), PortError> {
        self.ensure_reachable()?;
        let i = port_index(channel)?;
        let level = lock(&self.stuck)[i].unwrap_or(on);
        lock(&self.levels)[i] = level;
        self.writes.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(channel, on, "sim relay write");
        Ok(())
    }

    fn read_channel(&self, channel: Channel) -> Result<bool, PortError> {
        self.ensure_reachable()?;
        let i = port_index(channel)?;
        Ok(lock(&self.levels)[i])
    }
}

/// Physical parameters of the simulated pool.
#[derive(Debug, Clone, Copy)]
pub struct ThermalParams {
    pub initial_pool_c: f32,
    pub ambient_c: f32,
    pub heater_delta_c: f32,
    pub max_heater_output_c: f32,
    pub heating_rate_per_hour: f32,
    pub heat_loss_rate_per_hour: f32,
    pub time_multiplier: f32,
}

impl Default for ThermalParams {
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

#[derive(Debug)]
struct ThermalState {
    pool_c: f32,
    updated_at: Instant,
}

/// Pool water temperature model driven by the simulated relays.
pub struct SimPool {
    relays: Arc<SimRelayBlock>,
    pump: Channel,
    heater: Channel,
    params: ThermalParams,
    clock: Arc<dyn Clock>,
    state: Mutex<ThermalState>,
}

impl SimPool {
    pub fn new(
        relays: Arc<SimRelayBlock>,
        pump: Channel,
        heater: Channel,
        params: ThermalParams,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let state = Mutex::new(ThermalState {
            pool_c: params.initial_pool_c,
            updated_at: clock.now(),
        });
        Self {
            relays,
            pump,
            heater,
            params,
            clock,
            state,
        }
    }

    fn heating(&self) -> bool {
        self.relays.is_on(self.pump) && self.relays.is_on(self.heater)
    }

    /// Integrate the model up to now and return the pool temperature.
    pub fn pool_temperature(&self) -> f32 {
        let now = self.clock.now();
        let heating = self.heating();
        let mut st = lock(&self.state);
        let elapsed = now.saturating_duration_since(st.updated_at);
        st.updated_at = now;
        let hours = elapsed.as_secs_f32() * self.params.time_multiplier / 3600.0;
        if heating {
            st.pool_c += self.params.heating_rate_per_hour * hours;
        } else if st.pool_c > self.params.ambient_c {
            let cooled = st.pool_c - self.params.heat_loss_rate_per_hour * hours;
            st.pool_c = cooled.max(self.params.ambient_c);
        }
        st.pool_c
    }

    /// Water leaving the heater: intake plus the heater delta while heating,
    /// capped at the heater's output limit.
    pub fn heater_output_temperature(&self) -> f32 {
        let intake = self.pool_temperature();
        if !self.heating() {
            return intake;
        }
        let heated = intake + self.params.heater_delta_c;
        if heated > self.params.max_heater_output_c {
            tracing::warn!(
                heated,
                cap = self.params.max_heater_output_c,
                "sim heater output capped"
            );
        }
        heated.min(self.params.max_heater_output_c)
    }

    pub fn ambient_temperature(&self) -> f32 {
        self.params.ambient_c
    }

    pub fn set_pool_temperature(&self, celsius: f32) {
        let now = self.clock.now();
        let mut st = lock(&self.state);
        st.pool_c = celsius;
        st.updated_at = now;
    }
}

/// What a simulated sensor measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimSensorKind {
    Intake,
    HeaterOutput,
    Ambient,
}

/// Sensor port reading the thermal model.
pub struct SimSensors {
    pool: Arc<SimPool>,
    sensors: HashMap<String, SimSensorKind>,
    failing: Mutex<HashSet<String>>,
}

impl SimSensors {
    pub fn new(pool: Arc<SimPool>) -> Self {
        Self {
            pool,
            sensors: HashMap::new(),
            failing: Mutex::new(HashSet::new()),
        }
    }

    #[must_use]
    pub fn with_sensor(mut self, name: impl Into<String>, kind: SimSensorKind) -> Self {
        self.sensors.insert(name.into(), kind);
        self
    }

    /// Make reads of `name` time out until cleared.
    pub fn set_failing(&self, name: &str, failing: bool) {
        let mut set = lock(&self.failing);
        if failing {
            set.insert(name.to_string());
        } else {
            set.remove(name);
        }
    }
}

impl SensorPort for SimSensors {
    fn read_temperature(&self, sensor: &str, _timeout: Duration) -> Result<f32, SensorError> {
        if lock(&self.failing).contains(sensor) {
            return Err(SensorError::Timeout);
        }
        let kind = self
            .sensors
            .get(sensor)
            .ok_or_else(|| SensorError::NotFound(sensor.to_string()))?;
        Ok(match kind {
            SimSensorKind::Intake => self.pool.pool_temperature(),
            SimSensorKind::HeaterOutput => self.pool.heater_output_temperature(),
            SimSensorKind::Ambient => self.pool.ambient_temperature(),
        })
    }
}

/// Connectivity probe whose state is set by hand.
pub struct SimProbe {
    connected: AtomicBool,
    last_seen: Mutex<Option<Instant>>,
    clock: Arc<dyn Clock>,
}

impl SimProbe {
    pub fn new(connected: bool, clock: Arc<dyn Clock>) -> Self {
        let last_seen = connected.then(|| clock.now());
        Self {
            connected: AtomicBool::new(connected),
            last_seen: Mutex::new(last_seen),
            clock,
        }
    }

    pub fn set_connected(&self, connected: bool) {
        if connected {
            *lock(&self.last_seen) = Some(self.clock.now());
        }
        let was = self.connected.swap(connected, Ordering::Relaxed);
        if was != connected {
            tracing::info!(connected, "sim network state changed");
        }
    }
}

impl ConnectivityProbe for SimProbe {
    fn status(&self) -> NetworkStatus {
        let connected = self.connected.load(Ordering::Relaxed);
        let mut last_seen = lock(&self.last_seen);
        if connected {
            *last_seen = Some(self.clock.now());
        }
        NetworkStatus {
            connected,
            last_seen_at: *last_seen,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use poolctl_traits::ManualClock;

    #[test]
    fn stuck_relay_ignores_writes() {
        let relays = SimRelayBlock::new();
        relays.stick(2, Some(true));
        relays.set_channel(2, false).unwrap();
        assert!(relays.read_channel(2).unwrap());
        relays.stick(2, None);
        relays.set_channel(2, false).unwrap();
        assert!(!relays.read_channel(2).unwrap());
    }

    #[test]
    fn unknown_channel_is_rejected() {
        let relays = SimRelayBlock::new();
        assert_eq!(relays.set_channel(0, true), Err(PortError::UnknownChannel(0)));
        assert_eq!(relays.read_channel(9), Err(PortError::UnknownChannel(9)));
    }

    #[test]
    fn probe_keeps_last_seen_while_disconnected() {
        let clock = ManualClock::new();
        let probe = SimProbe::new(true, Arc::new(clock.clone()));
        let seen = probe.status().last_seen_at;
        probe.set_connected(false);
        clock.advance(Duration::from_secs(30));
        let st = probe.status();
        assert!(!st.connected);
        assert_eq!(st.last_seen_at, seen);
    }
}
