//! Thread-safe command surface over all three devices.
//!
//! Lock order is fixed: the circulation (interlock) lock first, then the
//! light's private lock. Nothing takes them the other way round.
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use chrono::Utc;
use poolctl_traits::{NetworkStatus, PortError};

use crate::commands::{Command, HeaterCommand, LightCommand, PumpCommand};
use crate::config::{Channels, HeaterLimits, LightTiming};
use crate::devices::color::ColorRequest;
use crate::devices::heater::Heater;
use crate::devices::light::LightColorController;
use crate::devices::pump::Pump;
use crate::error::CommandError;
use crate::events::{DeviceId, Invariant, StopCause};
use crate::interlock::{Circulation, CirculationTick};
use crate::ports::DeviceIo;
use crate::snapshot::{HeaterSnapshot, LightSnapshot, PumpSnapshot, SensorSnapshot, Snapshot};
use crate::watchdog::{Readback, SafetyView, Violation, Watchdog};

/// Outcome of one controller tick.
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub circulation: CirculationTick,
    /// Violations acted on this tick.
    pub violations: Vec<Violation>,
}

pub struct PoolController {
    io: Arc<DeviceIo>,
    circulation: Mutex<Circulation>,
    light: Arc<LightColorController>,
    /// Devices already stopped for a read-back mismatch that has not cleared.
    mismatch_latched: Mutex<Vec<DeviceId>>,
}

impl PoolController {
    pub fn new(channels: Channels, heater: HeaterLimits, light: LightTiming, io: Arc<DeviceIo>) -> Self {
        let circulation = Circulation::new(Pump::new(channels.pump), Heater::new(channels.heater, heater));
        let light = Arc::new(LightColorController::new(channels.light, light, io.clone()));
        Self {
            io,
            circulation: Mutex::new(circulation),
            light,
            mismatch_latched: Mutex::new(Vec::new()),
        }
    }

    pub fn io(&self) -> &DeviceIo {
        &self.io
    }

    pub const fn light(&self) -> &Arc<LightColorController> {
        &self.light
    }

    /// Hold the interlock lock. A poisoned lock is still usable: stopping
    /// devices must work after a panic elsewhere.
    pub fn circulation(&self) -> MutexGuard<'_, Circulation> {
        self.circulation
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    // ── Pump ─────────────────────────────────────────────────────────────────

    pub fn pump_set_on(&self) -> Result<(), CommandError> {
        self.circulation().pump_request_on(&self.io)
    }

    pub fn pump_set_off(&self) -> Result<(), CommandError> {
        self.circulation().pump_request_off(&self.io)
    }

    pub fn pump_run_for_minutes(&self, minutes: u32) -> Result<(), CommandError> {
        self.circulation().pump_request_timed_run(minutes, &self.io)
    }

    // ── Heater ───────────────────────────────────────────────────────────────

    pub fn heater_set_on(&self) -> Result<(), CommandError> {
        self.circulation().heater_request_on(&self.io)
    }

    pub fn heater_set_off(&self) -> Result<(), CommandError> {
        self.circulation().heater_request_off(&self.io)
    }

    pub fn heater_reach_and_stop(&self, target_celsius: f32) -> Result<(), CommandError> {
        self.circulation()
            .heater_request_reach_and_stop(target_celsius, &self.io)
    }

    // ── Light ────────────────────────────────────────────────────────────────

    pub fn light_set_on(&self) -> Result<(), CommandError> {
        self.light.request_on()
    }

    pub fn light_set_off(&self) -> Result<(), CommandError> {
        self.light.request_off()
    }

    /// Queue a color change; the light worker carries it out.
    pub fn light_set_color(&self, request: ColorRequest) -> Result<(), CommandError> {
        self.light.request_color(request);
        Ok(())
    }

    pub fn handle(&self, command: Command) -> Result<(), CommandError> {
        let result = match command {
            Command::Pump(PumpCommand::SetOn) => self.pump_set_on(),
            Command::Pump(PumpCommand::SetOff) => self.pump_set_off(),
            Command::Pump(PumpCommand::RunForMinutes(m)) => self.pump_run_for_minutes(m),
            Command::Heater(HeaterCommand::SetOn) => self.heater_set_on(),
            Command::Heater(HeaterCommand::SetOff) => self.heater_set_off(),
            Command::Heater(HeaterCommand::ReachAndStop(t)) => self.heater_reach_and_stop(t),
            Command::Light(LightCommand::SetOn) => self.light_set_on(),
            Command::Light(LightCommand::SetOff) => self.light_set_off(),
            Command::Light(LightCommand::SetColor(r)) => self.light_set_color(r),
        };
        if let Err(e) = &result {
            tracing::warn!(device = %command.device(), code = e.code(), error = %e, "command rejected");
        }
        result
    }

    /// Advance devices, evaluate the watchdog and apply its stops, all under
    /// the interlock lock.
    pub fn tick(
        &self,
        elapsed: Duration,
        input_celsius: Option<f32>,
        network: NetworkStatus,
        watchdog: &Watchdog,
        started_at: Instant,
    ) -> TickReport {
        let mut circ = self.circulation();
        let circulation = circ.tick(elapsed, input_celsius, &self.io);

        let mut readbacks = Vec::with_capacity(3);
        for (device, channel, commanded) in [
            (DeviceId::Pump, circ.pump().channel(), circ.pump().state()),
            (DeviceId::Heater, circ.heater().channel(), circ.heater().state()),
        ] {
            match self.io.read_back(channel) {
                Ok(actual_on) => readbacks.push(Readback {
                    device,
                    commanded,
                    actual_on,
                }),
                Err(PortError::Unsupported) => {}
                Err(e) => tracing::warn!(%device, error = %e, "read-back failed"),
            }
        }
        readbacks.extend(self.light.read_back());

        let view = SafetyView {
            pump: circ.pump().state(),
            heater: circ.heater().state(),
            network,
            now: self.io.now(),
            started_at,
            readbacks,
        };
        let violations = self.unlatched(watchdog.evaluate(&view), &view.readbacks);
        for v in &violations {
            let cause = StopCause::Safety(v.invariant);
            match v.device {
                DeviceId::Pump => circ.pump_hard_stop(cause, &self.io),
                DeviceId::Heater => circ.heater_hard_stop(cause, &self.io),
                DeviceId::Light => self.light.hard_stop(cause),
            }
        }
        TickReport {
            circulation,
            violations,
        }
    }

    /// Drop mismatch violations for devices that are already OFF and were
    /// stopped for the same mismatch; a stuck relay is reported once, until
    /// its read-back agrees again.
    fn unlatched(&self, violations: Vec<Violation>, readbacks: &[Readback]) -> Vec<Violation> {
        let mut latched = self
            .mismatch_latched
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        latched.retain(|d| readbacks.iter().any(|rb| rb.device == *d && rb.mismatched()));
        violations
            .into_iter()
            .filter(|v| {
                if v.invariant != Invariant::ActuationMismatch {
                    return true;
                }
                let commanded_off = readbacks
                    .iter()
                    .any(|rb| rb.device == v.device && !rb.commanded.is_on());
                if commanded_off && latched.contains(&v.device) {
                    tracing::debug!(device = %v.device, "read-back mismatch persists");
                    return false;
                }
                if !latched.contains(&v.device) {
                    latched.push(v.device);
                }
                true
            })
            .collect()
    }

    /// Ordered shutdown: heater, pump, light.
    pub fn shutdown(&self) {
        tracing::info!("ordered shutdown");
        {
            let mut circ = self.circulation();
            circ.heater_hard_stop(StopCause::Shutdown, &self.io);
            circ.pump_hard_stop(StopCause::Shutdown, &self.io);
        }
        self.light.hard_stop(StopCause::Shutdown);
    }

    pub fn snapshot(&self, sensors: Vec<SensorSnapshot>, network_connected: bool) -> Snapshot {
        let now = self.io.now();
        let (pump, heater) = {
            let circ = self.circulation();
            let p = circ.pump();
            let h = circ.heater();
            (
                PumpSnapshot {
                    state: p.state(),
                    mode: p.mode().as_str(),
                    remaining_s: p.mode().remaining_seconds(),
                    runtime_s: p.timer().elapsed(now).as_secs(),
                },
                HeaterSnapshot {
                    state: h.state(),
                    mode: h.mode().as_str(),
                    target_c: h.mode().target_celsius(),
                    runtime_s: h.timer().elapsed(now).as_secs(),
                },
            )
        };
        let lv = self.light.view();
        Snapshot {
            at: Utc::now(),
            pump,
            heater,
            light: LightSnapshot {
                state: lv.state,
                color: lv.assumed,
                color_name: lv.assumed.map(|c| c.name()),
                pending: lv.pending,
                sequencing: lv.sequencing,
            },
            sensors,
            network_connected,
        }
    }
}
