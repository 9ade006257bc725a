use std::ops::RangeInclusive;

use poolctl_traits::Channel;
use serde_json::json;

use super::pump::Pump;
use crate::config::HeaterLimits;
use crate::error::CommandError;
use crate::events::{DeviceEvent, DeviceId, DeviceState, EventKind, Invariant, StopCause};
use crate::ports::DeviceIo;
use crate::timer::RuntimeTimer;

/// Accepted reach-and-stop targets, degrees Celsius.
pub const TARGET_RANGE_C: RangeInclusive<f32> = 20.0..=40.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HeaterMode {
    Idle,
    Continuous,
    ReachAndStop { target_celsius: f32 },
}

impl HeaterMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Continuous => "continuous",
            Self::ReachAndStop { .. } => "reach_and_stop",
        }
    }

    pub const fn target_celsius(self) -> Option<f32> {
        match self {
            Self::ReachAndStop { target_celsius } => Some(target_celsius),
            _ => None,
        }
    }
}

/// What a heater tick did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HeaterTick {
    Off,
    Running,
    /// Target reached, normal stop.
    Reached,
    SafetyStop(Invariant),
}

#[derive(Debug)]
pub struct Heater {
    channel: Channel,
    state: DeviceState,
    mode: HeaterMode,
    timer: RuntimeTimer,
    limits: HeaterLimits,
}

impl Heater {
    pub const fn new(channel: Channel, limits: HeaterLimits) -> Self {
        Self {
            channel,
            state: DeviceState::Off,
            mode: HeaterMode::Idle,
            timer: RuntimeTimer::new(DeviceId::Heater),
            limits,
        }
    }

    pub const fn channel(&self) -> Channel {
        self.channel
    }

    pub const fn state(&self) -> DeviceState {
        self.state
    }

    pub const fn mode(&self) -> HeaterMode {
        self.mode
    }

    pub const fn timer(&self) -> &RuntimeTimer {
        &self.timer
    }

    pub(crate) fn request_on(&mut self, pump: &Pump, io: &DeviceIo) -> Result<(), CommandError> {
        Self::ensure_pump_on(pump)?;
        self.power_on(io)?;
        self.set_mode(HeaterMode::Continuous, io);
        Ok(())
    }

    pub(crate) fn request_reach_and_stop(
        &mut self,
        target_celsius: f32,
        pump: &Pump,
        io: &DeviceIo,
    ) -> Result<(), CommandError> {
        if !target_celsius.is_finite() || !TARGET_RANGE_C.contains(&target_celsius) {
            return Err(CommandError::InvalidParameter(format!(
                "reach-and-stop target must be in 20.0..=40.0 C, got {target_celsius}"
            )));
        }
        if target_celsius > self.limits.max_water_temp_c {
            return Err(CommandError::InvalidParameter(format!(
                "reach-and-stop target {target_celsius} C is above the water limit of {} C",
                self.limits.max_water_temp_c
            )));
        }
        Self::ensure_pump_on(pump)?;
        self.power_on(io)?;
        self.set_mode(HeaterMode::ReachAndStop { target_celsius }, io);
        Ok(())
    }

    pub(crate) fn request_off(&mut self, io: &DeviceIo) -> Result<(), CommandError> {
        let written = io.actuate(DeviceId::Heater, self.channel, false);
        self.enter_off(EventKind::Requested, io);
        written.map_err(CommandError::from)
    }

    /// Unconditional, idempotent OFF.
    pub(crate) fn hard_stop(&mut self, cause: StopCause, io: &DeviceIo) {
        if let Err(e) = io.actuate(DeviceId::Heater, self.channel, false) {
            tracing::error!(error = %e, "heater hard stop write failed");
        }
        self.enter_off(EventKind::from(cause), io);
    }

    /// Evaluate the ON-state rules against the staleness-checked input reading.
    ///
    /// A reached target is a normal stop even at the water limit; requests
    /// above the limit are rejected up front.
    pub(crate) fn tick(&mut self, input_celsius: Option<f32>, io: &DeviceIo) -> HeaterTick {
        if !self.state.is_on() {
            return HeaterTick::Off;
        }
        // A DS18B20 glitch reads as 0 or slightly below; the heater loop is never that cold.
        let input = input_celsius.filter(|t| *t > 0.0);
        if let (Some(t), None) = (input_celsius, input) {
            tracing::warn!(input_celsius = t, "implausible heater input reading");
        }

        if self.timer.elapsed(io.now()) > self.limits.max_runtime {
            return self.safety_stop(Invariant::HeaterMaxRuntime, io);
        }
        let Some(t) = input else {
            return self.safety_stop(Invariant::HeaterSensorAbsent, io);
        };

        if let HeaterMode::ReachAndStop { target_celsius } = self.mode {
            if t >= target_celsius {
                if let Err(e) = io.actuate(DeviceId::Heater, self.channel, false) {
                    tracing::error!(error = %e, "heater target stop write failed");
                }
                tracing::info!(target_celsius, input_celsius = t, "heater target reached");
                self.enter_off(EventKind::Completed, io);
                return HeaterTick::Reached;
            }
        }

        if t >= self.limits.max_water_temp_c {
            return self.safety_stop(Invariant::HeaterOverTemperature, io);
        }
        HeaterTick::Running
    }

    fn safety_stop(&mut self, invariant: Invariant, io: &DeviceIo) -> HeaterTick {
        self.hard_stop(StopCause::Safety(invariant), io);
        HeaterTick::SafetyStop(invariant)
    }

    fn ensure_pump_on(pump: &Pump) -> Result<(), CommandError> {
        if pump.state().is_on() {
            Ok(())
        } else {
            Err(CommandError::InterlockViolation("heater requires the pump to be on"))
        }
    }

    fn power_on(&mut self, io: &DeviceIo) -> Result<(), CommandError> {
        io.actuate(DeviceId::Heater, self.channel, true)?;
        if !self.state.is_on() {
            self.state = DeviceState::On;
            self.timer.start(io.now());
            io.record(DeviceEvent::new(DeviceId::Heater, EventKind::Requested, "off", "on"));
        }
        Ok(())
    }

    fn set_mode(&mut self, mode: HeaterMode, io: &DeviceIo) {
        let from = self.mode;
        self.mode = mode;
        if from != mode {
            io.record(
                DeviceEvent::new(DeviceId::Heater, EventKind::ModeChanged, from.as_str(), mode.as_str())
                    .with_metadata(json!({ "target_c": mode.target_celsius() })),
            );
        }
    }

    fn enter_off(&mut self, kind: EventKind, io: &DeviceIo) {
        let from = self.state;
        let mode = self.mode;
        self.state = DeviceState::Off;
        self.mode = HeaterMode::Idle;
        io.record_runtime(self.timer.stop(io.now()));
        if from.is_on() || kind.is_safety() {
            io.record(
                DeviceEvent::new(DeviceId::Heater, kind, from.as_str(), "off")
                    .with_metadata(json!({ "mode": mode.as_str() })),
            );
        }
    }
}
