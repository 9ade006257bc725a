//! Pump and heater behind one lock.
//!
//! Every operation that can affect `heater ON => pump ON` runs on
//! `&mut Circulation`, so callers must hold the single interlock mutex for
//! the whole check-and-actuate step. Pump OFF transitions stop the heater
//! first, inside the same critical section.
use std::time::Duration;

use crate::devices::heater::{Heater, HeaterTick};
use crate::devices::pump::Pump;
use crate::error::CommandError;
use crate::events::{Invariant, StopCause};
use crate::ports::DeviceIo;

#[derive(Debug)]
pub struct Circulation {
    pump: Pump,
    heater: Heater,
}

/// What one circulation tick did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CirculationTick {
    pub timed_run_completed: bool,
    pub heater: HeaterTick,
}

impl Circulation {
    pub const fn new(pump: Pump, heater: Heater) -> Self {
        Self { pump, heater }
    }

    pub const fn pump(&self) -> &Pump {
        &self.pump
    }

    pub const fn heater(&self) -> &Heater {
        &self.heater
    }

    pub fn pump_request_on(&mut self, io: &DeviceIo) -> Result<(), CommandError> {
        self.pump.request_on(io)
    }

    pub fn pump_request_timed_run(&mut self, minutes: u32, io: &DeviceIo) -> Result<(), CommandError> {
        self.pump.request_timed_run(minutes, io)
    }

    pub fn pump_request_off(&mut self, io: &DeviceIo) -> Result<(), CommandError> {
        self.stop_heater_for_pump(StopCause::Safety(Invariant::HeaterRequiresPump), io);
        self.pump.request_off(io)
    }

    pub fn pump_hard_stop(&mut self, cause: StopCause, io: &DeviceIo) {
        let heater_cause = match cause {
            StopCause::Shutdown => StopCause::Shutdown,
            StopCause::Safety(_) => StopCause::Safety(Invariant::HeaterRequiresPump),
        };
        self.stop_heater_for_pump(heater_cause, io);
        self.pump.hard_stop(cause, io);
    }

    pub fn heater_request_on(&mut self, io: &DeviceIo) -> Result<(), CommandError> {
        self.heater.request_on(&self.pump, io)
    }

    pub fn heater_request_reach_and_stop(
        &mut self,
        target_celsius: f32,
        io: &DeviceIo,
    ) -> Result<(), CommandError> {
        self.heater
            .request_reach_and_stop(target_celsius, &self.pump, io)
    }

    pub fn heater_request_off(&mut self, io: &DeviceIo) -> Result<(), CommandError> {
        self.heater.request_off(io)
    }

    pub fn heater_hard_stop(&mut self, cause: StopCause, io: &DeviceIo) {
        self.heater.hard_stop(cause, io);
    }

    /// Advance the timed run and evaluate the heater against `input_celsius`.
    pub fn tick(&mut self, elapsed: Duration, input_celsius: Option<f32>, io: &DeviceIo) -> CirculationTick {
        let timed_run_completed = self.pump.advance(elapsed);
        if timed_run_completed {
            self.stop_heater_for_pump(StopCause::Safety(Invariant::HeaterRequiresPump), io);
            self.pump.complete_timed_run(io);
        }
        let heater = self.heater.tick(input_celsius, io);
        CirculationTick {
            timed_run_completed,
            heater,
        }
    }

    fn stop_heater_for_pump(&mut self, cause: StopCause, io: &DeviceIo) {
        if self.heater.state().is_on() {
            tracing::info!("pump going off, stopping heater first");
            self.heater.hard_stop(cause, io);
        }
    }
}
