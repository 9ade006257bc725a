use std::ops::RangeInclusive;
use std::time::Duration;

use poolctl_traits::Channel;
use serde_json::json;

use crate::error::CommandError;
use crate::events::{DeviceEvent, DeviceId, DeviceState, EventKind, StopCause};
use crate::ports::DeviceIo;
use crate::timer::RuntimeTimer;

/// Accepted duration of a timed run, in minutes.
pub const TIMED_RUN_MINUTES: RangeInclusive<u32> = 1..=480;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpMode {
    Idle,
    Continuous,
    TimedRun { remaining: Duration },
}

impl PumpMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Continuous => "continuous",
            Self::TimedRun { .. } => "timed_run",
        }
    }

    /// Whole seconds left in a timed run, rounded up.
    pub fn remaining_seconds(self) -> Option<u32> {
        match self {
            Self::TimedRun { remaining } => {
                let secs = remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0);
                Some(u32::try_from(secs).unwrap_or(u32::MAX))
            }
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct Pump {
    channel: Channel,
    state: DeviceState,
    mode: PumpMode,
    timer: RuntimeTimer,
}

impl Pump {
    pub const fn new(channel: Channel) -> Self {
        Self {
            channel,
            state: DeviceState::Off,
            mode: PumpMode::Idle,
            timer: RuntimeTimer::new(DeviceId::Pump),
        }
    }

    pub const fn channel(&self) -> Channel {
        self.channel
    }

    pub const fn state(&self) -> DeviceState {
        self.state
    }

    pub const fn mode(&self) -> PumpMode {
        self.mode
    }

    pub const fn timer(&self) -> &RuntimeTimer {
        &self.timer
    }

    pub(crate) fn request_on(&mut self, io: &DeviceIo) -> Result<(), CommandError> {
        self.power_on(io)?;
        self.set_mode(PumpMode::Continuous, io);
        Ok(())
    }

    pub(crate) fn request_timed_run(&mut self, minutes: u32, io: &DeviceIo) -> Result<(), CommandError> {
        if !TIMED_RUN_MINUTES.contains(&minutes) {
            return Err(CommandError::InvalidParameter(format!(
                "timed run minutes must be in 1..=480, got {minutes}"
            )));
        }
        let was_on = self.state.is_on();
        self.power_on(io)?;
        if was_on {
            // Each timed run is accounted separately.
            let now = io.now();
            io.record_runtime(self.timer.stop(now));
            self.timer.start(now);
        }
        let remaining = Duration::from_secs(u64::from(minutes) * 60);
        self.set_mode(PumpMode::TimedRun { remaining }, io);
        Ok(())
    }

    /// Caller must have forced the heater OFF first.
    pub(crate) fn request_off(&mut self, io: &DeviceIo) -> Result<(), CommandError> {
        let written = io.actuate(DeviceId::Pump, self.channel, false);
        self.enter_off(EventKind::Requested, io);
        written.map_err(CommandError::from)
    }

    /// Unconditional OFF. A failed relay write is absorbed: it is counted
    /// against port health and caught by the read-back check.
    pub(crate) fn hard_stop(&mut self, cause: StopCause, io: &DeviceIo) {
        if let Err(e) = io.actuate(DeviceId::Pump, self.channel, false) {
            tracing::error!(error = %e, "pump hard stop write failed");
        }
        self.enter_off(EventKind::from(cause), io);
    }

    /// Advance a timed run by `elapsed`. Returns true once the run has used
    /// up its time; the pump stays ON until `complete_timed_run`.
    pub(crate) fn advance(&mut self, elapsed: Duration) -> bool {
        if !self.state.is_on() {
            return false;
        }
        match &mut self.mode {
            PumpMode::TimedRun { remaining } => {
                *remaining = remaining.saturating_sub(elapsed);
                remaining.is_zero()
            }
            _ => false,
        }
    }

    pub(crate) fn complete_timed_run(&mut self, io: &DeviceIo) {
        if let Err(e) = io.actuate(DeviceId::Pump, self.channel, false) {
            tracing::error!(error = %e, "pump timed-run stop write failed");
        }
        self.enter_off(EventKind::Completed, io);
    }

    fn power_on(&mut self, io: &DeviceIo) -> Result<(), CommandError> {
        io.actuate(DeviceId::Pump, self.channel, true)?;
        if !self.state.is_on() {
            self.state = DeviceState::On;
            self.timer.start(io.now());
            io.record(DeviceEvent::new(DeviceId::Pump, EventKind::Requested, "off", "on"));
        }
        Ok(())
    }

    fn set_mode(&mut self, mode: PumpMode, io: &DeviceIo) {
        let from = self.mode;
        self.mode = mode;
        if from.as_str() != mode.as_str() || matches!(mode, PumpMode::TimedRun { .. }) {
            io.record(
                DeviceEvent::new(DeviceId::Pump, EventKind::ModeChanged, from.as_str(), mode.as_str())
                    .with_metadata(json!({ "remaining_s": mode.remaining_seconds() })),
            );
        }
    }

    fn enter_off(&mut self, kind: EventKind, io: &DeviceIo) {
        let from = self.state;
        let mode = self.mode;
        self.state = DeviceState::Off;
        self.mode = PumpMode::Idle;
        io.record_runtime(self.timer.stop(io.now()));
        if from.is_on() || kind.is_safety() {
            io.record(
                DeviceEvent::new(DeviceId::Pump, kind, from.as_str(), "off")
                    .with_metadata(json!({ "mode": mode.as_str() })),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remaining_seconds_rounds_up() {
        let m = PumpMode::TimedRun {
            remaining: Duration::from_millis(1500),
        };
        assert_eq!(m.remaining_seconds(), Some(2));
        assert_eq!(PumpMode::Continuous.remaining_seconds(), None);
    }
}
