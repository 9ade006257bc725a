#![allow(dead_code)]
use std::sync::Arc;
use std::time::{Duration, Instant};

use poolctl_core::config::{Channels, HeaterLimits, LightTiming, WatchdogCfg};
use poolctl_core::mocks::{MemoryEventLog, RecordingPort};
use poolctl_core::{DeviceIo, EventKind, PoolController, TickReport, Watchdog};
use poolctl_traits::{Clock, ManualClock, NetworkStatus};

pub const PUMP: u8 = 1;
pub const HEATER: u8 = 2;
pub const LIGHT: u8 = 3;

pub const TIMING: LightTiming = LightTiming {
    advance_window: Duration::from_millis(500),
    reset_window: Duration::from_secs(5),
    settle: Duration::from_millis(1500),
    power_on_hold: Duration::from_secs(17),
    retain_after_off: Duration::from_secs(60),
};

/// Controller wired to in-memory collaborators on a manual clock.
pub struct Rig {
    pub clock: Arc<ManualClock>,
    pub port: Arc<RecordingPort>,
    pub events: Arc<MemoryEventLog>,
    pub controller: Arc<PoolController>,
    pub watchdog: Watchdog,
    pub started_at: Instant,
}

impl Rig {
    pub fn new() -> Self {
        Self::with_limits(HeaterLimits::default())
    }

    pub fn with_limits(limits: HeaterLimits) -> Self {
        Self::assemble(limits, true)
    }

    /// Relay block with no feedback path, like the GPIO board.
    pub fn without_read_back() -> Self {
        Self::assemble(HeaterLimits::default(), false)
    }

    fn assemble(limits: HeaterLimits, read_back: bool) -> Self {
        let clock = Arc::new(ManualClock::new());
        let port = RecordingPort::new(clock.clone());
        let port = Arc::new(if read_back { port } else { port.without_read_back() });
        let events = Arc::new(MemoryEventLog::new());
        let io = Arc::new(DeviceIo::new(port.clone(), events.clone(), clock.clone()));
        let controller = Arc::new(PoolController::new(Channels::default(), limits, TIMING, io));
        let started_at = clock.now();
        Self {
            clock,
            port,
            events,
            controller,
            watchdog: Watchdog::new(WatchdogCfg::default()),
            started_at,
        }
    }

    /// Move time forward by `step` and run one controller tick with the
    /// network up.
    pub fn step(&self, step: Duration, input_celsius: Option<f32>) -> TickReport {
        self.clock.advance(step);
        let network = NetworkStatus::connected(self.clock.now());
        self.controller
            .tick(step, input_celsius, network, &self.watchdog, self.started_at)
    }

    pub fn kinds(&self, device: poolctl_core::DeviceId) -> Vec<EventKind> {
        self.events
            .events()
            .into_iter()
            .filter(|e| e.device == device)
            .map(|e| e.kind)
            .collect()
    }
}
