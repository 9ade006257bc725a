use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use crate::events::{DeviceId, RuntimeRecord};

/// Measures one ON period of a device.
#[derive(Debug, Clone)]
pub struct RuntimeTimer {
    device: DeviceId,
    running: Option<(DateTime<Utc>, Instant)>,
}

impl RuntimeTimer {
    pub const fn new(device: DeviceId) -> Self {
        Self {
            device,
            running: None,
        }
    }

    /// Start timing. No effect while already running.
    pub fn start(&mut self, now: Instant) {
        if self.running.is_none() {
            self.running = Some((Utc::now(), now));
        }
    }

    pub const fn is_running(&self) -> bool {
        self.running.is_some()
    }

    pub fn elapsed(&self, now: Instant) -> Duration {
        self.running
            .map_or(Duration::ZERO, |(_, t0)| now.saturating_duration_since(t0))
    }

    /// Stop and hand back the completed period, resetting the timer.
    pub fn stop(&mut self, now: Instant) -> Option<RuntimeRecord> {
        let (started_at, t0) = self.running.take()?;
        Some(RuntimeRecord {
            device: self.device,
            started_at,
            elapsed_seconds: now.saturating_duration_since(t0).as_secs(),
        })
    }
}
