//! Outbound collaborators and the shared actuation handle used by devices.
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Instant;

use poolctl_traits::{ActuationPort, Channel, Clock, PortError};

use crate::events::{DeviceEvent, DeviceId, RuntimeRecord};
use crate::snapshot::Snapshot;

/// Receives the full device snapshot once per tick. Fire-and-forget.
pub trait StatePublisher: Send + Sync {
    fn publish(&self, snapshot: &Snapshot);
}

/// Transition and runtime sink. Errors are logged by the caller and never
/// block the transition that produced the record.
pub trait EventLog: Send + Sync {
    fn record_event(&self, event: &DeviceEvent) -> eyre::Result<()>;
    fn record_runtime(&self, record: &RuntimeRecord) -> eyre::Result<()>;
}

/// Counts consecutive failed relay writes.
#[derive(Debug, Default)]
pub struct PortHealth {
    consecutive_failures: AtomicU32,
}

impl PortHealth {
    pub fn record_ok(&self) {
        self.consecutive_failures.store(0, Ordering::Relaxed);
    }

    pub fn record_failure(&self) -> u32 {
        self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::Relaxed)
    }
}

/// Actuation port, event log and clock shared by every device.
pub struct DeviceIo {
    port: Arc<dyn ActuationPort>,
    events: Arc<dyn EventLog>,
    clock: Arc<dyn Clock>,
    health: PortHealth,
}

impl DeviceIo {
    pub fn new(
        port: Arc<dyn ActuationPort>,
        events: Arc<dyn EventLog>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            port,
            events,
            clock,
            health: PortHealth::default(),
        }
    }

    pub fn now(&self) -> Instant {
        self.clock.now()
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub const fn health(&self) -> &PortHealth {
        &self.health
    }

    /// Drive a relay channel, counting the outcome against port health.
    pub fn actuate(&self, device: DeviceId, channel: Channel, on: bool) -> Result<(), PortError> {
        match self.port.set_channel(channel, on) {
            Ok(()) => {
                self.health.record_ok();
                tracing::trace!(%device, channel, on, "actuated");
                Ok(())
            }
            Err(e) => {
                let failures = self.health.record_failure();
                tracing::warn!(%device, channel, on, failures, error = %e, "actuation failed");
                Err(e)
            }
        }
    }

    pub fn read_back(&self, channel: Channel) -> Result<bool, PortError> {
        self.port.read_channel(channel)
    }

    pub fn record(&self, event: DeviceEvent) {
        if event.kind.is_safety() {
            tracing::error!(
                device = %event.device,
                from = %event.from,
                to = %event.to,
                kind = ?event.kind,
                "safety shutdown"
            );
        } else {
            tracing::info!(
                device = %event.device,
                from = %event.from,
                to = %event.to,
                kind = ?event.kind,
                "device transition"
            );
        }
        if let Err(e) = self.events.record_event(&event) {
            tracing::warn!(device = %event.device, error = %e, "event log write failed");
        }
    }

    pub fn record_runtime(&self, record: Option<RuntimeRecord>) {
        let Some(record) = record else { return };
        tracing::debug!(
            device = %record.device,
            elapsed_s = record.elapsed_seconds,
            "runtime recorded"
        );
        if let Err(e) = self.events.record_runtime(&record) {
            tracing::warn!(device = %record.device, error = %e, "runtime log write failed");
        }
    }
}

/// Event log that discards records; transitions are still traced.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullEventLog;

impl EventLog for NullEventLog {
    fn record_event(&self, _event: &DeviceEvent) -> eyre::Result<()> {
        Ok(())
    }
    fn record_runtime(&self, _record: &RuntimeRecord) -> eyre::Result<()> {
        Ok(())
    }
}

/// Publisher that discards snapshots.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullPublisher;

impl StatePublisher for NullPublisher {
    fn publish(&self, _snapshot: &Snapshot) {}
}
