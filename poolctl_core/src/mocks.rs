//! In-memory collaborators for tests and dry runs.
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use poolctl_traits::{
    ActuationPort, Channel, Clock, ConnectivityProbe, NetworkStatus, PortError, SensorError,
    SensorPort,
};

use crate::events::{DeviceEvent, RuntimeRecord};
use crate::ports::{EventLog, StatePublisher};
use crate::snapshot::Snapshot;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One relay write as seen by [`RecordingPort`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Write {
    pub channel: Channel,
    pub on: bool,
    pub at: Instant,
}

/// Relay block that remembers every write with its timestamp.
pub struct RecordingPort {
    clock: Arc<dyn Clock>,
    writes: Mutex<Vec<Write>>,
    levels: Mutex<HashMap<Channel, bool>>,
    stuck: Mutex<HashMap<Channel, bool>>,
    failing: AtomicBool,
    read_back: bool,
}

impl RecordingPort {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            writes: Mutex::new(Vec::new()),
            levels: Mutex::new(HashMap::new()),
            stuck: Mutex::new(HashMap::new()),
            failing: AtomicBool::new(false),
            read_back: true,
        }
    }

    /// Port without a feedback path.
    #[must_use]
    pub const fn without_read_back(mut self) -> Self {
        self.read_back = false;
        self
    }

    /// Make every following write fail with `Unreachable`.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Relaxed);
    }

    /// Force the physical level of a channel without a write.
    pub fn force_level(&self, channel: Channel, on: bool) {
        lock(&self.levels).insert(channel, on);
    }

    /// Pin the read-back of a channel regardless of writes; `None` releases it.
    pub fn set_stuck(&self, channel: Channel, level: Option<bool>) {
        match level {
            Some(on) => lock(&self.stuck).insert(channel, on),
            None => lock(&self.stuck).remove(&channel),
        };
    }

    pub fn writes(&self) -> Vec<Write> {
        lock(&self.writes).clone()
    }

    pub fn writes_for(&self, channel: Channel) -> Vec<Write> {
        lock(&self.writes)
            .iter()
            .filter(|w| w.channel == channel)
            .copied()
            .collect()
    }

    pub fn clear(&self) {
        lock(&self.writes).clear();
    }

    pub fn is_on(&self, channel: Channel) -> bool {
        lock(&self.levels).get(&channel).copied().unwrap_or(false)
    }
}

impl ActuationPort for RecordingPort {
    fn set_channel(&self, channel: Channel, on: bool) -> Result<(), PortError> {
        if self.failing.load(Ordering::Relaxed) {
            return Err(PortError::Unreachable("recording port failing".into()));
        }
        lock(&self.writes).push(Write {
            channel,
            on,
            at: self.clock.now(),
        });
        lock(&self.levels).insert(channel, on);
        Ok(())
    }

    fn read_channel(&self, channel: Channel) -> Result<bool, PortError> {
        if !self.read_back {
            return Err(PortError::Unsupported);
        }
        if let Some(&on) = lock(&self.stuck).get(&channel) {
            return Ok(on);
        }
        Ok(self.is_on(channel))
    }
}

/// Sensor port answering from a per-sensor script. Once a script runs dry
/// the last value repeats; an unknown sensor reports `NotFound`.
#[derive(Default)]
pub struct ScriptedSensor {
    scripts: Mutex<HashMap<String, Vec<Result<f32, SensorError>>>>,
    last: Mutex<HashMap<String, Result<f32, SensorError>>>,
    calls: Mutex<HashMap<String, u32>>,
}

impl ScriptedSensor {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_value(self, sensor: &str, celsius: f32) -> Self {
        self.set_value(sensor, celsius);
        self
    }

    /// Replace the script of `sensor` with one fixed value.
    pub fn set_value(&self, sensor: &str, celsius: f32) {
        lock(&self.scripts).remove(sensor);
        lock(&self.last).insert(sensor.to_string(), Ok(celsius));
    }

    /// Queue results returned in order before the fixed value resumes.
    pub fn push(&self, sensor: &str, results: impl IntoIterator<Item = Result<f32, SensorError>>) {
        let mut scripts = lock(&self.scripts);
        let script = scripts.entry(sensor.to_string()).or_default();
        script.extend(results);
    }

    pub fn set_failing(&self, sensor: &str) {
        lock(&self.scripts).remove(sensor);
        lock(&self.last).insert(sensor.to_string(), Err(SensorError::Timeout));
    }

    pub fn calls(&self, sensor: &str) -> u32 {
        lock(&self.calls).get(sensor).copied().unwrap_or(0)
    }
}

impl SensorPort for ScriptedSensor {
    fn read_temperature(&self, sensor: &str, _timeout: Duration) -> Result<f32, SensorError> {
        *lock(&self.calls).entry(sensor.to_string()).or_default() += 1;
        {
            let mut scripts = lock(&self.scripts);
            if let Some(script) = scripts.get_mut(sensor) {
                if !script.is_empty() {
                    return script.remove(0);
                }
            }
        }
        lock(&self.last)
            .get(sensor)
            .cloned()
            .unwrap_or_else(|| Err(SensorError::NotFound(sensor.to_string())))
    }
}

/// Event log kept in memory.
#[derive(Default)]
pub struct MemoryEventLog {
    events: Mutex<Vec<DeviceEvent>>,
    runtimes: Mutex<Vec<RuntimeRecord>>,
}

impl MemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<DeviceEvent> {
        lock(&self.events).clone()
    }

    pub fn runtimes(&self) -> Vec<RuntimeRecord> {
        lock(&self.runtimes).clone()
    }
}

impl EventLog for MemoryEventLog {
    fn record_event(&self, event: &DeviceEvent) -> eyre::Result<()> {
        lock(&self.events).push(event.clone());
        Ok(())
    }

    fn record_runtime(&self, record: &RuntimeRecord) -> eyre::Result<()> {
        lock(&self.runtimes).push(record.clone());
        Ok(())
    }
}

/// Publisher that keeps every snapshot.
#[derive(Default)]
pub struct CapturePublisher {
    snapshots: Mutex<Vec<Snapshot>>,
}

impl CapturePublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshots(&self) -> Vec<Snapshot> {
        lock(&self.snapshots).clone()
    }

    pub fn last(&self) -> Option<Snapshot> {
        lock(&self.snapshots).last().cloned()
    }
}

impl StatePublisher for CapturePublisher {
    fn publish(&self, snapshot: &Snapshot) {
        lock(&self.snapshots).push(snapshot.clone());
    }
}

/// Connectivity probe whose answer is set by hand. While connected it
/// reports the current clock time as last seen.
pub struct FixedProbe {
    clock: Arc<dyn Clock>,
    connected: AtomicBool,
    last_seen: Mutex<Option<Instant>>,
}

impl FixedProbe {
    pub fn new(connected: bool, clock: Arc<dyn Clock>) -> Self {
        let last_seen = connected.then(|| clock.now());
        Self {
            clock,
            connected: AtomicBool::new(connected),
            last_seen: Mutex::new(last_seen),
        }
    }

    pub fn set_connected(&self, connected: bool) {
        if self.connected.swap(connected, Ordering::Relaxed) && !connected {
            *lock(&self.last_seen) = Some(self.clock.now());
        }
    }
}

impl ConnectivityProbe for FixedProbe {
    fn status(&self) -> NetworkStatus {
        if self.connected.load(Ordering::Relaxed) {
            let now = self.clock.now();
            *lock(&self.last_seen) = Some(now);
            NetworkStatus::connected(now)
        } else {
            NetworkStatus {
                connected: false,
                last_seen_at: *lock(&self.last_seen),
            }
        }
    }
}
