pub mod clock;

pub use clock::{Clock, ManualClock, MonotonicClock};

use std::time::{Duration, Instant};
use thiserror::Error;

/// Relay channel identifier (relay block port number).
pub type Channel = u8;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PortError {
    /// The hardware layer could not be reached at all.
    #[error("actuation port unreachable: {0}")]
    Unreachable(String),
    #[error("actuation port timed out")]
    Timeout,
    #[error("unknown channel {0}")]
    UnknownChannel(Channel),
    /// The port has no read-back capability.
    #[error("read-back not supported")]
    Unsupported,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SensorError {
    #[error("sensor {0} not found")]
    NotFound(String),
    #[error("sensor read timed out")]
    Timeout,
    #[error("sensor data rejected: {0}")]
    Invalid(String),
    #[error("sensor io: {0}")]
    Io(String),
}

/// Binary on/off control of relay channels.
///
/// Implementations are shared between devices and threads, so all methods
/// take `&self` and synchronize internally.
pub trait ActuationPort: Send + Sync {
    fn set_channel(&self, channel: Channel, on: bool) -> Result<(), PortError>;

    /// Read back the physical state of a channel. Ports without a feedback
    /// path keep the default and report `Unsupported`.
    fn read_channel(&self, _channel: Channel) -> Result<bool, PortError> {
        Err(PortError::Unsupported)
    }
}

/// Point-in-time temperature reads.
pub trait SensorPort: Send + Sync {
    fn read_temperature(&self, sensor: &str, timeout: Duration) -> Result<f32, SensorError>;
}

/// Network reachability as last observed by a connectivity probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkStatus {
    pub connected: bool,
    /// Last instant the remote side was known reachable.
    pub last_seen_at: Option<Instant>,
}

impl NetworkStatus {
    pub fn connected(at: Instant) -> Self {
        Self {
            connected: true,
            last_seen_at: Some(at),
        }
    }

    /// How long the network has been unreachable, measured from `last_seen_at`
    /// (or from `since` when it was never seen).
    pub fn disconnected_for(&self, now: Instant, since: Instant) -> Duration {
        if self.connected {
            return Duration::ZERO;
        }
        now.saturating_duration_since(self.last_seen_at.unwrap_or(since))
    }
}

/// Supplies the latest connectivity status. Polled by the control loop.
pub trait ConnectivityProbe: Send + Sync {
    fn status(&self) -> NetworkStatus;
}

impl<T: ActuationPort + ?Sized> ActuationPort for std::sync::Arc<T> {
    fn set_channel(&self, channel: Channel, on: bool) -> Result<(), PortError> {
        (**self).set_channel(channel, on)
    }
    fn read_channel(&self, channel: Channel) -> Result<bool, PortError> {
        (**self).read_channel(channel)
    }
}

impl<T: SensorPort + ?Sized> SensorPort for std::sync::Arc<T> {
    fn read_temperature(&self, sensor: &str, timeout: Duration) -> Result<f32, SensorError> {
        (**self).read_temperature(sensor, timeout)
    }
}

impl<T: ConnectivityProbe + ?Sized> ConnectivityProbe for std::sync::Arc<T> {
    fn status(&self) -> NetworkStatus {
        (**self).status()
    }
}
