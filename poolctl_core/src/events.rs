//! Device transition and runtime records handed to the event log.
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceId {
    Pump,
    Heater,
    Light,
}

impl DeviceId {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pump => "pump",
            Self::Heater => "heater",
            Self::Light => "light",
        }
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceState {
    On,
    Off,
}

impl DeviceState {
    pub const fn from_on(on: bool) -> Self {
        if on { Self::On } else { Self::Off }
    }

    pub const fn is_on(self) -> bool {
        matches!(self, Self::On)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::On => "on",
            Self::Off => "off",
        }
    }
}

/// Safety rule whose violation forced a device OFF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Invariant {
    HeaterRequiresPump,
    HeaterMaxRuntime,
    HeaterSensorAbsent,
    HeaterOverTemperature,
    NetworkLost,
    NetworkOutage,
    ActuationMismatch,
}

impl Invariant {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::HeaterRequiresPump => "heater_requires_pump",
            Self::HeaterMaxRuntime => "heater_max_runtime",
            Self::HeaterSensorAbsent => "heater_sensor_absent",
            Self::HeaterOverTemperature => "heater_over_temperature",
            Self::NetworkLost => "network_lost",
            Self::NetworkOutage => "network_outage",
            Self::ActuationMismatch => "actuation_mismatch",
        }
    }
}

impl fmt::Display for Invariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a transition happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// User or network command.
    Requested,
    /// Mode changed without a power transition.
    ModeChanged,
    /// Goal reached: timed run elapsed, target temperature met, color set.
    Completed,
    /// Forced OFF by a violated invariant.
    SafetyShutdown(Invariant),
    /// Ordered process shutdown.
    Shutdown,
}

impl EventKind {
    pub const fn is_safety(self) -> bool {
        matches!(self, Self::SafetyShutdown(_))
    }
}

/// Cause of an unconditional stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopCause {
    Safety(Invariant),
    Shutdown,
}

impl From<StopCause> for EventKind {
    fn from(c: StopCause) -> Self {
        match c {
            StopCause::Safety(inv) => Self::SafetyShutdown(inv),
            StopCause::Shutdown => Self::Shutdown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceEvent {
    pub device: DeviceId,
    pub kind: EventKind,
    pub from: String,
    pub to: String,
    #[serde(skip_serializing_if = "serde_json::Value::is_null")]
    pub metadata: serde_json::Value,
    pub at: DateTime<Utc>,
}

impl DeviceEvent {
    pub fn new(device: DeviceId, kind: EventKind, from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            device,
            kind,
            from: from.into(),
            to: to.into(),
            metadata: serde_json::Value::Null,
            at: Utc::now(),
        }
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// One completed ON period.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuntimeRecord {
    pub device: DeviceId,
    pub started_at: DateTime<Utc>,
    pub elapsed_seconds: u64,
}
