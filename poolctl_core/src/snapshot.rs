use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::devices::color::{ColorIndex, ColorRequest};
use crate::events::DeviceState;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PumpSnapshot {
    pub state: DeviceState,
    pub mode: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_s: Option<u32>,
    pub runtime_s: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeaterSnapshot {
    pub state: DeviceState,
    pub mode: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_c: Option<f32>,
    pub runtime_s: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LightSnapshot {
    pub state: DeviceState,
    pub color: Option<ColorIndex>,
    pub color_name: Option<&'static str>,
    pub pending: Option<ColorRequest>,
    pub sequencing: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorSnapshot {
    pub name: String,
    /// Last known value, possibly stale.
    pub celsius: Option<f32>,
    pub fresh: bool,
}

/// State of every device, published once per tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub at: DateTime<Utc>,
    pub pump: PumpSnapshot,
    pub heater: HeaterSnapshot,
    pub light: LightSnapshot,
    pub sensors: Vec<SensorSnapshot>,
    pub network_connected: bool,
}
