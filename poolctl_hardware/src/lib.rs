#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Hardware backends for the pool controller ports.
//!
//! - `sim`: in-memory relay block, thermal model, sensors and probe
//! - `w1`: 1-Wire DS18B20 sensors read from sysfs
//! - `probe`: TCP reachability probe thread
//! - `relay` (feature `hardware`, Linux): GPIO relay block via `rppal`
pub mod error;
pub mod probe;
#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod relay;
pub mod sim;
pub mod util;
pub mod w1;

pub use error::HwError;
pub use probe::TcpProbe;
#[cfg(all(feature = "hardware", target_os = "linux"))]
pub use relay::GpioRelayBlock;
pub use sim::{SimPool, SimProbe, SimRelayBlock, SimSensorKind, SimSensors, ThermalParams};
pub use w1::{DEFAULT_W1_BASE, W1Sensors};
