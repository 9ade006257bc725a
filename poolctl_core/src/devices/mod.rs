//! The three relay-driven devices.
pub mod color;
pub mod heater;
pub mod light;
pub mod pump;

pub use color::{COLOR_COUNT, ColorIndex, ColorRequest};
pub use heater::{Heater, HeaterMode, HeaterTick};
pub use light::{LightColorController, LightView, SequenceOutcome};
pub use pump::{Pump, PumpMode};
