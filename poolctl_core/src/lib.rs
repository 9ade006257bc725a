#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Pool equipment control (hardware-agnostic).
//!
//! Drives a circulation pump, a water heater and a color-changing light
//! through `poolctl_traits::ActuationPort`, reads temperatures through
//! `poolctl_traits::SensorPort` and paces everything off an injected
//! `poolctl_traits::Clock`.
//!
//! ## Architecture
//!
//! - **Devices**: pump, heater and light state machines (`devices`)
//! - **Interlock**: pump and heater share one lock (`interlock`)
//! - **Controller**: command surface and watchdog application (`controller`)
//! - **Control loop**: fixed-cadence sampling and publishing (`control`)
//! - **Light worker**: background pulse sequencing (`worker`)
//! - **Events**: transition records and the JSONL sink (`events`, `event_log`)
//!
//! ## Safety
//!
//! The heater is never ON while the pump is OFF. Every path that turns the
//! pump off stops the heater first under the same lock, and the watchdog
//! re-checks the rule every tick alongside network loss, heater limits and
//! relay read-back.

pub mod commands;
pub mod config;
pub mod control;
pub mod controller;
pub mod conversions;
pub mod devices;
pub mod error;
pub mod event_log;
pub mod events;
pub mod interlock;
pub mod mocks;
pub mod ports;
pub mod snapshot;
pub mod thermometer;
pub mod timer;
pub mod watchdog;
pub mod worker;

pub use commands::{Command, CommandReply, parse_command};
pub use control::ControlLoop;
pub use controller::{PoolController, TickReport};
pub use error::{CommandError, Fault, Result};
pub use event_log::JsonlEventLog;
pub use events::{DeviceEvent, DeviceId, DeviceState, EventKind, Invariant, RuntimeRecord};
pub use ports::{DeviceIo, EventLog, StatePublisher};
pub use snapshot::Snapshot;
pub use thermometer::Thermometer;
pub use watchdog::Watchdog;
pub use worker::LightWorker;
