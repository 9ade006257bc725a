//! Controller assembly and the `run` / `self-check` commands.

use std::io::BufRead;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use eyre::WrapErr;
use poolctl_config::Config;
use poolctl_core::config::ThermometerCfg;
use poolctl_core::ports::NullEventLog;
use poolctl_core::{
    CommandReply, ControlLoop, DeviceIo, EventLog, JsonlEventLog, LightWorker, PoolController,
    Snapshot, StatePublisher, Thermometer, Watchdog, parse_command,
};

use crate::backend::Backend;

/// Prints every snapshot as one JSON line on stdout.
pub struct StdoutPublisher;

impl StatePublisher for StdoutPublisher {
    fn publish(&self, snapshot: &Snapshot) {
        match serde_json::to_string(snapshot) {
            Ok(line) => println!("{line}"),
            Err(e) => tracing::warn!(error = %e, "snapshot serialization failed"),
        }
    }
}

fn event_log(cfg: &Config) -> Arc<dyn EventLog> {
    match &cfg.logging.events_file {
        Some(path) => {
            tracing::info!(path = %path, "device events logged to file");
            Arc::new(JsonlEventLog::new(path))
        }
        None => Arc::new(NullEventLog),
    }
}

/// Answer JSON command lines from stdin until EOF. The thread is detached:
/// a blocked stdin read must not hold up shutdown.
fn spawn_command_reader(controller: Arc<PoolController>) -> eyre::Result<()> {
    std::thread::Builder::new()
        .name("command-reader".into())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let result = parse_command(line).and_then(|cmd| controller.handle(cmd));
                let reply = CommandReply::from_result(&result);
                match serde_json::to_string(&reply) {
                    Ok(json) => println!("{json}"),
                    Err(e) => tracing::warn!(error = %e, "reply serialization failed"),
                }
            }
            tracing::debug!("command input closed");
        })
        .wrap_err("spawn command reader")?;
    Ok(())
}

pub fn run_controller(cfg: &Config, backend: Backend, ticks: Option<u64>) -> eyre::Result<u64> {
    let io = Arc::new(DeviceIo::new(
        backend.port.clone(),
        event_log(cfg),
        backend.clock.clone(),
    ));
    let controller = Arc::new(PoolController::new(
        (&cfg.channels).into(),
        (&cfg.heater).into(),
        (&cfg.light).into(),
        io,
    ));
    let thermo_cfg: ThermometerCfg = (&cfg.thermometer).into();
    let thermometers = cfg
        .sensors
        .iter()
        .map(|s| {
            Thermometer::new(
                s.name.clone(),
                backend.sensors.clone(),
                backend.clock.clone(),
                thermo_cfg,
            )
        })
        .collect();
    let mut control = ControlLoop::new(
        controller.clone(),
        thermometers,
        &cfg.heater.input_sensor,
        backend.probe.clone(),
        Arc::new(StdoutPublisher),
        Watchdog::new((&cfg.watchdog).into()),
        backend.clock.clone(),
        (&cfg.control).into(),
    )?;

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = shutdown.clone();
        ctrlc::set_handler(move || shutdown.store(true, Ordering::Relaxed))
            .wrap_err("install Ctrl-C handler")?;
    }

    let worker = LightWorker::spawn(controller.light().clone());
    spawn_command_reader(controller)?;

    let result = control.run(&shutdown, ticks);
    drop(worker);
    let ran = result?;
    tracing::info!(ticks = ran, "controller stopped");
    Ok(ran)
}

/// Result of one self-check probe.
#[derive(Debug)]
pub struct CheckItem {
    pub name: String,
    pub ok: bool,
    pub detail: String,
}

pub fn self_check(cfg: &Config, backend: &Backend) -> Vec<CheckItem> {
    let mut items = Vec::new();
    for (name, channel) in [
        ("pump", cfg.channels.pump),
        ("heater", cfg.channels.heater),
        ("light", cfg.channels.light),
    ] {
        let result = backend.port.set_channel(channel, false);
        items.push(CheckItem {
            name: format!("relay {name} (port {channel})"),
            ok: result.is_ok(),
            detail: result.map_or_else(|e| e.to_string(), |()| "off".to_string()),
        });
    }
    let timeout = Duration::from_millis(cfg.thermometer.read_timeout_ms);
    for sensor in &cfg.sensors {
        let result = backend.sensors.read_temperature(&sensor.name, timeout);
        items.push(CheckItem {
            name: format!("sensor {}", sensor.name),
            ok: result.is_ok(),
            detail: result.map_or_else(|e| e.to_string(), |c| format!("{c:.2} C")),
        });
    }
    items
}
