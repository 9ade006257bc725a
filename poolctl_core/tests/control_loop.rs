mod common;

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use common::{PUMP, TIMING};
use poolctl_core::config::{Channels, ControlCfg, HeaterLimits, ThermometerCfg, WatchdogCfg};
use poolctl_core::mocks::{CapturePublisher, FixedProbe, MemoryEventLog, RecordingPort, ScriptedSensor};
use poolctl_core::{
    ControlLoop, DeviceId, DeviceIo, DeviceState, EventKind, Fault, Invariant, PoolController,
    Thermometer, Watchdog, parse_command,
};
use poolctl_traits::{Clock, ManualClock};

struct Loop {
    clock: Arc<ManualClock>,
    port: Arc<RecordingPort>,
    events: Arc<MemoryEventLog>,
    sensor: Arc<ScriptedSensor>,
    probe: Arc<FixedProbe>,
    publisher: Arc<CapturePublisher>,
    control: ControlLoop,
}

fn build(watchdog: WatchdogCfg) -> Loop {
    let clock = Arc::new(ManualClock::new());
    let port = Arc::new(RecordingPort::new(clock.clone()));
    let events = Arc::new(MemoryEventLog::new());
    let sensor = Arc::new(
        ScriptedSensor::new()
            .with_value("intake", 26.0)
            .with_value("heater_output", 31.0),
    );
    let probe = Arc::new(FixedProbe::new(true, clock.clone()));
    let publisher = Arc::new(CapturePublisher::new());
    let io = Arc::new(DeviceIo::new(port.clone(), events.clone(), clock.clone()));
    let controller = Arc::new(PoolController::new(
        Channels::default(),
        HeaterLimits::default(),
        TIMING,
        io,
    ));
    let thermometers = ["intake", "heater_output"]
        .into_iter()
        .map(|name| Thermometer::new(name, sensor.clone(), clock.clone(), ThermometerCfg::default()))
        .collect();
    let control = ControlLoop::new(
        controller,
        thermometers,
        "intake",
        probe.clone(),
        publisher.clone(),
        Watchdog::new(watchdog),
        clock.clone(),
        ControlCfg::default(),
    )
    .unwrap();
    Loop {
        clock,
        port,
        events,
        sensor,
        probe,
        publisher,
        control,
    }
}

#[test]
fn missing_heater_input_is_rejected() {
    let clock = Arc::new(ManualClock::new());
    let port = Arc::new(RecordingPort::new(clock.clone()));
    let io = Arc::new(DeviceIo::new(port, Arc::new(MemoryEventLog::new()), clock.clone()));
    let controller = Arc::new(PoolController::new(
        Channels::default(),
        HeaterLimits::default(),
        TIMING,
        io,
    ));
    let err = ControlLoop::new(
        controller,
        Vec::new(),
        "intake",
        Arc::new(FixedProbe::new(true, clock.clone())),
        Arc::new(CapturePublisher::new()),
        Watchdog::new(WatchdogCfg::default()),
        clock,
        ControlCfg::default(),
    )
    .err()
    .unwrap();
    assert!(err.to_string().contains("intake"));
}

#[test]
fn publishes_one_snapshot_per_tick_and_shuts_down() {
    let mut l = build(WatchdogCfg::default());
    l.control.controller().pump_set_on().unwrap();
    l.control.controller().heater_set_on().unwrap();

    let t0 = l.clock.now();
    let ticks = l.control.run(&AtomicBool::new(false), Some(5)).unwrap();
    assert_eq!(ticks, 5);
    assert_eq!(l.clock.now() - t0, Duration::from_secs(5));

    let snaps = l.publisher.snapshots();
    assert_eq!(snaps.len(), 5);
    let last = &snaps[4];
    assert_eq!(last.pump.state, DeviceState::On);
    assert_eq!(last.heater.state, DeviceState::On);
    assert!(last.network_connected);
    assert_eq!(last.sensors.len(), 2);
    assert_eq!(last.sensors[1].celsius, Some(31.0));
    assert!(last.sensors.iter().all(|s| s.fresh));

    // Ordered shutdown after the loop: heater, pump, light.
    let circ = l.control.controller().circulation();
    assert_eq!(circ.pump().state(), DeviceState::Off);
    assert_eq!(circ.heater().state(), DeviceState::Off);
    drop(circ);
    let kinds: Vec<_> = l
        .events
        .events()
        .into_iter()
        .filter(|e| e.kind == EventKind::Shutdown)
        .map(|e| e.device)
        .collect();
    assert_eq!(kinds, vec![DeviceId::Heater, DeviceId::Pump]);
}

#[test]
fn shutdown_flag_stops_before_first_tick() {
    let mut l = build(WatchdogCfg::default());
    let ticks = l.control.run(&AtomicBool::new(true), None).unwrap();
    assert_eq!(ticks, 0);
    assert!(l.publisher.snapshots().is_empty());
}

#[test]
fn failed_intake_sensor_stops_heater_after_staleness() {
    let mut l = build(WatchdogCfg::default());
    l.control.controller().pump_set_on().unwrap();
    l.control.controller().heater_reach_and_stop(30.0).unwrap();
    l.control.tick().unwrap();
    l.sensor.set_failing("intake");

    let mut stopped_after = None;
    for i in 1..=120 {
        l.control.tick().unwrap();
        l.clock.advance(Duration::from_secs(1));
        if !l.control.controller().circulation().heater().state().is_on() {
            stopped_after = Some(i);
            break;
        }
    }
    let stopped_after = stopped_after.unwrap();
    assert!((55..=62).contains(&stopped_after), "stopped after {stopped_after} ticks");
    assert!(
        l.events
            .events()
            .iter()
            .any(|e| e.kind == EventKind::SafetyShutdown(Invariant::HeaterSensorAbsent))
    );
    let snap = l.publisher.last().unwrap();
    assert!(!snap.sensors[0].fresh);
    assert_eq!(snap.sensors[0].celsius, Some(26.0));
}

#[test]
fn network_loss_stops_heater_then_pump() {
    let mut l = build(WatchdogCfg {
        network_grace: Duration::from_secs(60),
        network_full_stop: Some(Duration::from_secs(300)),
        max_port_failures: 5,
    });
    l.control.controller().pump_set_on().unwrap();
    l.control.controller().heater_set_on().unwrap();
    l.control.tick().unwrap();
    l.probe.set_connected(false);

    l.clock.advance(Duration::from_secs(60));
    l.control.tick().unwrap();
    assert_eq!(
        l.control.controller().circulation().heater().state(),
        DeviceState::On
    );

    l.clock.advance(Duration::from_secs(2));
    l.control.tick().unwrap();
    {
        let circ = l.control.controller().circulation();
        assert_eq!(circ.heater().state(), DeviceState::Off);
        assert_eq!(circ.pump().state(), DeviceState::On);
    }
    let report = l.control.last_report().unwrap();
    assert_eq!(report.violations[0].invariant, Invariant::NetworkLost);

    l.clock.advance(Duration::from_secs(240));
    l.control.tick().unwrap();
    assert_eq!(
        l.control.controller().circulation().pump().state(),
        DeviceState::Off
    );
    assert_eq!(
        l.control.last_report().unwrap().violations[0].invariant,
        Invariant::NetworkOutage
    );
}

#[test]
fn repeated_port_failures_escalate_to_fault() {
    let mut l = build(WatchdogCfg {
        max_port_failures: 3,
        ..WatchdogCfg::default()
    });
    l.port.set_failing(true);
    for _ in 0..3 {
        assert!(l.control.controller().pump_set_on().is_err());
    }
    let err = l.control.run(&AtomicBool::new(false), None).unwrap_err();
    assert!(matches!(err, Fault::ActuationUnreachable { failures } if failures >= 3));
}

#[test]
fn readback_mismatch_forces_channel_off() {
    let mut l = build(WatchdogCfg::default());
    l.port.force_level(PUMP, true);
    l.control.tick().unwrap();
    assert!(!l.port.is_on(PUMP));
    assert_eq!(
        l.control.last_report().unwrap().violations[0].invariant,
        Invariant::ActuationMismatch
    );
}

#[test]
fn stuck_relay_is_reported_once_until_it_recovers() {
    let mut l = build(WatchdogCfg::default());
    l.port.set_stuck(PUMP, Some(true));
    for _ in 0..100 {
        l.clock.advance(Duration::from_secs(1));
        l.control.tick().unwrap();
    }
    let mismatches = |events: &MemoryEventLog| {
        events
            .events()
            .iter()
            .filter(|e| {
                e.device == DeviceId::Pump
                    && e.kind == EventKind::SafetyShutdown(Invariant::ActuationMismatch)
            })
            .count()
    };
    assert_eq!(mismatches(&l.events), 1);

    // Read-back agrees again, then the relay sticks a second time.
    l.port.set_stuck(PUMP, None);
    l.clock.advance(Duration::from_secs(1));
    l.control.tick().unwrap();
    assert!(l.control.last_report().unwrap().violations.is_empty());
    l.port.set_stuck(PUMP, Some(true));
    for _ in 0..10 {
        l.clock.advance(Duration::from_secs(1));
        l.control.tick().unwrap();
    }
    assert_eq!(mismatches(&l.events), 2);
}

#[test]
fn json_commands_drive_the_controller() {
    let l = build(WatchdogCfg::default());
    let c = l.control.controller();
    for json in [
        r#"{"device":"pump","command":"run_for_minutes","minutes":15}"#,
        r#"{"device":"heater","command":"reach_and_stop","target":29.5}"#,
        r#"{"device":"light","command":"set_color","color":3}"#,
    ] {
        c.handle(parse_command(json).unwrap()).unwrap();
    }
    let snap = c.snapshot(Vec::new(), true);
    assert_eq!(snap.pump.mode, "timed_run");
    assert_eq!(snap.pump.remaining_s, Some(15 * 60));
    assert_eq!(snap.heater.target_c, Some(29.5));
    assert!(snap.light.pending.is_some());

    let value = serde_json::to_value(&snap).unwrap();
    assert_eq!(value["pump"]["state"], "on");
    assert_eq!(value["light"]["pending"], 3);
}
