use std::fs;

use chrono::Utc;
use poolctl_core::events::{DeviceEvent, DeviceId, EventKind, Invariant, RuntimeRecord};
use poolctl_core::{EventLog, JsonlEventLog};
use serde_json::{Value, json};

#[test]
fn appends_one_json_object_per_record() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("events.jsonl");
    let log = JsonlEventLog::new(&path);

    log.record_event(&DeviceEvent::new(DeviceId::Pump, EventKind::Requested, "off", "on"))
        .unwrap();
    log.record_event(
        &DeviceEvent::new(
            DeviceId::Heater,
            EventKind::SafetyShutdown(Invariant::HeaterMaxRuntime),
            "on",
            "off",
        )
        .with_metadata(json!({ "mode": "continuous" })),
    )
    .unwrap();
    log.record_runtime(&RuntimeRecord {
        device: DeviceId::Pump,
        started_at: Utc::now(),
        elapsed_seconds: 90,
    })
    .unwrap();

    let text = fs::read_to_string(&path).unwrap();
    let lines: Vec<Value> = text
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), 3);

    assert_eq!(lines[0]["record"], "event");
    assert_eq!(lines[0]["device"], "pump");
    assert_eq!(lines[0]["kind"], "requested");
    assert!(lines[0].get("metadata").is_none());

    assert_eq!(lines[1]["kind"]["safety_shutdown"], "heater_max_runtime");
    assert_eq!(lines[1]["metadata"]["mode"], "continuous");

    assert_eq!(lines[2]["record"], "runtime");
    assert_eq!(lines[2]["elapsed_seconds"], 90);
    assert!(lines[2]["started_at"].is_string());
}

#[test]
fn unwritable_path_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let log = JsonlEventLog::new(dir.path().join("missing").join("events.jsonl"));
    let err = log
        .record_event(&DeviceEvent::new(DeviceId::Light, EventKind::Requested, "off", "on"))
        .unwrap_err();
    assert!(err.to_string().contains("open event log"));
}
