mod common;

use std::time::Duration;

use common::{PUMP, Rig};
use poolctl_core::devices::PumpMode;
use poolctl_core::{DeviceId, DeviceState, EventKind};
use proptest::prelude::*;
use rstest::rstest;

const MINUTE: Duration = Duration::from_secs(60);

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn timed_run_stops_after_exactly_n_minutes(n in 1u32..=480) {
        let rig = Rig::new();
        rig.controller.pump_run_for_minutes(n).unwrap();

        for _ in 1..n {
            let report = rig.step(MINUTE, Some(26.0));
            prop_assert!(!report.circulation.timed_run_completed);
            prop_assert_eq!(rig.controller.circulation().pump().state(), DeviceState::On);
        }
        let report = rig.step(MINUTE, Some(26.0));
        prop_assert!(report.circulation.timed_run_completed);
        let circ = rig.controller.circulation();
        prop_assert_eq!(circ.pump().state(), DeviceState::Off);
        prop_assert_eq!(circ.pump().mode(), PumpMode::Idle);
    }
}

#[test]
fn timed_run_counts_down_with_one_second_ticks() {
    let rig = Rig::new();
    rig.controller.pump_run_for_minutes(2).unwrap();
    for _ in 0..119 {
        rig.step(Duration::from_secs(1), None);
    }
    assert_eq!(
        rig.controller.circulation().pump().mode().remaining_seconds(),
        Some(1)
    );
    rig.step(Duration::from_secs(1), None);
    assert_eq!(rig.controller.circulation().pump().state(), DeviceState::Off);
    assert!(!rig.port.is_on(PUMP));
    assert_eq!(rig.kinds(DeviceId::Pump).last(), Some(&EventKind::Completed));
}

#[rstest]
#[case(0)]
#[case(481)]
#[case(10_000)]
fn timed_run_rejects_out_of_range(#[case] minutes: u32) {
    let rig = Rig::new();
    let err = rig.controller.pump_run_for_minutes(minutes).unwrap_err();
    assert_eq!(err.code(), "invalid_parameter");
    assert_eq!(rig.controller.circulation().pump().state(), DeviceState::Off);
    assert!(rig.port.writes().is_empty());
}

#[test]
fn new_timed_run_replaces_remaining_time() {
    let rig = Rig::new();
    rig.controller.pump_run_for_minutes(10).unwrap();
    rig.step(MINUTE * 9, None);
    rig.controller.pump_run_for_minutes(5).unwrap();
    rig.step(MINUTE * 4, None);
    assert_eq!(rig.controller.circulation().pump().state(), DeviceState::On);
    rig.step(MINUTE, None);
    assert_eq!(rig.controller.circulation().pump().state(), DeviceState::Off);
    // The restarted run is accounted separately.
    let runtimes = rig.events.runtimes();
    assert_eq!(runtimes.len(), 2);
    assert_eq!(runtimes[0].elapsed_seconds, 9 * 60);
    assert_eq!(runtimes[1].elapsed_seconds, 5 * 60);
}

#[test]
fn continuous_run_survives_ticks_and_records_runtime() {
    let rig = Rig::new();
    rig.controller.pump_set_on().unwrap();
    rig.step(Duration::from_secs(90), None);
    assert_eq!(rig.controller.circulation().pump().mode(), PumpMode::Continuous);
    rig.controller.pump_set_off().unwrap();

    let runtimes = rig.events.runtimes();
    assert_eq!(runtimes.len(), 1);
    assert_eq!(runtimes[0].device, DeviceId::Pump);
    assert_eq!(runtimes[0].elapsed_seconds, 90);
}

#[test]
fn switching_timed_run_to_continuous_keeps_pump_on() {
    let rig = Rig::new();
    rig.controller.pump_run_for_minutes(1).unwrap();
    rig.controller.pump_set_on().unwrap();
    rig.step(MINUTE * 2, None);
    assert_eq!(rig.controller.circulation().pump().state(), DeviceState::On);
    assert_eq!(rig.controller.circulation().pump().mode(), PumpMode::Continuous);
}

#[test]
fn off_when_already_off_records_nothing() {
    let rig = Rig::new();
    rig.controller.pump_set_off().unwrap();
    assert!(rig.events.events().is_empty());
}

#[test]
fn failed_on_write_leaves_pump_off() {
    let rig = Rig::new();
    rig.port.set_failing(true);
    let err = rig.controller.pump_set_on().unwrap_err();
    assert_eq!(err.code(), "port_error");
    assert_eq!(rig.controller.circulation().pump().state(), DeviceState::Off);
    assert_eq!(rig.controller.io().health().consecutive_failures(), 1);
}
