use std::sync::Arc;
use std::time::Duration;

use poolctl_core::Thermometer;
use poolctl_core::config::ThermometerCfg;
use poolctl_core::mocks::ScriptedSensor;
use poolctl_traits::{Clock, ManualClock, SensorError, SensorPort};
use rstest::rstest;

fn cfg(retries: u32) -> ThermometerCfg {
    ThermometerCfg {
        retries,
        backoff: Duration::from_millis(20),
        read_timeout: Duration::from_millis(80),
        staleness: Duration::from_secs(60),
    }
}

fn rig(retries: u32) -> (Arc<ManualClock>, Arc<ScriptedSensor>, Thermometer) {
    let clock = Arc::new(ManualClock::new());
    let sensor = Arc::new(ScriptedSensor::new().with_value("intake", 26.5));
    let t = Thermometer::new("intake", sensor.clone(), clock.clone(), cfg(retries));
    (clock, sensor, t)
}

#[rstest]
#[case(0)]
#[case(1)]
#[case(2)]
#[case(5)]
fn absent_after_all_retries_fail(#[case] retries: u32) {
    let (_clock, sensor, mut t) = rig(retries);
    sensor.set_failing("intake");
    assert_eq!(t.read(), None);
    assert_eq!(sensor.calls("intake"), retries + 1);
    assert_eq!(t.consecutive_failures(), 1);
}

#[test]
fn success_within_retries_is_returned() {
    let (clock, sensor, mut t) = rig(2);
    sensor.push(
        "intake",
        [Err(SensorError::Timeout), Err(SensorError::Io("crc".into()))],
    );
    let t0 = clock.now();
    assert_eq!(t.read(), Some(26.5));
    assert_eq!(sensor.calls("intake"), 3);
    // Two backoffs between three attempts.
    assert_eq!(clock.now() - t0, Duration::from_millis(40));
    assert_eq!(t.consecutive_failures(), 0);
}

#[test]
fn single_success_resets_failure_count() {
    let (_clock, sensor, mut t) = rig(1);
    sensor.set_failing("intake");
    assert_eq!(t.read(), None);
    assert_eq!(t.read(), None);
    assert_eq!(t.consecutive_failures(), 2);

    sensor.set_value("intake", 27.0);
    assert_eq!(t.read(), Some(27.0));
    assert_eq!(t.consecutive_failures(), 0);

    sensor.set_failing("intake");
    assert_eq!(t.read(), None);
    assert_eq!(t.consecutive_failures(), 1);
}

#[test]
fn non_finite_values_are_failures() {
    let (_clock, sensor, mut t) = rig(0);
    sensor.push("intake", [Ok(f32::NAN)]);
    assert_eq!(t.read(), None);
    assert_eq!(t.read(), Some(26.5));
}

/// Sensor that takes longer than the read timeout.
struct SlowSensor {
    clock: Arc<ManualClock>,
    delay: Duration,
}

impl SensorPort for SlowSensor {
    fn read_temperature(&self, _sensor: &str, _timeout: Duration) -> Result<f32, SensorError> {
        self.clock.advance(self.delay);
        Ok(25.0)
    }
}

#[test]
fn slow_read_counts_as_timeout() {
    let clock = Arc::new(ManualClock::new());
    let slow = Arc::new(SlowSensor {
        clock: clock.clone(),
        delay: Duration::from_millis(200),
    });
    let mut t = Thermometer::new("intake", slow, clock.clone(), cfg(0));
    assert_eq!(t.read(), None);
    assert!(t.last_known().is_none());
}

#[test]
fn stale_reading_is_absent_but_still_displayed() {
    let (clock, sensor, mut t) = rig(0);
    assert_eq!(t.read(), Some(26.5));
    sensor.set_failing("intake");

    clock.advance(Duration::from_secs(60));
    assert_eq!(t.fresh(clock.now()), Some(26.5));

    clock.advance(Duration::from_secs(1));
    assert_eq!(t.fresh(clock.now()), None);
    assert_eq!(t.last_known().map(|r| r.celsius), Some(26.5));
    assert_eq!(t.age(clock.now()), Some(Duration::from_secs(61)));
}

#[test]
fn unknown_sensor_is_absent() {
    let clock = Arc::new(ManualClock::new());
    let mut t = Thermometer::new(
        "ambient",
        Arc::new(ScriptedSensor::new()),
        clock,
        cfg(0),
    );
    assert_eq!(t.read(), None);
}
