//! Cross-device safety evaluator.
//!
//! `Watchdog::evaluate` is pure: it reads a `SafetyView` taken under the
//! interlock lock and returns the devices to stop. Applying the stops is the
//! controller's job and goes through the same `hard_stop` entry points a
//! user-initiated shutdown uses.
use std::time::Instant;

use poolctl_traits::NetworkStatus;

use crate::config::WatchdogCfg;
use crate::error::Fault;
use crate::events::{DeviceId, DeviceState, Invariant};
use crate::ports::PortHealth;

/// Commanded state of a channel next to what the port reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Readback {
    pub device: DeviceId,
    pub commanded: DeviceState,
    pub actual_on: bool,
}

impl Readback {
    pub const fn mismatched(&self) -> bool {
        self.commanded.is_on() != self.actual_on
    }
}

#[derive(Debug, Clone)]
pub struct SafetyView {
    pub pump: DeviceState,
    pub heater: DeviceState,
    pub network: NetworkStatus,
    pub now: Instant,
    /// Process start; stands in for `last_seen_at` when the network was never seen.
    pub started_at: Instant,
    pub readbacks: Vec<Readback>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Violation {
    pub device: DeviceId,
    pub invariant: Invariant,
}

#[derive(Debug, Clone)]
pub struct Watchdog {
    cfg: WatchdogCfg,
}

fn flag(out: &mut Vec<Violation>, device: DeviceId, invariant: Invariant) {
    // First rule wins per device.
    if !out.iter().any(|v| v.device == device) {
        out.push(Violation { device, invariant });
    }
}

impl Watchdog {
    pub const fn new(cfg: WatchdogCfg) -> Self {
        Self { cfg }
    }

    pub const fn config(&self) -> &WatchdogCfg {
        &self.cfg
    }

    pub fn evaluate(&self, view: &SafetyView) -> Vec<Violation> {
        let mut out = Vec::new();
        let heater_on = view.heater.is_on();
        let pump_on = view.pump.is_on();

        if heater_on && !pump_on {
            flag(&mut out, DeviceId::Heater, Invariant::HeaterRequiresPump);
        }

        let offline = view.network.disconnected_for(view.now, view.started_at);
        if let Some(full_stop) = self.cfg.network_full_stop {
            if offline > full_stop {
                if heater_on {
                    flag(&mut out, DeviceId::Heater, Invariant::NetworkOutage);
                }
                if pump_on {
                    flag(&mut out, DeviceId::Pump, Invariant::NetworkOutage);
                }
            }
        }
        if heater_on && offline > self.cfg.network_grace {
            flag(&mut out, DeviceId::Heater, Invariant::NetworkLost);
        }

        for rb in view.readbacks.iter().filter(|rb| rb.mismatched()) {
            flag(&mut out, rb.device, Invariant::ActuationMismatch);
        }
        out
    }

    /// Process-level fault once relay writes have failed too many times in a row.
    pub fn port_fault(&self, health: &PortHealth) -> Option<Fault> {
        let failures = health.consecutive_failures();
        (failures >= self.cfg.max_port_failures).then_some(Fault::ActuationUnreachable { failures })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn view(pump: DeviceState, heater: DeviceState, offline_s: u64) -> SafetyView {
        let started_at = Instant::now();
        let now = started_at + Duration::from_secs(1000);
        let network = if offline_s == 0 {
            NetworkStatus::connected(now)
        } else {
            NetworkStatus {
                connected: false,
                last_seen_at: Some(now - Duration::from_secs(offline_s)),
            }
        };
        SafetyView {
            pump,
            heater,
            network,
            now,
            started_at,
            readbacks: Vec::new(),
        }
    }

    fn wd() -> Watchdog {
        Watchdog::new(WatchdogCfg {
            network_grace: Duration::from_secs(60),
            network_full_stop: Some(Duration::from_secs(300)),
            max_port_failures: 3,
        })
    }

    #[test]
    fn healthy_state_has_no_violations() {
        assert!(wd().evaluate(&view(DeviceState::On, DeviceState::On, 0)).is_empty());
        assert!(wd().evaluate(&view(DeviceState::On, DeviceState::On, 60)).is_empty());
    }

    #[test]
    fn heater_without_pump() {
        let v = wd().evaluate(&view(DeviceState::Off, DeviceState::On, 0));
        assert_eq!(
            v,
            vec![Violation {
                device: DeviceId::Heater,
                invariant: Invariant::HeaterRequiresPump
            }]
        );
    }

    #[test]
    fn network_grace_then_full_stop() {
        let lost = wd().evaluate(&view(DeviceState::On, DeviceState::On, 61));
        assert_eq!(lost.len(), 1);
        assert_eq!(lost[0].invariant, Invariant::NetworkLost);

        let outage = wd().evaluate(&view(DeviceState::On, DeviceState::On, 301));
        assert_eq!(outage.len(), 2);
        assert!(outage.iter().all(|v| v.invariant == Invariant::NetworkOutage));
    }

    #[test]
    fn outage_rule_can_be_disabled() {
        let w = Watchdog::new(WatchdogCfg {
            network_full_stop: None,
            ..WatchdogCfg::default()
        });
        let v = w.evaluate(&view(DeviceState::On, DeviceState::Off, 10_000));
        assert!(v.is_empty());
    }

    #[test]
    fn readback_mismatch_flags_device() {
        let mut sv = view(DeviceState::Off, DeviceState::Off, 0);
        sv.readbacks.push(Readback {
            device: DeviceId::Pump,
            commanded: DeviceState::Off,
            actual_on: true,
        });
        sv.readbacks.push(Readback {
            device: DeviceId::Light,
            commanded: DeviceState::On,
            actual_on: true,
        });
        let v = wd().evaluate(&sv);
        assert_eq!(
            v,
            vec![Violation {
                device: DeviceId::Pump,
                invariant: Invariant::ActuationMismatch
            }]
        );
    }

    #[test]
    fn port_fault_after_limit() {
        let health = PortHealth::default();
        health.record_failure();
        health.record_failure();
        assert_eq!(wd().port_fault(&health), None);
        health.record_failure();
        assert_eq!(
            wd().port_fault(&health),
            Some(Fault::ActuationUnreachable { failures: 3 })
        );
        health.record_ok();
        assert_eq!(wd().port_fault(&health), None);
    }
}
