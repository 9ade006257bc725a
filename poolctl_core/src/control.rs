//! Fixed-cadence control loop.
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use poolctl_traits::{Clock, ConnectivityProbe};

use crate::config::ControlCfg;
use crate::controller::{PoolController, TickReport};
use crate::error::Fault;
use crate::ports::StatePublisher;
use crate::snapshot::{SensorSnapshot, Snapshot};
use crate::thermometer::Thermometer;
use crate::watchdog::Watchdog;

pub struct ControlLoop {
    controller: Arc<PoolController>,
    thermometers: Vec<Thermometer>,
    heater_input: usize,
    probe: Arc<dyn ConnectivityProbe>,
    publisher: Arc<dyn StatePublisher>,
    watchdog: Watchdog,
    clock: Arc<dyn Clock>,
    tick_period: Duration,
    started_at: Instant,
    last_tick: Instant,
    last_report: Option<TickReport>,
}

impl ControlLoop {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        controller: Arc<PoolController>,
        thermometers: Vec<Thermometer>,
        heater_input: &str,
        probe: Arc<dyn ConnectivityProbe>,
        publisher: Arc<dyn StatePublisher>,
        watchdog: Watchdog,
        clock: Arc<dyn Clock>,
        cfg: ControlCfg,
    ) -> eyre::Result<Self> {
        let Some(heater_input) = thermometers.iter().position(|t| t.name() == heater_input) else {
            eyre::bail!("heater input sensor '{heater_input}' has no thermometer");
        };
        let now = clock.now();
        Ok(Self {
            controller,
            thermometers,
            heater_input,
            probe,
            publisher,
            watchdog,
            clock,
            tick_period: cfg.tick_period,
            started_at: now,
            last_tick: now,
            last_report: None,
        })
    }

    pub fn controller(&self) -> &Arc<PoolController> {
        &self.controller
    }

    pub fn thermometers(&self) -> &[Thermometer] {
        &self.thermometers
    }

    pub const fn last_report(&self) -> Option<&TickReport> {
        self.last_report.as_ref()
    }

    /// One control step: sample, advance devices under the interlock lock,
    /// publish, then check port health.
    pub fn tick(&mut self) -> Result<Snapshot, Fault> {
        let now = self.clock.now();
        let elapsed = now.saturating_duration_since(self.last_tick);
        self.last_tick = now;

        for t in &mut self.thermometers {
            t.read();
        }
        let sampled_at = self.clock.now();
        let input = self.thermometers[self.heater_input].fresh(sampled_at);
        if input.is_none() {
            tracing::debug!(
                sensor = self.thermometers[self.heater_input].name(),
                "heater input reading absent"
            );
        }
        let network = self.probe.status();

        let report = self
            .controller
            .tick(elapsed, input, network, &self.watchdog, self.started_at);

        let sensors = self
            .thermometers
            .iter()
            .map(|t| SensorSnapshot {
                name: t.name().to_string(),
                celsius: t.last_known().map(|r| r.celsius),
                fresh: t.fresh(sampled_at).is_some(),
            })
            .collect();
        let snapshot = self.controller.snapshot(sensors, network.connected);
        self.publisher.publish(&snapshot);
        self.last_report = Some(report);

        if let Some(fault) = self.watchdog.port_fault(self.controller.io().health()) {
            tracing::error!(error = %fault, "actuation port fault");
            return Err(fault);
        }
        Ok(snapshot)
    }

    /// Tick until `shutdown` is set, `max_ticks` have run, or a fault occurs,
    /// then run the ordered shutdown. Returns the number of ticks run.
    pub fn run(&mut self, shutdown: &AtomicBool, max_ticks: Option<u64>) -> Result<u64, Fault> {
        tracing::info!(period_ms = self.tick_period.as_millis(), "control loop start");
        let mut ticks = 0u64;
        let result = loop {
            if shutdown.load(Ordering::Relaxed) {
                tracing::info!("shutdown requested");
                break Ok(ticks);
            }
            if max_ticks.is_some_and(|max| ticks >= max) {
                break Ok(ticks);
            }
            let t0 = self.clock.now();
            if let Err(fault) = self.tick() {
                break Err(fault);
            }
            ticks += 1;
            let spent = self.clock.now().saturating_duration_since(t0);
            if spent > self.tick_period {
                tracing::warn!(
                    spent_ms = spent.as_millis(),
                    period_ms = self.tick_period.as_millis(),
                    "tick overrun"
                );
            } else {
                self.clock.sleep(self.tick_period - spent);
            }
        };
        self.controller.shutdown();
        tracing::info!(ticks, "control loop stopped");
        result
    }
}
