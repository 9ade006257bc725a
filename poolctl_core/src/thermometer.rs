//! Retrying, staleness-aware temperature reads.
//!
//! Sensor failures never reach callers as errors. `read()` degrades to
//! `None`, and safety decisions go through `fresh()`, which also returns
//! `None` once the last good reading is older than the staleness window.
use std::sync::Arc;
use std::time::{Duration, Instant};

use poolctl_traits::{Clock, SensorError, SensorPort};

use crate::config::ThermometerCfg;

#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub sensor: String,
    pub celsius: f32,
    pub observed_at: Instant,
}

pub struct Thermometer {
    name: String,
    port: Arc<dyn SensorPort>,
    clock: Arc<dyn Clock>,
    cfg: ThermometerCfg,
    last: Option<Reading>,
    consecutive_failures: u32,
}

impl Thermometer {
    pub fn new(
        name: impl Into<String>,
        port: Arc<dyn SensorPort>,
        clock: Arc<dyn Clock>,
        cfg: ThermometerCfg,
    ) -> Self {
        Self {
            name: name.into(),
            port,
            clock,
            cfg,
            last: None,
            consecutive_failures: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn attempt(&self) -> Result<f32, SensorError> {
        let started = self.clock.now();
        let celsius = self.port.read_temperature(&self.name, self.cfg.read_timeout)?;
        if self.clock.now().saturating_duration_since(started) > self.cfg.read_timeout {
            return Err(SensorError::Timeout);
        }
        if !celsius.is_finite() {
            return Err(SensorError::Invalid(format!("non-finite value {celsius}")));
        }
        Ok(celsius)
    }

    /// Read with up to `retries` extra attempts. `None` when every attempt failed.
    pub fn read(&mut self) -> Option<f32> {
        let attempts = self.cfg.retries.saturating_add(1);
        for attempt in 0..attempts {
            if attempt > 0 && !self.cfg.backoff.is_zero() {
                self.clock.sleep(self.cfg.backoff);
            }
            match self.attempt() {
                Ok(celsius) => {
                    if self.consecutive_failures > 0 {
                        tracing::info!(sensor = %self.name, after = self.consecutive_failures, "sensor recovered");
                    }
                    self.consecutive_failures = 0;
                    self.last = Some(Reading {
                        sensor: self.name.clone(),
                        celsius,
                        observed_at: self.clock.now(),
                    });
                    tracing::trace!(sensor = %self.name, celsius, attempt, "sensor read");
                    return Some(celsius);
                }
                Err(e) => {
                    tracing::debug!(sensor = %self.name, attempt, error = %e, "sensor attempt failed");
                }
            }
        }
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        tracing::warn!(
            sensor = %self.name,
            attempts,
            failures = self.consecutive_failures,
            "sensor read failed"
        );
        None
    }

    /// Most recent good reading of any age. Display only.
    pub const fn last_known(&self) -> Option<&Reading> {
        self.last.as_ref()
    }

    /// Last good value if it is not older than the staleness window.
    pub fn fresh(&self, now: Instant) -> Option<f32> {
        self.last
            .as_ref()
            .filter(|r| now.saturating_duration_since(r.observed_at) <= self.cfg.staleness)
            .map(|r| r.celsius)
    }

    pub fn age(&self, now: Instant) -> Option<Duration> {
        self.last
            .as_ref()
            .map(|r| now.saturating_duration_since(r.observed_at))
    }

    /// Failed `read()` calls since the last success.
    pub const fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }
}
