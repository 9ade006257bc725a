//! Blind color controller for a fixture that only sees power pulses.
//!
//! The fixture advances one program on a short power-off and returns to
//! program 0 after a long one. There is no feedback, so the controller keeps
//! an assumed position and only trusts it between a completed sequence and
//! the next power event it could not account for.
//!
//! Sequences run step by step. The private lock is held for each relay write
//! and released during holds, so power commands and hard stops can interrupt
//! a running sequence. Interruption bumps the generation counter; the
//! sequence notices at its next step and gives up, leaving the position
//! unknown.
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crossbeam_channel as xch;
use poolctl_traits::{Channel, PortError};
use serde_json::json;

use super::color::{ColorIndex, ColorRequest, Pulse, plan};
use crate::config::LightTiming;
use crate::error::CommandError;
use crate::events::{DeviceEvent, DeviceId, DeviceState, EventKind, StopCause};
use crate::ports::DeviceIo;
use crate::watchdog::Readback;

/// Granularity of holds; bounds how long an interrupted sequence keeps running.
const HOLD_SLICE: Duration = Duration::from_millis(50);

#[derive(Debug)]
struct LightState {
    state: DeviceState,
    assumed: Option<ColorIndex>,
    pending: Option<ColorRequest>,
    generation: u64,
    sequencing: bool,
    off_since: Option<Instant>,
}

/// Point-in-time copy of the light state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LightView {
    pub state: DeviceState,
    pub assumed: Option<ColorIndex>,
    pub pending: Option<ColorRequest>,
    pub sequencing: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SequenceOutcome {
    Completed(ColorIndex),
    /// Interrupted by a power command or hard stop.
    Aborted,
    Failed(PortError),
}

enum Abort {
    Interrupted,
    Port(PortError),
}

fn color_label(c: Option<ColorIndex>) -> String {
    c.map_or_else(|| "unknown".to_string(), |c| c.name().to_string())
}

pub struct LightColorController {
    channel: Channel,
    timing: LightTiming,
    io: Arc<DeviceIo>,
    inner: Mutex<LightState>,
    wake_tx: xch::Sender<()>,
    wake_rx: xch::Receiver<()>,
}

impl LightColorController {
    pub fn new(channel: Channel, timing: LightTiming, io: Arc<DeviceIo>) -> Self {
        let (wake_tx, wake_rx) = xch::bounded(1);
        Self {
            channel,
            timing,
            io,
            inner: Mutex::new(LightState {
                state: DeviceState::Off,
                assumed: None,
                pending: None,
                generation: 0,
                sequencing: false,
                off_since: None,
            }),
            wake_tx,
            wake_rx,
        }
    }

    fn lock(&self) -> MutexGuard<'_, LightState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub const fn channel(&self) -> Channel {
        self.channel
    }

    pub fn view(&self) -> LightView {
        let st = self.lock();
        LightView {
            state: st.state,
            assumed: st.assumed,
            pending: st.pending,
            sequencing: st.sequencing,
        }
    }

    /// Receiver signalled whenever a color request is queued.
    pub fn wake_receiver(&self) -> xch::Receiver<()> {
        self.wake_rx.clone()
    }

    pub fn request_on(&self) -> Result<(), CommandError> {
        let mut st = self.lock();
        self.interrupt(&mut st);
        self.io.actuate(DeviceId::Light, self.channel, true)?;
        if !st.state.is_on() {
            let now = self.io.now();
            if let Some(off_since) = st.off_since.take() {
                let off_for = now.saturating_duration_since(off_since);
                if off_for < self.timing.retain_after_off && st.assumed.take().is_some() {
                    tracing::info!(off_ms = off_for.as_millis(), "short power cycle, light color unknown");
                }
            }
            st.state = DeviceState::On;
            self.io
                .record(DeviceEvent::new(DeviceId::Light, EventKind::Requested, "off", "on"));
        }
        Ok(())
    }

    pub fn request_off(&self) -> Result<(), CommandError> {
        let mut st = self.lock();
        self.interrupt(&mut st);
        let written = self.io.actuate(DeviceId::Light, self.channel, false);
        self.enter_off(&mut st, EventKind::Requested);
        written.map_err(CommandError::from)
    }

    /// Queue a color request, replacing any request not yet started.
    pub fn request_color(&self, request: ColorRequest) {
        {
            let mut st = self.lock();
            if let Some(old) = st.pending.replace(request) {
                tracing::debug!(?old, ?request, "pending light request replaced");
            }
        }
        // Full means the worker is already due to wake.
        let _ = self.wake_tx.try_send(());
    }

    /// Run the pending request to completion on the calling thread.
    /// Returns `None` when nothing was pending.
    pub fn execute_pending(&self) -> Option<SequenceOutcome> {
        let (generation, request, pulses, from, start_off) = {
            let mut st = self.lock();
            let request = st.pending.take()?;
            if !st.state.is_on() {
                // Powering up from a short OFF counts as an untracked pulse.
                let now = self.io.now();
                if let Some(off_since) = st.off_since.take() {
                    if now.saturating_duration_since(off_since) < self.timing.retain_after_off {
                        st.assumed = None;
                    }
                }
            }
            st.generation += 1;
            st.sequencing = true;
            let pulses = plan(st.assumed, request);
            (st.generation, request, pulses, st.assumed, !st.state.is_on())
        };
        let target = request.target();
        tracing::info!(
            target = target.get(),
            color = target.name(),
            pulses = pulses.len(),
            "light sequence start"
        );

        let result = self.run_sequence(generation, &pulses, start_off);

        let mut st = self.lock();
        let outcome = match result {
            Ok(()) if st.generation == generation => {
                st.sequencing = false;
                st.assumed = Some(target);
                self.io.record(
                    DeviceEvent::new(
                        DeviceId::Light,
                        EventKind::Completed,
                        color_label(from),
                        color_label(Some(target)),
                    )
                    .with_metadata(json!({ "color": target.get(), "pulses": pulses.len() })),
                );
                SequenceOutcome::Completed(target)
            }
            Ok(()) | Err(Abort::Interrupted) => {
                tracing::warn!(target = target.get(), "light sequence aborted");
                SequenceOutcome::Aborted
            }
            Err(Abort::Port(e)) => {
                if st.generation == generation {
                    st.sequencing = false;
                    st.assumed = None;
                }
                tracing::error!(target = target.get(), error = %e, "light sequence failed");
                SequenceOutcome::Failed(e)
            }
        };
        Some(outcome)
    }

    /// Unconditional OFF: abort any sequence and drop the pending request.
    pub fn hard_stop(&self, cause: StopCause) {
        let mut st = self.lock();
        st.pending = None;
        self.interrupt(&mut st);
        st.assumed = None;
        if let Err(e) = self.io.actuate(DeviceId::Light, self.channel, false) {
            tracing::error!(error = %e, "light hard stop write failed");
        }
        self.enter_off(&mut st, EventKind::from(cause));
    }

    /// Commanded vs physical state. `None` while a sequence is toggling the
    /// channel or when the port cannot read back.
    pub fn read_back(&self) -> Option<Readback> {
        let st = self.lock();
        if st.sequencing {
            return None;
        }
        match self.io.read_back(self.channel) {
            Ok(actual) => Some(Readback {
                device: DeviceId::Light,
                commanded: st.state,
                actual_on: actual,
            }),
            Err(PortError::Unsupported) => None,
            Err(e) => {
                tracing::warn!(error = %e, "light read-back failed");
                None
            }
        }
    }

    fn interrupt(&self, st: &mut LightState) {
        if st.sequencing {
            st.generation += 1;
            st.sequencing = false;
            st.assumed = None;
            tracing::warn!(channel = self.channel, "light sequence interrupted, color unknown");
        }
    }

    fn enter_off(&self, st: &mut LightState, kind: EventKind) {
        let from = st.state;
        st.state = DeviceState::Off;
        if from.is_on() {
            st.off_since = Some(self.io.now());
        }
        if from.is_on() || kind.is_safety() {
            self.io
                .record(DeviceEvent::new(DeviceId::Light, kind, from.as_str(), "off"));
        }
    }

    fn run_sequence(&self, generation: u64, pulses: &[Pulse], start_off: bool) -> Result<(), Abort> {
        if start_off {
            self.step(generation, true)?;
            self.hold(generation, self.timing.power_on_hold)?;
        }
        for pulse in pulses {
            let window = match pulse {
                Pulse::Reset => self.timing.reset_window,
                Pulse::Advance => self.timing.advance_window,
            };
            tracing::debug!(?pulse, "light pulse");
            self.step(generation, false)?;
            self.hold(generation, window)?;
            self.step(generation, true)?;
            self.hold(generation, self.timing.settle)?;
        }
        Ok(())
    }

    fn step(&self, generation: u64, on: bool) -> Result<(), Abort> {
        let mut st = self.lock();
        if st.generation != generation {
            return Err(Abort::Interrupted);
        }
        self.io
            .actuate(DeviceId::Light, self.channel, on)
            .map_err(Abort::Port)?;
        st.state = DeviceState::from_on(on);
        Ok(())
    }

    fn hold(&self, generation: u64, duration: Duration) -> Result<(), Abort> {
        let mut held = Duration::ZERO;
        while held < duration {
            if self.lock().generation != generation {
                return Err(Abort::Interrupted);
            }
            let slice = HOLD_SLICE.min(duration - held);
            self.io.clock().sleep(slice);
            held += slice;
        }
        Ok(())
    }
}
