//! Background thread that runs queued light color sequences.
//!
//! Each `LightWorker` spawns exactly one thread, shut down and joined when
//! the worker is dropped. Run the controller's ordered shutdown first so a
//! running sequence is interrupted instead of finishing its holds.
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel as xch;

use crate::devices::light::{LightColorController, SequenceOutcome};

/// How often the idle thread re-checks the shutdown flag.
const POLL: Duration = Duration::from_millis(100);

pub struct LightWorker {
    shutdown: Arc<AtomicBool>,
    join_handle: Option<JoinHandle<()>>,
}

impl LightWorker {
    pub fn spawn(light: Arc<LightColorController>) -> Self {
        let wake = light.wake_receiver();
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_bg = shutdown.clone();

        let join_handle = std::thread::spawn(move || {
            loop {
                if shutdown_bg.load(Ordering::Relaxed) {
                    tracing::debug!("light worker received shutdown signal");
                    break;
                }
                match wake.recv_timeout(POLL) {
                    Ok(()) => {
                        while let Some(outcome) = light.execute_pending() {
                            if let SequenceOutcome::Completed(c) = outcome {
                                tracing::info!(color = c.get(), name = c.name(), "light color set");
                            }
                            if shutdown_bg.load(Ordering::Relaxed) {
                                break;
                            }
                        }
                    }
                    Err(xch::RecvTimeoutError::Timeout) => {}
                    Err(xch::RecvTimeoutError::Disconnected) => break,
                }
            }
            tracing::trace!("light worker exiting cleanly");
        });

        Self {
            shutdown,
            join_handle: Some(join_handle),
        }
    }
}

impl Drop for LightWorker {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.join_handle.take() {
            match handle.join() {
                Ok(()) => tracing::trace!("light worker joined"),
                Err(e) => tracing::warn!(?e, "light worker panicked during shutdown"),
            }
        }
    }
}
