//! Background TCP reachability probe.
//!
//! Spawns one thread that periodically opens a TCP connection to the target
//! and records the last instant it succeeded. The thread is shut down and
//! joined when the `TcpProbe` is dropped.
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use poolctl_traits::{ConnectivityProbe, NetworkStatus};

/// Granularity of the interval sleep, bounds shutdown latency.
const SLEEP_SLICE: Duration = Duration::from_millis(100);

#[derive(Debug, Default)]
struct Shared {
    connected: AtomicBool,
    last_seen: Mutex<Option<Instant>>,
}

pub struct TcpProbe {
    shared: Arc<Shared>,
    shutdown: Arc<AtomicBool>,
    join_handle: Option<JoinHandle<()>>,
}

fn probe_once(target: &str, timeout: Duration) -> bool {
    let addrs: Vec<SocketAddr> = match target.to_socket_addrs() {
        Ok(a) => a.collect(),
        Err(e) => {
            tracing::debug!(addr = target, error = %e, "probe target did not resolve");
            return false;
        }
    };
    addrs
        .iter()
        .any(|addr| TcpStream::connect_timeout(addr, timeout).is_ok())
}

impl TcpProbe {
    pub fn spawn(target: String, connect_timeout: Duration, interval: Duration) -> Self {
        let shared = Arc::new(Shared::default());
        let shutdown = Arc::new(AtomicBool::new(false));
        let shared_bg = shared.clone();
        let shutdown_bg = shutdown.clone();

        let join_handle = std::thread::spawn(move || {
            loop {
                if shutdown_bg.load(Ordering::Relaxed) {
                    break;
                }
                let ok = probe_once(&target, connect_timeout);
                if ok {
                    *shared_bg
                        .last_seen
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner) = Some(Instant::now());
                }
                let was = shared_bg.connected.swap(ok, Ordering::Relaxed);
                if was != ok {
                    if ok {
                        tracing::info!(addr = %target, "network reachable");
                    } else {
                        tracing::warn!(addr = %target, "network unreachable");
                    }
                }

                let wake_at = Instant::now() + interval;
                while Instant::now() < wake_at {
                    if shutdown_bg.load(Ordering::Relaxed) {
                        break;
                    }
                    std::thread::sleep(
                        SLEEP_SLICE.min(wake_at.saturating_duration_since(Instant::now())),
                    );
                }
            }
            tracing::trace!("probe thread exiting cleanly");
        });

        Self {
            shared,
            shutdown,
            join_handle: Some(join_handle),
        }
    }
}

impl ConnectivityProbe for TcpProbe {
    fn status(&self) -> NetworkStatus {
        NetworkStatus {
            connected: self.shared.connected.load(Ordering::Relaxed),
            last_seen_at: *self
                .shared
                .last_seen
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        }
    }
}

impl Drop for TcpProbe {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.join_handle.take() {
            if let Err(e) = handle.join() {
                tracing::warn!(?e, "probe thread panicked during shutdown");
            }
        }
    }
}
