//! Platform abstraction (`spec.md` §2, §9): everything the engine needs from
//! the host but does not implement itself — a monotonic clock and a way to
//! send a reply datagram. Passed once to the engine constructor instead of
//! process-wide function pointers.

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::NetworkInfo;

/// Errors raised while sending a reply through the platform.
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("platform send failed: {0}")]
    Send(String),
}

/// Host services the engine depends on but never implements directly.
pub trait Platform: Send + Sync {
    /// Milliseconds since an arbitrary but fixed epoch (monotonic).
    fn monotonic_ms(&self) -> u64;

    /// Send `payload` to `dest`. Non-blocking: an engine that cannot send
    /// immediately should report a [`PlatformError`] rather than block.
    fn send_to(&self, payload: &[u8], dest: SocketAddr) -> Result<(), PlatformError>;

    /// Current network configuration, consulted once at construction and
    /// whenever the engine is told to refresh it.
    fn network_info(&self) -> NetworkInfo;
}

/// In-memory [`Platform`] used by the engine's own tests: a fixed clock and
/// a channel capturing every datagram that would have been sent.
#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    pub struct RecordingPlatform {
        pub now_ms: AtomicU64,
        pub network: NetworkInfo,
        pub sent: Mutex<Vec<(Vec<u8>, SocketAddr)>>,
        pub fail_sends: AtomicU64,
    }

    impl RecordingPlatform {
        pub fn new(network: NetworkInfo) -> Self {
            Self {
                now_ms: AtomicU64::new(0),
                network,
                sent: Mutex::new(Vec::new()),
                fail_sends: AtomicU64::new(0),
            }
        }

        pub fn set_now(&self, ms: u64) {
            self.now_ms.store(ms, Ordering::Relaxed);
        }

        pub fn fail_next_sends(&self, count: u64) {
            self.fail_sends.store(count, Ordering::Relaxed);
        }

        pub fn sent_count(&self) -> usize {
            self.sent.lock().unwrap().len()
        }

        pub fn last_sent(&self) -> Option<(Vec<u8>, SocketAddr)> {
            self.sent.lock().unwrap().last().cloned()
        }
    }

    impl Platform for RecordingPlatform {
        fn monotonic_ms(&self) -> u64 {
            self.now_ms.load(Ordering::Relaxed)
        }

        fn send_to(&self, payload: &[u8], dest: SocketAddr) -> Result<(), PlatformError> {
            let remaining = self.fail_sends.load(Ordering::Relaxed);
            if remaining > 0 {
                self.fail_sends.store(remaining - 1, Ordering::Relaxed);
                return Err(PlatformError::Send("simulated failure".into()));
            }
            self.sent.lock().unwrap().push((payload.to_vec(), dest));
            Ok(())
        }

        fn network_info(&self) -> NetworkInfo {
            self.network
        }
    }
}
