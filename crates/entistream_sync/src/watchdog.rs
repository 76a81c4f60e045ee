//! Deadline thread for HTTP reads.

use crate::cancel::CancellationToken;
use crate::error::TimeoutKind;
use parking_lot::{Condvar, Mutex};
use std::io;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::warn;

struct Deadlines {
    idle: Option<Instant>,
    overall: Instant,
    fired: Option<TimeoutKind>,
    stopped: bool,
}

struct Shared {
    state: Mutex<Deadlines>,
    wake: Condvar,
    token: CancellationToken,
    idle_timeout: Duration,
}

/// Enforces the idle and overall deadlines of one read.
///
/// The overall deadline runs from [`Watchdog::start`]. The idle deadline
/// is armed by the first [`Watchdog::reset`] and pushed back by every
/// later one. When either expires the watchdog cancels its token and
/// exits. Dropping the watchdog stops the thread.
pub struct Watchdog {
    shared: Arc<Shared>,
    handle: Option<JoinHandle<()>>,
}

impl Watchdog {
    /// Starts the watchdog thread.
    pub fn start(idle_timeout: Duration, overall_timeout: Duration) -> io::Result<Self> {
        let shared = Arc::new(Shared {
            state: Mutex::new(Deadlines {
                idle: None,
                overall: Instant::now() + overall_timeout,
                fired: None,
                stopped: false,
            }),
            wake: Condvar::new(),
            token: CancellationToken::new(),
            idle_timeout,
        });

        let thread_shared = Arc::clone(&shared);
        let handle = std::thread::Builder::new()
            .name("entistream-watchdog".to_string())
            .spawn(move || run(&thread_shared))?;

        Ok(Self {
            shared,
            handle: Some(handle),
        })
    }

    /// Token cancelled when a deadline expires.
    pub fn token(&self) -> &CancellationToken {
        &self.shared.token
    }

    /// Pushes the idle deadline back by the idle timeout.
    pub fn reset(&self) {
        let mut state = self.shared.state.lock();
        let armed = state.idle.is_some();
        state.idle = Some(Instant::now() + self.shared.idle_timeout);
        drop(state);
        // Until the first reset the thread only waits on the overall deadline.
        if !armed {
            self.shared.wake.notify_all();
        }
    }

    /// The deadline that expired, if any.
    pub fn fired(&self) -> Option<TimeoutKind> {
        self.shared.state.lock().fired
    }

    /// Stops the thread without firing.
    pub fn stop(&mut self) {
        {
            let mut state = self.shared.state.lock();
            state.stopped = true;
        }
        self.shared.wake.notify_all();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(shared: &Shared) {
    let mut state = shared.state.lock();
    loop {
        if state.stopped {
            return;
        }

        let now = Instant::now();
        let kind = if now >= state.overall {
            Some(TimeoutKind::Overall)
        } else if state.idle.is_some_and(|idle| now >= idle) {
            Some(TimeoutKind::Idle)
        } else {
            None
        };

        if let Some(kind) = kind {
            state.fired = Some(kind);
            shared.token.cancel();
            warn!(%kind, "read deadline expired");
            return;
        }

        let wake_at = match state.idle {
            Some(idle) => idle.min(state.overall),
            None => state.overall,
        };
        shared.wake.wait_until(&mut state, wake_at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn idle_is_armed_by_first_reset() {
        let dog = Watchdog::start(Duration::from_millis(20), Duration::from_secs(10)).unwrap();
        sleep(Duration::from_millis(60));
        assert_eq!(dog.fired(), None);

        dog.reset();
        sleep(Duration::from_millis(200));
        assert_eq!(dog.fired(), Some(TimeoutKind::Idle));
        assert!(dog.token().is_cancelled());
    }

    #[test]
    fn resets_keep_it_alive() {
        let dog = Watchdog::start(Duration::from_millis(100), Duration::from_secs(10)).unwrap();
        for _ in 0..6 {
            dog.reset();
            sleep(Duration::from_millis(20));
        }
        assert_eq!(dog.fired(), None);
        assert!(!dog.token().is_cancelled());
    }

    #[test]
    fn overall_ignores_resets() {
        let dog = Watchdog::start(Duration::from_secs(10), Duration::from_millis(50)).unwrap();
        for _ in 0..10 {
            dog.reset();
            sleep(Duration::from_millis(15));
        }
        sleep(Duration::from_millis(100));
        assert_eq!(dog.fired(), Some(TimeoutKind::Overall));
    }

    #[test]
    fn stop_does_not_fire() {
        let mut dog = Watchdog::start(Duration::from_secs(1), Duration::from_secs(1)).unwrap();
        dog.reset();
        dog.stop();
        assert_eq!(dog.fired(), None);
    }
}
