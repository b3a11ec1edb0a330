//! Reachability gate: device connectivity plus a server cooldown breaker

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug)]
struct GateState {
    device_connected: bool,
    server_reachable: bool,
    unreachable_since: Option<Instant>,
}

/// Decides whether a server call is worth attempting right now.
///
/// Not a circuit breaker with half-open probes: once the cooldown since the
/// last unreachable report has elapsed, calls are simply allowed again.
#[derive(Debug)]
pub struct ReachabilityGate {
    cooldown: Duration,
    state: Mutex<GateState>,
}

impl ReachabilityGate {
    pub fn new(cooldown: Duration, device_connected: bool) -> Self {
        Self {
            cooldown,
            state: Mutex::new(GateState {
                device_connected,
                server_reachable: true,
                unreachable_since: None,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn cooldown_elapsed(&self, state: &GateState) -> bool {
        state
            .unreachable_since
            .is_none_or(|since| since.elapsed() >= self.cooldown)
    }

    /// The server answered
    pub fn report_success(&self) {
        let mut state = self.state();
        if !state.server_reachable {
            tracing::info!("Note service reachable again");
        }
        state.server_reachable = true;
        state.unreachable_since = None;
    }

    /// The server could not be reached.
    ///
    /// Starts a cooldown unless one is already running.
    pub fn report_unreachable(&self) {
        let mut state = self.state();
        if state.server_reachable || self.cooldown_elapsed(&state) {
            tracing::warn!(
                "Note service unreachable, backing off for {:?}",
                self.cooldown
            );
            state.unreachable_since = Some(Instant::now());
        }
        state.server_reachable = false;
    }

    /// Whether a server call should be attempted now
    pub fn should_attempt_server_call(&self) -> bool {
        let state = self.state();
        if !state.device_connected {
            return false;
        }
        state.server_reachable || self.cooldown_elapsed(&state)
    }

    /// Update device connectivity. Returns true when the device just came online.
    pub fn set_device_connected(&self, connected: bool) -> bool {
        let mut state = self.state();
        let came_online = connected && !state.device_connected;
        state.device_connected = connected;

        if came_online && !state.server_reachable && self.cooldown_elapsed(&state) {
            state.server_reachable = true;
            state.unreachable_since = None;
        }
        came_online
    }

    pub fn is_server_reachable(&self) -> bool {
        self.state().server_reachable
    }
}
