use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::nlu_metrics::{BreakerService, MetricsRecorder};

/// Point-in-time copy of a breaker's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BreakerState {
    /// Consecutive failures since the last success.
    pub failure_count: u32,
    /// The breaker rejects calls until this instant. `None` means never opened
    /// or reset.
    pub open_until: Option<Instant>,
}

impl BreakerState {
    fn is_open_at(&self, now: Instant) -> bool {
        self.open_until.is_some_and(|until| until > now)
    }
}

/// A failure-counting gate in front of one external dependency.
///
/// After `failure_threshold` consecutive failures the breaker opens for
/// `reset` and callers skip the dependency. Once the window elapses the next
/// call is let through; a success closes the breaker, another failure reopens
/// it immediately because the count is still at the threshold.
///
/// All mutation happens under one mutex, so concurrent requests never lose an
/// increment or observe a half-reset state.
pub struct CircuitBreaker {
    service: BreakerService,
    failure_threshold: u32,
    reset: Duration,
    state: Mutex<BreakerState>,
    metrics: Arc<dyn MetricsRecorder>,
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("service", &self.service)
            .field("failure_threshold", &self.failure_threshold)
            .field("reset", &self.reset)
            .field("state", &self.snapshot())
            .finish()
    }
}

impl CircuitBreaker {
    /// Creates a closed breaker.
    ///
    /// # Arguments
    ///
    /// * `service` - The guarded dependency, used for the state gauge and logs.
    /// * `failure_threshold` - Consecutive failures that open the breaker (at least 1).
    /// * `reset` - How long the breaker stays open.
    /// * `metrics` - Receives open/closed transitions.
    pub fn new(
        service: BreakerService,
        failure_threshold: u32,
        reset: Duration,
        metrics: Arc<dyn MetricsRecorder>,
    ) -> Self {
        Self {
            service,
            failure_threshold: failure_threshold.max(1),
            reset,
            state: Mutex::new(BreakerState::default()),
            metrics,
        }
    }

    pub fn service(&self) -> BreakerService {
        self.service
    }

    pub fn failure_threshold(&self) -> u32 {
        self.failure_threshold
    }

    // Counters stay meaningful even if a holder panicked mid-update.
    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// `true` while the open window has not elapsed.
    pub fn is_open(&self) -> bool {
        self.lock().is_open_at(Instant::now())
    }

    pub fn failure_count(&self) -> u32 {
        self.lock().failure_count
    }

    pub fn snapshot(&self) -> BreakerState {
        *self.lock()
    }

    /// Counts a failure and (re)opens the breaker once the threshold is reached.
    ///
    /// Returns `true` if this call opened the breaker.
    pub fn record_failure(&self) -> bool {
        let (opened, failures) = {
            let mut state = self.lock();
            state.failure_count = state.failure_count.saturating_add(1);
            let opened = state.failure_count >= self.failure_threshold;
            if opened {
                state.open_until = Some(Instant::now() + self.reset);
            }
            (opened, state.failure_count)
        };

        if opened {
            warn!(
                "Circuit breaker for {} opened for {}ms after {} failures",
                self.service.label(),
                self.reset.as_millis(),
                failures
            );
            self.metrics.set_circuit_breaker_state(self.service, true);
        }
        opened
    }

    /// Resets the breaker to closed with zero failures.
    pub fn record_success(&self) {
        let was_open = {
            let mut state = self.lock();
            let was_open = state.open_until.is_some();
            *state = BreakerState::default();
            was_open
        };

        if was_open {
            info!("Circuit breaker for {} closed", self.service.label());
            self.metrics.set_circuit_breaker_state(self.service, false);
        }
    }
}
