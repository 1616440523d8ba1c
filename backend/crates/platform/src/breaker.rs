//! Circuit Breaker
//!
//! [`BreakerSetting`] is the declarative description, [`BreakerPolicy`] the
//! trip/reset parameters built from it, and [`CircuitBreaker`] the
//! closed/open/half-open runtime that consumes a policy.
//!
//! ## Runtime rules
//! - **Closed**: calls pass; counts reset every `interval` (never when zero).
//!   The policy decides when a failure trips the breaker.
//! - **Open**: calls fail fast until `timeout` elapses, then half-open.
//! - **Half-open**: at most `max_requests` probes. That many consecutive
//!   successes close the breaker; any failure re-opens it.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::config::{env_duration, env_parse};

/// Failure ratio at which a breaker trips
pub const FAILURE_RATIO: f64 = 0.5;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

// ============================================================================
// Setting & Policy
// ============================================================================

/// Declarative breaker description
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakerSetting {
    pub name: String,
    /// Probes admitted while half-open
    pub max_requests: u32,
    /// Rolling window for closed-state counts
    pub interval: Duration,
    /// Time spent open before probing
    pub timeout: Duration,
    /// Requests observed before the breaker may trip
    pub min_requests: u32,
}

impl Default for BreakerSetting {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            max_requests: 1,
            interval: Duration::ZERO,
            timeout: DEFAULT_TIMEOUT,
            min_requests: 5,
        }
    }
}

impl BreakerSetting {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Read `{prefix}_CB_MAX_REQUESTS`, `{prefix}_CB_INTERVAL`,
    /// `{prefix}_CB_TIMEOUT` and `{prefix}_CB_MIN_REQUESTS`
    pub fn from_env(name: impl Into<String>, prefix: &str) -> Self {
        let defaults = Self::new(name);
        Self {
            max_requests: env_parse(
                &format!("{prefix}_CB_MAX_REQUESTS"),
                defaults.max_requests,
            ),
            interval: env_duration(&format!("{prefix}_CB_INTERVAL"), defaults.interval),
            timeout: env_duration(&format!("{prefix}_CB_TIMEOUT"), defaults.timeout),
            min_requests: env_parse(
                &format!("{prefix}_CB_MIN_REQUESTS"),
                defaults.min_requests,
            ),
            name: defaults.name,
        }
    }
}

/// Trip/reset parameters for [`CircuitBreaker`]
#[derive(Debug, Clone, PartialEq)]
pub struct BreakerPolicy {
    pub name: String,
    pub max_requests: u32,
    pub interval: Duration,
    pub timeout: Duration,
    pub min_requests: u32,
    pub failure_ratio: f64,
}

impl From<BreakerSetting> for BreakerPolicy {
    fn from(setting: BreakerSetting) -> Self {
        Self {
            name: setting.name,
            max_requests: setting.max_requests.max(1),
            interval: setting.interval,
            timeout: if setting.timeout.is_zero() {
                DEFAULT_TIMEOUT
            } else {
                setting.timeout
            },
            min_requests: setting.min_requests,
            failure_ratio: FAILURE_RATIO,
        }
    }
}

impl BreakerPolicy {
    /// Never trips below `min_requests` or with no requests at all
    pub fn ready_to_trip(&self, counts: &Counts) -> bool {
        if counts.requests == 0 || counts.requests < self.min_requests {
            return false;
        }
        let ratio = f64::from(counts.total_failures) / f64::from(counts.requests);
        ratio >= self.failure_ratio
    }
}

// ============================================================================
// Counts & State
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counts {
    pub requests: u32,
    pub total_successes: u32,
    pub total_failures: u32,
    pub consecutive_successes: u32,
    pub consecutive_failures: u32,
}

impl Counts {
    fn on_request(&mut self) {
        self.requests = self.requests.saturating_add(1);
    }

    fn on_success(&mut self) {
        self.total_successes = self.total_successes.saturating_add(1);
        self.consecutive_successes = self.consecutive_successes.saturating_add(1);
        self.consecutive_failures = 0;
    }

    fn on_failure(&mut self) {
        self.total_failures = self.total_failures.saturating_add(1);
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.consecutive_successes = 0;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    HalfOpen,
    Open,
}

impl fmt::Display for BreakerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BreakerState::Closed => "closed",
            BreakerState::HalfOpen => "half-open",
            BreakerState::Open => "open",
        })
    }
}

#[derive(Debug, Error)]
pub enum BreakerError<E> {
    #[error("circuit breaker is open")]
    Open,

    #[error("too many requests while half-open")]
    TooManyRequests,

    #[error(transparent)]
    Inner(E),
}

impl<E> BreakerError<E> {
    /// True when the call was rejected without running
    pub fn is_rejected(&self) -> bool {
        !matches!(self, BreakerError::Inner(_))
    }
}

type StateListener = Arc<dyn Fn(&str, BreakerState, BreakerState) + Send + Sync>;

// ============================================================================
// Runtime
// ============================================================================

struct Inner {
    state: BreakerState,
    generation: u64,
    counts: Counts,
    expiry: Option<Instant>,
}

/// Closed/open/half-open state machine
///
/// The lock is held only around bookkeeping, never across the guarded call.
pub struct CircuitBreaker {
    policy: BreakerPolicy,
    inner: Mutex<Inner>,
    listener: Option<StateListener>,
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("policy", &self.policy)
            .field("state", &self.state())
            .finish()
    }
}

impl CircuitBreaker {
    pub fn new(policy: BreakerPolicy) -> Self {
        let now = Instant::now();
        let expiry = (!policy.interval.is_zero()).then(|| now + policy.interval);
        Self {
            policy,
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                generation: 0,
                counts: Counts::default(),
                expiry,
            }),
            listener: None,
        }
    }

    /// Called with `(name, from, to)` on every transition
    pub fn with_state_listener<F>(mut self, listener: F) -> Self
    where
        F: Fn(&str, BreakerState, BreakerState) + Send + Sync + 'static,
    {
        self.listener = Some(Arc::new(listener));
        self
    }

    pub fn name(&self) -> &str {
        &self.policy.name
    }

    pub fn policy(&self) -> &BreakerPolicy {
        &self.policy
    }

    pub fn state(&self) -> BreakerState {
        let mut inner = self.lock();
        self.current_state(&mut inner, Instant::now())
    }

    pub fn counts(&self) -> Counts {
        self.lock().counts
    }

    /// Run `f`, counting any `Err` as a failure
    pub async fn call<F, Fut, T, E>(&self, f: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.call_with(f, |_| false).await
    }

    /// Run `f`; errors for which `is_successful` holds do not count as failures
    pub async fn call_with<F, Fut, T, E, P>(
        &self,
        f: F,
        is_successful: P,
    ) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: FnOnce(&E) -> bool,
    {
        let guard = RequestGuard {
            breaker: self,
            generation: self.before_request::<E>()?,
            settled: false,
        };
        let result = f().await;
        let success = match &result {
            Ok(_) => true,
            Err(e) => is_successful(e),
        };
        guard.settle(success);
        result.map_err(BreakerError::Inner)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // Bookkeeping never panics while locked; recover from poisoning anyway
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn before_request<E>(&self) -> Result<u64, BreakerError<E>> {
        let mut inner = self.lock();
        let state = self.current_state(&mut inner, Instant::now());

        match state {
            BreakerState::Open => return Err(BreakerError::Open),
            BreakerState::HalfOpen if inner.counts.requests >= self.policy.max_requests => {
                return Err(BreakerError::TooManyRequests);
            }
            _ => {}
        }

        inner.counts.on_request();
        Ok(inner.generation)
    }

    fn after_request(&self, before: u64, success: bool) {
        let mut inner = self.lock();
        let now = Instant::now();
        let state = self.current_state(&mut inner, now);
        if inner.generation != before {
            return;
        }

        if success {
            inner.counts.on_success();
            if state == BreakerState::HalfOpen
                && inner.counts.consecutive_successes >= self.policy.max_requests
            {
                self.set_state(&mut inner, BreakerState::Closed, now);
            }
        } else {
            inner.counts.on_failure();
            match state {
                BreakerState::Closed if self.policy.ready_to_trip(&inner.counts) => {
                    self.set_state(&mut inner, BreakerState::Open, now);
                }
                BreakerState::HalfOpen => self.set_state(&mut inner, BreakerState::Open, now),
                _ => {}
            }
        }
    }

    fn current_state(&self, inner: &mut Inner, now: Instant) -> BreakerState {
        let expired = inner.expiry.is_some_and(|at| at <= now);
        let state = inner.state;
        match state {
            BreakerState::Closed if expired => self.new_generation(inner, now),
            BreakerState::Open if expired => self.set_state(inner, BreakerState::HalfOpen, now),
            _ => {}
        }
        inner.state
    }

    fn set_state(&self, inner: &mut Inner, to: BreakerState, now: Instant) {
        let from = inner.state;
        if from == to {
            return;
        }
        inner.state = to;
        self.new_generation(inner, now);

        match to {
            BreakerState::Open => tracing::warn!(
                breaker = %self.policy.name,
                from = %from,
                to = %to,
                "Circuit breaker opened"
            ),
            _ => tracing::info!(
                breaker = %self.policy.name,
                from = %from,
                to = %to,
                "Circuit breaker state changed"
            ),
        }

        if let Some(listener) = &self.listener {
            listener(&self.policy.name, from, to);
        }
    }

    fn new_generation(&self, inner: &mut Inner, now: Instant) {
        inner.generation = inner.generation.wrapping_add(1);
        inner.counts = Counts::default();
        inner.expiry = match inner.state {
            BreakerState::Closed => {
                (!self.policy.interval.is_zero()).then(|| now + self.policy.interval)
            }
            BreakerState::Open => Some(now + self.policy.timeout),
            BreakerState::HalfOpen => None,
        };
    }
}

/// Records the outcome of an admitted call
///
/// A call dropped before completion (timeout, client disconnect) is counted
/// as a failure so half-open slots are always released.
struct RequestGuard<'a> {
    breaker: &'a CircuitBreaker,
    generation: u64,
    settled: bool,
}

impl RequestGuard<'_> {
    fn settle(mut self, success: bool) {
        self.settled = true;
        self.breaker.after_request(self.generation, success);
    }
}

impl Drop for RequestGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            tracing::debug!(breaker = %self.breaker.policy.name, "Guarded call cancelled");
            self.breaker.after_request(self.generation, false);
        }
    }
}
