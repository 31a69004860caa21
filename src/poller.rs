use std::fmt;
use std::future::Future;
use std::time::Duration;

use tokio::time::{self, Instant, MissedTickBehavior};

use crate::error::{HarnessError, Result};
use crate::verify::{Comparison, VerificationFailure, Verify};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(10);

/// Cadence and budget of a [`Poller`].
///
/// `interval` is the minimum spacing between the starts of two attempts and must be
/// greater than zero. `timeout` is the wall-clock budget; the action always runs at
/// least once, even with a zero timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    interval: Duration,
    timeout: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_POLL_TIMEOUT,
        }
    }
}

impl PollConfig {
    pub fn new(interval: Duration, timeout: Duration) -> Result<Self> {
        if interval.is_zero() {
            return Err(HarnessError::InvalidConfig(
                "poll interval must be greater than 0".to_string(),
            ));
        }
        Ok(Self { interval, timeout })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn with_interval(self, interval: Duration) -> Result<Self> {
        Self::new(interval, self.timeout)
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        Self { timeout, ..self }
    }
}

/// Terminal state of a poll: the last observed value and whether the predicate held.
#[derive(Debug, Clone, PartialEq)]
pub struct PollResult<T> {
    value: T,
    satisfied: bool,
    attempts: u32,
    elapsed: Duration,
    timeout: Duration,
}

/// Tagged view of a [`PollResult`] separating convergence from giving up.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome<T> {
    Satisfied(T),
    TimedOut(T),
}

impl<T> PollOutcome<T> {
    pub fn into_inner(self) -> T {
        match self {
            PollOutcome::Satisfied(value) | PollOutcome::TimedOut(value) => value,
        }
    }
}

impl<T> PollResult<T> {
    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn into_value(self) -> T {
        self.value
    }

    pub fn is_satisfied(&self) -> bool {
        self.satisfied
    }

    pub fn timed_out(&self) -> bool {
        !self.satisfied
    }

    /// Number of times the action was invoked.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn into_outcome(self) -> PollOutcome<T> {
        if self.satisfied {
            PollOutcome::Satisfied(self.value)
        } else {
            PollOutcome::TimedOut(self.value)
        }
    }

    /// Start a labeled verification of the terminal value.
    ///
    /// Failures raised from the returned [`Verify`] report how many attempts the poll
    /// made, which separates "never converged" from "converged to the wrong value".
    pub fn verify(&self, label: &str) -> Verify<&T> {
        Verify::new(&self.value)
            .labeled(label)
            .after_attempts(self.attempts)
    }

    /// Return the value if the predicate held, or a failure naming the label otherwise.
    pub fn require(self, label: &str) -> Result<T, VerificationFailure>
    where
        T: fmt::Debug,
    {
        if self.satisfied {
            return Ok(self.value);
        }
        Err(VerificationFailure::new(
            Some(label.to_string()),
            Comparison::Converges,
            format!("condition met within {:?}", self.timeout),
            format!("{:?}", self.value),
        )
        .with_attempts(self.attempts))
    }
}

/// Bounded retry-until-predicate executor.
///
/// The action is any closure producing a future of `Result<T, E>`; it may be a pure
/// read or a request that also drives the state change. An `Err` from the action
/// ends polling immediately and is handed back to the caller unchanged. Only a
/// predicate returning `false` triggers another attempt.
pub struct Poller<A, P> {
    action: A,
    predicate: P,
    config: PollConfig,
}

impl<A, P> fmt::Debug for Poller<A, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Poller")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<A, P> Poller<A, P> {
    pub fn new(action: A, predicate: P) -> Self {
        Self {
            action,
            predicate,
            config: PollConfig::default(),
        }
    }

    pub fn with_config(mut self, config: PollConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> PollConfig {
        self.config
    }

    /// Run the poll to completion.
    ///
    /// The interval timer lives only inside this call and is released on every exit
    /// path. Polling gives up once the next attempt could not start before the
    /// timeout, so a poll never outlives `timeout` by more than the duration of the
    /// action itself.
    pub async fn result<T, E, Fut>(mut self) -> Result<PollResult<T>, E>
    where
        A: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&T) -> bool,
    {
        let PollConfig { interval, timeout } = self.config;
        let started = Instant::now();

        // First tick completes immediately; later ticks subtract time spent in the action.
        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut attempts: u32 = 0;
        loop {
            ticker.tick().await;
            let attempt_started = Instant::now();
            attempts += 1;

            let value = (self.action)().await?;

            if (self.predicate)(&value) {
                let elapsed = started.elapsed();
                log::debug!("Poll satisfied after {attempts} attempt(s) in {elapsed:?}");
                return Ok(PollResult {
                    value,
                    satisfied: true,
                    attempts,
                    elapsed,
                    timeout,
                });
            }

            // An interval too large to schedule puts the next attempt past any deadline.
            let past_deadline = match attempt_started.checked_add(interval) {
                Some(next_attempt) => {
                    next_attempt.max(Instant::now()).duration_since(started) > timeout
                }
                None => true,
            };
            if past_deadline {
                let elapsed = started.elapsed();
                log::warn!(
                    "Poll gave up after {attempts} attempt(s) in {elapsed:?} (timeout {timeout:?})"
                );
                return Ok(PollResult {
                    value,
                    satisfied: false,
                    attempts,
                    elapsed,
                    timeout,
                });
            }

            log::trace!("Poll attempt {attempts} unsatisfied, next in {interval:?}");
        }
    }
}
