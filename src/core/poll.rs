//! Readiness polling.
//!
//! A fixed-interval, fixed-window wait loop. Transient errors (the server not
//! listening yet, a 503 while it boots) count as "not ready"; anything else
//! aborts the wait immediately.

use crate::error::{Error, Result};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitSpec {
    pub timeout: Duration,
    pub interval: Duration,
}

impl WaitSpec {
    pub fn new(timeout: Duration, interval: Duration) -> Self {
        Self { timeout, interval }
    }
}

/// Outcome of one check.
#[derive(Debug, Clone, PartialEq)]
pub enum Check<T> {
    Ready(T),
    /// Not there yet; the string (if any) is what was observed instead.
    Pending(Option<String>),
}

impl<T> Check<T> {
    pub fn pending() -> Self {
        Check::Pending(None)
    }

    pub fn observed(observation: impl Into<String>) -> Self {
        Check::Pending(Some(observation.into()))
    }
}

/// Shortest budget handed to an attempt, so a closing window still gets one try.
const MIN_ATTEMPT_BUDGET: Duration = Duration::from_millis(1);

/// Call `check` until it reports ready or `spec.timeout` elapses.
///
/// Each attempt is handed what is left of the window and must not outlive it
/// (HTTP checks cap their request timeout with it). Sleeps `spec.interval`
/// between attempts, clamped so that no attempt starts after the window
/// closes. On expiry returns a single `readiness.timeout` error carrying the
/// last observation.
pub fn wait_until<T, F>(what: &str, spec: &WaitSpec, mut check: F) -> Result<T>
where
    F: FnMut(Duration) -> Result<Check<T>>,
{
    let started = Instant::now();
    let mut attempts: u32 = 0;
    let mut last_observation: Option<String> = None;

    loop {
        attempts += 1;
        let budget = spec
            .timeout
            .saturating_sub(started.elapsed())
            .max(MIN_ATTEMPT_BUDGET);

        match check(budget) {
            Ok(Check::Ready(value)) => return Ok(value),
            Ok(Check::Pending(observation)) => {
                if observation.is_some() {
                    last_observation = observation;
                }
            }
            Err(err) if err.is_transient() => {
                last_observation = Some(err.message.clone());
            }
            Err(err) => return Err(err),
        }

        let elapsed = started.elapsed();
        if elapsed >= spec.timeout {
            return Err(Error::readiness_timeout(
                what,
                spec.timeout,
                attempts,
                last_observation,
            ));
        }

        std::thread::sleep(spec.interval.min(spec.timeout - elapsed));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    fn quick() -> WaitSpec {
        WaitSpec::new(Duration::from_millis(120), Duration::from_millis(10))
    }

    fn connection_refused() -> Error {
        let mut err = Error::new(
            ErrorCode::HttpRequestFailed,
            "HTTP request failed: connection refused",
            serde_json::Value::Null,
        );
        err.retryable = Some(true);
        err
    }

    #[test]
    fn returns_on_first_ready_check() {
        let mut calls = 0;
        let value = wait_until("server", &quick(), |_| {
            calls += 1;
            Ok(Check::Ready(42))
        })
        .unwrap();
        assert_eq!(value, 42);
        assert_eq!(calls, 1);
    }

    #[test]
    fn swallows_connection_refused_until_success() {
        let mut calls = 0;
        let value = wait_until("server", &quick(), |_| {
            calls += 1;
            if calls < 3 {
                Err(connection_refused())
            } else {
                Ok(Check::Ready("up"))
            }
        })
        .unwrap();
        assert_eq!(value, "up");
        assert_eq!(calls, 3);
    }

    #[test]
    fn times_out_once_with_last_observation() {
        let spec = quick();
        let started = Instant::now();
        let mut calls = 0u32;

        let err = wait_until::<(), _>("pipeline", &spec, |_| {
            calls += 1;
            Ok(Check::observed(format!("Building #{}", calls)))
        })
        .unwrap_err();

        assert_eq!(err.code, ErrorCode::ReadinessTimeout);
        assert_eq!(err.details["attempts"], calls);
        assert_eq!(err.details["lastObservation"], format!("Building #{}", calls));
        // No attempt may start after the window, so the overrun is at most one
        // attempt's worth of work.
        assert!(started.elapsed() < spec.timeout + Duration::from_millis(100));
    }

    #[test]
    fn transient_error_is_remembered_as_observation() {
        let err = wait_until::<(), _>("agent", &quick(), |_| Err(connection_refused())).unwrap_err();
        assert_eq!(err.code, ErrorCode::ReadinessTimeout);
        assert_eq!(
            err.details["lastObservation"],
            "HTTP request failed: connection refused"
        );
    }

    #[test]
    fn hard_errors_abort_immediately() {
        let mut calls = 0;
        let err = wait_until::<(), _>("agent", &quick(), |_| {
            calls += 1;
            Err(Error::http_status("GET", "/go/api/agents", 404, "not found"))
        })
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::HttpStatus);
        assert_eq!(calls, 1);
    }

    #[test]
    fn zero_window_checks_exactly_once() {
        let mut calls = 0;
        let spec = WaitSpec::new(Duration::ZERO, Duration::from_secs(5));
        let err = wait_until::<(), _>("server", &spec, |_| {
            calls += 1;
            Ok(Check::pending())
        })
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::ReadinessTimeout);
        assert_eq!(calls, 1);
    }

    #[test]
    fn each_attempt_gets_the_remaining_window() {
        let spec = WaitSpec::new(Duration::from_millis(60), Duration::from_millis(20));
        let mut budgets = Vec::new();
        let _ = wait_until::<(), _>("agent", &spec, |budget| {
            budgets.push(budget);
            Ok(Check::pending())
        });

        assert!(budgets.len() >= 2);
        assert!(budgets[0] <= spec.timeout);
        assert!(budgets.windows(2).all(|pair| pair[1] <= pair[0]));
        assert!(budgets[budgets.len() - 1] < budgets[0]);
        assert!(budgets.iter().all(|b| *b >= MIN_ATTEMPT_BUDGET));
    }
}
