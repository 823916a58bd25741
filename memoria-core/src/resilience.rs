use std::collections::VecDeque;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use crate::error::{MemoriaError, Result};

/// Sliding-window rate limiter (spec §4.8). `acquire()` either records `now`
/// or fails with `RateLimited{retry_after}`.
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    timestamps: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            timestamps: Mutex::new(VecDeque::new()),
        }
    }

    pub async fn acquire(&self) -> Result<()> {
        let now = Instant::now();
        let mut timestamps = self.timestamps.lock().await;

        while let Some(&oldest) = timestamps.front() {
            if now.duration_since(oldest) >= self.window {
                timestamps.pop_front();
            } else {
                break;
            }
        }

        if timestamps.len() as u32 >= self.max_requests {
            let oldest = *timestamps.front().expect("at capacity implies non-empty");
            let retry_after = self.window.saturating_sub(now.duration_since(oldest));
            return Err(MemoriaError::RateLimited {
                retry_after_secs: retry_after.as_secs().max(1),
            });
        }

        timestamps.push_back(now);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Closed,
    Open,
    HalfOpen,
}

struct CircuitState {
    state: State,
    consecutive_failures: u32,
    consecutive_successes: u32,
    opened_at: Option<Instant>,
}

/// Failure-tripped circuit breaker (spec §4.8): `closed -> open` after
/// `failure_threshold` consecutive failures; `open -> half_open` after
/// `recovery_timeout`; `half_open -> closed` after `success_threshold`
/// successes; `half_open -> open` on any failure.
pub struct CircuitBreaker {
    service: String,
    failure_threshold: u32,
    recovery_timeout: Duration,
    success_threshold: u32,
    state: Mutex<CircuitState>,
}

impl CircuitBreaker {
    pub fn new(
        service: impl Into<String>,
        failure_threshold: u32,
        recovery_timeout: Duration,
        success_threshold: u32,
    ) -> Self {
        Self {
            service: service.into(),
            failure_threshold,
            recovery_timeout,
            success_threshold,
            state: Mutex::new(CircuitState {
                state: State::Closed,
                consecutive_failures: 0,
                consecutive_successes: 0,
                opened_at: None,
            }),
        }
    }

    /// Call before attempting the protected operation. Transitions
    /// `open -> half_open` once `recovery_timeout` has elapsed.
    pub async fn check(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        match state.state {
            State::Closed | State::HalfOpen => Ok(()),
            State::Open => {
                let opened_at = state.opened_at.expect("open state always has opened_at");
                let elapsed = Instant::now().duration_since(opened_at);
                if elapsed >= self.recovery_timeout {
                    state.state = State::HalfOpen;
                    state.consecutive_successes = 0;
                    Ok(())
                } else {
                    let retry_after = self.recovery_timeout.saturating_sub(elapsed);
                    Err(MemoriaError::CircuitOpen {
                        service: self.service.clone(),
                        retry_after_secs: retry_after.as_secs().max(1),
                    })
                }
            }
        }
    }

    pub async fn record_success(&self) {
        let mut state = self.state.lock().await;
        match state.state {
            State::Closed => {
                state.consecutive_failures = 0;
            }
            State::HalfOpen => {
                state.consecutive_successes += 1;
                if state.consecutive_successes >= self.success_threshold {
                    state.state = State::Closed;
                    state.consecutive_failures = 0;
                    state.consecutive_successes = 0;
                    state.opened_at = None;
                }
            }
            State::Open => {}
        }
    }

    pub async fn record_failure(&self) {
        let mut state = self.state.lock().await;
        match state.state {
            State::Closed => {
                state.consecutive_failures += 1;
                if state.consecutive_failures >= self.failure_threshold {
                    state.state = State::Open;
                    state.opened_at = Some(Instant::now());
                }
            }
            State::HalfOpen => {
                state.state = State::Open;
                state.opened_at = Some(Instant::now());
                state.consecutive_successes = 0;
            }
            State::Open => {}
        }
    }
}

/// Rate-limit first, then circuit-breaker check, matching §4.8's composition
/// order ("rate-limit first, then circuit-breaker wrap of the call itself").
pub async fn guarded<F, Fut, T>(limiter: &RateLimiter, breaker: &CircuitBreaker, call: F) -> Result<T>
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    limiter.acquire().await?;
    breaker.check().await?;
    let outcome = call().await;
    match &outcome {
        Ok(_) => breaker.record_success().await,
        Err(_) => breaker.record_failure().await,
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rate_limiter_allows_up_to_max_requests() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60));
        assert!(limiter.acquire().await.is_ok());
        assert!(limiter.acquire().await.is_ok());
        assert!(limiter.acquire().await.is_ok());
        assert!(limiter.acquire().await.is_err());
    }

    #[tokio::test]
    async fn circuit_breaker_opens_after_failure_threshold() {
        let breaker = CircuitBreaker::new("embedder", 2, Duration::from_millis(50), 1);
        breaker.check().await.unwrap();
        breaker.record_failure().await;
        breaker.check().await.unwrap();
        breaker.record_failure().await;
        assert!(breaker.check().await.is_err());
    }

    #[tokio::test]
    async fn circuit_breaker_half_opens_after_recovery_timeout() {
        let breaker = CircuitBreaker::new("embedder", 1, Duration::from_millis(20), 1);
        breaker.record_failure().await;
        assert!(breaker.check().await.is_err());
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(breaker.check().await.is_ok());
    }

    #[tokio::test]
    async fn circuit_breaker_closes_after_success_threshold_in_half_open() {
        let breaker = CircuitBreaker::new("embedder", 1, Duration::from_millis(10), 2);
        breaker.record_failure().await;
        tokio::time::sleep(Duration::from_millis(15)).await;
        breaker.check().await.unwrap();
        breaker.record_success().await;
        breaker.record_success().await;
        breaker.check().await.unwrap();
        breaker.record_failure().await;
        assert!(breaker.check().await.is_ok(), "single failure while closed must not reopen");
    }

    #[tokio::test]
    async fn circuit_breaker_half_open_failure_reopens() {
        let breaker = CircuitBreaker::new("embedder", 1, Duration::from_millis(10), 2);
        breaker.record_failure().await;
        tokio::time::sleep(Duration::from_millis(15)).await;
        breaker.check().await.unwrap();
        breaker.record_failure().await;
        assert!(breaker.check().await.is_err());
    }

    #[tokio::test]
    async fn success_in_closed_state_resets_failure_counter() {
        let breaker = CircuitBreaker::new("embedder", 2, Duration::from_millis(50), 1);
        breaker.record_failure().await;
        breaker.record_success().await;
        breaker.record_failure().await;
        assert!(breaker.check().await.is_ok());
    }
}
