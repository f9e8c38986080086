//! Login throttling.
//!
//! Login attempts are counted per source address over a sliding window.
//! An attempt takes its slot the moment it arrives, before credentials are
//! looked at, so concurrent guesses from one address cannot all slip past
//! the ceiling. A successful login hands its slot back; failures keep
//! theirs until they age out of the window.

use std::collections::{HashMap, VecDeque};
use std::net::IpAddr;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::AuthError;

/// Throttling parameters.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Length of the sliding window.
    ///
    /// Default: 15 minutes.
    pub window: Duration,

    /// Attempts allowed inside one window. Successful logins hand their
    /// slot back, so in practice this caps failed guesses.
    ///
    /// Default: 5.
    pub max_failures: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(15 * 60),
            max_failures: 5,
        }
    }
}

/// Per-address sliding-window counter of login attempts.
#[derive(Debug)]
pub struct LoginRateLimiter {
    config: RateLimitConfig,
    failures: Mutex<HashMap<IpAddr, VecDeque<Instant>>>,
}

impl LoginRateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            failures: Mutex::new(HashMap::new()),
        }
    }

    fn failures(&self) -> MutexGuard<'_, HashMap<IpAddr, VecDeque<Instant>>> {
        self.failures.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claims an attempt slot for `addr`.
    ///
    /// # Errors
    /// [`AuthError::RateLimited`] with the time until the oldest counted
    /// attempt leaves the window. A refused attempt takes no slot.
    pub fn try_acquire(&self, addr: IpAddr) -> Result<(), AuthError> {
        self.try_acquire_at(addr, Instant::now())
    }

    /// [`try_acquire`](Self::try_acquire) with an explicit clock.
    pub fn try_acquire_at(&self, addr: IpAddr, now: Instant) -> Result<(), AuthError> {
        let mut failures = self.failures();
        let times = failures.entry(addr).or_default();
        prune(times, now, self.config.window);

        if times.len() >= self.config.max_failures {
            let oldest = times.front().copied().unwrap_or(now);
            let retry_after = (oldest + self.config.window).saturating_duration_since(now);
            return Err(AuthError::RateLimited { retry_after });
        }

        times.push_back(now);
        if times.len() == self.config.max_failures {
            tracing::warn!(%addr, "login attempt ceiling reached");
        }
        Ok(())
    }

    /// Gives back the most recent slot taken by `addr`, for an attempt
    /// that turned out not to be a failed guess.
    pub fn release(&self, addr: IpAddr) {
        let mut failures = self.failures();
        if let Some(times) = failures.get_mut(&addr) {
            times.pop_back();
            if times.is_empty() {
                failures.remove(&addr);
            }
        }
    }

    /// Drops every address whose failures have all aged out.
    pub fn purge(&self) {
        let now = Instant::now();
        let window = self.config.window;
        self.failures().retain(|_, times| {
            prune(times, now, window);
            !times.is_empty()
        });
    }

    /// Number of addresses with at least one counted failure.
    pub fn tracked(&self) -> usize {
        self.failures().len()
    }
}

impl Default for LoginRateLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}

fn prune(times: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(&oldest) = times.front() {
        if now.saturating_duration_since(oldest) >= window {
            times.pop_front();
        } else {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;
    use std::sync::Arc;

    use super::*;

    const ADDR: IpAddr = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 7));
    const OTHER: IpAddr = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 8));

    #[test]
    fn test_try_acquire_unknown_address_allows() {
        let limiter = LoginRateLimiter::default();

        assert!(limiter.try_acquire(ADDR).is_ok());
        assert_eq!(limiter.tracked(), 1);
    }

    #[test]
    fn test_try_acquire_sixth_attempt_is_limited() {
        let limiter = LoginRateLimiter::default();
        let start = Instant::now();

        for i in 0..5 {
            let at = start + Duration::from_secs(i);
            assert!(limiter.try_acquire_at(ADDR, at).is_ok(), "attempt {} allowed", i + 1);
        }

        match limiter.try_acquire_at(ADDR, start + Duration::from_secs(5)) {
            Err(AuthError::RateLimited { retry_after }) => {
                // Oldest attempt at `start`, window 15 min, now start+5s.
                assert_eq!(retry_after, Duration::from_secs(15 * 60 - 5));
            }
            other => panic!("expected RateLimited, got {other:?}"),
        }
    }

    #[test]
    fn test_try_acquire_concurrent_attempts_respect_ceiling() {
        let limiter = Arc::new(LoginRateLimiter::default());

        let handles: Vec<_> = (0..20)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                std::thread::spawn(move || limiter.try_acquire(ADDR).is_ok())
            })
            .collect();
        let admitted = handles
            .into_iter()
            .map(|h| h.join().expect("thread"))
            .filter(|ok| *ok)
            .count();

        assert_eq!(admitted, 5);
    }

    #[test]
    fn test_release_returns_slot_to_address() {
        let limiter = LoginRateLimiter::default();
        let now = Instant::now();
        for _ in 0..5 {
            limiter.try_acquire_at(ADDR, now).expect("slot");
        }

        limiter.release(ADDR);

        assert!(limiter.try_acquire_at(ADDR, now).is_ok());
        assert!(limiter.try_acquire_at(ADDR, now).is_err());
    }

    #[test]
    fn test_release_last_slot_forgets_address() {
        let limiter = LoginRateLimiter::default();
        limiter.try_acquire(ADDR).expect("slot");

        limiter.release(ADDR);

        assert_eq!(limiter.tracked(), 0);
    }

    #[test]
    fn test_try_acquire_after_window_elapses_allows_again() {
        let limiter = LoginRateLimiter::default();
        let start = Instant::now();
        for _ in 0..5 {
            limiter.try_acquire_at(ADDR, start).expect("slot");
        }

        let later = start + Duration::from_secs(15 * 60);

        assert!(limiter.try_acquire_at(ADDR, later).is_ok());
        assert_eq!(limiter.tracked(), 1);
    }

    #[test]
    fn test_limit_is_per_address() {
        let limiter = LoginRateLimiter::default();
        let now = Instant::now();
        for _ in 0..5 {
            limiter.try_acquire_at(ADDR, now).expect("slot");
        }

        assert!(limiter.try_acquire_at(ADDR, now).is_err());
        assert!(limiter.try_acquire_at(OTHER, now).is_ok());
    }

    #[test]
    fn test_window_slides_per_attempt() {
        let limiter = LoginRateLimiter::new(RateLimitConfig {
            window: Duration::from_secs(60),
            max_failures: 2,
        });
        let start = Instant::now();
        limiter.try_acquire_at(ADDR, start).expect("first");
        limiter.try_acquire_at(ADDR, start + Duration::from_secs(30)).expect("second");

        assert!(limiter.try_acquire_at(ADDR, start + Duration::from_secs(59)).is_err());
        // First attempt aged out, only one left.
        assert!(limiter.try_acquire_at(ADDR, start + Duration::from_secs(60)).is_ok());
    }

    #[test]
    fn test_purge_drops_aged_out_addresses() {
        let limiter = LoginRateLimiter::new(RateLimitConfig {
            window: Duration::ZERO,
            max_failures: 5,
        });
        limiter.try_acquire(ADDR).expect("slot");

        limiter.purge();

        assert_eq!(limiter.tracked(), 0);
    }
}
