use std::{
    collections::VecDeque,
    time::{Duration, Instant},
};

/// Sliding window rate limiter: at most `max_requests` are admitted within any
/// period of length `window`.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    admitted: VecDeque<Instant>,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            admitted: VecDeque::with_capacity(max_requests),
        }
    }

    /// Admits a request at `now` if the window has room left.
    /// `now` must not go backwards between calls.
    pub fn try_acquire_at(&mut self, now: Instant) -> bool {
        while let Some(oldest) = self.admitted.front() {
            if now.saturating_duration_since(*oldest) >= self.window {
                self.admitted.pop_front();
            } else {
                break;
            }
        }

        if self.admitted.len() < self.max_requests {
            self.admitted.push_back(now);
            true
        } else {
            false
        }
    }

    pub fn try_acquire(&mut self) -> bool {
        self.try_acquire_at(Instant::now())
    }

    /// Number of requests currently counted against the window
    pub fn in_window(&self) -> usize {
        self.admitted.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_within_window() {
        let start = Instant::now();
        let mut limiter = RateLimiter::new(2, Duration::from_secs(60));

        assert!(limiter.try_acquire_at(start));
        assert!(limiter.try_acquire_at(start + Duration::from_secs(1)));
        assert!(!limiter.try_acquire_at(start + Duration::from_secs(2)));
        assert_eq!(limiter.in_window(), 2);
    }

    #[test]
    fn test_window_slides() {
        let start = Instant::now();
        let mut limiter = RateLimiter::new(2, Duration::from_secs(60));

        assert!(limiter.try_acquire_at(start));
        assert!(limiter.try_acquire_at(start + Duration::from_secs(30)));
        assert!(!limiter.try_acquire_at(start + Duration::from_secs(59)));
        // the first request left the window, the second did not
        assert!(limiter.try_acquire_at(start + Duration::from_secs(60)));
        assert!(!limiter.try_acquire_at(start + Duration::from_secs(61)));
        assert!(limiter.try_acquire_at(start + Duration::from_secs(90)));
    }

    #[test]
    fn test_denied_requests_do_not_count() {
        let start = Instant::now();
        let mut limiter = RateLimiter::new(1, Duration::from_secs(10));

        assert!(limiter.try_acquire_at(start));
        for s in 1..10 {
            assert!(!limiter.try_acquire_at(start + Duration::from_secs(s)));
        }
        assert!(limiter.try_acquire_at(start + Duration::from_secs(10)));
    }
}
