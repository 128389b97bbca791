use std::time::{Duration, Instant};

use dashmap::DashMap;

pub const LOGIN_WINDOW: Duration = Duration::from_secs(15 * 60);
pub const LOGIN_MAX_FAILURES: u32 = 5;

struct Attempts {
    count: u32,
    window_start: Instant,
}

/// Per-email login budget inside a fixed window.
///
/// Every attempt reserves a slot up front, so concurrent attempts cannot
/// overrun the budget while their password checks are in flight. A
/// successful login clears the email; an attempt that failed for reasons
/// other than bad credentials hands its slot back.
/// Keys are lowercased so case variants share one budget.
pub struct LoginRateLimiter {
    entries: DashMap<String, Attempts>,
    max_failures: u32,
    window: Duration,
}

impl Default for LoginRateLimiter {
    fn default() -> Self {
        Self::new(LOGIN_MAX_FAILURES, LOGIN_WINDOW)
    }
}

impl LoginRateLimiter {
    pub fn new(max_failures: u32, window: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            max_failures,
            window,
        }
    }

    /// Reserve one attempt. Err carries the time left until the window closes.
    pub fn acquire(&self, email: &str) -> Result<(), Duration> {
        let now = Instant::now();
        let mut entry = self
            .entries
            .entry(email.to_lowercase())
            .or_insert(Attempts {
                count: 0,
                window_start: now,
            });

        let elapsed = now.duration_since(entry.window_start);
        if elapsed > self.window {
            entry.count = 0;
            entry.window_start = now;
        } else if entry.count >= self.max_failures {
            return Err(self.window.saturating_sub(elapsed));
        }

        entry.count += 1;
        Ok(())
    }

    /// Give back a reserved attempt that did not fail on credentials.
    pub fn release(&self, email: &str) {
        if let Some(mut entry) = self.entries.get_mut(&email.to_lowercase()) {
            entry.count = entry.count.saturating_sub(1);
        }
    }

    /// Forget attempts for an email after a successful login.
    pub fn reset(&self, email: &str) {
        self.entries.remove(&email.to_lowercase());
    }

    /// Drop entries whose window has closed.
    pub fn cleanup(&self) {
        let window = self.window;
        self.entries
            .retain(|_, attempts| attempts.window_start.elapsed() < window);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[test]
    fn blocks_after_budget_is_spent() {
        let limiter = LoginRateLimiter::default();
        for _ in 0..4 {
            assert!(limiter.acquire("user@example.com").is_ok());
        }
        assert!(limiter.acquire("USER@example.com").is_ok());

        let retry_after = limiter.acquire("user@example.com").unwrap_err();
        assert!(retry_after <= LOGIN_WINDOW);
        assert!(limiter.acquire("other@example.com").is_ok());
    }

    #[test]
    fn reset_clears_attempts() {
        let limiter = LoginRateLimiter::new(2, LOGIN_WINDOW);
        limiter.acquire("user@example.com").unwrap();
        limiter.acquire("user@example.com").unwrap();
        assert!(limiter.acquire("user@example.com").is_err());

        limiter.reset("user@example.com");
        assert!(limiter.acquire("user@example.com").is_ok());
    }

    #[test]
    fn release_returns_the_slot() {
        let limiter = LoginRateLimiter::new(1, LOGIN_WINDOW);
        limiter.acquire("user@example.com").unwrap();
        limiter.release("user@example.com");
        assert!(limiter.acquire("user@example.com").is_ok());
        assert!(limiter.acquire("user@example.com").is_err());
    }

    #[test]
    fn concurrent_attempts_cannot_exceed_budget() {
        let limiter = Arc::new(LoginRateLimiter::default());
        let admitted = Arc::new(AtomicU32::new(0));
        let barrier = Arc::new(std::sync::Barrier::new(16));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let limiter = limiter.clone();
                let admitted = admitted.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    if limiter.acquire("user@example.com").is_ok() {
                        admitted.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(admitted.load(Ordering::SeqCst), LOGIN_MAX_FAILURES);
    }

    #[test]
    fn closed_window_admits_again() {
        let limiter = LoginRateLimiter::new(1, Duration::ZERO);
        limiter.acquire("user@example.com").unwrap();
        std::thread::sleep(Duration::from_millis(5));
        assert!(limiter.acquire("user@example.com").is_ok());

        std::thread::sleep(Duration::from_millis(5));
        limiter.cleanup();
        assert!(limiter.entries.is_empty());
    }
}
