//! A sliding-log rate limiter keyed by an arbitrary identity, for limiting
//! per-requester traffic (as opposed to [`crate::RateLimiterLayer`], which
//! limits a single shared resource).
//!
//! This is the shape the bulk/CIDR lookup endpoints need: each requester IP
//! gets its own 60-second sliding window, and stale windows are swept
//! periodically so the map doesn't grow without bound.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::sync::Mutex;
use std::time::{Duration, Instant};

struct Window {
    hits: VecDeque<Instant>,
}

impl Window {
    fn new() -> Self {
        Self {
            hits: VecDeque::new(),
        }
    }

    fn prune(&mut self, now: Instant, period: Duration) {
        while let Some(&front) = self.hits.front() {
            if now.duration_since(front) >= period {
                self.hits.pop_front();
            } else {
                break;
            }
        }
    }
}

/// Per-key sliding window limiter: at most `limit` hits per `period` for any
/// single key.
pub struct KeyedSlidingWindowLimiter<K> {
    limit: usize,
    period: Duration,
    windows: Mutex<HashMap<K, Window>>,
}

impl<K> KeyedSlidingWindowLimiter<K>
where
    K: Eq + Hash,
{
    pub fn new(limit: usize, period: Duration) -> Self {
        Self {
            limit,
            period,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Tries to record `cost` hits against `key`'s window. Returns `Ok(())`
    /// if all of them fit under the limit (and records them), or
    /// `Err(retry_after)` if the key's window is already saturated.
    ///
    /// Unlike a permit-at-a-time limiter, bulk/CIDR requests consume many
    /// units (one per IP) in a single call, so the whole batch either fits
    /// or is rejected atomically.
    pub fn try_acquire(&self, key: K, cost: usize) -> Result<(), Duration> {
        let now = Instant::now();
        let mut windows = self.windows.lock().unwrap();
        let window = match windows.entry(key) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(Window::new()),
        };
        window.prune(now, self.period);

        if window.hits.len() + cost > self.limit {
            let retry_after = window
                .hits
                .front()
                .map(|&oldest| (oldest + self.period).saturating_duration_since(now))
                .unwrap_or(self.period);
            return Err(retry_after);
        }

        for _ in 0..cost {
            window.hits.push_back(now);
        }
        Ok(())
    }

    /// Removes windows that have had no activity for a full period. Intended
    /// to run on a background interval; never called from the request path.
    pub fn sweep(&self) {
        let now = Instant::now();
        let mut windows = self.windows.lock().unwrap();
        windows.retain(|_, window| {
            window.prune(now, self.period);
            !window.hits.is_empty()
        });
    }

    pub fn tracked_keys(&self) -> usize {
        self.windows.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_up_to_the_limit_per_key() {
        let limiter = KeyedSlidingWindowLimiter::new(3, Duration::from_secs(60));
        assert!(limiter.try_acquire("1.2.3.4", 2).is_ok());
        assert!(limiter.try_acquire("1.2.3.4", 1).is_ok());
        assert!(limiter.try_acquire("1.2.3.4", 1).is_err());
    }

    #[test]
    fn keys_are_independent() {
        let limiter = KeyedSlidingWindowLimiter::new(1, Duration::from_secs(60));
        assert!(limiter.try_acquire("a", 1).is_ok());
        assert!(limiter.try_acquire("b", 1).is_ok());
        assert!(limiter.try_acquire("a", 1).is_err());
    }

    #[test]
    fn sweep_drops_idle_keys() {
        let limiter = KeyedSlidingWindowLimiter::new(1, Duration::from_millis(10));
        limiter.try_acquire("a", 1).unwrap();
        assert_eq!(limiter.tracked_keys(), 1);
        std::thread::sleep(Duration::from_millis(15));
        limiter.sweep();
        assert_eq!(limiter.tracked_keys(), 0);
    }
}
