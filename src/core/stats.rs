//! Request, token and cost counters shared across the server

use serde::Serialize;
use std::fmt;
use std::sync::{PoisonError, RwLock};

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct StatsSnapshot {
    pub requests: u64,
    pub tokens: u64,
    pub cost: f64,
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Tokens: {} | Requests: {} | Cost: ${:.4}",
            self.tokens, self.requests, self.cost
        )
    }
}

/// Thread-safe usage counters
#[derive(Debug, Default)]
pub struct Stats {
    inner: RwLock<StatsSnapshot>,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    fn update(&self, f: impl FnOnce(&mut StatsSnapshot)) {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut *guard);
    }

    pub fn record_request(&self) {
        self.update(|s| s.requests += 1);
    }

    pub fn add_tokens(&self, tokens: u64) {
        self.update(|s| s.tokens += tokens);
    }

    pub fn add_cost(&self, cost: f64) {
        self.update(|s| s.cost += cost);
    }

    /// Zero every counter
    pub fn reset(&self) {
        self.update(|s| *s = StatsSnapshot::default());
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        *self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_counters_accumulate() {
        let stats = Stats::new();
        stats.record_request();
        stats.record_request();
        stats.add_tokens(10);
        stats.add_tokens(5);
        stats.add_cost(1.5);
        stats.add_cost(0.5);
        assert_eq!(
            stats.snapshot(),
            StatsSnapshot {
                requests: 2,
                tokens: 15,
                cost: 2.0
            }
        );
    }

    #[test]
    fn test_reset() {
        let stats = Stats::new();
        stats.record_request();
        stats.add_tokens(100);
        stats.add_cost(5.0);
        stats.reset();
        assert_eq!(stats.snapshot(), StatsSnapshot::default());
    }

    #[test]
    fn test_status_line() {
        let snapshot = StatsSnapshot {
            requests: 5,
            tokens: 50,
            cost: 2.5,
        };
        assert_eq!(
            snapshot.to_string(),
            "Tokens: 50 | Requests: 5 | Cost: $2.5000"
        );
    }

    #[test]
    fn test_concurrent_updates() {
        let stats = Arc::new(Stats::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let stats = stats.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        stats.record_request();
                        stats.add_tokens(2);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.requests, 800);
        assert_eq!(snapshot.tokens, 1600);
    }
}
