//! Circuit breaker guarding the quality evaluator

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone)]
struct BreakerEntry {
    state: BreakerState,
    consecutive_failures: usize,
    opened_at: Option<Instant>,
}

impl BreakerEntry {
    fn new() -> Self {
        Self {
            state: BreakerState::Closed,
            consecutive_failures: 0,
            opened_at: None,
        }
    }
}

/// Circuit breaker configuration
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: usize,
    pub reset_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(30),
        }
    }
}

/// Per-key breaker: after `failure_threshold` consecutive scoring failures
/// the key rejects calls until `reset_timeout` elapses, then lets one probe
/// through (half-open).
pub struct CircuitBreaker {
    entries: Mutex<HashMap<String, BreakerEntry>>,
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            config,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, BreakerEntry>> {
        // Entries stay consistent even if a holder panicked
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Whether calls for `key` should be rejected right now
    pub fn is_open(&self, key: &str) -> bool {
        let mut entries = self.lock();
        let entry = entries.entry(key.to_string()).or_insert_with(BreakerEntry::new);

        match entry.state {
            BreakerState::Closed | BreakerState::HalfOpen => false,
            BreakerState::Open => match entry.opened_at {
                Some(opened_at) if opened_at.elapsed() >= self.config.reset_timeout => {
                    entry.state = BreakerState::HalfOpen;
                    false
                }
                _ => true,
            },
        }
    }

    pub fn mark_success(&self, key: &str) {
        let mut entries = self.lock();
        entries.insert(key.to_string(), BreakerEntry::new());
    }

    pub fn mark_failure(&self, key: &str) {
        let mut entries = self.lock();
        let entry = entries.entry(key.to_string()).or_insert_with(BreakerEntry::new);

        entry.consecutive_failures += 1;

        // A failed half-open probe reopens immediately
        if entry.state == BreakerState::HalfOpen
            || entry.consecutive_failures >= self.config.failure_threshold
        {
            entry.state = BreakerState::Open;
            entry.opened_at = Some(Instant::now());
        }
    }

    pub fn state(&self, key: &str) -> BreakerState {
        self.lock()
            .get(key)
            .map(|e| e.state)
            .unwrap_or(BreakerState::Closed)
    }

    pub fn failure_count(&self, key: &str) -> usize {
        self.lock()
            .get(key)
            .map(|e| e.consecutive_failures)
            .unwrap_or(0)
    }

    pub fn reset(&self, key: &str) {
        self.lock().remove(key);
    }
}
