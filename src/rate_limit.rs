//! Fixed-window admission control.
//!
//! Each (subject, operation) pair gets an independent window of fixed length
//! in which at most `max_requests` admissions succeed. The window table is the
//! only long-lived shared mutable state in the crate and sits behind a single
//! mutex, so the check/reset/increment sequence is atomic per admission.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Runtime settings for a [`RateLimiter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitSettings {
    /// Window length.
    pub window: Duration,
    /// Maximum admissions per window for one key.
    pub max_requests: u32,
    /// Tracked-key count above which expired windows are swept.
    pub cleanup_threshold: usize,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(60),
            max_requests: 5,
            cleanup_threshold: 1000,
        }
    }
}

/// Result of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Request admitted; `count` is its position within the current window (1-based).
    Allow { count: u32 },
    /// Request rejected until the window resets.
    Reject { retry_after_secs: u64 },
}

impl Admission {
    /// Returns true if the request was admitted.
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow { .. })
    }
}

/// Time source for the limiter.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall-clock time source.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Manually advanced time source for tests and simulations.
#[derive(Debug)]
pub struct ManualClock {
    base: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    /// Creates a clock frozen at the current instant.
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    /// Moves the clock forward.
    pub fn advance(&self, by: Duration) {
        let mut offset = self.offset.lock().unwrap_or_else(|e| e.into_inner());
        *offset += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        let offset = *self.offset.lock().unwrap_or_else(|e| e.into_inner());
        self.base + offset
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct WindowKey {
    subject: String,
    operation: String,
}

#[derive(Debug, Clone, Copy)]
struct RateWindow {
    count: u32,
    reset_at: Instant,
}

/// Fixed-window rate limiter keyed by (subject, operation).
pub struct RateLimiter {
    settings: RateLimitSettings,
    clock: Arc<dyn Clock>,
    windows: Mutex<HashMap<WindowKey, RateWindow>>,
}

impl RateLimiter {
    /// Creates a limiter driven by the system clock.
    pub fn new(settings: RateLimitSettings) -> Self {
        Self::with_clock(settings, Arc::new(SystemClock))
    }

    /// Creates a limiter driven by the given clock.
    pub fn with_clock(settings: RateLimitSettings, clock: Arc<dyn Clock>) -> Self {
        Self {
            settings,
            clock,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the limiter's settings.
    pub fn settings(&self) -> &RateLimitSettings {
        &self.settings
    }

    /// Checks and records one request for `(subject, operation)`.
    pub fn admit(&self, subject: &str, operation: &str) -> Admission {
        let now = self.clock.now();
        let mut windows = self.lock_windows();

        if windows.len() > self.settings.cleanup_threshold {
            let before = windows.len();
            windows.retain(|_, window| now < window.reset_at);
            tracing::debug!(
                removed = before - windows.len(),
                remaining = windows.len(),
                "Swept expired rate windows"
            );
        }

        let key = WindowKey {
            subject: subject.to_string(),
            operation: operation.to_string(),
        };
        let window = windows.entry(key).or_insert(RateWindow {
            count: 0,
            reset_at: now + self.settings.window,
        });

        if now >= window.reset_at {
            window.count = 0;
            window.reset_at = now + self.settings.window;
        }

        if window.count >= self.settings.max_requests {
            let retry_after_secs = ceil_secs(window.reset_at.saturating_duration_since(now))
                .clamp(1, ceil_secs(self.settings.window).max(1));
            tracing::warn!(
                subject,
                operation,
                count = window.count,
                retry_after_secs,
                "Rate limit exceeded"
            );
            return Admission::Reject { retry_after_secs };
        }

        window.count += 1;
        tracing::debug!(
            subject,
            operation,
            count = window.count,
            max = self.settings.max_requests,
            "Request admitted"
        );
        Admission::Allow {
            count: window.count,
        }
    }

    /// Returns the number of keys currently tracked.
    pub fn tracked_keys(&self) -> usize {
        self.lock_windows().len()
    }

    /// Drops every window.
    pub fn reset(&self) {
        self.lock_windows().clear();
    }

    fn lock_windows(&self) -> MutexGuard<'_, HashMap<WindowKey, RateWindow>> {
        self.windows.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn ceil_secs(duration: Duration) -> u64 {
    duration.as_secs() + u64::from(duration.subsec_nanos() > 0)
}
