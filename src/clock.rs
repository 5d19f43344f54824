/// Cross-platform wall-clock deadline for bounded searches
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    #[cfg(not(target_arch = "wasm32"))]
    start: std::time::Instant,
    #[cfg(target_arch = "wasm32")]
    start_ms: f64,
    limit_ms: Option<u64>,
}

impl Deadline {
    /// Start a clock that expires after `limit_ms`; `None` never expires.
    pub fn start(limit_ms: Option<u64>) -> Self {
        Self {
            #[cfg(not(target_arch = "wasm32"))]
            start: std::time::Instant::now(),
            #[cfg(target_arch = "wasm32")]
            start_ms: now_ms(),
            limit_ms,
        }
    }

    /// Milliseconds since the clock started
    pub fn elapsed_ms(&self) -> u64 {
        #[cfg(not(target_arch = "wasm32"))]
        {
            self.start.elapsed().as_millis() as u64
        }
        #[cfg(target_arch = "wasm32")]
        {
            (now_ms() - self.start_ms).max(0.0) as u64
        }
    }

    pub fn is_expired(&self) -> bool {
        self.limit_ms
            .is_some_and(|limit| self.elapsed_ms() >= limit)
    }

    /// Milliseconds left, or `None` for a clock that never expires
    pub fn remaining_ms(&self) -> Option<u64> {
        self.limit_ms
            .map(|limit| limit.saturating_sub(self.elapsed_ms()))
    }
}

// `performance.now()` when a window is available (browsers), `Date.now()` otherwise (workers, node).
#[cfg(target_arch = "wasm32")]
fn now_ms() -> f64 {
    web_sys::window()
        .and_then(|window| window.performance())
        .map_or_else(js_sys::Date::now, |performance| performance.now())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unbounded_never_expires() {
        assert!(!Deadline::start(None).is_expired());
    }

    #[test]
    fn test_zero_limit_is_expired() {
        assert!(Deadline::start(Some(0)).is_expired());
    }

    #[test]
    fn test_remaining() {
        assert_eq!(Deadline::start(None).remaining_ms(), None);
        assert_eq!(Deadline::start(Some(0)).remaining_ms(), Some(0));
        assert!(Deadline::start(Some(60_000)).remaining_ms().is_some_and(|ms| ms > 0));
    }
}
