//! Wall-clock deadlines threaded through the analyzer (§5).
//!
//! Every [`crate::analyzer::Analyzer`] call accepts an optional deadline,
//! checked between timesteps, between partitioner cell splits, and before
//! each propagator call. A deadline hit is not an error: the caller gets
//! back the best sound prefix computed so far with `truncated: true`.

use std::time::{Duration, Instant};

/// A wall-clock deadline for one analysis call.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    /// A deadline `timeout` from now.
    pub fn after(timeout: Duration) -> Self {
        Self {
            at: Instant::now() + timeout,
        }
    }

    /// A deadline that has already passed, for exercising truncation
    /// deterministically (spec scenario 5: a zero-millisecond deadline).
    pub fn expired_now() -> Self {
        Self { at: Instant::now() }
    }

    /// `true` if this deadline has passed.
    pub fn expired(&self) -> bool {
        Instant::now() >= self.at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expired_now_is_immediately_past() {
        let deadline = Deadline::expired_now();
        std::thread::sleep(Duration::from_millis(1));
        assert!(deadline.expired());
    }

    #[test]
    fn after_a_generous_timeout_is_not_expired() {
        let deadline = Deadline::after(Duration::from_secs(60));
        assert!(!deadline.expired());
    }
}
