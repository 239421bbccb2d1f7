//! pqo-lock — the distributed lock manager (spec §4.3): transactional
//! acquisition, heartbeat-extended leases, and a `with_lock` convenience.

pub mod error;
pub mod manager;

pub use error::LockError;
pub use manager::{AcquireOptions, LockGuard, LockManager};

#[cfg(test)]
mod tests {
    use super::manager::*;
    use std::time::Duration;

    #[test]
    fn acquire_options_default_enables_heartbeat() {
        let opts = AcquireOptions::default();
        assert!(opts.heartbeat);
        assert!(opts.ttl.is_none());
        assert!(opts.max_retries.is_none());
    }

    #[test]
    fn backoff_with_jitter_is_bounded() {
        for attempt in 0..12 {
            let d = backoff_with_jitter(attempt);
            assert!(d <= Duration::from_millis(5_000));
        }
    }
}
