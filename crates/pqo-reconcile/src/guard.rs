//! A clock-injectable, fail-closed freshness gate over the reconciler's last
//! clean run, mirroring the execution core's reconcile-freshness pattern:
//! absence of a recent clean result reads as "not clean", never as "unknown
//! therefore fine".

use chrono::{DateTime, Utc};

pub struct ReconcileFreshnessGuard<C>
where
    C: Fn() -> DateTime<Utc>,
{
    freshness_bound: chrono::Duration,
    last_clean_at: Option<DateTime<Utc>>,
    clock: C,
}

impl<C> ReconcileFreshnessGuard<C>
where
    C: Fn() -> DateTime<Utc>,
{
    pub fn new(freshness_bound: chrono::Duration, clock: C) -> Self {
        Self { freshness_bound, last_clean_at: None, clock }
    }

    /// Records the outcome of a sweep. A clean sweep (no unresolved
    /// duplicates) stamps the gate; a dirty one clears it immediately rather
    /// than waiting for the bound to lapse naturally.
    pub fn record_sweep_result(&mut self, is_clean: bool) {
        self.last_clean_at = if is_clean { Some((self.clock)()) } else { None };
    }

    pub fn last_clean_at(&self) -> Option<DateTime<Utc>> {
        self.last_clean_at
    }

    /// `true` only if a clean sweep was recorded within the freshness bound.
    pub fn is_clean(&self) -> bool {
        match self.last_clean_at {
            None => false,
            Some(t) => (self.clock)() - t <= self.freshness_bound,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn guard_with_clock(now: &'static Cell<DateTime<Utc>>) -> ReconcileFreshnessGuard<impl Fn() -> DateTime<Utc>> {
        ReconcileFreshnessGuard::new(chrono::Duration::minutes(10), move || now.get())
    }

    #[test]
    fn starts_dirty() {
        let now: &'static Cell<DateTime<Utc>> = Box::leak(Box::new(Cell::new(Utc::now())));
        let guard = guard_with_clock(now);
        assert!(!guard.is_clean());
    }

    #[test]
    fn clean_sweep_is_fresh_until_bound_elapses() {
        let now: &'static Cell<DateTime<Utc>> = Box::leak(Box::new(Cell::new(Utc::now())));
        let mut guard = guard_with_clock(now);
        guard.record_sweep_result(true);
        assert!(guard.is_clean());

        now.set(now.get() + chrono::Duration::minutes(11));
        assert!(!guard.is_clean());
    }

    #[test]
    fn dirty_sweep_clears_the_gate_immediately() {
        let now: &'static Cell<DateTime<Utc>> = Box::leak(Box::new(Cell::new(Utc::now())));
        let mut guard = guard_with_clock(now);
        guard.record_sweep_result(true);
        assert!(guard.is_clean());
        guard.record_sweep_result(false);
        assert!(!guard.is_clean());
    }
}
